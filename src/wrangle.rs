//! Ingestion run: schema, document pass, category pass.
//!
//! One store connection is held for the whole run and committed at the end.
//! A fatal error (unreadable input, bad schema, broken store) returns early
//! and leaves the run's writes uncommitted.

use crate::config::WrangleConfig;
use crate::errlog::{ErrorKind, ErrorLog, ErrorRecord};
use crate::error::Result;
use crate::normalize::{parse_cat_row, parse_doc_row, RowOutcome};
use crate::records::{open_reader, CategoryRow, DocumentRow, CATEGORY_COLUMNS, DOCUMENT_COLUMNS};
use crate::schema::{create_database, load_schema};
use crate::store::Store;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::path::Path;
use tracing::{info, warn};

/// Counters for one ingestion run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WrangleStats {
    pub documents: usize,
    pub articles: usize,
    pub categories: usize,
    pub labels: usize,
    pub errors: usize,
}

/// Build the database described by `config` from the two CSV exports.
pub fn wrangle(config: &WrangleConfig) -> Result<WrangleStats> {
    config.validate()?;

    let schema = load_schema(config.schema.as_deref())?;
    create_database(&config.db, config.force, &schema)?;

    let store = Store::open(&config.db)?;
    let mut log = ErrorLog::create(&config.report)?;
    let mut stats = WrangleStats::default();

    info!(path = %config.docs.display(), "Loading documents");
    run_pass::<DocumentRow, _>(&config.docs, DOCUMENT_COLUMNS, &mut log, |row| {
        stats.documents += 1;
        let outcome = parse_doc_row(&store, row)?;
        if outcome.id.is_some() {
            stats.articles += 1;
        }
        Ok(outcome)
    })?;
    info!(documents = stats.documents, articles = stats.articles, "Document pass complete");

    info!(path = %config.cats.display(), "Loading categories");
    run_pass::<CategoryRow, _>(&config.cats, CATEGORY_COLUMNS, &mut log, |row| {
        stats.categories += 1;
        let outcome = parse_cat_row(&store, row)?;
        if outcome.is_ok() {
            stats.labels += 1;
        }
        Ok(outcome)
    })?;
    info!(categories = stats.categories, labels = stats.labels, "Category pass complete");

    store.commit()?;
    stats.errors = log.finish()?;

    info!(
        documents = stats.documents,
        articles = stats.articles,
        categories = stats.categories,
        labels = stats.labels,
        errors = stats.errors,
        "Wrangle complete"
    );
    Ok(stats)
}

/// Feed every row of one CSV through `handle`, logging row-level errors.
fn run_pass<T, F>(path: &Path, required: &[&str], log: &mut ErrorLog, mut handle: F) -> Result<()>
where
    T: DeserializeOwned,
    F: FnMut(&T) -> Result<RowOutcome>,
{
    let mut reader = open_reader(path, required)?;

    for result in reader.deserialize::<T>() {
        let outcome = match result {
            Ok(row) => handle(&row)?,
            Err(e) => {
                let line = e.position().map(|p| p.line());
                RowOutcome {
                    id: None,
                    errors: vec![ErrorRecord::new(
                        ErrorKind::ParseRow,
                        json!({
                            "file": path.display().to_string(),
                            "line": line,
                        }),
                    )
                    .with_exception(e)],
                }
            }
        };

        if !outcome.is_ok() {
            for record in &outcome.errors {
                warn!(kind = %record.error, "Row error");
            }
            log.write_all(&outcome.errors)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BiblioError;
    use rusqlite::Connection;
    use tempfile::{tempdir, TempDir};

    fn csv_line(values: &[&str]) -> String {
        values
            .iter()
            .map(|v| format!("\"{}\"", v.replace('"', "\"\"")))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Document CSV with every required column; unspecified cells are empty.
    fn documents_csv(rows: &[&[(&str, &str)]]) -> String {
        let mut out = csv_line(DOCUMENT_COLUMNS);
        out.push('\n');
        for row in rows {
            let cells: Vec<&str> = DOCUMENT_COLUMNS
                .iter()
                .map(|col| {
                    row.iter()
                        .find(|(name, _)| name == col)
                        .map(|(_, v)| *v)
                        .unwrap_or("")
                })
                .collect();
            out.push_str(&csv_line(&cells));
            out.push('\n');
        }
        out
    }

    struct Fixture {
        dir: TempDir,
        config: WrangleConfig,
    }

    fn fixture(docs: &str, cats: &str) -> Fixture {
        let dir = tempdir().expect("tempdir");
        let docs_path = dir.path().join("docs.csv");
        let cats_path = dir.path().join("cats.csv");
        std::fs::write(&docs_path, docs).expect("write docs");
        std::fs::write(&cats_path, cats).expect("write cats");
        let config = WrangleConfig::new(
            docs_path,
            cats_path,
            dir.path().join("biblio.db"),
            dir.path().join("wrangle_report.json"),
        );
        Fixture { dir, config }
    }

    fn count(db: &Path, table: &str) -> i64 {
        let conn = Connection::open(db).expect("open");
        conn.query_row(&format!("SELECT count(*) FROM {}", table), [], |r| r.get(0))
            .expect("count")
    }

    #[test]
    fn test_end_to_end_single_article() -> Result<()> {
        let docs = documents_csv(&[&[
            ("Document Title", "T"),
            ("Publication Title", "P"),
            ("Authors", "X;Y"),
            ("Author Affiliations", "Aff1;Aff2"),
            ("Publication_Year", "2018"),
        ]]);
        let cats = "\u{feff}Publication_Year,Document Title,Domain\n2018,T,D\n";
        let fx = fixture(&docs, cats);

        let stats = wrangle(&fx.config)?;
        assert_eq!(
            stats,
            WrangleStats {
                documents: 1,
                articles: 1,
                categories: 1,
                labels: 1,
                errors: 0,
            }
        );

        let db = &fx.config.db;
        assert_eq!(count(db, "publications"), 1);
        assert_eq!(count(db, "articles"), 1);
        assert_eq!(count(db, "authors"), 2);
        assert_eq!(count(db, "affiliations"), 2);
        assert_eq!(count(db, "author_affiliations"), 2);
        assert_eq!(count(db, "author_articles"), 2);
        assert_eq!(count(db, "keywords"), 0);
        assert_eq!(count(db, "article_keywords"), 0);
        assert_eq!(count(db, "labels"), 1);
        assert_eq!(count(db, "article_labels"), 1);

        let report = std::fs::read_to_string(&fx.config.report)?;
        assert!(report.is_empty());
        assert!(fx.dir.path().exists());
        Ok(())
    }

    #[test]
    fn test_errors_are_logged_not_fatal() -> Result<()> {
        let docs = documents_csv(&[
            &[
                ("Document Title", "T"),
                ("Publication Title", "P"),
                ("Authors", "A;A;B"),
                ("Author Affiliations", "X;Y;Z"),
            ],
            &[("Document Title", "U"), ("Publication Title", "P")],
        ]);
        let cats = "Document Title,Publication_Year,Domain\nMissing,2018,D\nU,,E\n";
        let fx = fixture(&docs, cats);

        let stats = wrangle(&fx.config)?;
        assert_eq!(stats.articles, 2);
        assert_eq!(stats.labels, 1);
        assert_eq!(stats.errors, 2);

        let report = std::fs::read_to_string(&fx.config.report)?;
        let records: Vec<ErrorRecord> = report
            .lines()
            .map(serde_json::from_str)
            .collect::<std::result::Result<_, _>>()?;
        let kinds: Vec<ErrorKind> = records.iter().map(|r| r.error).collect();
        assert_eq!(kinds, vec![ErrorKind::DuplicateAuthors, ErrorKind::LookupArticle]);
        assert_eq!(count(&fx.config.db, "article_labels"), 1);
        Ok(())
    }

    #[test]
    fn test_malformed_row_is_recorded() -> Result<()> {
        let mut docs = documents_csv(&[&[("Document Title", "T"), ("Publication Title", "P")]]);
        docs.push_str("\"too\",\"short\"\n");
        let fx = fixture(&docs, "Document Title,Publication_Year,Domain\n");

        let stats = wrangle(&fx.config)?;
        assert_eq!(stats.documents, 1);
        assert_eq!(stats.errors, 1);

        let report = std::fs::read_to_string(&fx.config.report)?;
        let record: ErrorRecord = serde_json::from_str(report.trim())?;
        assert_eq!(record.error, ErrorKind::ParseRow);
        assert_eq!(record.data["line"], json!(3));
        Ok(())
    }

    #[test]
    fn test_existing_database_requires_force() -> Result<()> {
        let docs = documents_csv(&[]);
        let fx = fixture(&docs, "Document Title,Publication_Year,Domain\n");
        std::fs::write(&fx.config.db, b"existing")?;

        let err = wrangle(&fx.config).expect_err("database exists");
        assert!(matches!(err, BiblioError::AlreadyExists(_)));

        let forced = fx.config.clone().with_force(true);
        let stats = wrangle(&forced)?;
        assert_eq!(stats, WrangleStats::default());
        Ok(())
    }

    #[test]
    fn test_missing_column_is_fatal() {
        let fx = fixture(
            "Document Title,Authors\nT,A\n",
            "Document Title,Publication_Year,Domain\n",
        );
        let err = wrangle(&fx.config).expect_err("missing columns");
        assert!(matches!(err, BiblioError::MissingColumn { .. }));
    }
}
