//! Relational store access.
//!
//! [`Store`] wraps one SQLite connection for a whole ingestion run. Lookup
//! tables are filled through resolve-or-create: find the row by its natural
//! key and return its id, or insert it and return the new id.

use crate::error::{BiblioError, Result};
use crate::records::{non_empty, parse_int, DocumentRow};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use tracing::debug;

/// Label type recorded for every label created by the category pass
pub const LABEL_SOURCE: &str = "sgsma_manual";

/// Outcome of inserting an association row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// New link row with this id
    Created(i64),
    /// The pair was already linked
    Existing,
}

/// SQLite-backed store for one ingestion run
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open the database at `path` and start the run's transaction.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Wrap an already opened connection (used for in-memory databases).
    pub fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON; BEGIN;")?;
        Ok(Self { conn })
    }

    /// Read-only access for queries outside the ingestion API
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Commit everything written in this run and close the connection.
    ///
    /// Dropping a store without committing discards the run's writes.
    pub fn commit(self) -> Result<()> {
        self.conn.execute_batch("COMMIT;")?;
        self.conn.close().map_err(|(_, e)| BiblioError::Sqlite(e))?;
        debug!("Store committed and closed");
        Ok(())
    }

    /// Resolve or create a publication by trimmed title.
    ///
    /// Publisher and meeting date are captured only when the publication is
    /// first created.
    pub fn get_or_create_publication(
        &self,
        title: &str,
        publisher: &str,
        meeting_date: &str,
    ) -> Result<i64> {
        let title = title.trim();
        if let Some(id) = self.lookup_id("SELECT id FROM publications WHERE title=?1", params![title])? {
            return Ok(id);
        }
        self.conn
            .execute(
                "INSERT INTO publications (title, publisher, meeting_date) VALUES (?1, ?2, ?3)",
                params![title, publisher.trim(), meeting_date.trim()],
            )
            .map_err(BiblioError::from_sqlite)?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Insert one article from a document row.
    ///
    /// Empty text fields and unparseable numbers are left out of the insert
    /// so they are stored as NULL.
    pub fn insert_article(&self, row: &DocumentRow, publication_id: i64) -> Result<i64> {
        let fields = article_fields(row, publication_id);
        let columns: Vec<&str> = fields.iter().map(|(c, _)| *c).collect();
        let placeholders: Vec<String> = (1..=fields.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO articles ({}) VALUES ({})",
            columns.join(","),
            placeholders.join(",")
        );

        self.conn
            .execute(&sql, params_from_iter(fields.into_iter().map(|(_, v)| v)))
            .map_err(BiblioError::from_sqlite)?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Find an article for a category row.
    ///
    /// An article with the same title and publication year is preferred;
    /// otherwise the first article with the title is returned.
    pub fn lookup_article(&self, title: &str, pub_year: Option<i64>) -> Result<Option<i64>> {
        self.lookup_id(
            "SELECT id FROM articles WHERE title=?1
             ORDER BY (pub_year IS NOT NULL AND pub_year = ?2) DESC, id
             LIMIT 1",
            params![title.trim(), pub_year],
        )
    }

    /// Resolve or create an author by exact name.
    pub fn get_or_create_author(&self, name: &str) -> Result<i64> {
        self.get_or_create_named("authors", name)
    }

    /// Resolve or create an affiliation by exact name.
    pub fn get_or_create_affiliation(&self, name: &str) -> Result<i64> {
        self.get_or_create_named("affiliations", name)
    }

    /// Resolve or create a keyword by (term, type).
    ///
    /// Returns `None` without touching the store when either part is empty.
    pub fn get_or_create_keyword(&self, term: &str, term_type: &str) -> Result<Option<i64>> {
        self.get_or_create_typed("keywords", "term", term, term_type)
    }

    /// Resolve or create a label by (name, type).
    pub fn get_or_create_label(&self, name: &str, label_type: &str) -> Result<Option<i64>> {
        self.get_or_create_typed("labels", "name", name, label_type)
    }

    /// Link an author to an affiliation; an existing link is not an error.
    pub fn insert_author_affiliation(&self, author_id: i64, affiliation_id: i64) -> Result<LinkOutcome> {
        match self.insert_link("author_affiliations", "author_id", "affiliation_id", author_id, affiliation_id) {
            Err(BiblioError::Constraint(msg)) => {
                debug!(author_id, affiliation_id, reason = %msg, "Author affiliation already linked");
                Ok(LinkOutcome::Existing)
            }
            other => other,
        }
    }

    /// Link an author to an article.
    pub fn insert_article_author(&self, author_id: i64, article_id: i64) -> Result<LinkOutcome> {
        self.insert_link("author_articles", "author_id", "article_id", author_id, article_id)
    }

    /// Link a keyword to an article.
    pub fn insert_article_keyword(&self, keyword_id: i64, article_id: i64) -> Result<LinkOutcome> {
        self.insert_link("article_keywords", "keyword_id", "article_id", keyword_id, article_id)
    }

    /// Link a label to an article.
    pub fn insert_article_label(&self, label_id: i64, article_id: i64) -> Result<LinkOutcome> {
        self.insert_link("article_labels", "label_id", "article_id", label_id, article_id)
    }

    fn lookup_id<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Option<i64>> {
        let id = self
            .conn
            .query_row(sql, params, |row| row.get(0))
            .optional()?;
        Ok(id)
    }

    fn get_or_create_named(&self, table: &str, name: &str) -> Result<i64> {
        let select = format!("SELECT id FROM {} WHERE name=?1", table);
        if let Some(id) = self.lookup_id(&select, params![name])? {
            return Ok(id);
        }
        let insert = format!("INSERT INTO {} (name) VALUES (?1)", table);
        self.conn
            .execute(&insert, params![name])
            .map_err(BiblioError::from_sqlite)?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_or_create_typed(
        &self,
        table: &str,
        value_column: &str,
        value: &str,
        kind: &str,
    ) -> Result<Option<i64>> {
        let value = value.trim();
        let kind = kind.trim();
        if value.is_empty() || kind.is_empty() {
            return Ok(None);
        }

        let select = format!("SELECT id FROM {} WHERE {}=?1 AND type=?2", table, value_column);
        if let Some(id) = self.lookup_id(&select, params![value, kind])? {
            return Ok(Some(id));
        }
        let insert = format!("INSERT INTO {} ({}, type) VALUES (?1, ?2)", table, value_column);
        self.conn
            .execute(&insert, params![value, kind])
            .map_err(BiblioError::from_sqlite)?;
        Ok(Some(self.conn.last_insert_rowid()))
    }

    fn insert_link(
        &self,
        table: &str,
        left_column: &str,
        right_column: &str,
        left: i64,
        right: i64,
    ) -> Result<LinkOutcome> {
        let sql = format!(
            "INSERT INTO {} ({}, {}) VALUES (?1, ?2)",
            table, left_column, right_column
        );
        self.conn
            .execute(&sql, params![left, right])
            .map_err(BiblioError::from_sqlite)?;
        Ok(LinkOutcome::Created(self.conn.last_insert_rowid()))
    }
}

/// Column/value pairs for an article insert, absent values dropped.
fn article_fields(row: &DocumentRow, publication_id: i64) -> Vec<(&'static str, Value)> {
    let text = |v: &str| non_empty(v).map(Value::Text);
    let int = |v: &str| parse_int(v, None).map(Value::Integer);

    let candidates = [
        ("title", Some(Value::Text(row.title.trim().to_string()))),
        ("abstract", text(&row.abstract_text)),
        ("xplore_date", text(&row.xplore_date)),
        ("pub_year", int(&row.pub_year)),
        ("volume", int(&row.volume)),
        ("issue", text(&row.issue)),
        ("start_page", int(&row.start_page)),
        ("end_page", int(&row.end_page)),
        ("issn", text(&row.issn)),
        ("isbn", text(&row.isbn)),
        ("doi", text(&row.doi)),
        ("funding_info", text(&row.funding_info)),
        ("pdf_link", text(&row.pdf_link)),
        ("citation_count", int(&row.citation_count)),
        ("reference_count", int(&row.reference_count)),
        ("copyright_year", int(&row.copyright_year)),
        ("license", text(&row.license)),
        ("online_date", text(&row.online_date)),
        ("document_identifier", text(&row.document_identifier)),
        ("publication_id", Some(Value::Integer(publication_id))),
    ];

    candidates
        .into_iter()
        .filter_map(|(column, value)| value.map(|v| (column, v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{apply_schema, DEFAULT_SCHEMA};

    fn memory_store() -> Store {
        let conn = Connection::open_in_memory().expect("open");
        apply_schema(&conn, DEFAULT_SCHEMA).expect("schema");
        Store::with_connection(conn).expect("store")
    }

    fn count(store: &Store, table: &str) -> i64 {
        store
            .connection()
            .query_row(&format!("SELECT count(*) FROM {}", table), [], |r| r.get(0))
            .expect("count")
    }

    fn document(title: &str, publication: &str) -> DocumentRow {
        DocumentRow {
            title: title.to_string(),
            publication_title: publication.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_publication_lookup_is_idempotent() -> Result<()> {
        let store = memory_store();
        let first = store.get_or_create_publication(" Proc. SmartGrid ", "IEEE", "1-3 May")?;
        let second = store.get_or_create_publication("Proc. SmartGrid", "Other", "")?;
        assert_eq!(first, second);
        assert_eq!(count(&store, "publications"), 1);

        let publisher: String = store.connection().query_row(
            "SELECT publisher FROM publications WHERE id=?1",
            [first],
            |r| r.get(0),
        )?;
        assert_eq!(publisher, "IEEE");
        Ok(())
    }

    #[test]
    fn test_author_and_affiliation_dedup() -> Result<()> {
        let store = memory_store();
        let a = store.get_or_create_author("Ada Lovelace")?;
        assert_eq!(store.get_or_create_author("Ada Lovelace")?, a);
        assert_ne!(store.get_or_create_author("ada lovelace")?, a);
        assert_eq!(count(&store, "authors"), 2);

        let x = store.get_or_create_affiliation("MIT")?;
        assert_eq!(store.get_or_create_affiliation("MIT")?, x);
        assert_eq!(count(&store, "affiliations"), 1);
        Ok(())
    }

    #[test]
    fn test_keyword_composite_key() -> Result<()> {
        let store = memory_store();
        let author = store.get_or_create_keyword("smart grid", "author")?;
        let ieee = store.get_or_create_keyword("smart grid", "ieee")?;
        assert!(author.is_some());
        assert_ne!(author, ieee);
        assert_eq!(store.get_or_create_keyword(" smart grid ", "author")?, author);
        assert_eq!(store.get_or_create_keyword("", "author")?, None);
        assert_eq!(store.get_or_create_keyword("term", " ")?, None);
        assert_eq!(count(&store, "keywords"), 2);
        Ok(())
    }

    #[test]
    fn test_label_composite_key() -> Result<()> {
        let store = memory_store();
        let a = store.get_or_create_label("Forecasting", LABEL_SOURCE)?;
        let b = store.get_or_create_label("Forecasting", "other")?;
        assert_ne!(a, b);
        assert_eq!(store.get_or_create_label("Forecasting", LABEL_SOURCE)?, a);
        Ok(())
    }

    #[test]
    fn test_insert_article_omits_missing_fields() -> Result<()> {
        let store = memory_store();
        let pub_id = store.get_or_create_publication("P", "", "")?;
        let mut row = document("T", "P");
        row.volume = "n/a".to_string();
        row.pub_year = "2018".to_string();
        row.doi = "  ".to_string();

        let id = store.insert_article(&row, pub_id)?;
        let (volume, year, doi): (Option<i64>, Option<i64>, Option<String>) =
            store.connection().query_row(
                "SELECT volume, pub_year, doi FROM articles WHERE id=?1",
                [id],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )?;
        assert_eq!(volume, None);
        assert_eq!(year, Some(2018));
        assert_eq!(doi, None);
        Ok(())
    }

    #[test]
    fn test_insert_article_constraint() -> Result<()> {
        let store = memory_store();
        let pub_id = store.get_or_create_publication("P", "", "")?;
        let mut row = document("T", "P");
        row.pub_year = "2018".to_string();
        store.insert_article(&row, pub_id)?;

        let err = store.insert_article(&row, pub_id).expect_err("duplicate article");
        assert!(err.is_constraint());
        Ok(())
    }

    #[test]
    fn test_lookup_article_prefers_year() -> Result<()> {
        let store = memory_store();
        let pub_id = store.get_or_create_publication("P", "", "")?;
        let mut row = document("T", "P");
        row.pub_year = "2017".to_string();
        let old = store.insert_article(&row, pub_id)?;
        row.pub_year = "2018".to_string();
        let new = store.insert_article(&row, pub_id)?;

        assert_eq!(store.lookup_article("T", Some(2018))?, Some(new));
        assert_eq!(store.lookup_article(" T ", Some(2017))?, Some(old));
        assert_eq!(store.lookup_article("T", Some(0))?, Some(old));
        assert_eq!(store.lookup_article("Missing", Some(2018))?, None);
        Ok(())
    }

    #[test]
    fn test_author_affiliation_duplicate_swallowed() -> Result<()> {
        let store = memory_store();
        let author = store.get_or_create_author("A")?;
        let aff = store.get_or_create_affiliation("X")?;
        assert!(matches!(store.insert_author_affiliation(author, aff)?, LinkOutcome::Created(_)));
        assert_eq!(store.insert_author_affiliation(author, aff)?, LinkOutcome::Existing);
        assert_eq!(count(&store, "author_affiliations"), 1);
        Ok(())
    }

    #[test]
    fn test_duplicate_label_link_is_constraint() -> Result<()> {
        let store = memory_store();
        let pub_id = store.get_or_create_publication("P", "", "")?;
        let article = store.insert_article(&document("T", "P"), pub_id)?;
        let label = store.get_or_create_label("D", LABEL_SOURCE)?.expect("label");
        store.insert_article_label(label, article)?;
        let err = store.insert_article_label(label, article).expect_err("duplicate");
        assert!(err.is_constraint());
        Ok(())
    }
}
