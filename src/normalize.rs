//! Row normalization for the document and category passes.
//!
//! Each CSV row is mapped onto the relational schema through the store's
//! resolve-or-create operations. Row-level failures come back as
//! [`ErrorRecord`]s in the [`RowOutcome`]; only failures of the store itself
//! (a lookup query that cannot run) are returned as `Err`.

use crate::errlog::{ErrorKind, ErrorRecord};
use crate::error::Result;
use crate::records::{parse_int, split_field, CategoryRow, DocumentRow, TermType};
use crate::store::{Store, LABEL_SOURCE};
use serde_json::json;
use std::collections::HashMap;
use tracing::debug;

/// Result of normalizing one row
#[derive(Debug, Default)]
pub struct RowOutcome {
    /// Article created (document pass) or label link created (category pass)
    pub id: Option<i64>,
    /// Row-level errors, in the order they occurred
    pub errors: Vec<ErrorRecord>,
}

impl RowOutcome {
    fn failed(record: ErrorRecord) -> Self {
        Self {
            id: None,
            errors: vec![record],
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Normalize one document row: publication, article, authors, keywords.
pub fn parse_doc_row(store: &Store, row: &DocumentRow) -> Result<RowOutcome> {
    let publication_id =
        store.get_or_create_publication(&row.publication_title, &row.publisher, &row.meeting_date)?;

    let article_id = match store.insert_article(row, publication_id) {
        Ok(id) => id,
        Err(e) => {
            let record = ErrorRecord::new(
                ErrorKind::InsertArticle,
                json!({
                    "title": row.title,
                    "pub_year": row.pub_year,
                }),
            )
            .with_exception(e);
            return Ok(RowOutcome::failed(record));
        }
    };
    debug!(article_id, title = %row.title.trim(), "Inserted article");

    let mut errors = handle_authors(store, row, article_id);
    errors.extend(handle_keywords(store, row, article_id));

    Ok(RowOutcome {
        id: Some(article_id),
        errors,
    })
}

/// Normalize one category row: find the article and attach the label.
pub fn parse_cat_row(store: &Store, row: &CategoryRow) -> Result<RowOutcome> {
    let pub_year = parse_int(&row.pub_year, Some(0));

    let article_id = match store.lookup_article(&row.title, pub_year)? {
        Some(id) => id,
        None => {
            return Ok(RowOutcome::failed(ErrorRecord::new(
                ErrorKind::LookupArticle,
                json!({
                    "title": row.title,
                    "pub_year": row.pub_year,
                    "label": row.domain,
                }),
            )));
        }
    };

    let label_id = match store.get_or_create_label(&row.domain, LABEL_SOURCE) {
        Ok(Some(id)) => id,
        Ok(None) => return Ok(label_failure(row, article_id, None, "label name is empty")),
        Err(e) => return Ok(label_failure(row, article_id, None, e)),
    };

    match store.insert_article_label(label_id, article_id) {
        Ok(_) => {
            debug!(article_id, label_id, label = %row.domain.trim(), "Labelled article");
            Ok(RowOutcome {
                id: Some(label_id),
                errors: Vec::new(),
            })
        }
        Err(e) => Ok(label_failure(row, article_id, Some(label_id), e)),
    }
}

fn label_failure(
    row: &CategoryRow,
    article_id: i64,
    label_id: Option<i64>,
    cause: impl ToString,
) -> RowOutcome {
    RowOutcome::failed(
        ErrorRecord::new(
            ErrorKind::AssignLabel,
            json!({
                "title": row.title,
                "pub_year": row.pub_year,
                "label": row.domain,
                "article_id": article_id,
                "label_id": label_id,
            }),
        )
        .with_exception(cause),
    )
}

/// Give repeated names an ordinal suffix: the second "A" becomes "A (2)".
///
/// Returns the disambiguated names and the names that were repeated, in
/// order of first appearance. Empty entries are left untouched.
pub fn disambiguate_authors(authors: &[String]) -> (Vec<String>, Vec<String>) {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut duplicates: Vec<String> = Vec::new();
    let mut names = Vec::with_capacity(authors.len());

    for name in authors {
        if name.is_empty() {
            names.push(name.clone());
            continue;
        }
        let occurrence = seen.entry(name.as_str()).or_insert(0);
        *occurrence += 1;
        if *occurrence == 1 {
            names.push(name.clone());
        } else {
            if *occurrence == 2 {
                duplicates.push(name.clone());
            }
            names.push(format!("{} ({})", name, occurrence));
        }
    }

    (names, duplicates)
}

/// Count distinct non-empty terms, keeping first-appearance order.
pub fn count_terms(field: &str) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for term in split_field(field).into_iter().filter(|t| !t.is_empty()) {
        match index.get(&term) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(term.clone(), counts.len());
                counts.push((term, 1));
            }
        }
    }
    counts
}

fn handle_authors(store: &Store, row: &DocumentRow, article_id: i64) -> Vec<ErrorRecord> {
    let mut errors = Vec::new();
    let (authors, duplicates) = disambiguate_authors(&split_field(&row.authors));
    let affiliations = split_field(&row.affiliations);

    if authors.len() != affiliations.len() {
        errors.push(ErrorRecord::new(
            ErrorKind::MismatchedAffiliations,
            json!({
                "title": row.title,
                "pub_year": row.pub_year,
                "article_id": article_id,
                "authors": authors.len(),
                "affiliations": affiliations.len(),
            }),
        ));
    }

    for (position, author) in authors.iter().enumerate() {
        if author.is_empty() {
            continue;
        }
        let affiliation = affiliations.get(position).map(String::as_str).unwrap_or("");
        if let Err(e) = link_author(store, author, affiliation, article_id) {
            errors.push(
                ErrorRecord::new(
                    ErrorKind::AssignAuthor,
                    json!({
                        "title": row.title,
                        "pub_year": row.pub_year,
                        "article_id": article_id,
                        "author": author,
                        "affiliation": affiliation,
                    }),
                )
                .with_exception(e),
            );
        }
    }

    if !duplicates.is_empty() {
        errors.push(ErrorRecord::new(
            ErrorKind::DuplicateAuthors,
            json!({
                "title": row.title,
                "pub_year": row.pub_year,
                "article_id": article_id,
                "duplicates": duplicates,
            }),
        ));
    }

    errors
}

fn link_author(store: &Store, author: &str, affiliation: &str, article_id: i64) -> Result<()> {
    let author_id = store.get_or_create_author(author)?;
    if !affiliation.is_empty() {
        let affiliation_id = store.get_or_create_affiliation(affiliation)?;
        store.insert_author_affiliation(author_id, affiliation_id)?;
    }
    store.insert_article_author(author_id, article_id)?;
    Ok(())
}

fn handle_keywords(store: &Store, row: &DocumentRow, article_id: i64) -> Vec<ErrorRecord> {
    let mut errors = Vec::new();

    for (field, term_type) in row.keyword_fields() {
        for (term, count) in count_terms(field) {
            if count > 1 {
                errors.push(ErrorRecord::new(
                    ErrorKind::DuplicateKeywords,
                    json!({
                        "title": row.title,
                        "pub_year": row.pub_year,
                        "article_id": article_id,
                        "term": term,
                        "term_type": term_type.as_str(),
                        "count": count,
                    }),
                ));
            }

            if let Err(e) = link_keyword(store, &term, term_type, article_id) {
                errors.push(
                    ErrorRecord::new(
                        ErrorKind::AssignKeyword,
                        json!({
                            "title": row.title,
                            "pub_year": row.pub_year,
                            "article_id": article_id,
                            "term": term,
                            "term_type": term_type.as_str(),
                        }),
                    )
                    .with_exception(e),
                );
            }
        }
    }

    errors
}

fn link_keyword(store: &Store, term: &str, term_type: TermType, article_id: i64) -> Result<()> {
    if let Some(keyword_id) = store.get_or_create_keyword(term, term_type.as_str())? {
        store.insert_article_keyword(keyword_id, article_id)?;
    }
    Ok(())
}
