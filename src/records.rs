//! CSV row types for the document and category exports.
//!
//! Both exports are header-driven. Headers are normalized on read (leading
//! byte-order mark and surrounding whitespace removed) so columns are always
//! addressed by their plain names.

use crate::error::{BiblioError, Result};
use csv::StringRecord;
use serde::Deserialize;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// Separator for multi-valued fields (authors, affiliations, keywords)
pub const FIELD_DELIMITER: char = ';';

/// Columns the document pass reads
pub const DOCUMENT_COLUMNS: &[&str] = &[
    "Document Title",
    "Authors",
    "Author Affiliations",
    "Publication Title",
    "Date Added To Xplore",
    "Publication_Year",
    "Volume",
    "Issue",
    "Start Page",
    "End Page",
    "Abstract",
    "ISSN",
    "ISBNs",
    "DOI",
    "Funding Information",
    "PDF Link",
    "Author Keywords",
    "IEEE Terms",
    "INSPEC Controlled Terms",
    "INSPEC Non-Controlled Terms",
    "Mesh_Terms",
    "Article Citation Count",
    "Reference Count",
    "Copyright Year",
    "License",
    "Online Date",
    "Meeting Date",
    "Publisher",
    "Document Identifier",
];

/// Columns the category pass reads
pub const CATEGORY_COLUMNS: &[&str] = &["Document Title", "Publication_Year", "Domain"];

/// One article from the document metadata export
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentRow {
    #[serde(rename = "Document Title")]
    pub title: String,
    #[serde(rename = "Authors")]
    pub authors: String,
    #[serde(rename = "Author Affiliations")]
    pub affiliations: String,
    #[serde(rename = "Publication Title")]
    pub publication_title: String,
    #[serde(rename = "Date Added To Xplore")]
    pub xplore_date: String,
    #[serde(rename = "Publication_Year")]
    pub pub_year: String,
    #[serde(rename = "Volume")]
    pub volume: String,
    #[serde(rename = "Issue")]
    pub issue: String,
    #[serde(rename = "Start Page")]
    pub start_page: String,
    #[serde(rename = "End Page")]
    pub end_page: String,
    #[serde(rename = "Abstract")]
    pub abstract_text: String,
    #[serde(rename = "ISSN")]
    pub issn: String,
    #[serde(rename = "ISBNs")]
    pub isbn: String,
    #[serde(rename = "DOI")]
    pub doi: String,
    #[serde(rename = "Funding Information")]
    pub funding_info: String,
    #[serde(rename = "PDF Link")]
    pub pdf_link: String,
    #[serde(rename = "Author Keywords")]
    pub author_keywords: String,
    #[serde(rename = "IEEE Terms")]
    pub ieee_terms: String,
    #[serde(rename = "INSPEC Controlled Terms")]
    pub inspec_controlled: String,
    #[serde(rename = "INSPEC Non-Controlled Terms")]
    pub inspec_non_controlled: String,
    #[serde(rename = "Mesh_Terms")]
    pub mesh_terms: String,
    #[serde(rename = "Article Citation Count")]
    pub citation_count: String,
    #[serde(rename = "Reference Count")]
    pub reference_count: String,
    #[serde(rename = "Copyright Year")]
    pub copyright_year: String,
    #[serde(rename = "License")]
    pub license: String,
    #[serde(rename = "Online Date")]
    pub online_date: String,
    #[serde(rename = "Meeting Date")]
    pub meeting_date: String,
    #[serde(rename = "Publisher")]
    pub publisher: String,
    #[serde(rename = "Document Identifier")]
    pub document_identifier: String,
}

impl DocumentRow {
    /// Keyword fields paired with the term type they produce
    pub fn keyword_fields(&self) -> [(&str, TermType); 5] {
        [
            (self.author_keywords.as_str(), TermType::Author),
            (self.ieee_terms.as_str(), TermType::Ieee),
            (self.inspec_controlled.as_str(), TermType::InspecControlled),
            (self.inspec_non_controlled.as_str(), TermType::InspecNonControlled),
            (self.mesh_terms.as_str(), TermType::Mesh),
        ]
    }
}

/// One taxonomy assignment from the categories export
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryRow {
    #[serde(rename = "Document Title")]
    pub title: String,
    #[serde(rename = "Publication_Year")]
    pub pub_year: String,
    #[serde(rename = "Domain")]
    pub domain: String,
}

/// Fixed vocabulary of keyword sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TermType {
    Author,
    Ieee,
    InspecControlled,
    InspecNonControlled,
    Mesh,
}

impl TermType {
    /// Value stored in `keywords.type`
    pub fn as_str(&self) -> &'static str {
        match self {
            TermType::Author => "author",
            TermType::Ieee => "ieee",
            TermType::InspecControlled => "inspec_controlled",
            TermType::InspecNonControlled => "inspec_non_controlled",
            TermType::Mesh => "mesh",
        }
    }
}

/// Open a CSV export, normalize its headers and check required columns.
pub fn open_reader(path: &Path, required: &[&str]) -> Result<csv::Reader<File>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;

    let headers = normalize_headers(reader.headers()?);
    for column in required {
        if !headers.iter().any(|h| h == *column) {
            return Err(BiblioError::MissingColumn {
                file: path.display().to_string(),
                column: column.to_string(),
            });
        }
    }
    debug!(path = %path.display(), columns = headers.len(), "Opened CSV");
    reader.set_headers(headers);
    Ok(reader)
}

/// Strip a byte-order mark and surrounding whitespace from each header.
pub fn normalize_headers(headers: &StringRecord) -> StringRecord {
    headers
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim())
        .collect()
}

/// Parse an integer permissively.
///
/// Surrounding whitespace is ignored; an empty or non-numeric value yields
/// `default`.
pub fn parse_int(value: &str, default: Option<i64>) -> Option<i64> {
    value.trim().parse::<i64>().ok().or(default)
}

/// Trimmed text, or `None` when nothing is left.
pub fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Split a multi-valued field into trimmed entries, keeping positions.
///
/// An empty (or all-whitespace) field has no entries at all.
pub fn split_field(value: &str) -> Vec<String> {
    if value.trim().is_empty() {
        return Vec::new();
    }
    value
        .split(FIELD_DELIMITER)
        .map(|part| part.trim().to_string())
        .collect()
}
