//! Row-level error records and the newline-delimited JSON log they go to.
//!
//! A failed row never aborts a run; it becomes an [`ErrorRecord`] that is
//! printed as it happens and appended to the error log for the summary
//! report.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Classification of a row-level failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    #[serde(rename = "could not insert article")]
    InsertArticle,
    #[serde(rename = "non-unique author names for article")]
    DuplicateAuthors,
    #[serde(rename = "mismatched author affiliations")]
    MismatchedAffiliations,
    #[serde(rename = "could not assign author to article")]
    AssignAuthor,
    #[serde(rename = "duplicate keywords")]
    DuplicateKeywords,
    #[serde(rename = "could not assign keyword to article")]
    AssignKeyword,
    #[serde(rename = "could not lookup article for label")]
    LookupArticle,
    #[serde(rename = "could not assign label to article")]
    AssignLabel,
    #[serde(rename = "could not parse row")]
    ParseRow,
}

impl ErrorKind {
    /// The string written to the `error` field
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InsertArticle => "could not insert article",
            ErrorKind::DuplicateAuthors => "non-unique author names for article",
            ErrorKind::MismatchedAffiliations => "mismatched author affiliations",
            ErrorKind::AssignAuthor => "could not assign author to article",
            ErrorKind::DuplicateKeywords => "duplicate keywords",
            ErrorKind::AssignKeyword => "could not assign keyword to article",
            ErrorKind::LookupArticle => "could not lookup article for label",
            ErrorKind::AssignLabel => "could not assign label to article",
            ErrorKind::ParseRow => "could not parse row",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub error: ErrorKind,
    /// Description of the underlying failure, when there was one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
    /// Context describing the offending row
    pub data: Value,
}

impl ErrorRecord {
    pub fn new(error: ErrorKind, data: Value) -> Self {
        Self {
            error,
            exception: None,
            data,
        }
    }

    /// Attach the causing condition's description
    pub fn with_exception(mut self, exception: impl ToString) -> Self {
        self.exception = Some(exception.to_string());
        self
    }

    /// Single-line JSON form
    pub fn to_json_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Newline-delimited JSON sink for error records
pub struct ErrorLog {
    path: PathBuf,
    writer: BufWriter<File>,
    echo: bool,
    written: usize,
}

impl ErrorLog {
    /// Create (or truncate) the log at `path`.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            echo: true,
            written: 0,
        })
    }

    /// Whether records are also printed to stdout (on by default)
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Append records, one JSON object per line.
    pub fn write_all(&mut self, records: &[ErrorRecord]) -> Result<()> {
        for record in records {
            let line = record.to_json_line()?;
            if self.echo {
                println!("{}", line);
            }
            writeln!(self.writer, "{}", line)?;
            self.written += 1;
        }
        Ok(())
    }

    /// Number of records written so far
    pub fn written(&self) -> usize {
        self.written
    }

    /// Flush to disk and return the number of records written.
    pub fn finish(mut self) -> Result<usize> {
        self.writer.flush()?;
        info!(path = %self.path.display(), records = self.written, "Error log written");
        Ok(self.written)
    }
}
