//! Run configuration for the wrangle and summarize commands.
//!
//! Paths are supplied by the caller (the CLI layer fills in defaults); no
//! module in the library computes locations on its own.

use crate::error::{BiblioError, OptionExt, Result};
use std::path::{Path, PathBuf};

/// Inputs and outputs of one ingestion run
#[derive(Debug, Clone)]
pub struct WrangleConfig {
    /// Document metadata CSV
    pub docs: PathBuf,
    /// Taxonomic categories CSV
    pub cats: PathBuf,
    /// SQLite database to create
    pub db: PathBuf,
    /// Newline-delimited JSON error log to write
    pub report: PathBuf,
    /// External schema file; the embedded schema is used when `None`
    pub schema: Option<PathBuf>,
    /// Delete an existing database instead of refusing to run
    pub force: bool,
}

impl WrangleConfig {
    pub fn new(docs: PathBuf, cats: PathBuf, db: PathBuf, report: PathBuf) -> Self {
        Self {
            docs,
            cats,
            db,
            report,
            schema: None,
            force: false,
        }
    }

    /// Use an external schema definition
    pub fn with_schema(mut self, schema: Option<PathBuf>) -> Self {
        self.schema = schema;
        self
    }

    /// Allow an existing database to be replaced
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Check that every input exists before anything on disk is touched.
    pub fn validate(&self) -> Result<()> {
        require_file(&self.docs, "document metadata CSV")?;
        require_file(&self.cats, "categories CSV")?;
        if let Some(ref schema) = self.schema {
            require_file(schema, "schema file")?;
        }
        self.db
            .file_name()
            .ok_or_config("database path has no file name")?;
        if self.db == self.report {
            return Err(BiblioError::Config(format!(
                "database and error report share the same path: {}",
                self.db.display()
            )));
        }
        Ok(())
    }
}

/// Inputs of the summary reports
#[derive(Debug, Clone)]
pub struct SummaryConfig {
    /// SQLite database produced by wrangle
    pub db: PathBuf,
    /// Error log produced by wrangle
    pub report: PathBuf,
    /// Also print per-kind error details
    pub details: bool,
}

impl SummaryConfig {
    pub fn new(db: PathBuf, report: PathBuf) -> Self {
        Self {
            db,
            report,
            details: false,
        }
    }

    pub fn with_details(mut self, details: bool) -> Self {
        self.details = details;
        self
    }

    pub fn validate(&self) -> Result<()> {
        require_file(&self.db, "database")?;
        require_file(&self.report, "error report")
    }
}

fn require_file(path: &Path, what: &str) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(BiblioError::Config(format!(
            "{} not found: {}",
            what,
            path.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_validate_missing_inputs() {
        let config = WrangleConfig::new(
            PathBuf::from("/nonexistent/docs.csv"),
            PathBuf::from("/nonexistent/cats.csv"),
            PathBuf::from("/tmp/biblio.db"),
            PathBuf::from("/tmp/report.json"),
        );
        let err = config.validate().expect_err("missing inputs");
        assert!(err.to_string().contains("document metadata CSV not found"));
    }

    #[test]
    fn test_validate_ok() -> Result<()> {
        let docs = NamedTempFile::new()?;
        let cats = NamedTempFile::new()?;
        let dir = tempdir()?;
        let config = WrangleConfig::new(
            docs.path().to_path_buf(),
            cats.path().to_path_buf(),
            dir.path().join("biblio.db"),
            dir.path().join("report.json"),
        )
        .with_force(true);
        config.validate()?;
        assert!(config.force);
        assert!(config.schema.is_none());
        Ok(())
    }

    #[test]
    fn test_validate_shared_output_path() -> Result<()> {
        let docs = NamedTempFile::new()?;
        let cats = NamedTempFile::new()?;
        let out = PathBuf::from("/tmp/same");
        let config = WrangleConfig::new(
            docs.path().to_path_buf(),
            cats.path().to_path_buf(),
            out.clone(),
            out,
        );
        assert!(config.validate().is_err());
        Ok(())
    }
}
