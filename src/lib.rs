//! # rustbiblio
//!
//! Bibliographic CSV Wrangler - normalizes literature exports into SQLite
//!
//! ## Modules
//!
//! - [`schema`] - Database creation from the fixed schema
//! - [`records`] - CSV row types and field parsing
//! - [`store`] - Resolve-or-create access to the SQLite store
//! - [`normalize`] - Document and category row normalization
//! - [`errlog`] - Row-level error records and their JSON log
//! - [`wrangle`] - The ingestion run
//! - [`summary`] - Table count and error reports
//! - [`config`] - Run configuration
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rustbiblio::config::WrangleConfig;
//! use rustbiblio::wrangle::wrangle;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = WrangleConfig::new(
//!         "data/lit-review-doc-metadata.csv".into(),
//!         "data/lit-review-categories.csv".into(),
//!         "data/biblio.db".into(),
//!         "data/wrangle_report.json".into(),
//!     );
//!     let stats = wrangle(&config)?;
//!     println!("Loaded {} articles", stats.articles);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod errlog;
pub mod error;
pub mod normalize;
pub mod records;
pub mod schema;
pub mod store;
pub mod summary;
pub mod wrangle;

pub use error::{BiblioError, Result};
