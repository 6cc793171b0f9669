//! rustbiblio - Bibliographic CSV Wrangler
//!
//! Normalizes a literature review's document metadata and category exports
//! into a SQLite database, then reports on what was loaded.
//!
//! ## Usage
//!
//! ### Ingest
//! ```bash
//! rustbiblio wrangle --docs data/lit-review-doc-metadata.csv --cats data/lit-review-categories.csv --force
//! ```
//!
//! ### Report
//! ```bash
//! rustbiblio summarize --db data/biblio.db --report data/wrangle_report.json
//! ```

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};
use rustbiblio::config::{SummaryConfig, WrangleConfig};
use rustbiblio::{summary, wrangle};
use std::path::PathBuf;
use tracing::{error, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Bibliographic CSV Wrangler - normalizes literature exports into SQLite
#[derive(Parser)]
#[command(name = "rustbiblio")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short = 'v', long, global = true)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert the CSV files into a SQLite database
    Wrangle {
        /// Location of document metadata CSV file
        #[arg(short, long, value_name = "PATH", default_value = "data/lit-review-doc-metadata.csv")]
        docs: PathBuf,

        /// Location of taxonomic categories CSV file
        #[arg(short, long, value_name = "PATH", default_value = "data/lit-review-categories.csv")]
        cats: PathBuf,

        /// Location to save the SQLite database to
        #[arg(short, long, value_name = "PATH", default_value = "data/biblio.db")]
        out: PathBuf,

        /// Location to write the error report to
        #[arg(short, long, value_name = "PATH", default_value = "data/wrangle_report.json")]
        report: PathBuf,

        /// External schema definition (defaults to the built-in schema)
        #[arg(long, value_name = "PATH")]
        schema: Option<PathBuf>,

        /// Delete existing database and rebuild
        #[arg(short, long)]
        force: bool,
    },

    /// Summarize the database and the error report written by wrangle
    Summarize {
        /// Location of the error report output from wrangle
        #[arg(short, long, value_name = "PATH", default_value = "data/wrangle_report.json")]
        report: PathBuf,

        /// Location of SQLite database
        #[arg(short, long, value_name = "PATH", default_value = "data/biblio.db")]
        db: PathBuf,

        /// Also list the titles affected by each error kind
        #[arg(long)]
        details: bool,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for error records and reports
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.command {
        Commands::Wrangle {
            docs,
            cats,
            out,
            report,
            schema,
            force,
        } => {
            let config = WrangleConfig::new(docs, cats, out, report)
                .with_schema(schema)
                .with_force(force);
            run_wrangle(&config);
            Ok(())
        }
        Commands::Summarize { report, db, details } => {
            let config = SummaryConfig::new(db, report).with_details(details);
            run_summarize(&config)
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

/// Run the ingestion; any fatal error is reported as a usage error.
fn run_wrangle(config: &WrangleConfig) {
    match wrangle::wrangle(config) {
        Ok(stats) => {
            println!(
                "\n✓ Wrangled {} documents ({} articles) and {} categories ({} labelled), {} errors. Database: {}",
                stats.documents,
                stats.articles,
                stats.categories,
                stats.labels,
                stats.errors,
                config.db.display()
            );
        }
        Err(e) => {
            error!(error = %e, "Wrangle failed");
            Cli::command()
                .error(ErrorKind::ValueValidation, e.to_string())
                .exit();
        }
    }
}

fn run_summarize(config: &SummaryConfig) -> Result<()> {
    let text = summary::summarize(config).context("Failed to summarize wrangle output")?;
    print!("{}", text);
    Ok(())
}
