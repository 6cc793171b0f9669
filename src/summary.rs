//! Summary reports over a finished wrangle run.
//!
//! Two reports are produced: row counts for every table in the database and
//! a tally of the error log by error kind. Both render as pipe tables.

use crate::config::SummaryConfig;
use crate::error::Result;
use rusqlite::{Connection, OpenFlags};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};

/// Titles listed per error kind in the detail report
const DETAIL_LIMIT: usize = 10;

/// Error log line, read loosely so unknown kinds are still counted
#[derive(Debug, Clone, Deserialize)]
pub struct LoggedError {
    pub error: String,
    #[serde(default)]
    pub exception: Option<String>,
    #[serde(default)]
    pub data: Value,
}

impl LoggedError {
    /// Title of the offending row, if the record carries one
    pub fn title(&self) -> Option<&str> {
        self.data.get("title").and_then(Value::as_str)
    }
}

/// A table cell; numeric columns are right-aligned
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(i64),
}

impl Cell {
    fn render(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => n.to_string(),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<i64> for Cell {
    fn from(n: i64) -> Self {
        Cell::Number(n)
    }
}

impl From<usize> for Cell {
    fn from(n: usize) -> Self {
        Cell::Number(n as i64)
    }
}

/// Run both reports (and the detail report if asked) and return the text.
pub fn summarize(config: &SummaryConfig) -> Result<String> {
    config.validate()?;

    let conn = Connection::open_with_flags(&config.db, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let counts = table_counts(&conn)?;
    info!(tables = counts.len(), "Counted tables");

    let errors = read_error_log(&config.report)?;
    info!(records = errors.len(), "Read error log");

    let mut out = String::new();
    out.push_str(&render_table_counts(&counts));
    out.push_str("\n\n");
    out.push_str(&render_error_report(&errors));
    out.push_str("\n\n");
    if config.details {
        out.push_str(&render_error_details(&errors));
    }
    Ok(out)
}

/// Row count of every user table, sorted by table name.
pub fn table_counts(conn: &Connection) -> Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
    )?;
    let mut tables: Vec<String> = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<_, _>>()?;
    tables.sort();

    let mut counts = Vec::with_capacity(tables.len());
    for table in tables {
        let sql = format!("SELECT count(*) FROM \"{}\"", table.replace('"', "\"\""));
        let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        debug!(table = %table, count, "Table count");
        counts.push((table, count));
    }
    Ok(counts)
}

/// Read a newline-delimited JSON error log, skipping blank lines.
pub fn read_error_log(path: &Path) -> Result<Vec<LoggedError>> {
    let reader = BufReader::new(std::fs::File::open(path)?);
    let mut errors = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        errors.push(serde_json::from_str(line)?);
    }
    Ok(errors)
}

/// Count `items`, most frequent first; ties keep first-appearance order.
pub fn most_common<'a, I>(items: I) -> Vec<(String, usize)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<&'a str, usize> = HashMap::new();
    for item in items {
        match index.get(item) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(item, counts.len());
                counts.push((item.to_string(), 1));
            }
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

/// Tally of error records by kind
pub fn tally_errors(errors: &[LoggedError]) -> Vec<(String, usize)> {
    most_common(errors.iter().map(|e| e.error.as_str()))
}

pub fn render_table_counts(counts: &[(String, i64)]) -> String {
    let rows = counts
        .iter()
        .map(|(table, count)| vec![Cell::from(table.as_str()), Cell::from(*count)])
        .collect::<Vec<_>>();
    render_table(&["Table", "Rows"], &rows)
}

pub fn render_error_report(errors: &[LoggedError]) -> String {
    let tally = tally_errors(errors);
    let total: usize = tally.iter().map(|(_, c)| c).sum();
    let mut rows: Vec<Vec<Cell>> = tally
        .into_iter()
        .map(|(kind, count)| vec![Cell::from(kind), Cell::from(count)])
        .collect();
    rows.push(vec![Cell::from("Total"), Cell::from(total)]);
    render_table(&["Error", "Count"], &rows)
}

/// Per error kind, the titles it affected most often.
pub fn render_error_details(errors: &[LoggedError]) -> String {
    let mut out = String::new();
    for (kind, count) in tally_errors(errors) {
        let titles = most_common(
            errors
                .iter()
                .filter(|e| e.error == kind)
                .map(|e| e.title().unwrap_or("(no title)")),
        );
        let rows: Vec<Vec<Cell>> = titles
            .into_iter()
            .take(DETAIL_LIMIT)
            .map(|(title, n)| vec![Cell::from(title), Cell::from(n)])
            .collect();

        out.push_str(&format!("{} ({})\n\n", kind, count));
        out.push_str(&render_table(&["Title", "Count"], &rows));
        out.push_str("\n\n");
    }
    out
}

/// Render a pipe table: header, alignment row, then one line per row.
pub fn render_table(headers: &[&str], rows: &[Vec<Cell>]) -> String {
    let columns = headers.len();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    let mut numeric = vec![!rows.is_empty(); columns];

    for row in rows {
        for (i, cell) in row.iter().enumerate().take(columns) {
            widths[i] = widths[i].max(cell.render().chars().count());
            if !matches!(cell, Cell::Number(_)) {
                numeric[i] = false;
            }
        }
    }

    let pad = |text: &str, width: usize, right: bool| {
        if right {
            format!(" {:>width$} ", text, width = width)
        } else {
            format!(" {:<width$} ", text, width = width)
        }
    };

    let mut lines = Vec::with_capacity(rows.len() + 2);
    let header: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| pad(*h, widths[i], numeric[i]))
        .collect();
    lines.push(format!("|{}|", header.join("|")));

    let align: Vec<String> = (0..columns)
        .map(|i| {
            let dashes = "-".repeat(widths[i] + 1);
            if numeric[i] {
                format!("{}:", dashes)
            } else {
                format!(":{}", dashes)
            }
        })
        .collect();
    lines.push(format!("|{}|", align.join("|")));

    for row in rows {
        let cells: Vec<String> = (0..columns)
            .map(|i| {
                let text = row.get(i).map(Cell::render).unwrap_or_default();
                pad(&text, widths[i], numeric[i])
            })
            .collect();
        lines.push(format!("|{}|", cells.join("|")));
    }

    lines.join("\n")
}
