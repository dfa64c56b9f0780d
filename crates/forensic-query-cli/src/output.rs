//! Human-readable and JSON rendering of command results.

use std::io::{self, Write};

use serde::Serialize;
use serde_json::Value;

use forensic_query::{fields_for, Dataset, Row, ValidationError};

const MAX_CELL: usize = 40;

/// How results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    Text,
    Json,
}

impl OutputMode {
    pub fn from_flag(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Text
        }
    }

    pub fn is_json(self) -> bool {
        self == OutputMode::Json
    }
}

/// Pretty-printed JSON followed by a newline.
pub fn print_json<T: Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> io::Result<()> {
    let text = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    writeln!(out, "{text}")
}

/// Plain text form of a cell.
pub fn cell(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_CELL {
        text.to_string()
    } else {
        let head: String = text.chars().take(MAX_CELL - 3).collect();
        format!("{head}...")
    }
}

/// Print rows as an aligned table with columns in schema order.
pub fn print_rows(out: &mut dyn Write, dataset: Dataset, rows: &[Row]) -> io::Result<()> {
    if rows.is_empty() {
        return writeln!(out, "  No results.");
    }

    let columns: Vec<&str> = fields_for(dataset).iter().map(|f| f.name).collect();
    let table: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|c| truncate(&row.get(*c).map(cell).unwrap_or_else(|| "-".to_string())))
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            table
                .iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(c.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    writeln!(out, "  {} results:\n", rows.len())?;

    write!(out, " ")?;
    for (c, w) in columns.iter().zip(&widths) {
        write!(out, " {c:<w$}")?;
    }
    writeln!(out)?;
    write!(out, " ")?;
    for w in &widths {
        write!(out, " {}", "-".repeat(*w))?;
    }
    writeln!(out)?;

    for row in &table {
        write!(out, " ")?;
        for (value, w) in row.iter().zip(&widths) {
            write!(out, " {value:<w$}")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Describe a rejected query.
pub fn print_validation_error(
    out: &mut dyn Write,
    mode: OutputMode,
    err: &ValidationError,
) -> io::Result<()> {
    match mode {
        OutputMode::Json => print_json(out, &serde_json::json!({"valid": false, "error": err})),
        OutputMode::Text => {
            writeln!(out, "  Invalid query: {}", err.reason)?;
            writeln!(out, "    at:      {}", err.path)?;
            writeln!(out, "    message: {}", err.message)
        }
    }
}
