//! Execution adapter: runs a [`CompiledStatement`] against SQLite.

use std::sync::Arc;

use regex::Regex;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{Connection, ToSql};
use serde_json::{Map, Value};

use crate::compiler::CompiledStatement;
use crate::dsl::Scalar;

/// A result row keyed by column name.
pub type Row = Map<String, Value>;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

impl ToSql for Scalar {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Scalar::Integer(i) => ToSqlOutput::from(*i),
            Scalar::Real(r) => ToSqlOutput::from(*r),
            Scalar::Text(s) => ToSqlOutput::from(s.as_str()),
        })
    }
}

/// Install the SQL functions compiled statements rely on.
///
/// SQLite parses `X REGEXP Y` but ships no implementation; this registers
/// `regexp(pattern, text)`. NULL text never matches.
pub fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let pattern: Arc<Regex> = ctx.get_or_create_aux(0, |vr| -> Result<_, BoxError> {
                Ok(Regex::new(vr.as_str()?)?)
            })?;
            let matched = match ctx.get_raw(1) {
                ValueRef::Null => false,
                ValueRef::Text(bytes) => pattern.is_match(&String::from_utf8_lossy(bytes)),
                ValueRef::Integer(i) => pattern.is_match(&i.to_string()),
                ValueRef::Real(r) => pattern.is_match(&r.to_string()),
                ValueRef::Blob(_) => false,
            };
            Ok(matched)
        },
    )
}

/// Run `stmt` and collect every row, in store order.
pub fn execute(conn: &Connection, stmt: &CompiledStatement) -> rusqlite::Result<Vec<Row>> {
    let mut prepared = conn.prepare(&stmt.sql)?;
    let columns: Vec<String> = prepared
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();

    let bindings = stmt.bindings();
    let mut rows = prepared.query(rusqlite::params_from_iter(bindings.iter()))?;

    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Map::with_capacity(columns.len());
        for (i, name) in columns.iter().enumerate() {
            record.insert(name.clone(), to_json(row.get_ref(i)?));
        }
        out.push(record);
    }

    tracing::info!("Query returned {} rows", out.len());
    Ok(out)
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(r) => serde_json::Number::from_f64(r)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::from(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
    }
}
