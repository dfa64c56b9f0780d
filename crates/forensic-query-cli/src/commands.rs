//! Subcommand implementations. Each writes to `out` and reports success.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::json;

use forensic_query::country::countries as country_table;
use forensic_query::samples;
use forensic_query::{
    fields_for, validator, CompiledStatement, Compiler, CompilerConfig, Dataset, ForensicStore,
    Query, RawQuery,
};

use crate::output::{self, OutputMode};

/// Parse and validate query text, reporting rejections to `out`.
fn checked_query(
    text: &str,
    mode: OutputMode,
    out: &mut dyn Write,
) -> Result<Option<Query>> {
    let result = RawQuery::from_json(text).and_then(|raw| validator::validate(&raw));
    match result {
        Ok(query) => Ok(Some(query)),
        Err(err) => {
            output::print_validation_error(out, mode, &err)?;
            Ok(None)
        }
    }
}

/// `fq validate`: report whether a query is valid.
pub fn validate(text: &str, mode: OutputMode, out: &mut dyn Write) -> Result<bool> {
    let Some(query) = checked_query(text, mode, out)? else {
        return Ok(false);
    };
    if mode.is_json() {
        output::print_json(out, &json!({"valid": true, "query": query}))?;
    } else {
        writeln!(
            out,
            "  Valid {} query: {} filters, {} sort keys, limit {}",
            query.dataset(),
            query.filters().len(),
            query.sort().len(),
            query
                .limit()
                .map(|l| l.to_string())
                .unwrap_or_else(|| "default".to_string())
        )?;
    }
    Ok(true)
}

fn print_statement(
    stmt: &CompiledStatement,
    mode: OutputMode,
    out: &mut dyn Write,
) -> Result<()> {
    if mode.is_json() {
        output::print_json(out, stmt)?;
    } else {
        writeln!(out, "  SQL:    {}", stmt.sql)?;
        writeln!(
            out,
            "  Params: {}",
            serde_json::to_string(&stmt.bindings()).context("failed to render params")?
        )?;
    }
    Ok(())
}

/// `fq compile`: print the SQL and bindings for a query.
pub fn compile(
    text: &str,
    config: CompilerConfig,
    mode: OutputMode,
    out: &mut dyn Write,
) -> Result<bool> {
    let Some(query) = checked_query(text, mode, out)? else {
        return Ok(false);
    };
    let stmt = Compiler::new(config).compile(&query)?;
    print_statement(&stmt, mode, out)?;
    Ok(true)
}

/// `fq run`: execute a query against the database at `db_path`.
pub fn run(db_path: &str, text: &str, mode: OutputMode, out: &mut dyn Write) -> Result<bool> {
    if !Path::new(db_path).exists() {
        anyhow::bail!("database not found at {db_path}, run `fq init --seed` to create one");
    }
    let store = ForensicStore::open(db_path)
        .with_context(|| format!("failed to open database at {db_path}"))?;
    run_with_store(&store, text, mode, out)
}

/// [`run`] against an already-open store.
pub fn run_with_store(
    store: &ForensicStore,
    text: &str,
    mode: OutputMode,
    out: &mut dyn Write,
) -> Result<bool> {
    let Some(query) = checked_query(text, mode, out)? else {
        return Ok(false);
    };
    let rows = store.run_query(&query)?;

    if mode.is_json() {
        output::print_json(out, &json!({"results": rows.len(), "rows": rows}))?;
    } else {
        output::print_rows(out, query.dataset(), &rows)?;
    }
    Ok(true)
}

/// `fq schema`: list datasets and their typed fields.
pub fn schema(dataset: Option<Dataset>, mode: OutputMode, out: &mut dyn Write) -> Result<()> {
    let datasets: Vec<Dataset> = match dataset {
        Some(d) => vec![d],
        None => Dataset::ALL.to_vec(),
    };

    if mode.is_json() {
        let doc: serde_json::Map<String, serde_json::Value> = datasets
            .iter()
            .map(|d| {
                let fields: Vec<_> = fields_for(*d)
                    .iter()
                    .map(|f| {
                        json!({
                            "name": f.name,
                            "type": f.semantic_type,
                            "nullable": f.nullable,
                            "operators": f.semantic_type.allowed_operators(),
                        })
                    })
                    .collect();
                (d.as_str().to_string(), json!(fields))
            })
            .collect();
        output::print_json(out, &doc)?;
        return Ok(());
    }

    for d in datasets {
        writeln!(out)?;
        writeln!(out, "  {d}")?;
        for f in fields_for(d) {
            let ops: Vec<&str> = f
                .semantic_type
                .allowed_operators()
                .iter()
                .map(|op| op.as_str())
                .collect();
            writeln!(
                out,
                "    {:<18} {:<10} {:<9} {}",
                f.name,
                f.semantic_type.as_str(),
                if f.nullable { "nullable" } else { "" },
                ops.join(" ")
            )?;
        }
    }
    writeln!(out)?;
    Ok(())
}

/// `fq countries`: print the country code table.
pub fn countries(mode: OutputMode, out: &mut dyn Write) -> Result<()> {
    if mode.is_json() {
        output::print_json(out, country_table())?;
        return Ok(());
    }
    for c in country_table() {
        writeln!(out, "  {:<30} {}", c.name, c.prefix)?;
    }
    Ok(())
}

/// `fq samples`: list the example queries.
pub fn list_samples(mode: OutputMode, out: &mut dyn Write) -> Result<()> {
    let all = samples::samples();
    if mode.is_json() {
        let doc: Vec<_> = all
            .iter()
            .map(|s| json!({"name": s.name, "description": s.description, "query": s.query}))
            .collect();
        output::print_json(out, &doc)?;
        return Ok(());
    }
    for s in &all {
        writeln!(out, "  {:<28} {}", s.name, s.description)?;
        writeln!(out, "    {}", s.query)?;
    }
    Ok(())
}

/// `fq init`: create the schema, optionally replacing contents with sample data.
pub fn init(db_path: &str, seed: bool, mode: OutputMode, out: &mut dyn Write) -> Result<()> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }

    let mut store = ForensicStore::open(db_path)
        .with_context(|| format!("failed to open database at {db_path}"))?;
    store
        .ensure_schema()
        .context("failed to create forensic tables")?;
    let summary = if seed {
        Some(store.seed_sample().context("failed to seed sample data")?)
    } else {
        None
    };

    if mode.is_json() {
        output::print_json(out, &json!({"database": db_path, "seeded": summary}))?;
    } else {
        writeln!(out, "  Initialized {db_path}")?;
        if let Some(s) = summary {
            writeln!(
                out,
                "  Seeded {} messages, {} calls, {} contacts, {} entities",
                s.messages, s.calls, s.contacts, s.entities
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture(f: impl FnOnce(&mut dyn Write) -> Result<bool>) -> (bool, String) {
        let mut buf = Vec::new();
        let ok = f(&mut buf).unwrap();
        (ok, String::from_utf8(buf).unwrap())
    }

    #[test]
    fn test_validate_reports_reason_and_path() {
        let (ok, text) = capture(|out| {
            validate(
                r#"{"dataset": "calls", "filters": [{"field": "nonexistent", "op": "=", "value": 1}]}"#,
                OutputMode::Text,
                out,
            )
        });
        assert!(!ok);
        assert!(text.contains("UnknownField"));
        assert!(text.contains("filters[0].field"));
    }

    #[test]
    fn test_compile_text_output() {
        let (ok, text) = capture(|out| {
            compile(
                r#"{"dataset": "calls", "filters": [{"field": "duration", "op": ">", "value": 600}]}"#,
                CompilerConfig::default(),
                OutputMode::Text,
                out,
            )
        });
        assert!(ok);
        assert!(text.contains("SELECT * FROM calls WHERE duration > ?1 LIMIT ?2"));
        assert!(text.contains("[600,10000]"));
    }

    #[test]
    fn test_run_with_store_prints_table() {
        let mut store = ForensicStore::open_in_memory().unwrap();
        store.seed_sample().unwrap();
        let (ok, text) = capture(|out| {
            run_with_store(
                &store,
                r#"{"dataset": "contacts", "filters": [{"field": "email", "op": "contains", "value": "protonmail"}]}"#,
                OutputMode::Text,
                out,
            )
        });
        assert!(ok);
        assert!(text.contains("1 results"));
        assert!(text.contains("Ahmed Al-Rashid"));
    }

    #[test]
    fn test_run_with_store_rejects_before_touching_rows() {
        let mut store = ForensicStore::open_in_memory().unwrap();
        store.seed_sample().unwrap();
        let (ok, text) = capture(|out| {
            run_with_store(
                &store,
                r#"{"dataset": "calls", "filter": [{"field": "duration", "op": ">", "value": 600}]}"#,
                OutputMode::Json,
                out,
            )
        });
        assert!(!ok);
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["valid"], false);
        assert_eq!(parsed["error"]["reason"], "MalformedQuery");
        assert!(!text.contains("rows"));
    }
}
