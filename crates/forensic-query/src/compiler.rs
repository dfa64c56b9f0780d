//! Query compiler: converts a validated [`Query`] into parameterized SQL.
//!
//! Column names and keywords come only from the schema registry and the
//! operator table. Every literal travels as a numbered `?N` binding.

use std::fmt::Write as _;

use serde::Serialize;

use crate::dsl::{CompareOp, Filter, Predicate, Query, Scalar, SortDirection};
use crate::error::CompileError;
use crate::schema::Dataset;
use crate::validator::{MAX_LIMIT, MIN_LIMIT};

/// A value bound to a placeholder.
pub type SqlParam = Scalar;

/// Environment variable overriding [`CompilerConfig::default_limit`].
pub const DEFAULT_LIMIT_ENV: &str = "FORENSIC_DEFAULT_LIMIT";

/// Compiler settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilerConfig {
    /// Fetch size used when a query has no explicit limit.
    pub default_limit: u32,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            default_limit: MAX_LIMIT,
        }
    }
}

impl CompilerConfig {
    /// Defaults, with `FORENSIC_DEFAULT_LIMIT` applied when it holds a valid limit.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var(DEFAULT_LIMIT_ENV) {
            match raw.trim().parse::<u32>() {
                Ok(n) if (MIN_LIMIT..=MAX_LIMIT).contains(&n) => config.default_limit = n,
                _ => tracing::warn!(
                    "Ignoring {DEFAULT_LIMIT_ENV}={raw:?}: expected an integer in {MIN_LIMIT}..={MAX_LIMIT}"
                ),
            }
        }
        config
    }

    pub fn with_default_limit(mut self, limit: u32) -> Self {
        self.default_limit = limit;
        self
    }
}

/// SQL text plus its ordered bindings.
///
/// `params` holds the filter bindings in placeholder order; the final
/// placeholder (`LIMIT ?K`) is bound to `fetch_size`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledStatement {
    pub sql: String,
    pub params: Vec<SqlParam>,
    pub fetch_size: u32,
}

impl CompiledStatement {
    /// Every binding in placeholder order: `params` followed by the fetch size.
    pub fn bindings(&self) -> Vec<SqlParam> {
        let mut all = self.params.clone();
        all.push(Scalar::Integer(i64::from(self.fetch_size)));
        all
    }

    /// Number of `?N` placeholders in `sql`.
    pub fn placeholder_count(&self) -> usize {
        self.params.len() + 1
    }
}

/// Compiles validated queries. Holds only configuration, so it can be shared freely.
#[derive(Debug, Clone, Copy, Default)]
pub struct Compiler {
    config: CompilerConfig,
}

impl Compiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> CompilerConfig {
        self.config
    }

    /// Compile `query`. The same query always yields byte-identical output.
    pub fn compile(&self, query: &Query) -> Result<CompiledStatement, CompileError> {
        let result = self.compile_inner(query);
        match &result {
            Ok(stmt) => tracing::debug!(
                "Compiled {} query: {} ({} params, fetch {})",
                query.dataset(),
                stmt.sql,
                stmt.params.len(),
                stmt.fetch_size
            ),
            Err(e) => tracing::error!("Compiler invariant violated: {e}"),
        }
        result
    }

    fn compile_inner(&self, query: &Query) -> Result<CompiledStatement, CompileError> {
        let dataset = query.dataset();

        let fetch_size = query.limit().unwrap_or(self.config.default_limit);
        if !(MIN_LIMIT..=MAX_LIMIT).contains(&fetch_size) {
            return Err(CompileError::FetchSizeOutOfRange(fetch_size));
        }

        let mut builder = SqlBuilder::default();
        write!(builder.sql, "SELECT * FROM {}", dataset.table_name()).ok();

        for (i, filter) in query.filters().iter().enumerate() {
            check_owner(filter.field.name, filter.field.dataset, dataset)?;
            builder.sql.push_str(if i == 0 { " WHERE " } else { " AND " });
            builder.predicate(filter);
        }

        for (i, key) in query.sort().iter().enumerate() {
            check_owner(key.field.name, key.field.dataset, dataset)?;
            builder.sql.push_str(if i == 0 { " ORDER BY " } else { ", " });
            let dir = match key.direction {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            };
            write!(builder.sql, "{} {dir}", key.field.name).ok();
        }

        builder.sql.push_str(" LIMIT ");
        builder.placeholder();

        Ok(CompiledStatement {
            sql: builder.sql,
            params: builder.params,
            fetch_size,
        })
    }
}

/// Compile with the default configuration.
pub fn compile(query: &Query) -> Result<CompiledStatement, CompileError> {
    Compiler::default().compile(query)
}

fn check_owner(
    field: &'static str,
    field_dataset: Dataset,
    dataset: Dataset,
) -> Result<(), CompileError> {
    if field_dataset == dataset {
        Ok(())
    } else {
        Err(CompileError::FieldOutsideDataset {
            field,
            field_dataset,
            dataset,
        })
    }
}

#[derive(Default)]
struct SqlBuilder {
    sql: String,
    params: Vec<SqlParam>,
}

impl SqlBuilder {
    /// Append the next `?N` placeholder; `N` counts every placeholder so far, LIMIT included.
    fn placeholder(&mut self) {
        write!(self.sql, "?{}", self.params.len() + 1).ok();
    }

    fn bind(&mut self, value: SqlParam) {
        self.placeholder();
        self.params.push(value);
    }

    fn bind_list(&mut self, values: &[Scalar]) {
        self.sql.push('(');
        for (i, v) in values.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.bind(v.clone());
        }
        self.sql.push(')');
    }

    fn predicate(&mut self, filter: &Filter) {
        let column = filter.field.name;
        match &filter.predicate {
            Predicate::Compare { op, value } => {
                write!(self.sql, "{column} {} ", compare_sql(*op)).ok();
                self.bind(value.clone());
            }
            Predicate::Contains(needle) => {
                write!(self.sql, "{column} LIKE ").ok();
                self.bind(Scalar::Text(format!("%{}%", escape_like(needle))));
                self.sql.push_str(" ESCAPE '\\'");
            }
            Predicate::Regex(pattern) => {
                write!(self.sql, "{column} REGEXP ").ok();
                self.bind(Scalar::Text(pattern.clone()));
            }
            Predicate::Between { low, high } => {
                write!(self.sql, "{column} BETWEEN ").ok();
                self.bind(low.clone());
                self.sql.push_str(" AND ");
                self.bind(high.clone());
            }
            Predicate::In(values) => {
                write!(self.sql, "{column} IN ").ok();
                self.bind_list(values);
            }
            Predicate::NotIn(values) => {
                write!(self.sql, "{column} NOT IN ").ok();
                self.bind_list(values);
            }
            Predicate::Country(country) => {
                write!(self.sql, "{column} LIKE ").ok();
                self.bind(Scalar::Text(crate::country::like_pattern(country.prefix)));
            }
            Predicate::IsNull => {
                write!(self.sql, "{column} IS NULL").ok();
            }
            Predicate::IsNotNull => {
                write!(self.sql, "{column} IS NOT NULL").ok();
            }
        }
    }
}

fn compare_sql(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Eq => "=",
        CompareOp::Ne => "!=",
        CompareOp::Gt => ">",
        CompareOp::Lt => "<",
        CompareOp::Ge => ">=",
        CompareOp::Le => "<=",
    }
}

/// Escape `LIKE` metacharacters so `input` matches literally under `ESCAPE '\'`.
pub fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
