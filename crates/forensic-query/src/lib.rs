//! Forensic query: a validating DSL compiler for message, call, contact and entity records.
//!
//! Queries arrive as JSON (or a [`RawQuery`] / [`QueryBuilder`]), are
//! validated into a typed [`Query`], compiled to parameterized SQL and run
//! against SQLite.

pub mod builder;
pub mod compiler;
pub mod country;
pub mod dsl;
pub mod error;
pub mod executor;
pub mod samples;
pub mod schema;
pub mod store;
pub mod validator;

pub use builder::QueryBuilder;
pub use compiler::{compile, CompiledStatement, Compiler, CompilerConfig, SqlParam};
pub use country::{lookup as lookup_country, prefix_for, CountryCode, UnknownCountry};
pub use dsl::{
    CompareOp, Filter, Operator, Predicate, Query, RawFilter, RawQuery, RawSort, Scalar,
    SortDirection, SortKey,
};
pub use error::{
    CompileError, ErrorKind, QueryError, QueryResult, ReasonCode, ValidationError,
};
pub use executor::{execute, register_functions, Row};
pub use schema::{
    field_descriptor, fields_for, semantic_type_of, Dataset, FieldDescriptor, SchemaError,
    SemanticType,
};
pub use store::{ForensicStore, SeedSummary};
pub use validator::{validate, validate_json, validate_value, MAX_LIMIT, MIN_LIMIT};
