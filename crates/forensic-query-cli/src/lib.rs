//! Forensic query CLI: validate, compile and run DSL queries from the shell.

pub mod commands;
pub mod config;
pub mod input;
pub mod output;
pub mod repl;

pub use config::resolve_database_path;
pub use output::OutputMode;
