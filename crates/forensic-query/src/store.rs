//! SQLite-backed forensic store: schema bootstrap, sample data and end-to-end query runs.

use std::path::Path;

use rusqlite::{params, Connection};
use serde_json::Value;

use crate::compiler::{Compiler, CompilerConfig};
use crate::dsl::{Query, RawQuery};
use crate::error::QueryResult;
use crate::executor::{self, Row};
use crate::schema::Dataset;
use crate::validator;

/// Table definitions. `DATETIME` columns hold text in
/// [`validator::TIMESTAMP_FORMAT`], e.g. `2024-01-02 10:30:00.000000`.
const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    sender VARCHAR(255) NOT NULL,
    receiver VARCHAR(255) NOT NULL,
    app VARCHAR(100) NOT NULL,
    timestamp DATETIME NOT NULL,
    text TEXT
);
CREATE INDEX IF NOT EXISTS ix_messages_sender ON messages (sender);
CREATE INDEX IF NOT EXISTS ix_messages_receiver ON messages (receiver);
CREATE INDEX IF NOT EXISTS ix_messages_app ON messages (app);
CREATE INDEX IF NOT EXISTS ix_messages_timestamp ON messages (timestamp);
CREATE INDEX IF NOT EXISTS idx_messages_sender_app ON messages (sender, app);
CREATE INDEX IF NOT EXISTS idx_messages_receiver_app ON messages (receiver, app);
CREATE INDEX IF NOT EXISTS idx_messages_timestamp_app ON messages (timestamp, app);

CREATE TABLE IF NOT EXISTS calls (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    caller VARCHAR(255) NOT NULL,
    callee VARCHAR(255) NOT NULL,
    timestamp DATETIME NOT NULL,
    duration INTEGER,
    type VARCHAR(20) NOT NULL
);
CREATE INDEX IF NOT EXISTS ix_calls_caller ON calls (caller);
CREATE INDEX IF NOT EXISTS ix_calls_callee ON calls (callee);
CREATE INDEX IF NOT EXISTS ix_calls_timestamp ON calls (timestamp);
CREATE INDEX IF NOT EXISTS ix_calls_type ON calls (type);
CREATE INDEX IF NOT EXISTS idx_calls_caller_type ON calls (caller, type);
CREATE INDEX IF NOT EXISTS idx_calls_callee_type ON calls (callee, type);
CREATE INDEX IF NOT EXISTS idx_calls_timestamp_type ON calls (timestamp, type);

CREATE TABLE IF NOT EXISTS contacts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name VARCHAR(255),
    number VARCHAR(50),
    email VARCHAR(255),
    app VARCHAR(100) NOT NULL
);
CREATE INDEX IF NOT EXISTS ix_contacts_name ON contacts (name);
CREATE INDEX IF NOT EXISTS ix_contacts_number ON contacts (number);
CREATE INDEX IF NOT EXISTS ix_contacts_email ON contacts (email);
CREATE INDEX IF NOT EXISTS ix_contacts_app ON contacts (app);
CREATE INDEX IF NOT EXISTS idx_contacts_number_app ON contacts (number, app);
CREATE INDEX IF NOT EXISTS idx_contacts_email_app ON contacts (email, app);
CREATE INDEX IF NOT EXISTS idx_contacts_name_app ON contacts (name, app);

CREATE TABLE IF NOT EXISTS entities (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    type VARCHAR(50) NOT NULL,
    value VARCHAR(500) NOT NULL,
    linked_message_id INTEGER REFERENCES messages (id),
    linked_call_id INTEGER REFERENCES calls (id),
    confidence FLOAT NOT NULL DEFAULT 1.0
);
CREATE INDEX IF NOT EXISTS ix_entities_type ON entities (type);
CREATE INDEX IF NOT EXISTS ix_entities_value ON entities (value);
CREATE INDEX IF NOT EXISTS idx_entities_type_value ON entities (type, value);
CREATE INDEX IF NOT EXISTS idx_entities_confidence ON entities (confidence);
CREATE INDEX IF NOT EXISTS idx_entities_linked_message ON entities (linked_message_id);
CREATE INDEX IF NOT EXISTS idx_entities_linked_call ON entities (linked_call_id);
";

/// Row counts after seeding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct SeedSummary {
    pub messages: usize,
    pub calls: usize,
    pub contacts: usize,
    pub entities: usize,
}

/// A forensic database with the query functions registered.
pub struct ForensicStore {
    conn: Connection,
    compiler: Compiler,
}

impl ForensicStore {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> rusqlite::Result<Self> {
        let path = path.as_ref();
        tracing::debug!("Opening forensic store at {}", path.display());
        Self::from_connection(Connection::open(path)?)
    }

    /// A fresh in-memory database.
    pub fn open_in_memory() -> rusqlite::Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Wrap an existing connection, registering the functions compiled queries need.
    pub fn from_connection(conn: Connection) -> rusqlite::Result<Self> {
        executor::register_functions(&conn)?;
        Ok(Self {
            conn,
            compiler: Compiler::new(CompilerConfig::from_env()),
        })
    }

    /// Replace the compiler settings.
    pub fn with_compiler(mut self, compiler: Compiler) -> Self {
        self.compiler = compiler;
        self
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    /// Create the four tables and their indexes if missing.
    pub fn ensure_schema(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch(SCHEMA_SQL)
    }

    /// Number of rows stored for `dataset`.
    pub fn count(&self, dataset: Dataset) -> rusqlite::Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", dataset.table_name());
        let n: i64 = self.conn.query_row(&sql, [], |r| r.get(0))?;
        Ok(usize::try_from(n).unwrap_or(0))
    }

    /// Replace all data with a small, fixed case file: everyday traffic mixed
    /// with a UAE contact, bitcoin addresses and a ProtonMail account.
    pub fn seed_sample(&mut self) -> rusqlite::Result<SeedSummary> {
        self.ensure_schema()?;
        let tx = self.conn.transaction()?;
        tx.execute_batch(
            "DELETE FROM entities; DELETE FROM messages; DELETE FROM calls; DELETE FROM contacts;
             DELETE FROM sqlite_sequence WHERE name IN ('entities', 'messages', 'calls', 'contacts');",
        )?;

        let mut summary = SeedSummary::default();

        let messages = [
            ("+1234567890", "+1987654321", "WhatsApp", "2024-01-02 10:30:00.000000",
             "Hey, are we still meeting for lunch tomorrow?"),
            ("+971501234567", "+1234567890", "Telegram", "2024-01-03 14:15:00.000000",
             "Payment received. Send 0.5 BTC to: 1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2"),
            ("+1987654321", "+1234567890", "WhatsApp", "2024-01-04 09:45:00.000000",
             "Thanks for the coffee! Let's do it again soon."),
            ("+1234567890", "+971509876543", "Signal", "2024-01-06 22:30:00.000000",
             "Transaction confirmed. New address: bc1qxy2kgdygjrsqtzq2n0yrf2493p83kkfjhx0wlh"),
            ("+1555123456", "+1234567890", "WhatsApp", "2024-01-08 16:20:00.000000",
             "Can you send me the project files when you get a chance?"),
        ];
        for (sender, receiver, app, timestamp, text) in messages {
            tx.execute(
                "INSERT INTO messages (sender, receiver, app, timestamp, text) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![sender, receiver, app, timestamp, text],
            )?;
            summary.messages += 1;
        }

        let calls = [
            ("+1234567890", "+1987654321", "2024-01-02 11:00:00.000000", 180, "outgoing"),
            ("+971501234567", "+1234567890", "2024-01-03 15:00:00.000000", 750, "incoming"),
            ("+1234567890", "+1555123456", "2024-01-08 17:00:00.000000", 420, "outgoing"),
        ];
        for (caller, callee, timestamp, duration, kind) in calls {
            tx.execute(
                "INSERT INTO calls (caller, callee, timestamp, duration, type) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![caller, callee, timestamp, duration, kind],
            )?;
            summary.calls += 1;
        }

        let contacts = [
            ("Sarah Johnson", "+1987654321", "sarah.johnson@email.com", "WhatsApp"),
            ("Ahmed Al-Rashid", "+971501234567", "ahmed.rashid@protonmail.com", "Telegram"),
            ("Mike Chen", "+1555123456", "mike.chen@company.com", "WhatsApp"),
        ];
        for (name, number, email, app) in contacts {
            tx.execute(
                "INSERT INTO contacts (name, number, email, app) VALUES (?1, ?2, ?3, ?4)",
                params![name, number, email, app],
            )?;
            summary.contacts += 1;
        }

        let entities: [(&str, &str, Option<i64>, Option<i64>, f64); 4] = [
            ("bitcoin", "1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2", Some(2), None, 0.98),
            ("foreign_number", "+971501234567", Some(2), None, 1.0),
            ("bitcoin", "bc1qxy2kgdygjrsqtzq2n0yrf2493p83kkfjhx0wlh", Some(4), None, 0.95),
            ("foreign_number", "+971501234567", None, Some(2), 1.0),
        ];
        for (kind, value, message_id, call_id, confidence) in entities {
            tx.execute(
                "INSERT INTO entities (type, value, linked_message_id, linked_call_id, confidence)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![kind, value, message_id, call_id, confidence],
            )?;
            summary.entities += 1;
        }

        tx.commit()?;
        tracing::info!(
            "Seeded sample data: {} messages, {} calls, {} contacts, {} entities",
            summary.messages,
            summary.calls,
            summary.contacts,
            summary.entities
        );
        Ok(summary)
    }

    /// Validate, compile and execute a query.
    pub fn run(&self, raw: &RawQuery) -> QueryResult<Vec<Row>> {
        let query = validator::validate(raw)?;
        self.run_query(&query)
    }

    /// Compile and execute an already validated query.
    pub fn run_query(&self, query: &Query) -> QueryResult<Vec<Row>> {
        let stmt = self.compiler.compile(query)?;
        Ok(executor::execute(&self.conn, &stmt)?)
    }

    /// [`run`](Self::run) for a JSON document.
    pub fn run_json(&self, input: &str) -> QueryResult<Vec<Row>> {
        self.run(&RawQuery::from_json(input)?)
    }

    /// [`run`](Self::run) for a parsed JSON value.
    pub fn run_value(&self, input: Value) -> QueryResult<Vec<Row>> {
        self.run(&RawQuery::from_value(input)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, ReasonCode};
    use serde_json::json;

    fn seeded() -> ForensicStore {
        let mut store = ForensicStore::open_in_memory().unwrap();
        store.seed_sample().unwrap();
        store
    }

    #[test]
    fn test_ensure_schema_is_idempotent() {
        let store = ForensicStore::open_in_memory().unwrap();
        store.ensure_schema().unwrap();
        store.ensure_schema().unwrap();
        for dataset in Dataset::ALL {
            assert_eq!(store.count(dataset).unwrap(), 0);
        }
    }

    #[test]
    fn test_seed_sample_counts() {
        let mut store = ForensicStore::open_in_memory().unwrap();
        let summary = store.seed_sample().unwrap();
        assert_eq!(
            summary,
            SeedSummary {
                messages: 5,
                calls: 3,
                contacts: 3,
                entities: 4
            }
        );
        // reseeding replaces rather than appends
        store.seed_sample().unwrap();
        assert_eq!(store.count(Dataset::Messages).unwrap(), 5);
        assert_eq!(store.count(Dataset::Entities).unwrap(), 4);
    }

    #[test]
    fn test_run_json_long_calls() {
        let rows = seeded()
            .run_json(r#"{"dataset": "calls", "filters": [{"field": "duration", "op": ">", "value": 600}]}"#)
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["caller"], "+971501234567");
        assert_eq!(rows[0]["duration"], 750);
    }

    #[test]
    fn test_run_query_reuses_validated_query() {
        let store = seeded();
        let query = validator::validate_value(json!({
            "dataset": "entities",
            "filters": [{"field": "type", "op": "=", "value": "bitcoin"}],
            "sort": [{"field": "confidence", "direction": "desc"}]
        }))
        .unwrap();
        let rows = store.run_query(&query).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], 1);
        assert_eq!(rows, store.run(&query.to_raw()).unwrap());
    }

    #[test]
    fn test_run_reports_validation_errors() {
        let err = seeded()
            .run_value(json!({"dataset": "calls", "filters": [{"field": "nonexistent", "op": "=", "value": 1}]}))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.as_validation().unwrap().reason, ReasonCode::UnknownField);
    }

    #[test]
    fn test_run_reports_execution_errors() {
        let store = ForensicStore::open_in_memory().unwrap();
        let err = store.run_value(json!({"dataset": "messages"})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execution);
    }

    #[test]
    fn test_open_file_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("case.db");
        {
            let mut store = ForensicStore::open(&path).unwrap();
            store.seed_sample().unwrap();
        }
        let store = ForensicStore::open(&path).unwrap();
        assert_eq!(store.count(Dataset::Contacts).unwrap(), 3);
        let rows = store
            .run_value(json!({
                "dataset": "contacts",
                "filters": [{"field": "email", "op": "contains", "value": "protonmail"}]
            }))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], "Ahmed Al-Rashid");
    }
}
