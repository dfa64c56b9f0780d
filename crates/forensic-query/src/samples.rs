//! Named example queries covering the common investigative patterns.

use serde_json::{json, Value};

use crate::dsl::RawQuery;
use crate::error::ValidationError;

/// A named example query.
#[derive(Debug, Clone)]
pub struct Sample {
    pub name: &'static str,
    pub description: &'static str,
    pub query: Value,
}

impl Sample {
    pub fn raw(&self) -> Result<RawQuery, ValidationError> {
        RawQuery::from_value(self.query.clone())
    }
}

/// All samples, in catalog order.
pub fn samples() -> Vec<Sample> {
    vec![
        Sample {
            name: "whatsapp_uae",
            description: "WhatsApp messages sent to UAE numbers",
            query: json!({
                "dataset": "messages",
                "filters": [
                    {"field": "app", "op": "=", "value": "WhatsApp"},
                    {"field": "receiver", "op": "country", "value": "UAE"}
                ]
            }),
        },
        Sample {
            name: "long_calls",
            description: "Calls longer than ten minutes",
            query: json!({
                "dataset": "calls",
                "filters": [{"field": "duration", "op": ">", "value": 600}]
            }),
        },
        Sample {
            name: "protonmail_contacts",
            description: "Contacts with a ProtonMail address",
            query: json!({
                "dataset": "contacts",
                "filters": [{"field": "email", "op": "contains", "value": "protonmail"}]
            }),
        },
        Sample {
            name: "bitcoin_entities",
            description: "High-confidence bitcoin addresses, most confident first",
            query: json!({
                "dataset": "entities",
                "filters": [
                    {"field": "type", "op": "=", "value": "bitcoin"},
                    {"field": "confidence", "op": ">=", "value": 0.8}
                ],
                "sort": [{"field": "confidence", "direction": "desc"}]
            }),
        },
        Sample {
            name: "recent_messages",
            description: "Messages since the start of 2024, newest first",
            query: json!({
                "dataset": "messages",
                "filters": [{"field": "timestamp", "op": ">=", "value": "2024-01-01"}],
                "sort": [{"field": "timestamp", "direction": "desc"}],
                "limit": 100
            }),
        },
        Sample {
            name: "suspicious_communications",
            description: "Telegram or Signal messages mentioning bitcoin",
            query: json!({
                "dataset": "messages",
                "filters": [
                    {"field": "app", "op": "in", "value": ["Telegram", "Signal"]},
                    {"field": "text", "op": "contains", "value": "bitcoin"}
                ]
            }),
        },
    ]
}

/// Look up a sample by name.
pub fn sample(name: &str) -> Option<Sample> {
    samples().into_iter().find(|s| s.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::validator::validate;

    #[test]
    fn test_every_sample_validates_and_compiles() {
        for s in samples() {
            let raw = s.raw().unwrap();
            let query = validate(&raw).unwrap_or_else(|e| panic!("{}: {e}", s.name));
            compile(&query).unwrap_or_else(|e| panic!("{}: {e}", s.name));
        }
    }

    #[test]
    fn test_sample_lookup() {
        assert_eq!(sample("long_calls").unwrap().query["dataset"], "calls");
        assert!(sample("nope").is_none());
    }

    #[test]
    fn test_sample_names_unique() {
        let mut names: Vec<&str> = samples().iter().map(|s| s.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 6);
    }
}
