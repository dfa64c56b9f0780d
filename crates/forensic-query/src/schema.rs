//! Schema registry: the fixed set of forensic datasets and their typed fields.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dsl::Operator;

/// One of the four forensic record kinds. The table name equals the dataset name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    Messages,
    Calls,
    Contacts,
    Entities,
}

/// Semantic type of a field, which decides the operators it accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    String,
    Number,
    Timestamp,
    Phone,
}

/// A field of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub semantic_type: SemanticType,
    pub dataset: Dataset,
    /// Foreign references that may legitimately be NULL.
    pub nullable: bool,
}

/// Errors raised by registry lookups.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("unknown dataset '{0}'")]
    UnknownDataset(String),

    #[error("unknown field '{field}' for dataset '{dataset}'")]
    UnknownField { dataset: Dataset, field: String },
}

const fn field(
    dataset: Dataset,
    name: &'static str,
    semantic_type: SemanticType,
    nullable: bool,
) -> FieldDescriptor {
    FieldDescriptor {
        name,
        semantic_type,
        dataset,
        nullable,
    }
}

use Dataset::{Calls, Contacts, Entities, Messages};
use SemanticType::{Number, Phone, Timestamp};

static MESSAGE_FIELDS: [FieldDescriptor; 6] = [
    field(Messages, "id", Number, false),
    field(Messages, "sender", Phone, false),
    field(Messages, "receiver", Phone, false),
    field(Messages, "app", SemanticType::String, false),
    field(Messages, "timestamp", Timestamp, false),
    field(Messages, "text", SemanticType::String, false),
];

static CALL_FIELDS: [FieldDescriptor; 6] = [
    field(Calls, "id", Number, false),
    field(Calls, "caller", Phone, false),
    field(Calls, "callee", Phone, false),
    field(Calls, "timestamp", Timestamp, false),
    field(Calls, "duration", Number, false),
    field(Calls, "type", SemanticType::String, false),
];

static CONTACT_FIELDS: [FieldDescriptor; 5] = [
    field(Contacts, "id", Number, false),
    field(Contacts, "name", SemanticType::String, false),
    field(Contacts, "number", Phone, false),
    field(Contacts, "email", SemanticType::String, false),
    field(Contacts, "app", SemanticType::String, false),
];

static ENTITY_FIELDS: [FieldDescriptor; 6] = [
    field(Entities, "id", Number, false),
    field(Entities, "type", SemanticType::String, false),
    field(Entities, "value", SemanticType::String, false),
    field(Entities, "linked_message_id", Number, true),
    field(Entities, "linked_call_id", Number, true),
    field(Entities, "confidence", Number, false),
];

impl Dataset {
    /// Every dataset, in declaration order.
    pub const ALL: [Dataset; 4] = [Messages, Calls, Contacts, Entities];

    pub fn as_str(self) -> &'static str {
        match self {
            Messages => "messages",
            Calls => "calls",
            Contacts => "contacts",
            Entities => "entities",
        }
    }

    /// Table backing this dataset in the relational store.
    pub fn table_name(self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dataset {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dataset::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| SchemaError::UnknownDataset(s.to_string()))
    }
}

impl SemanticType {
    pub fn as_str(self) -> &'static str {
        match self {
            SemanticType::String => "string",
            Number => "number",
            Timestamp => "timestamp",
            Phone => "phone",
        }
    }

    /// Whether `op` may be applied to a field of this type.
    pub fn allows(self, op: Operator) -> bool {
        use Operator::*;
        match self {
            SemanticType::String => matches!(
                op,
                Eq | Ne | Contains | Regex | In | NotIn | IsNull | IsNotNull
            ),
            Number => matches!(
                op,
                Eq | Ne | Gt | Lt | Ge | Le | Between | In | NotIn | IsNull | IsNotNull
            ),
            Timestamp => matches!(
                op,
                Eq | Ne | Gt | Lt | Ge | Le | Between | IsNull | IsNotNull
            ),
            Phone => matches!(
                op,
                Eq | Ne | Contains | Regex | In | NotIn | Country | IsNull | IsNotNull
            ),
        }
    }

    /// Operators accepted by this type, in canonical operator order.
    pub fn allowed_operators(self) -> Vec<Operator> {
        Operator::ALL
            .into_iter()
            .filter(|op| self.allows(*op))
            .collect()
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields of a dataset, in declaration order.
pub fn fields_for(dataset: Dataset) -> &'static [FieldDescriptor] {
    match dataset {
        Messages => &MESSAGE_FIELDS,
        Calls => &CALL_FIELDS,
        Contacts => &CONTACT_FIELDS,
        Entities => &ENTITY_FIELDS,
    }
}

/// Look up a field descriptor by name.
pub fn field_descriptor(dataset: Dataset, name: &str) -> Option<&'static FieldDescriptor> {
    fields_for(dataset).iter().find(|f| f.name == name)
}

/// Semantic type of `field` within `dataset`.
pub fn semantic_type_of(dataset: Dataset, field: &str) -> Result<SemanticType, SchemaError> {
    field_descriptor(dataset, field)
        .map(|f| f.semantic_type)
        .ok_or_else(|| SchemaError::UnknownField {
            dataset,
            field: field.to_string(),
        })
}
