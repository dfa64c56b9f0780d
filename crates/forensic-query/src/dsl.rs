//! Query DSL data model.
//!
//! Two layers: the loosely typed [`RawQuery`] accepted from callers (JSON
//! documents or native structures), and the validated, immutable [`Query`]
//! produced by [`crate::validator::validate`]. Only a `Query` can be compiled.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::country::CountryCode;
use crate::error::{ReasonCode, ValidationError};
use crate::schema::{Dataset, FieldDescriptor};

// ── Raw input ──

/// An unvalidated query, exactly as supplied by the caller.
///
/// ```json
/// {"dataset": "calls",
///  "filters": [{"field": "duration", "op": ">", "value": 600}],
///  "sort": [{"field": "duration", "direction": "desc"}],
///  "limit": 50}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawQuery {
    #[serde(default)]
    pub dataset: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub filters: Vec<RawFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<Value>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub sort: Vec<RawSort>,
}

/// An unvalidated `{field, op, value}` filter. A JSON `null` value is treated as absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawFilter {
    pub field: String,
    pub op: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// An unvalidated `{field, direction}` sort entry; direction defaults to `asc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawSort {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl RawQuery {
    /// Parse a JSON document. Structural problems are reported as `MalformedQuery`.
    pub fn from_json(input: &str) -> Result<RawQuery, ValidationError> {
        serde_json::from_str(input).map_err(malformed)
    }

    /// Interpret an already-parsed JSON value.
    pub fn from_value(input: Value) -> Result<RawQuery, ValidationError> {
        serde_json::from_value(input).map_err(malformed)
    }
}

fn malformed(e: serde_json::Error) -> ValidationError {
    ValidationError::new(
        ReasonCode::MalformedQuery,
        "$",
        format!("query is not a valid DSL document: {e}"),
    )
}

impl RawFilter {
    pub fn new(field: impl Into<String>, op: impl Into<String>, value: Option<Value>) -> Self {
        Self {
            field: field.into(),
            op: op.into(),
            value,
        }
    }
}

impl RawSort {
    pub fn new(field: impl Into<String>, direction: Option<&str>) -> Self {
        Self {
            field: field.into(),
            direction: direction.map(str::to_string),
        }
    }
}

// ── Operators ──

/// The closed set of filter operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Contains,
    Regex,
    Between,
    In,
    NotIn,
    Country,
    IsNull,
    IsNotNull,
}

/// Shape of the value an operator expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// No value at all.
    Nullary,
    /// A single scalar.
    Scalar,
    /// An ordered `[min, max]` pair.
    Pair,
    /// A non-empty list of scalars.
    List,
}

impl Operator {
    pub const ALL: [Operator; 14] = [
        Operator::Eq,
        Operator::Ne,
        Operator::Gt,
        Operator::Lt,
        Operator::Ge,
        Operator::Le,
        Operator::Contains,
        Operator::Regex,
        Operator::Between,
        Operator::In,
        Operator::NotIn,
        Operator::Country,
        Operator::IsNull,
        Operator::IsNotNull,
    ];

    /// DSL spelling of the operator.
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Ge => ">=",
            Operator::Le => "<=",
            Operator::Contains => "contains",
            Operator::Regex => "regex",
            Operator::Between => "between",
            Operator::In => "in",
            Operator::NotIn => "not_in",
            Operator::Country => "country",
            Operator::IsNull => "is_null",
            Operator::IsNotNull => "is_not_null",
        }
    }

    /// Parse the DSL spelling. Word operators are case-insensitive.
    pub fn parse(s: &str) -> Option<Operator> {
        let s = s.trim();
        Operator::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(s))
    }

    pub fn arity(self) -> Arity {
        match self {
            Operator::IsNull | Operator::IsNotNull => Arity::Nullary,
            Operator::Between => Arity::Pair,
            Operator::In | Operator::NotIn => Arity::List,
            Operator::Eq
            | Operator::Ne
            | Operator::Gt
            | Operator::Lt
            | Operator::Ge
            | Operator::Le
            | Operator::Contains
            | Operator::Regex
            | Operator::Country => Arity::Scalar,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Operator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Binary comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl CompareOp {
    pub fn operator(self) -> Operator {
        match self {
            CompareOp::Eq => Operator::Eq,
            CompareOp::Ne => Operator::Ne,
            CompareOp::Gt => Operator::Gt,
            CompareOp::Lt => Operator::Lt,
            CompareOp::Ge => Operator::Ge,
            CompareOp::Le => Operator::Le,
        }
    }

    pub fn from_operator(op: Operator) -> Option<CompareOp> {
        match op {
            Operator::Eq => Some(CompareOp::Eq),
            Operator::Ne => Some(CompareOp::Ne),
            Operator::Gt => Some(CompareOp::Gt),
            Operator::Lt => Some(CompareOp::Lt),
            Operator::Ge => Some(CompareOp::Ge),
            Operator::Le => Some(CompareOp::Le),
            _ => None,
        }
    }
}

// ── Validated model ──

/// A literal value that has been coerced to its field's semantic type.
///
/// Timestamps are carried as normalized `YYYY-MM-DD HH:MM:SS` text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Scalar {
    /// Ordering between two scalars of the same semantic type.
    ///
    /// Integers and reals compare numerically; text compares bytewise, which
    /// is chronological for normalized timestamps.
    pub fn compare(&self, other: &Scalar) -> Option<Ordering> {
        match (self, other) {
            (Scalar::Integer(a), Scalar::Integer(b)) => Some(a.cmp(b)),
            (Scalar::Text(a), Scalar::Text(b)) => Some(a.cmp(b)),
            (a, b) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Integer(i) => Some(*i as f64),
            Scalar::Real(r) => Some(*r),
            Scalar::Text(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Scalar::Integer(i) => Value::from(*i),
            Scalar::Real(r) => serde_json::Number::from_f64(*r)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Scalar::Text(s) => Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Integer(v) => write!(f, "{v}"),
            Scalar::Real(v) => write!(f, "{v}"),
            Scalar::Text(v) => write!(f, "{v:?}"),
        }
    }
}

/// A typed predicate: the operator together with operands of the right shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare { op: CompareOp, value: Scalar },
    Contains(String),
    Regex(String),
    Between { low: Scalar, high: Scalar },
    In(Vec<Scalar>),
    NotIn(Vec<Scalar>),
    Country(&'static CountryCode),
    IsNull,
    IsNotNull,
}

impl Predicate {
    pub fn operator(&self) -> Operator {
        match self {
            Predicate::Compare { op, .. } => op.operator(),
            Predicate::Contains(_) => Operator::Contains,
            Predicate::Regex(_) => Operator::Regex,
            Predicate::Between { .. } => Operator::Between,
            Predicate::In(_) => Operator::In,
            Predicate::NotIn(_) => Operator::NotIn,
            Predicate::Country(_) => Operator::Country,
            Predicate::IsNull => Operator::IsNull,
            Predicate::IsNotNull => Operator::IsNotNull,
        }
    }

    /// The operand in DSL form, `None` for null checks.
    pub fn value_json(&self) -> Option<Value> {
        match self {
            Predicate::Compare { value, .. } => Some(value.to_json()),
            Predicate::Contains(s) | Predicate::Regex(s) => Some(Value::from(s.as_str())),
            Predicate::Between { low, high } => Some(Value::Array(vec![low.to_json(), high.to_json()])),
            Predicate::In(values) | Predicate::NotIn(values) => {
                Some(Value::Array(values.iter().map(Scalar::to_json).collect()))
            }
            Predicate::Country(c) => Some(Value::from(c.name)),
            Predicate::IsNull | Predicate::IsNotNull => None,
        }
    }
}

/// A validated filter condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: &'static FieldDescriptor,
    pub predicate: Predicate,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// Case-insensitive parse of `asc` / `desc`.
    pub fn parse(s: &str) -> Option<SortDirection> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// A validated sort key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SortKey {
    pub field: &'static FieldDescriptor,
    pub direction: SortDirection,
}

/// A validated query. Immutable: to change it, build and validate a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    dataset: Dataset,
    filters: Vec<Filter>,
    sort: Vec<SortKey>,
    limit: Option<u32>,
}

impl Query {
    pub(crate) fn new(
        dataset: Dataset,
        filters: Vec<Filter>,
        sort: Vec<SortKey>,
        limit: Option<u32>,
    ) -> Self {
        Self {
            dataset,
            filters,
            sort,
            limit,
        }
    }

    pub fn dataset(&self) -> Dataset {
        self.dataset
    }

    /// Filters, AND-combined in this order.
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn sort(&self) -> &[SortKey] {
        &self.sort
    }

    /// Explicit limit, if the caller gave one.
    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    /// Canonical DSL form of this query; validates back to an equal `Query`.
    pub fn to_raw(&self) -> RawQuery {
        RawQuery::from(self)
    }
}

impl From<&Query> for RawQuery {
    fn from(query: &Query) -> Self {
        RawQuery {
            dataset: Some(query.dataset.as_str().to_string()),
            filters: query
                .filters
                .iter()
                .map(|f| RawFilter {
                    field: f.field.name.to_string(),
                    op: f.predicate.operator().as_str().to_string(),
                    value: f.predicate.value_json(),
                })
                .collect(),
            limit: query.limit.map(Value::from),
            sort: query
                .sort
                .iter()
                .map(|s| RawSort::new(s.field.name, Some(s.direction.as_str())))
                .collect(),
        }
    }
}

impl Serialize for Query {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RawQuery::from(self).serialize(serializer)
    }
}
