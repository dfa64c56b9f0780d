//! DSL validator: turns an untrusted [`RawQuery`] into a typed [`Query`].
//!
//! Checks run in a fixed order and stop at the first failure:
//! dataset → filters (field, operator, value) → sort → limit.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde_json::Value;

use crate::country;
use crate::dsl::{
    Arity, CompareOp, Filter, Operator, Predicate, Query, RawFilter, RawQuery, RawSort, Scalar,
    SortDirection, SortKey,
};
use crate::error::{ReasonCode, ValidationError};
use crate::schema::{self, Dataset, FieldDescriptor, SemanticType};

/// Smallest accepted `limit`.
pub const MIN_LIMIT: u32 = 1;
/// Largest accepted `limit`.
pub const MAX_LIMIT: u32 = 10_000;

/// Canonical text form of timestamp literals, matching how the store writes
/// `DATETIME` columns. Fixed width so text order is chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Bare numeric strings shorter than this are not read as epoch seconds,
/// so compact dates like `20240101` are rejected instead of landing in 1970.
const MIN_EPOCH_DIGITS: usize = 9;

type VResult<T> = Result<T, ValidationError>;

/// Validate a raw query against the schema registry and operator rules.
pub fn validate(raw: &RawQuery) -> VResult<Query> {
    let result = validate_query(raw);
    match &result {
        Ok(query) => tracing::debug!(
            "Validated query on {} ({} filters, {} sort keys)",
            query.dataset(),
            query.filters().len(),
            query.sort().len()
        ),
        Err(e) => tracing::warn!("Rejected query: {e}"),
    }
    result
}

/// Parse a JSON document and validate it.
pub fn validate_json(input: &str) -> VResult<Query> {
    validate(&RawQuery::from_json(input)?)
}

/// Validate an already-parsed JSON value.
pub fn validate_value(input: Value) -> VResult<Query> {
    validate(&RawQuery::from_value(input)?)
}

fn validate_query(raw: &RawQuery) -> VResult<Query> {
    let dataset = validate_dataset(raw.dataset.as_deref())?;

    let filters = raw
        .filters
        .iter()
        .enumerate()
        .map(|(i, f)| validate_filter(dataset, i, f))
        .collect::<VResult<Vec<_>>>()?;

    let sort = raw
        .sort
        .iter()
        .enumerate()
        .map(|(i, s)| validate_sort(dataset, i, s))
        .collect::<VResult<Vec<_>>>()?;

    let limit = validate_limit(raw.limit.as_ref())?;

    Ok(Query::new(dataset, filters, sort, limit))
}

fn validate_dataset(dataset: Option<&str>) -> VResult<Dataset> {
    let name = dataset.ok_or_else(|| {
        ValidationError::new(
            ReasonCode::UnknownDataset,
            "dataset",
            "missing required field 'dataset'",
        )
    })?;
    name.parse::<Dataset>().map_err(|_| {
        ValidationError::new(
            ReasonCode::UnknownDataset,
            "dataset",
            format!(
                "unknown dataset '{name}', expected one of: messages, calls, contacts, entities"
            ),
        )
    })
}

fn resolve_field(
    dataset: Dataset,
    name: &str,
    path: String,
) -> VResult<&'static FieldDescriptor> {
    schema::field_descriptor(dataset, name).ok_or_else(|| {
        let known: Vec<&str> = schema::fields_for(dataset).iter().map(|f| f.name).collect();
        ValidationError::new(
            ReasonCode::UnknownField,
            path,
            format!(
                "unknown field '{name}' for dataset '{dataset}', expected one of: {}",
                known.join(", ")
            ),
        )
    })
}

fn validate_filter(dataset: Dataset, index: usize, raw: &RawFilter) -> VResult<Filter> {
    let base = format!("filters[{index}]");
    let field = resolve_field(dataset, &raw.field, format!("{base}.field"))?;

    let op = Operator::parse(&raw.op).ok_or_else(|| {
        ValidationError::new(
            ReasonCode::UnknownOperator,
            format!("{base}.op"),
            format!("unknown operator '{}'", raw.op),
        )
    })?;

    if !field.semantic_type.allows(op) {
        return Err(ValidationError::new(
            ReasonCode::OperatorTypeMismatch,
            format!("{base}.op"),
            format!(
                "operator '{op}' cannot be applied to {} field '{}'",
                field.semantic_type, field.name
            ),
        ));
    }

    let path = format!("{base}.value");
    let predicate = match op.arity() {
        Arity::Nullary => nullary(op, raw.value.as_ref(), &path)?,
        Arity::Pair => pair(field, raw.value.as_ref(), &path)?,
        Arity::List => list(field, op, raw.value.as_ref(), &path)?,
        Arity::Scalar => scalar(field, op, raw.value.as_ref(), &path)?,
    };

    Ok(Filter { field, predicate })
}

fn nullary(op: Operator, value: Option<&Value>, path: &str) -> VResult<Predicate> {
    if value.is_some() {
        return Err(ValidationError::new(
            ReasonCode::UnexpectedValue,
            path,
            format!("operator '{op}' does not take a value"),
        ));
    }
    Ok(match op {
        Operator::IsNull => Predicate::IsNull,
        _ => Predicate::IsNotNull,
    })
}

fn pair(field: &FieldDescriptor, value: Option<&Value>, path: &str) -> VResult<Predicate> {
    let items = match value {
        Some(Value::Array(items)) if items.len() == 2 => items,
        _ => {
            return Err(ValidationError::new(
                ReasonCode::InvalidRange,
                path,
                "operator 'between' requires exactly two values [min, max]",
            ))
        }
    };

    let low = coerce(field, &items[0], &format!("{path}[0]"))?;
    let high = coerce(field, &items[1], &format!("{path}[1]"))?;

    match low.compare(&high) {
        Some(std::cmp::Ordering::Greater) | None => Err(ValidationError::new(
            ReasonCode::InvalidRange,
            path,
            format!("range minimum {low} is greater than maximum {high}"),
        )),
        _ => Ok(Predicate::Between { low, high }),
    }
}

fn list(
    field: &FieldDescriptor,
    op: Operator,
    value: Option<&Value>,
    path: &str,
) -> VResult<Predicate> {
    let items = match value {
        Some(Value::Array(items)) if !items.is_empty() => items,
        _ => {
            return Err(ValidationError::new(
                ReasonCode::EmptyValueSet,
                path,
                format!("operator '{op}' requires a non-empty list of values"),
            ))
        }
    };

    let values = items
        .iter()
        .enumerate()
        .map(|(i, v)| coerce(field, v, &format!("{path}[{i}]")))
        .collect::<VResult<Vec<_>>>()?;

    Ok(match op {
        Operator::In => Predicate::In(values),
        _ => Predicate::NotIn(values),
    })
}

fn scalar(
    field: &FieldDescriptor,
    op: Operator,
    value: Option<&Value>,
    path: &str,
) -> VResult<Predicate> {
    let value = value.ok_or_else(|| {
        ValidationError::new(
            ReasonCode::TypeCoercionError,
            path,
            format!("operator '{op}' requires a value"),
        )
    })?;

    if op == Operator::Country {
        let entry = value
            .as_str()
            .and_then(country::lookup)
            .ok_or_else(|| {
                ValidationError::new(
                    ReasonCode::UnknownCountry,
                    path,
                    format!("unknown country {value}"),
                )
            })?;
        return Ok(Predicate::Country(entry));
    }

    let coerced = coerce(field, value, path)?;

    if let Some(cmp) = CompareOp::from_operator(op) {
        return Ok(Predicate::Compare {
            op: cmp,
            value: coerced,
        });
    }

    // contains / regex are only allowed on text-typed fields
    let Scalar::Text(text) = coerced else {
        return Err(ValidationError::new(
            ReasonCode::TypeCoercionError,
            path,
            format!("operator '{op}' requires a string value"),
        ));
    };

    if op == Operator::Regex {
        Regex::new(&text).map_err(|e| {
            ValidationError::new(
                ReasonCode::InvalidRegex,
                path,
                format!("invalid regular expression: {e}"),
            )
        })?;
        return Ok(Predicate::Regex(text));
    }

    Ok(Predicate::Contains(text))
}

/// Coerce a JSON literal to the semantic type of `field`.
fn coerce(field: &FieldDescriptor, value: &Value, path: &str) -> VResult<Scalar> {
    let coerced = match field.semantic_type {
        SemanticType::Number => coerce_number(value),
        SemanticType::Timestamp => coerce_timestamp(value),
        SemanticType::String | SemanticType::Phone => coerce_text(value),
    };
    coerced.ok_or_else(|| {
        let hint = match field.semantic_type {
            SemanticType::Timestamp => {
                " (expected YYYY-MM-DD, YYYY-MM-DD HH:MM:SS[.ffffff], RFC 3339 or epoch seconds)"
            }
            _ => "",
        };
        ValidationError::new(
            ReasonCode::TypeCoercionError,
            path,
            format!(
                "value {value} is not a valid {} for field '{}'{hint}",
                field.semantic_type, field.name
            ),
        )
    })
}

fn coerce_number(value: &Value) -> Option<Scalar> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Scalar::Integer(i))
            } else if n.is_u64() {
                None
            } else {
                n.as_f64().filter(|f| f.is_finite()).map(Scalar::Real)
            }
        }
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                Some(Scalar::Integer(i))
            } else {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(Scalar::Real)
            }
        }
        _ => None,
    }
}

fn coerce_text(value: &Value) -> Option<Scalar> {
    match value {
        Value::String(s) => Some(Scalar::Text(s.clone())),
        Value::Number(n) => n.as_i64().map(|i| Scalar::Text(i.to_string())),
        _ => None,
    }
}

fn coerce_timestamp(value: &Value) -> Option<Scalar> {
    let parsed = match value {
        Value::Number(n) => match n.as_i64() {
            Some(secs) => from_epoch(secs, 0),
            None => n.as_f64().and_then(from_fractional_epoch),
        },
        Value::String(s) => parse_timestamp(s.trim()),
        _ => None,
    }?;
    Some(Scalar::Text(parsed.format(TIMESTAMP_FORMAT).to_string()))
}

fn from_epoch(secs: i64, nanos: u32) -> Option<NaiveDateTime> {
    DateTime::<Utc>::from_timestamp(secs, nanos).map(|dt| dt.naive_utc())
}

fn from_fractional_epoch(secs: f64) -> Option<NaiveDateTime> {
    if !secs.is_finite() || secs.abs() > i64::MAX as f64 {
        return None;
    }
    let whole = secs.floor();
    let micros = ((secs - whole) * 1e6).round() as u32;
    // rounding can carry a full second
    let (whole, micros) = if micros >= 1_000_000 {
        (whole + 1.0, 0)
    } else {
        (whole, micros)
    };
    from_epoch(whole as i64, micros * 1_000)
}

/// Parse the timestamp spellings investigators use: RFC 3339, ISO date-times
/// with `T` or space and optional fractional seconds, bare dates, and epoch
/// seconds written with at least nine digits.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }

    const FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }

    let digits = s.strip_prefix('-').unwrap_or(s);
    if digits.len() < MIN_EPOCH_DIGITS || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<i64>().ok().and_then(|secs| from_epoch(secs, 0))
}

fn validate_sort(dataset: Dataset, index: usize, raw: &RawSort) -> VResult<SortKey> {
    let base = format!("sort[{index}]");
    let field = resolve_field(dataset, &raw.field, format!("{base}.field"))?;

    let direction = match raw.direction.as_deref() {
        None => SortDirection::Asc,
        Some(d) => SortDirection::parse(d).ok_or_else(|| {
            ValidationError::new(
                ReasonCode::InvalidSortDirection,
                format!("{base}.direction"),
                format!("invalid sort direction '{d}', expected 'asc' or 'desc'"),
            )
        })?,
    };

    Ok(SortKey { field, direction })
}

fn validate_limit(limit: Option<&Value>) -> VResult<Option<u32>> {
    let value = match limit {
        None | Some(Value::Null) => return Ok(None),
        Some(v) => v,
    };

    let out_of_range = || {
        ValidationError::new(
            ReasonCode::LimitOutOfRange,
            "limit",
            format!("limit {value} must be an integer between {MIN_LIMIT} and {MAX_LIMIT}"),
        )
    };

    match value {
        Value::Number(n) => {
            let n = n.as_i64().ok_or_else(out_of_range)?;
            if (i64::from(MIN_LIMIT)..=i64::from(MAX_LIMIT)).contains(&n) {
                Ok(Some(n as u32))
            } else {
                Err(out_of_range())
            }
        }
        _ => Err(out_of_range()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check(value: Value) -> VResult<Query> {
        validate_value(value)
    }

    fn reason(value: Value) -> (ReasonCode, String) {
        let err = check(value).unwrap_err();
        (err.reason, err.path)
    }

    #[test]
    fn test_validate_minimal_query() {
        let q = check(json!({"dataset": "messages"})).unwrap();
        assert_eq!(q.dataset(), Dataset::Messages);
        assert!(q.filters().is_empty());
        assert!(q.sort().is_empty());
        assert_eq!(q.limit(), None);
    }

    #[test]
    fn test_missing_and_unknown_dataset() {
        assert_eq!(
            reason(json!({"filters": []})),
            (ReasonCode::UnknownDataset, "dataset".to_string())
        );
        assert_eq!(
            reason(json!({"dataset": "emails"})).0,
            ReasonCode::UnknownDataset
        );
    }

    #[test]
    fn test_unknown_field_path() {
        let (code, path) = reason(json!({
            "dataset": "messages",
            "filters": [
                {"field": "app", "op": "=", "value": "WhatsApp"},
                {"field": "nonexistent", "op": "=", "value": "x"}
            ]
        }));
        assert_eq!(code, ReasonCode::UnknownField);
        assert_eq!(path, "filters[1].field");
    }

    #[test]
    fn test_field_from_other_dataset_is_unknown() {
        assert_eq!(
            reason(json!({
                "dataset": "contacts",
                "filters": [{"field": "duration", "op": ">", "value": 1}]
            }))
            .0,
            ReasonCode::UnknownField
        );
    }

    #[test]
    fn test_unknown_operator() {
        let (code, path) = reason(json!({
            "dataset": "calls",
            "filters": [{"field": "duration", "op": "like", "value": 1}]
        }));
        assert_eq!(code, ReasonCode::UnknownOperator);
        assert_eq!(path, "filters[0].op");
    }

    #[test]
    fn test_operator_type_mismatch() {
        for (field, op, value) in [
            ("type", ">", json!("x")),
            ("caller", "between", json!(["+1", "+2"])),
            ("timestamp", "in", json!(["2024-01-01"])),
            ("duration", "contains", json!("6")),
            ("type", "country", json!("UAE")),
        ] {
            let (code, _) = reason(json!({
                "dataset": "calls",
                "filters": [{"field": field, "op": op, "value": value}]
            }));
            assert_eq!(code, ReasonCode::OperatorTypeMismatch, "{field} {op}");
        }
    }

    #[test]
    fn test_between_shapes() {
        let base = |value: Value| {
            json!({"dataset": "calls", "filters": [{"field": "duration", "op": "between", "value": value}]})
        };
        assert!(check(base(json!([60, 600]))).is_ok());
        assert!(check(base(json!([60, 60]))).is_ok());
        assert_eq!(reason(base(json!([600, 60]))).0, ReasonCode::InvalidRange);
        assert_eq!(reason(base(json!([60]))).0, ReasonCode::InvalidRange);
        assert_eq!(reason(base(json!([1, 2, 3]))).0, ReasonCode::InvalidRange);
        assert_eq!(reason(base(json!(60))).0, ReasonCode::InvalidRange);
        assert_eq!(
            reason(base(json!([60, "long"]))),
            (
                ReasonCode::TypeCoercionError,
                "filters[0].value[1]".to_string()
            )
        );
    }

    #[test]
    fn test_between_mixed_numeric_types() {
        let q = check(json!({
            "dataset": "entities",
            "filters": [{"field": "confidence", "op": "between", "value": [0, 0.5]}]
        }))
        .unwrap();
        assert_eq!(
            q.filters()[0].predicate,
            Predicate::Between {
                low: Scalar::Integer(0),
                high: Scalar::Real(0.5)
            }
        );
    }

    #[test]
    fn test_between_timestamps_are_chronological() {
        let base = |a: &str, b: &str| {
            json!({"dataset": "messages", "filters": [{"field": "timestamp", "op": "between", "value": [a, b]}]})
        };
        assert!(check(base("2024-01-01", "2024-01-15T10:30:00Z")).is_ok());
        assert_eq!(
            reason(base("2024-02-01", "2024-01-31 23:59:59")).0,
            ReasonCode::InvalidRange
        );
    }

    #[test]
    fn test_in_requires_non_empty_list() {
        let base = |value: Value| {
            json!({"dataset": "messages", "filters": [{"field": "app", "op": "in", "value": value}]})
        };
        assert!(check(base(json!(["Telegram", "Signal"]))).is_ok());
        assert!(check(base(json!(["Telegram"]))).is_ok());
        assert_eq!(reason(base(json!([]))).0, ReasonCode::EmptyValueSet);
        assert_eq!(reason(base(json!("Telegram"))).0, ReasonCode::EmptyValueSet);
        assert_eq!(
            reason(json!({"dataset": "messages", "filters": [{"field": "app", "op": "not_in"}]})).0,
            ReasonCode::EmptyValueSet
        );
        assert_eq!(
            reason(base(json!(["Telegram", ["nested"]]))),
            (
                ReasonCode::TypeCoercionError,
                "filters[0].value[1]".to_string()
            )
        );
    }

    #[test]
    fn test_null_checks_reject_values() {
        let q = check(json!({
            "dataset": "entities",
            "filters": [
                {"field": "linked_message_id", "op": "is_null"},
                {"field": "linked_call_id", "op": "is_not_null", "value": null}
            ]
        }))
        .unwrap();
        assert_eq!(q.filters()[0].predicate, Predicate::IsNull);
        assert_eq!(q.filters()[1].predicate, Predicate::IsNotNull);

        assert_eq!(
            reason(json!({
                "dataset": "entities",
                "filters": [{"field": "linked_call_id", "op": "is_null", "value": 3}]
            }))
            .0,
            ReasonCode::UnexpectedValue
        );
    }

    #[test]
    fn test_country_resolution() {
        let q = check(json!({
            "dataset": "calls",
            "filters": [{"field": "caller", "op": "country", "value": "uae"}]
        }))
        .unwrap();
        match &q.filters()[0].predicate {
            Predicate::Country(c) => assert_eq!(c.prefix, "+971"),
            other => panic!("expected country predicate, got {other:?}"),
        }

        for value in [json!("Atlantis"), json!(971.5), json!(null)] {
            assert_eq!(
                reason(json!({
                    "dataset": "calls",
                    "filters": [{"field": "callee", "op": "country", "value": value}]
                }))
                .0,
                if value.is_null() {
                    ReasonCode::TypeCoercionError
                } else {
                    ReasonCode::UnknownCountry
                }
            );
        }
    }

    #[test]
    fn test_scalar_coercion() {
        let q = check(json!({
            "dataset": "calls",
            "filters": [
                {"field": "duration", "op": ">", "value": "600"},
                {"field": "duration", "op": "<", "value": 1200.5},
                {"field": "caller", "op": "=", "value": 971501234567i64}
            ]
        }))
        .unwrap();
        let values: Vec<&Predicate> = q.filters().iter().map(|f| &f.predicate).collect();
        assert_eq!(
            values[0],
            &Predicate::Compare {
                op: CompareOp::Gt,
                value: Scalar::Integer(600)
            }
        );
        assert_eq!(
            values[1],
            &Predicate::Compare {
                op: CompareOp::Lt,
                value: Scalar::Real(1200.5)
            }
        );
        assert_eq!(
            values[2],
            &Predicate::Compare {
                op: CompareOp::Eq,
                value: Scalar::Text("971501234567".into())
            }
        );
    }

    #[test]
    fn test_scalar_coercion_failures() {
        for (field, value) in [
            ("duration", json!("ten minutes")),
            ("duration", json!(true)),
            ("duration", json!([600])),
            ("type", json!(1.5)),
            ("type", json!({"a": 1})),
            ("timestamp", json!("yesterday")),
        ] {
            let (code, path) = reason(json!({
                "dataset": "calls",
                "filters": [{"field": field, "op": "=", "value": value}]
            }));
            assert_eq!(code, ReasonCode::TypeCoercionError, "{field} = {value}");
            assert_eq!(path, "filters[0].value");
        }
    }

    #[test]
    fn test_scalar_operator_requires_value() {
        assert_eq!(
            reason(json!({"dataset": "calls", "filters": [{"field": "type", "op": "="}]})).0,
            ReasonCode::TypeCoercionError
        );
    }

    #[test]
    fn test_timestamp_normalization() {
        let cases = [
            (json!("2024-01-01"), "2024-01-01 00:00:00.000000"),
            (json!("2024-01-15 10:30:00"), "2024-01-15 10:30:00.000000"),
            (json!("2024-01-15T10:30:00"), "2024-01-15 10:30:00.000000"),
            (json!("2024-01-15T10:30"), "2024-01-15 10:30:00.000000"),
            (json!("2024-01-15T14:30:00+04:00"), "2024-01-15 10:30:00.000000"),
            (json!("2024-01-15 10:30:00.123456"), "2024-01-15 10:30:00.123456"),
            (json!("2024-01-15 10:30:00.5"), "2024-01-15 10:30:00.500000"),
            (json!("2024-01-15T10:30:00.25Z"), "2024-01-15 10:30:00.250000"),
            (json!(1705314600), "2024-01-15 10:30:00.000000"),
            (json!(1705314600.75), "2024-01-15 10:30:00.750000"),
            (json!("1705314600"), "2024-01-15 10:30:00.000000"),
        ];
        for (input, expected) in cases {
            let q = check(json!({
                "dataset": "messages",
                "filters": [{"field": "timestamp", "op": ">=", "value": input}]
            }))
            .unwrap();
            assert_eq!(
                q.filters()[0].predicate,
                Predicate::Compare {
                    op: CompareOp::Ge,
                    value: Scalar::Text(expected.to_string())
                },
                "input {input}"
            );
        }
    }

    #[test]
    fn test_short_numeric_strings_are_not_epochs() {
        for input in ["20240101", "1705", "-86400"] {
            let err = check(json!({
                "dataset": "calls",
                "filters": [{"field": "timestamp", "op": ">", "value": input}]
            }))
            .unwrap_err();
            assert_eq!(err.reason, ReasonCode::TypeCoercionError, "input {input}");
            assert!(err.message.contains("epoch seconds"));
        }
        assert!(parse_timestamp("20240101").is_none());
        assert!(parse_timestamp("1705314600").is_some());
    }

    #[test]
    fn test_regex_must_compile() {
        assert!(check(json!({
            "dataset": "messages",
            "filters": [{"field": "text", "op": "regex", "value": "^bitcoin\\s+\\w+"}]
        }))
        .is_ok());
        assert_eq!(
            reason(json!({
                "dataset": "messages",
                "filters": [{"field": "text", "op": "regex", "value": "(unclosed"}]
            }))
            .0,
            ReasonCode::InvalidRegex
        );
    }

    #[test]
    fn test_sort_validation() {
        let q = check(json!({
            "dataset": "entities",
            "sort": [
                {"field": "confidence", "direction": "DESC"},
                {"field": "id"}
            ]
        }))
        .unwrap();
        assert_eq!(q.sort()[0].direction, SortDirection::Desc);
        assert_eq!(q.sort()[1].direction, SortDirection::Asc);

        assert_eq!(
            reason(json!({"dataset": "entities", "sort": [{"field": "id", "direction": "up"}]})),
            (
                ReasonCode::InvalidSortDirection,
                "sort[0].direction".to_string()
            )
        );
        assert_eq!(
            reason(json!({"dataset": "entities", "sort": [{"field": "score"}]})),
            (ReasonCode::UnknownField, "sort[0].field".to_string())
        );
    }

    #[test]
    fn test_limit_bounds() {
        for ok in [1, 20, 10_000] {
            let q = check(json!({"dataset": "calls", "limit": ok})).unwrap();
            assert_eq!(q.limit(), Some(ok as u32));
        }
        for bad in [
            json!(0),
            json!(10_001),
            json!(-1),
            json!(2.5),
            json!(u64::MAX),
            json!("ten"),
            json!("20"),
        ] {
            assert_eq!(
                reason(json!({"dataset": "calls", "limit": bad})),
                (ReasonCode::LimitOutOfRange, "limit".to_string())
            );
        }
        assert_eq!(
            check(json!({"dataset": "calls", "limit": null})).unwrap().limit(),
            None
        );
    }

    #[test]
    fn test_validation_order_dataset_first() {
        assert_eq!(
            reason(json!({"dataset": "nope", "limit": 0})).0,
            ReasonCode::UnknownDataset
        );
        assert_eq!(
            reason(json!({
                "dataset": "calls",
                "filters": [{"field": "nope", "op": "=", "value": 1}],
                "limit": 0
            }))
            .0,
            ReasonCode::UnknownField
        );
    }

    #[test]
    fn test_malformed_documents() {
        for input in [
            "",
            "not json",
            "[1, 2, 3]",
            r#"{"dataset": "calls", "filters": {"field": "id"}}"#,
            r#"{"dataset": "calls", "filters": [{"field": "id"}]}"#,
            r#"{"dataset": 7}"#,
        ] {
            let err = validate_json(input).unwrap_err();
            assert_eq!(err.reason, ReasonCode::MalformedQuery, "input {input:?}");
            assert_eq!(err.path, "$");
        }
    }

    #[test]
    fn test_canonical_form_revalidates_to_same_query() {
        let q = check(json!({
            "dataset": "messages",
            "filters": [
                {"field": "app", "op": "in", "value": ["Telegram", "Signal"]},
                {"field": "receiver", "op": "country", "value": "united arab emirates"},
                {"field": "timestamp", "op": "between", "value": ["2024-01-01", "2024-02-01T00:00:00Z"]},
                {"field": "text", "op": "contains", "value": "bitcoin"}
            ],
            "sort": [{"field": "timestamp", "direction": "Desc"}],
            "limit": 100
        }))
        .unwrap();
        let again = validate(&q.to_raw()).unwrap();
        assert_eq!(q, again);
    }
}
