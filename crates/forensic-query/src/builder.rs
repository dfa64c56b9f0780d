//! Fluent query construction for callers that assemble queries in code.
//!
//! The builder only collects a [`RawQuery`]; nothing is checked until
//! [`QueryBuilder::build`] runs the validator, so a built query carries the
//! same guarantees as one parsed from JSON.

use serde_json::Value;

use crate::dsl::{Operator, Query, RawFilter, RawQuery, RawSort, SortDirection};
use crate::error::ValidationError;
use crate::schema::Dataset;
use crate::validator;

/// Fluent builder ending in validation.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    raw: RawQuery,
}

impl QueryBuilder {
    /// Start a query over `dataset`.
    pub fn new(dataset: Dataset) -> Self {
        Self {
            raw: RawQuery {
                dataset: Some(dataset.as_str().to_string()),
                ..RawQuery::default()
            },
        }
    }

    /// Add a filter with a single operand (`=`, `>`, `contains`, `country`, ...).
    pub fn filter(mut self, field: &str, op: Operator, value: impl Into<Value>) -> Self {
        self.raw
            .filters
            .push(RawFilter::new(field, op.as_str(), Some(value.into())));
        self
    }

    pub fn between(self, field: &str, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        let pair: Vec<Value> = vec![low.into(), high.into()];
        self.filter(field, Operator::Between, pair)
    }

    /// `field IN (values...)`.
    pub fn any_of<V: Into<Value>>(self, field: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.filter(field, Operator::In, values)
    }

    /// `field NOT IN (values...)`.
    pub fn none_of<V: Into<Value>>(self, field: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.filter(field, Operator::NotIn, values)
    }

    pub fn country(self, field: &str, country: &str) -> Self {
        self.filter(field, Operator::Country, country)
    }

    pub fn is_null(mut self, field: &str) -> Self {
        self.raw
            .filters
            .push(RawFilter::new(field, Operator::IsNull.as_str(), None));
        self
    }

    pub fn is_not_null(mut self, field: &str) -> Self {
        self.raw
            .filters
            .push(RawFilter::new(field, Operator::IsNotNull.as_str(), None));
        self
    }

    pub fn sort(mut self, field: &str, direction: SortDirection) -> Self {
        self.raw
            .sort
            .push(RawSort::new(field, Some(direction.as_str())));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.raw.limit = Some(Value::from(limit));
        self
    }

    /// The collected, unvalidated query.
    pub fn into_raw(self) -> RawQuery {
        self.raw
    }

    /// Validate the collected query.
    pub fn build(self) -> Result<Query, ValidationError> {
        validator::validate(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::dsl::{Predicate, Scalar};
    use crate::error::ReasonCode;

    #[test]
    fn test_builder_matches_json_form() {
        let built = QueryBuilder::new(Dataset::Entities)
            .filter("type", Operator::Eq, "bitcoin")
            .filter("confidence", Operator::Ge, 0.8)
            .sort("confidence", SortDirection::Desc)
            .limit(20)
            .build()
            .unwrap();
        let parsed = validator::validate_json(
            r#"{"dataset": "entities",
                "filters": [{"field": "type", "op": "=", "value": "bitcoin"},
                            {"field": "confidence", "op": ">=", "value": 0.8}],
                "sort": [{"field": "confidence", "direction": "desc"}],
                "limit": 20}"#,
        )
        .unwrap();
        assert_eq!(built, parsed);
        assert_eq!(compile(&built).unwrap(), compile(&parsed).unwrap());
    }

    #[test]
    fn test_builder_set_and_null_helpers() {
        let q = QueryBuilder::new(Dataset::Entities)
            .any_of("type", ["bitcoin", "ethereum"])
            .none_of("id", [1, 2])
            .between("confidence", 0.5, 1.0)
            .is_null("linked_call_id")
            .is_not_null("linked_message_id")
            .build()
            .unwrap();
        assert_eq!(q.filters().len(), 5);
        assert_eq!(
            q.filters()[1].predicate,
            Predicate::NotIn(vec![Scalar::Integer(1), Scalar::Integer(2)])
        );
        assert_eq!(q.filters()[3].predicate, Predicate::IsNull);
    }

    #[test]
    fn test_builder_defers_errors_to_build() {
        let err = QueryBuilder::new(Dataset::Calls)
            .country("type", "UAE")
            .build()
            .unwrap_err();
        assert_eq!(err.reason, ReasonCode::OperatorTypeMismatch);
        assert_eq!(err.path, "filters[0].op");

        let err = QueryBuilder::new(Dataset::Calls).limit(0).build().unwrap_err();
        assert_eq!(err.reason, ReasonCode::LimitOutOfRange);
    }
}
