//! Filter predicates
//!
//! A [`FilterPredicate`] pairs a field with a [`ComparisonOperator`] and a
//! comparison value. Predicates in one query combine with logical AND.
//!
//! # Example
//!
//! ```rust
//! use tourbook::query::{ComparisonOperator, FilterPredicate};
//!
//! let cheap = FilterPredicate::lt("price", 500);
//! assert_eq!(cheap.operator, ComparisonOperator::Lt);
//! assert_eq!(cheap.operator.to_string(), "$lt");
//! ```

use std::fmt;

use serde_json::Value;

use super::params::{ParamValue, RawQueryParams};

/// Comparison operator in the store's vocabulary
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ComparisonOperator {
    /// Equality, implied by `key=value`
    Eq,
    /// Inequality (schema query hooks only)
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Membership, implied by a repeated key
    In,
    /// Anything else, forwarded verbatim for the store to judge
    Other(String),
}

impl ComparisonOperator {
    /// Rewrite a query-string operator (`price[gte]`) into the store vocabulary
    ///
    /// Only `gte`, `gt`, `lte` and `lt` are rewritten; every other name is
    /// kept as-is and left for the store to reject.
    pub fn from_query_key(operator: &str) -> Self {
        match operator {
            "gte" => Self::Gte,
            "gt" => Self::Gt,
            "lte" => Self::Lte,
            "lt" => Self::Lt,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq => write!(f, "$eq"),
            Self::Ne => write!(f, "$ne"),
            Self::Gt => write!(f, "$gt"),
            Self::Gte => write!(f, "$gte"),
            Self::Lt => write!(f, "$lt"),
            Self::Lte => write!(f, "$lte"),
            Self::In => write!(f, "$in"),
            Self::Other(name) => write!(f, "{}", name),
        }
    }
}

/// One condition of a conjunctive filter
#[derive(Debug, Clone, PartialEq)]
pub struct FilterPredicate {
    pub field: String,
    pub operator: ComparisonOperator,
    pub value: Value,
}

impl FilterPredicate {
    pub fn new(field: impl Into<String>, operator: ComparisonOperator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, ComparisonOperator::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, ComparisonOperator::Ne, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, ComparisonOperator::Gt, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, ComparisonOperator::Gte, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, ComparisonOperator::Lt, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, ComparisonOperator::Lte, value)
    }

    pub fn is_in<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect::<Vec<_>>();
        Self::new(field, ComparisonOperator::In, Value::Array(values))
    }
}

/// Filter that confines a list to the children of one parent resource
///
/// Used by nested routes such as `/tours/{tour_id}/reviews`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopeFilter {
    predicates: Vec<FilterPredicate>,
}

impl ScopeFilter {
    /// Scope on `field == value`
    pub fn field_eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            predicates: vec![FilterPredicate::eq(field, value)],
        }
    }

    #[must_use]
    pub fn and(mut self, predicate: FilterPredicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn predicates(&self) -> &[FilterPredicate] {
        &self.predicates
    }

    pub fn into_predicates(self) -> Vec<FilterPredicate> {
        self.predicates
    }
}

/// Turn the non-reserved query entries into predicates
pub(crate) fn predicates_from_params(params: &RawQueryParams) -> Vec<FilterPredicate> {
    let mut predicates = Vec::new();
    for (field, value) in params.filter_entries() {
        match value {
            ParamValue::Nested(operators) => {
                for (operator, operand) in operators {
                    predicates.push(FilterPredicate::new(
                        field,
                        ComparisonOperator::from_query_key(operator),
                        operand_value(operand),
                    ));
                }
            }
            ParamValue::Many(values) => {
                predicates.push(FilterPredicate::is_in(field, values.iter().cloned()));
            }
            ParamValue::Single(value) => {
                predicates.push(FilterPredicate::eq(field, value.clone()));
            }
        }
    }
    predicates
}

fn operand_value(operand: &ParamValue) -> Value {
    match operand {
        ParamValue::Single(value) => Value::String(value.clone()),
        ParamValue::Many(values) => {
            Value::Array(values.iter().cloned().map(Value::String).collect())
        }
        ParamValue::Nested(inner) => Value::Object(
            inner
                .iter()
                .map(|(key, value)| (key.clone(), operand_value(value)))
                .collect(),
        ),
    }
}
