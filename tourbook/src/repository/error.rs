//! Repository error types
//!
//! Every failure a store can raise is a [`RepositoryError`]. The kind tells
//! callers how to react; for validation failures the individual
//! [`FieldViolation`]s say which fields were rejected and why.
//!
//! # Example
//!
//! ```rust
//! use tourbook::repository::{RepositoryError, RepositoryErrorKind};
//!
//! let error = RepositoryError::not_found("Tour", "0190c0de");
//! assert!(matches!(error.kind, RepositoryErrorKind::NotFound));
//! assert_eq!(error.message, "No document found with that ID");
//! ```

use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// Operation being performed when the repository error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryOperation {
    /// Running a filtered, sorted, paginated query
    Find,
    /// Looking one document up by identifier
    FindById,
    /// Inserting a new document
    Create,
    /// Updating a document by identifier
    Update,
    /// Deleting a document by identifier
    Delete,
    /// Expanding references into documents
    Populate,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Find => write!(f, "find"),
            Self::FindById => write!(f, "find_by_id"),
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
            Self::Populate => write!(f, "populate"),
        }
    }
}

/// Category of repository error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryErrorKind {
    /// Lookup by identifier returned nothing
    NotFound,
    /// Schema or type rejection
    ValidationFailed,
    /// Uniqueness violation
    DuplicateKey,
    /// Any other store error
    StoreFailure,
}

impl fmt::Display for RepositoryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::ValidationFailed => write!(f, "validation_failed"),
            Self::DuplicateKey => write!(f, "duplicate_key"),
            Self::StoreFailure => write!(f, "store_failure"),
        }
    }
}

/// Why a field was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// The value could not be converted to the field's type
    Cast,
    /// The value broke a schema rule
    Rule,
    /// The value is already taken
    Duplicate,
}

/// A single rejected field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub path: String,
    pub value: String,
    pub message: String,
    pub kind: ViolationKind,
}

impl FieldViolation {
    /// `value` could not be cast to `type_name`
    pub fn cast(path: impl Into<String>, type_name: &str, value: &Value) -> Self {
        let path = path.into();
        let value = display_value(value);
        Self {
            message: format!(
                "Cast to {} failed for value \"{}\" at path \"{}\"",
                type_name, value, path
            ),
            path,
            value,
            kind: ViolationKind::Cast,
        }
    }

    pub fn rule(path: impl Into<String>, value: &Value, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            value: display_value(value),
            message: message.into(),
            kind: ViolationKind::Rule,
        }
    }

    pub fn duplicate(path: impl Into<String>, value: &Value) -> Self {
        let path = path.into();
        let value = display_value(value);
        Self {
            message: format!("{} must be unique", path),
            path,
            value,
            kind: ViolationKind::Duplicate,
        }
    }
}

/// Render a JSON value the way it appears in messages (strings unquoted)
pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Structured repository error with operation context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryError {
    /// The operation being performed when the error occurred
    pub operation: RepositoryOperation,
    /// The category of error
    pub kind: RepositoryErrorKind,
    /// Human-readable error message
    pub message: String,
    /// The entity involved (e.g. "Tour", "Review")
    pub entity_type: Option<String>,
    /// The identifier involved
    pub entity_id: Option<String>,
    /// Rejected fields, for validation and duplicate-key errors
    pub violations: Vec<FieldViolation>,
}

impl RepositoryError {
    pub fn new(
        operation: RepositoryOperation,
        kind: RepositoryErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            entity_type: None,
            entity_id: None,
            violations: Vec::new(),
        }
    }

    /// Nothing stored under `entity_id`
    pub fn not_found(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self::new(
            RepositoryOperation::FindById,
            RepositoryErrorKind::NotFound,
            "No document found with that ID",
        )
        .with_entity(entity_type, entity_id)
    }

    /// Schema rejection of one or more fields
    pub fn validation(entity_type: impl Into<String>, violations: Vec<FieldViolation>) -> Self {
        let entity_type = entity_type.into();
        let details = violations
            .iter()
            .map(|v| format!("{}: {}", v.path, v.message))
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            operation: RepositoryOperation::Create,
            kind: RepositoryErrorKind::ValidationFailed,
            message: format!("{} validation failed: {}", entity_type, details),
            entity_type: Some(entity_type),
            entity_id: None,
            violations,
        }
    }

    /// A query value that could not be cast to the field's type
    pub fn cast(operation: RepositoryOperation, violation: FieldViolation) -> Self {
        Self {
            operation,
            kind: RepositoryErrorKind::ValidationFailed,
            message: violation.message.clone(),
            entity_type: None,
            entity_id: None,
            violations: vec![violation],
        }
    }

    /// Uniqueness violation on `fields`
    pub fn duplicate_key(
        operation: RepositoryOperation,
        collection: &str,
        violations: Vec<FieldViolation>,
    ) -> Self {
        let index = violations
            .iter()
            .map(|v| format!("{}_1", v.path))
            .collect::<Vec<_>>()
            .join("_");
        let key = violations
            .iter()
            .map(|v| format!("{}: \"{}\"", v.path, v.value))
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            operation,
            kind: RepositoryErrorKind::DuplicateKey,
            message: format!(
                "duplicate key error collection: {} index: {} dup key: {{ {} }}",
                collection, index, key
            ),
            entity_type: None,
            entity_id: None,
            violations,
        }
    }

    pub fn store_failure(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::StoreFailure, message)
    }

    #[must_use]
    pub fn with_entity(
        mut self,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    #[must_use]
    pub fn with_entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    #[must_use]
    pub fn with_operation(mut self, operation: RepositoryOperation) -> Self {
        self.operation = operation;
        self
    }

    /// Whether the failure was caused by the request rather than the store
    pub fn is_operational(&self) -> bool {
        !matches!(self.kind, RepositoryErrorKind::StoreFailure)
    }

    /// The single cast violation, when that is all this error is about
    pub fn sole_cast(&self) -> Option<&FieldViolation> {
        match self.violations.as_slice() {
            [violation] if violation.kind == ViolationKind::Cast => Some(violation),
            _ => None,
        }
    }
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Repository {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        if let (Some(ref entity_type), Some(ref entity_id)) = (&self.entity_type, &self.entity_id) {
            write!(f, " [{}: {}]", entity_type, entity_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for RepositoryError {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_repository_operation_display() {
        assert_eq!(format!("{}", RepositoryOperation::Find), "find");
        assert_eq!(format!("{}", RepositoryOperation::FindById), "find_by_id");
        assert_eq!(format!("{}", RepositoryOperation::Populate), "populate");
    }

    #[test]
    fn test_repository_error_kind_display() {
        assert_eq!(format!("{}", RepositoryErrorKind::NotFound), "not_found");
        assert_eq!(
            format!("{}", RepositoryErrorKind::DuplicateKey),
            "duplicate_key"
        );
        assert_eq!(
            format!("{}", RepositoryErrorKind::StoreFailure),
            "store_failure"
        );
    }

    #[test]
    fn test_not_found_message() {
        let error = RepositoryError::not_found("Tour", "abc");
        assert_eq!(error.kind, RepositoryErrorKind::NotFound);
        assert_eq!(error.message, "No document found with that ID");
        assert_eq!(error.entity_id.as_deref(), Some("abc"));
        assert!(error.is_operational());
    }

    #[test]
    fn test_validation_message_lists_fields() {
        let error = RepositoryError::validation(
            "Tour",
            vec![
                FieldViolation::rule("name", &json!(null), "A tour must have a name"),
                FieldViolation::rule("price", &json!(null), "A tour must have a price"),
            ],
        );
        assert_eq!(
            error.message,
            "Tour validation failed: name: A tour must have a name, price: A tour must have a price"
        );
        assert!(error.sole_cast().is_none());
    }

    #[test]
    fn test_cast_violation() {
        let violation = FieldViolation::cast("price", "Number", &json!("cheap"));
        assert_eq!(violation.value, "cheap");
        let error = RepositoryError::cast(RepositoryOperation::Find, violation);
        assert_eq!(error.kind, RepositoryErrorKind::ValidationFailed);
        assert_eq!(error.sole_cast().map(|v| v.path.as_str()), Some("price"));
    }

    #[test]
    fn test_duplicate_key_message() {
        let error = RepositoryError::duplicate_key(
            RepositoryOperation::Create,
            "tours",
            vec![FieldViolation::duplicate("name", &json!("The Sea Explorer"))],
        );
        assert_eq!(error.kind, RepositoryErrorKind::DuplicateKey);
        assert!(error.message.contains("index: name_1"));
        assert!(error.message.contains("The Sea Explorer"));
    }

    #[test]
    fn test_store_failure_is_not_operational() {
        let error = RepositoryError::store_failure(RepositoryOperation::Find, "unknown operator: $foo");
        assert!(!error.is_operational());
        assert_eq!(
            error.to_string(),
            "Repository store_failure error during find: unknown operator: $foo"
        );
    }

    #[test]
    fn test_with_operation() {
        let error = RepositoryError::not_found("Review", "r1").with_operation(RepositoryOperation::Delete);
        assert_eq!(error.operation, RepositoryOperation::Delete);
    }
}
