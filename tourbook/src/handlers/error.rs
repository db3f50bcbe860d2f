//! API error types for handler operations
//!
//! [`ApiError`] is the single place where store and routing failures become
//! HTTP responses. Conversion from [`RepositoryError`] shapes the message the
//! client sees; `IntoResponse` picks the status code and logs the failure.
//!
//! # Example
//!
//! ```rust
//! use tourbook::handlers::{ApiError, ApiErrorKind};
//! use tourbook::repository::RepositoryError;
//!
//! let error: ApiError = RepositoryError::not_found("Tour", "0190c0de").into();
//! assert!(matches!(error.kind, ApiErrorKind::NotFound));
//! assert_eq!(error.message, "No document found with that ID");
//! ```

use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::repository::{
    FieldViolation, RepositoryError, RepositoryErrorKind, RepositoryOperation,
};

/// Message shown in production for failures that are not the client's fault
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went very wrong!";

/// Operation being performed when the API error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOperation {
    /// Listing documents
    List,
    /// Getting one document by ID
    Get,
    /// Creating a document
    Create,
    /// Updating a document
    Update,
    /// Deleting a document
    Delete,
    /// Running a report over a collection
    Aggregate,
    /// Resolving the request to a route
    Route,
}

impl fmt::Display for ApiOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List => write!(f, "list"),
            Self::Get => write!(f, "get"),
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
            Self::Aggregate => write!(f, "aggregate"),
            Self::Route => write!(f, "route"),
        }
    }
}

/// Category of API error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    /// Document or route was not found
    NotFound,
    /// Malformed request
    BadRequest,
    /// Schema or cast rejection
    ValidationFailed,
    /// Uniqueness violation
    DuplicateKey,
    /// Client exceeded its request quota
    TooManyRequests,
    /// Anything the client could not have caused
    InternalError,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::BadRequest => write!(f, "bad_request"),
            Self::ValidationFailed => write!(f, "validation_failed"),
            Self::DuplicateKey => write!(f, "duplicate_key"),
            Self::TooManyRequests => write!(f, "too_many_requests"),
            Self::InternalError => write!(f, "internal_error"),
        }
    }
}

impl ApiErrorKind {
    /// Get the HTTP status code for this error kind
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::BadRequest | Self::ValidationFailed | Self::DuplicateKey => {
                StatusCode::BAD_REQUEST
            }
            Self::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code string for this error kind
    #[must_use]
    pub fn error_code(&self) -> String {
        format!("{}", self).to_uppercase()
    }
}

/// Structured API error with operation context
///
/// `operational` separates failures the client caused (bad input, unknown
/// IDs) from faults in the service. Only operational messages survive
/// production rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// The operation being performed when the error occurred
    pub operation: ApiOperation,
    /// The category of error
    pub kind: ApiErrorKind,
    /// Client-facing message
    pub message: String,
    /// The type of entity involved (e.g. "Tour")
    pub entity_type: Option<String>,
    /// The ID of the entity involved
    pub entity_id: Option<String>,
    /// Whether the client caused the failure
    pub operational: bool,
    /// Rejected fields, when the store reported any
    pub violations: Vec<FieldViolation>,
    /// Underlying store message, kept for diagnostics
    pub cause: Option<String>,
}

impl ApiError {
    pub fn new(operation: ApiOperation, kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            entity_type: None,
            entity_id: None,
            operational: !matches!(kind, ApiErrorKind::InternalError),
            violations: Vec::new(),
            cause: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ApiOperation::Route, ApiErrorKind::BadRequest, message)
    }

    /// No route matches `path`
    ///
    /// # Example
    ///
    /// ```rust
    /// use tourbook::handlers::ApiError;
    ///
    /// let error = ApiError::route_not_found("/api/v2/tours");
    /// assert_eq!(error.message, "Can't find /api/v2/tours on this server");
    /// ```
    pub fn route_not_found(path: &str) -> Self {
        Self::new(
            ApiOperation::Route,
            ApiErrorKind::NotFound,
            format!("Can't find {} on this server", path),
        )
    }

    /// A route that exists but deliberately does nothing
    ///
    /// Reported as a 500 whose message is still shown in production.
    pub fn not_implemented(message: impl Into<String>) -> Self {
        let mut error = Self::new(ApiOperation::Route, ApiErrorKind::InternalError, message);
        error.operational = true;
        error
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::new(ApiOperation::Route, ApiErrorKind::TooManyRequests, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ApiOperation::Route, ApiErrorKind::InternalError, message)
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
    pub fn with_operation(mut self, operation: ApiOperation) -> Self {
        self.operation = operation;
        self
    }

    /// `"fail"` for client errors, `"error"` otherwise
    pub fn status_label(&self) -> &'static str {
        if self.kind.status_code().is_client_error() {
            "fail"
        } else {
            "error"
        }
    }

    /// Render the error body
    ///
    /// With `production` set, non-operational messages are replaced and the
    /// diagnostic `detail` object is left out.
    pub fn to_body(&self, production: bool) -> ApiErrorBody {
        let message = if production && !self.operational {
            GENERIC_FAILURE_MESSAGE.to_string()
        } else {
            self.message.clone()
        };
        let detail = (!production).then(|| ApiErrorDetail {
            operation: self.operation.to_string(),
            kind: self.kind.to_string(),
            entity_type: self.entity_type.clone(),
            entity_id: self.entity_id.clone(),
            violations: self.violations.clone(),
            cause: self.cause.clone(),
        });

        ApiErrorBody {
            status: self.status_label(),
            message,
            code: self.kind.error_code(),
            detail,
        }
    }

    /// Response as production clients see it
    pub fn into_production_response(self) -> Response {
        let body = self.to_body(true);
        (self.kind.status_code(), Json(body)).into_response()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "API {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        if let (Some(ref entity_type), Some(ref entity_id)) = (&self.entity_type, &self.entity_id) {
            write!(f, " [{}: {}]", entity_type, entity_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

/// Response body for API errors
#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorBody {
    pub status: &'static str,
    pub message: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<ApiErrorDetail>,
}

/// Diagnostics included outside production
#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorDetail {
    pub operation: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<FieldViolation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.kind.status_code();

        if status.is_server_error() {
            tracing::error!(
                operation = %self.operation,
                kind = %self.kind,
                entity_type = ?self.entity_type,
                entity_id = ?self.entity_id,
                operational = self.operational,
                cause = ?self.cause,
                "API error: {}", self.message
            );
        } else {
            tracing::error!(
                operation = %self.operation,
                kind = %self.kind,
                entity_type = ?self.entity_type,
                entity_id = ?self.entity_id,
                "Request rejected: {}", self.message
            );
        }

        let body = self.to_body(false);
        let mut response = (status, Json(body)).into_response();
        // Kept so the production layer can re-render without parsing the body
        response.extensions_mut().insert(self);
        response
    }
}

/// Convert RepositoryOperation to ApiOperation
fn repository_operation_to_api_operation(op: RepositoryOperation) -> ApiOperation {
    match op {
        RepositoryOperation::Find => ApiOperation::List,
        RepositoryOperation::FindById | RepositoryOperation::Populate => ApiOperation::Get,
        RepositoryOperation::Create => ApiOperation::Create,
        RepositoryOperation::Update => ApiOperation::Update,
        RepositoryOperation::Delete => ApiOperation::Delete,
    }
}

/// Client-facing message for a store error
fn client_message(err: &RepositoryError) -> String {
    match err.kind {
        RepositoryErrorKind::NotFound | RepositoryErrorKind::StoreFailure => err.message.clone(),
        RepositoryErrorKind::ValidationFailed => match err.sole_cast() {
            Some(cast) => format!("Invalid {}: {}.", cast.path, cast.value),
            None => {
                let messages = err
                    .violations
                    .iter()
                    .map(|v| v.message.as_str())
                    .collect::<Vec<_>>();
                format!("Invalid input data. {}", messages.join(". "))
            }
        },
        RepositoryErrorKind::DuplicateKey => {
            let value = err
                .violations
                .first()
                .map(|v| v.value.as_str())
                .unwrap_or_default();
            format!(
                "Duplicate field value: \"{}\". Please use a different value.",
                value
            )
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        let kind = match err.kind {
            RepositoryErrorKind::NotFound => ApiErrorKind::NotFound,
            RepositoryErrorKind::ValidationFailed => ApiErrorKind::ValidationFailed,
            RepositoryErrorKind::DuplicateKey => ApiErrorKind::DuplicateKey,
            RepositoryErrorKind::StoreFailure => ApiErrorKind::InternalError,
        };

        Self {
            operation: repository_operation_to_api_operation(err.operation),
            kind,
            message: client_message(&err),
            operational: err.is_operational(),
            cause: Some(err.message),
            entity_type: err.entity_type,
            entity_id: err.entity_id,
            violations: err.violations,
        }
    }
}
