//! Success envelopes for resource handlers
//!
//! Every successful resource response has the shape
//! `{"status": "success", "results"?: n, "data": {"data": ...}}`; deletes
//! answer 204 with no body at all.
//!
//! # Example
//!
//! ```rust
//! use tourbook::handlers::Envelope;
//! use serde_json::json;
//!
//! let envelope = Envelope::list(vec![json!({"name": "a"}), json!({"name": "b"})]);
//! assert_eq!(envelope.results(), Some(2));
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

/// `data` wrapper inside the envelope
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvelopeData {
    pub data: Value,
}

/// Serialized envelope body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvelopeBody {
    pub status: &'static str,
    /// Count of documents, only for list responses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<usize>,
    pub data: EnvelopeData,
}

/// Handler outcome: status code plus optional body
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    status_code: StatusCode,
    body: Option<EnvelopeBody>,
}

impl Envelope {
    fn with_body(status_code: StatusCode, results: Option<usize>, data: Value) -> Self {
        Self {
            status_code,
            body: Some(EnvelopeBody {
                status: "success",
                results,
                data: EnvelopeData { data },
            }),
        }
    }

    /// 200 with one document
    pub fn item(data: impl Into<Value>) -> Self {
        Self::with_body(StatusCode::OK, None, data.into())
    }

    /// 201 with the created document
    pub fn created(data: impl Into<Value>) -> Self {
        Self::with_body(StatusCode::CREATED, None, data.into())
    }

    /// 200 with a sequence; `results` is its length
    pub fn list<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let items = items.into_iter().map(Into::into).collect::<Vec<_>>();
        Self::with_body(StatusCode::OK, Some(items.len()), Value::Array(items))
    }

    /// 204, no body
    pub fn no_content() -> Self {
        Self {
            status_code: StatusCode::NO_CONTENT,
            body: None,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }

    pub fn body(&self) -> Option<&EnvelopeBody> {
        self.body.as_ref()
    }

    pub fn results(&self) -> Option<usize> {
        self.body.as_ref().and_then(|body| body.results)
    }

    /// The payload under `data.data`
    pub fn data(&self) -> Option<&Value> {
        self.body.as_ref().map(|body| &body.data.data)
    }

    pub fn into_data(self) -> Option<Value> {
        self.body.map(|body| body.data.data)
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        match self.body {
            Some(body) => (self.status_code, Json(body)).into_response(),
            None => self.status_code.into_response(),
        }
    }
}
