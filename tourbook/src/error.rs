//! Startup and infrastructure errors
//!
//! Request-level failures are [`ApiError`](crate::handlers::ApiError)s; this
//! type covers everything that can stop the service from starting or serving.

use std::path::PathBuf;

use thiserror::Error;

use crate::repository::RepositoryError;

pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the service
///
/// Large error variants are boxed to reduce stack size
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A seed file could not be read or parsed
    #[error("Seed file {path}: {message}")]
    SeedFile { path: PathBuf, message: String },

    /// A seed document was rejected by the store
    #[error("Seeding {collection} failed: {source}")]
    Seed {
        collection: String,
        #[source]
        source: RepositoryError,
    },

    /// Store error outside request handling
    #[error("{0}")]
    Repository(#[from] RepositoryError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}
