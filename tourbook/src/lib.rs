//! # tourbook
//!
//! REST backend for a tour-booking site, built on a generic resource layer:
//! any collection with a [`Schema`](repository::Schema) gets filtering,
//! sorting, field projection, pagination and the five CRUD operations from
//! the same handlers.
//!
//! ## Features
//!
//! - **Query builder**: query strings like `?price[lt]=1000&sort=-price&page=2`
//!   become a [`ResourceQuery`](query::ResourceQuery) in four stages
//! - **Document store**: schema-validated in-memory collections with unique
//!   indexes, population of references and rating rollups
//! - **Handlers**: [`ResourceHandlers`](handlers::ResourceHandlers) plus
//!   uniform success envelopes and error translation
//! - **Resources**: tours, users, reviews and bookings under `/api/v1`,
//!   plus radius and distance searches over tour start locations
//! - **Protection**: Argon2id password hashing and per-client rate limiting
//!   of `/api` routes
//!
//! ## Example
//!
//! ```rust,no_run
//! use tourbook::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let state = AppState::new(config.clone(), tourbook::resources::store());
//!     Server::new(config).serve(build_app(state)).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod config;
pub mod error;
pub mod handlers;
pub mod health;
pub mod observability;
pub mod password;
pub mod query;
pub mod rate_limit;
pub mod repository;
pub mod resources;
pub mod seed;
pub mod server;
pub mod state;

pub mod prelude {
    pub use crate::app::{build_app, API_PREFIX};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::handlers::{
        ApiError, ApiErrorKind, ApiOperation, Envelope, RequestDescriptor, ResourceHandlers,
    };
    pub use crate::health::{health, readiness};
    pub use crate::observability::{init_tracing, shutdown_tracing};
    pub use crate::query::{
        build_query, FilterPredicate, ProjectionSpec, QueryBuilder, QueryPreset, RawQueryParams,
        ResourceQuery, ScopeFilter,
    };
    pub use crate::repository::{
        Document, MemoryModel, MemoryStore, Model, Populate, RepositoryError,
        RepositoryErrorKind, RepositoryResult, Schema,
    };
    pub use crate::seed::seed_store;
    pub use crate::server::Server;
    pub use crate::state::AppState;

    pub use axum::{
        extract::{Path, Query, State},
        routing::{delete, get, patch, post, put},
        Json, Router,
    };
    pub use serde::{Deserialize, Serialize};
    pub use tokio;
}
