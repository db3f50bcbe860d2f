//! Resource handlers for the REST CRUD pattern
//!
//! # Features
//!
//! - **CRUD Handlers**: [`ResourceHandlers`] gives any [`Model`](crate::repository::Model)
//!   create, get-one, get-all, update and delete
//! - **Envelopes**: [`Envelope`] is the uniform success response
//! - **Error Handling**: [`ApiError`] turns store and routing failures into
//!   status-coded JSON responses
//!
//! # Integration with Axum
//!
//! Both [`Envelope`] and [`ApiError`] implement `IntoResponse`, so route
//! functions return `Result<Envelope, ApiError>` and use `?` on store calls:
//!
//! ```rust,ignore
//! async fn get_review(
//!     State(state): State<AppState>,
//!     Path(id): Path<String>,
//! ) -> Result<Envelope, ApiError> {
//!     let reviews = ResourceHandlers::new(state.store.model("reviews")?);
//!     Ok(reviews.get_one(&RequestDescriptor::for_id(id), &[]).await?)
//! }
//! ```

mod error;
mod factory;
mod response;

pub use error::{
    ApiError, ApiErrorBody, ApiErrorDetail, ApiErrorKind, ApiOperation, GENERIC_FAILURE_MESSAGE,
};
pub use factory::{RequestDescriptor, ResourceHandlers, ID_PARAM};
pub use response::{Envelope, EnvelopeBody, EnvelopeData};
