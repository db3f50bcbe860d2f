//! Storage trait behind the resource handlers
//!
//! [`Model`] uses RPITIT (Return Position Impl Trait In Traits) so async
//! methods need no `async_trait`. Handlers are generic over it; the only
//! implementation shipped is [`MemoryModel`](super::MemoryModel).

use std::future::Future;

use super::document::{Document, Populate};
use super::error::RepositoryError;
use super::schema::Schema;
use crate::query::{FilterPredicate, ResourceQuery};

/// Result type for repository operations
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// One collection of schema-validated documents
///
/// Every read honours the schema's base filter: a document it hides is
/// absent for `find`, `find_by_id`, `update_by_id` and `delete_by_id` alike.
pub trait Model: Send + Sync {
    /// Schema describing the collection
    fn schema(&self) -> &Schema;

    /// Documents matching `query`, sorted, projected and paged
    ///
    /// # Errors
    ///
    /// - validation failure when a filter operand cannot be cast
    /// - store failure for unknown operators or a mixed projection
    fn find(&self, query: &ResourceQuery) -> impl Future<Output = RepositoryResult<Vec<Document>>> + Send;

    /// One document with the default projection, expanding `populate`
    /// on top of the schema's auto-populated paths
    fn find_by_id(
        &self,
        id: &str,
        populate: &[Populate],
    ) -> impl Future<Output = RepositoryResult<Option<Document>>> + Send;

    /// Validate and insert a document, returning it as stored
    fn create(&self, fields: Document) -> impl Future<Output = RepositoryResult<Document>> + Send;

    /// Apply a partial update; `None` when no visible document has `id`
    fn update_by_id(
        &self,
        id: &str,
        fields: Document,
    ) -> impl Future<Output = RepositoryResult<Option<Document>>> + Send;

    /// Remove a document; `false` when no visible document has `id`
    fn delete_by_id(&self, id: &str) -> impl Future<Output = RepositoryResult<bool>> + Send;

    /// Number of visible documents matching `filter`
    fn count(&self, filter: &[FilterPredicate]) -> impl Future<Output = RepositoryResult<u64>> + Send;
}
