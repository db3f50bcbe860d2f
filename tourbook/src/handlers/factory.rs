//! Generic CRUD operations over any [`Model`]
//!
//! [`ResourceHandlers`] wraps one collection and exposes create, get-one,
//! get-all, update and delete. Each operation takes a [`RequestDescriptor`]
//! and returns an [`Envelope`] or the store's [`RepositoryError`] unchanged.
//! The only error raised here is `NotFound`, when the store finds nothing
//! under the requested ID.
//!
//! # Example
//!
//! ```rust,no_run
//! use tourbook::handlers::{RequestDescriptor, ResourceHandlers};
//! use tourbook::query::{RawQueryParams, ScopeFilter};
//! use tourbook::repository::MemoryStore;
//!
//! # async fn example(store: MemoryStore) -> Result<(), tourbook::repository::RepositoryError> {
//! let reviews = ResourceHandlers::new(store.model("reviews")?);
//! let request = RequestDescriptor::new().with_query(RawQueryParams::parse("sort=-rating"));
//! let envelope = reviews
//!     .get_all(&request, Some(ScopeFilter::field_eq("tour", "0190c0de")))
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;

use crate::query::{build_query, RawQueryParams, ScopeFilter};
use crate::repository::{
    Document, Model, Populate, RepositoryError, RepositoryOperation, RepositoryResult,
};

use super::response::Envelope;

/// Path parameter carrying the document ID
pub const ID_PARAM: &str = "id";

/// Normalized request: path parameters, query string and body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestDescriptor {
    pub params: BTreeMap<String, String>,
    pub query: RawQueryParams,
    pub body: Document,
}

impl RequestDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request addressing document `id`
    pub fn for_id(id: impl Into<String>) -> Self {
        Self::new().with_param(ID_PARAM, id)
    }

    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_query(mut self, query: RawQueryParams) -> Self {
        self.query = query;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Document) -> Self {
        self.body = body;
        self
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// The document ID, empty when the route carried none
    pub fn id(&self) -> &str {
        self.param(ID_PARAM).unwrap_or_default()
    }
}

/// The five resource operations for one collection
#[derive(Debug, Clone)]
pub struct ResourceHandlers<M> {
    model: M,
}

impl<M: Model> ResourceHandlers<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    fn not_found(&self, id: &str, operation: RepositoryOperation) -> RepositoryError {
        RepositoryError::not_found(self.model.schema().entity(), id).with_operation(operation)
    }

    /// Insert the request body; 201 with the created document
    pub async fn create_one(&self, request: RequestDescriptor) -> RepositoryResult<Envelope> {
        let created = self.model.create(request.body).await?;
        tracing::debug!(entity = %self.model.schema().entity(), "Created document");
        Ok(Envelope::created(created))
    }

    /// One document by ID, expanding `populate`
    pub async fn get_one(
        &self,
        request: &RequestDescriptor,
        populate: &[Populate],
    ) -> RepositoryResult<Envelope> {
        let id = request.id();
        match self.model.find_by_id(id, populate).await? {
            Some(document) => Ok(Envelope::item(document)),
            None => Err(self.not_found(id, RepositoryOperation::FindById)),
        }
    }

    /// Documents selected by the request's query string
    ///
    /// `scope` is applied before the caller's filters, so a nested route
    /// (reviews of one tour) can never see outside its parent.
    pub async fn get_all(
        &self,
        request: &RequestDescriptor,
        scope: Option<ScopeFilter>,
    ) -> RepositoryResult<Envelope> {
        let query = build_query(&request.query, scope);
        let documents = self.model.find(&query).await?;
        tracing::debug!(
            entity = %self.model.schema().entity(),
            results = documents.len(),
            "Listed documents"
        );
        Ok(Envelope::list(documents))
    }

    /// Apply the request body to document `id`; 200 with the new state
    pub async fn update_one(&self, request: RequestDescriptor) -> RepositoryResult<Envelope> {
        let id = request.id().to_string();
        match self.model.update_by_id(&id, request.body).await? {
            Some(document) => Ok(Envelope::item(document)),
            None => Err(self.not_found(&id, RepositoryOperation::Update)),
        }
    }

    /// Remove document `id`; 204 with no body
    pub async fn delete_one(&self, request: &RequestDescriptor) -> RepositoryResult<Envelope> {
        let id = request.id();
        if self.model.delete_by_id(id).await? {
            Ok(Envelope::no_content())
        } else {
            Err(self.not_found(id, RepositoryOperation::Delete))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{FieldSpec, MemoryModel, MemoryStore, RepositoryErrorKind, Schema};
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn tours() -> ResourceHandlers<MemoryModel> {
        let store = MemoryStore::new([Schema::new("Tour", "tours")
            .field(FieldSpec::string("name").required("A tour must have a name").unique())
            .field(FieldSpec::number("price").required("A tour must have a price"))]);
        ResourceHandlers::new(store.model("tours").unwrap())
    }

    async fn create(handlers: &ResourceHandlers<MemoryModel>, name: &str, price: u32) -> String {
        let envelope = handlers
            .create_one(RequestDescriptor::new().with_body(doc(json!({"name": name, "price": price}))))
            .await
            .unwrap();
        envelope.data().unwrap()["_id"].as_str().unwrap().to_string()
    }

    fn ids(envelope: &Envelope) -> Vec<String> {
        envelope
            .data()
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["_id"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_create_then_get_round_trip() {
        let handlers = tours();
        let created = handlers
            .create_one(RequestDescriptor::new().with_body(doc(json!({"name": "Sea", "price": 497}))))
            .await
            .unwrap();
        assert_eq!(created.status_code(), StatusCode::CREATED);
        let id = created.data().unwrap()["_id"].as_str().unwrap();

        let fetched = handlers.get_one(&RequestDescriptor::for_id(id), &[]).await.unwrap();
        assert_eq!(fetched.status_code(), StatusCode::OK);
        assert_eq!(fetched.data().unwrap()["name"], json!("Sea"));
        assert_eq!(fetched.data().unwrap()["price"], json!(497));
        assert!(fetched.results().is_none());
    }

    #[tokio::test]
    async fn test_get_one_missing_is_not_found() {
        let err = tours()
            .get_one(&RequestDescriptor::for_id("0190c0de00007000800000000000abcd"), &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::NotFound);
        assert_eq!(err.message, "No document found with that ID");
        assert_eq!(err.entity_type.as_deref(), Some("Tour"));
    }

    #[tokio::test]
    async fn test_get_all_defaults_and_results() {
        let handlers = tours();
        for (i, price) in [300, 100, 500].into_iter().enumerate() {
            create(&handlers, &format!("t{}", i), price).await;
        }
        let envelope = handlers.get_all(&RequestDescriptor::new(), None).await.unwrap();
        assert_eq!(envelope.results(), Some(3));
        for doc in envelope.data().unwrap().as_array().unwrap() {
            assert!(doc.get("__v").is_none());
        }
    }

    #[tokio::test]
    async fn test_unsorted_order_is_stable() {
        let handlers = tours();
        for i in 0..5 {
            create(&handlers, &format!("t{}", i), 100).await;
        }
        let request = RequestDescriptor::new();
        let first = handlers.get_all(&request, None).await.unwrap();
        let second = handlers.get_all(&request, None).await.unwrap();
        assert_eq!(ids(&first), ids(&second));
    }

    #[tokio::test]
    async fn test_second_page_of_two() {
        let handlers = tours();
        let mut created = Vec::new();
        for (i, price) in [50, 40, 30, 20, 10].into_iter().enumerate() {
            created.push((price, create(&handlers, &format!("t{}", i), price).await));
        }
        created.sort_by_key(|(price, _)| *price);

        let request = RequestDescriptor::new()
            .with_query(RawQueryParams::parse("sort=price&limit=2&page=2"));
        let envelope = handlers.get_all(&request, None).await.unwrap();
        assert_eq!(envelope.results(), Some(2));
        let expected: Vec<_> = created[2..4].iter().map(|(_, id)| id.clone()).collect();
        assert_eq!(ids(&envelope), expected);
    }

    #[tokio::test]
    async fn test_fields_projection() {
        let handlers = tours();
        create(&handlers, "Forest", 100).await;
        let request = RequestDescriptor::new().with_query(RawQueryParams::parse("fields=name"));
        let envelope = handlers.get_all(&request, None).await.unwrap();
        let first = envelope.data().unwrap()[0].as_object().unwrap();
        let mut keys: Vec<_> = first.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["_id", "name"]);
    }

    #[tokio::test]
    async fn test_range_filter_scenario() {
        let handlers = tours();
        let id = create(&handlers, "E1", 100).await;

        let hit = RequestDescriptor::new().with_query(RawQueryParams::parse("price[gte]=50"));
        assert_eq!(ids(&handlers.get_all(&hit, None).await.unwrap()), vec![id]);

        let miss = RequestDescriptor::new().with_query(RawQueryParams::parse("price[gte]=150"));
        assert!(ids(&handlers.get_all(&miss, None).await.unwrap()).is_empty());
    }

    #[tokio::test]
    async fn test_scope_is_applied() {
        let handlers = tours();
        create(&handlers, "a", 100).await;
        create(&handlers, "b", 200).await;
        let envelope = handlers
            .get_all(&RequestDescriptor::new(), Some(ScopeFilter::field_eq("name", "b")))
            .await
            .unwrap();
        assert_eq!(envelope.results(), Some(1));
        assert_eq!(envelope.data().unwrap()[0]["name"], json!("b"));
    }

    #[tokio::test]
    async fn test_update_one() {
        let handlers = tours();
        let id = create(&handlers, "a", 100).await;
        let envelope = handlers
            .update_one(RequestDescriptor::for_id(&id).with_body(doc(json!({"price": 150}))))
            .await
            .unwrap();
        assert_eq!(envelope.data().unwrap()["price"], json!(150));

        let err = handlers
            .update_one(RequestDescriptor::for_id("missing").with_body(doc(json!({"price": 1}))))
            .await
            .unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::NotFound);
        assert_eq!(err.operation, RepositoryOperation::Update);
    }

    #[tokio::test]
    async fn test_update_validation_passes_through() {
        let handlers = tours();
        let id = create(&handlers, "a", 100).await;
        let err = handlers
            .update_one(RequestDescriptor::for_id(&id).with_body(doc(json!({"price": "lots"}))))
            .await
            .unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::ValidationFailed);
    }

    #[tokio::test]
    async fn test_delete_then_get_is_not_found() {
        let handlers = tours();
        let id = create(&handlers, "a", 100).await;
        let request = RequestDescriptor::for_id(&id);

        let deleted = handlers.delete_one(&request).await.unwrap();
        assert_eq!(deleted.status_code(), StatusCode::NO_CONTENT);
        assert!(deleted.body().is_none());

        let err = handlers.get_one(&request, &[]).await.unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::NotFound);
        let err = handlers.delete_one(&request).await.unwrap_err();
        assert_eq!(err.operation, RepositoryOperation::Delete);
    }

    #[tokio::test]
    async fn test_duplicate_key_passes_through() {
        let handlers = tours();
        create(&handlers, "a", 100).await;
        let err = handlers
            .create_one(RequestDescriptor::new().with_body(doc(json!({"name": "a", "price": 5}))))
            .await
            .unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::DuplicateKey);
    }
}
