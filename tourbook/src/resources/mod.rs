//! Concrete resources and their HTTP routes
//!
//! Each submodule declares one collection's [`Schema`] and router. The
//! shared plumbing lives in [`ResourceRoutes`], which binds the generic
//! [`ResourceHandlers`] to a collection in the [`AppState`] store and adapts
//! axum extractors to [`RequestDescriptor`]s.

pub mod bookings;
pub mod geo;
pub mod reviews;
pub mod tours;
pub mod users;

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, RawQuery, State},
    routing::{get, MethodRouter},
    Json, Router,
};

use crate::handlers::{ApiError, Envelope, RequestDescriptor, ResourceHandlers};
use crate::query::{RawQueryParams, ScopeFilter};
use crate::repository::{Document, MemoryModel, MemoryStore, Populate, Schema};
use crate::state::AppState;

/// Every resource schema, in seeding order
pub fn schemas() -> Vec<Schema> {
    vec![
        users::schema(),
        tours::schema(),
        reviews::schema(),
        bookings::schema(),
    ]
}

/// Empty store holding every resource collection
pub fn store() -> MemoryStore {
    MemoryStore::new(schemas())
}

/// Routes mounted under `/api/v1`
pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/tours", tours::router())
        .nest("/users", users::router())
        .nest("/reviews", reviews::router())
        .nest("/bookings", bookings::router())
}

/// Filter keys that may repeat to match any of several values
///
/// Every other repeated key keeps only its last value.
pub const REPEATABLE_PARAMS: [&str; 6] = [
    "duration",
    "ratingsQuantity",
    "ratingsAverage",
    "maxGroupSize",
    "difficulty",
    "price",
];

/// Query string as [`RawQueryParams`]
pub(crate) fn query_params(query: Option<&str>) -> RawQueryParams {
    query
        .map(RawQueryParams::parse)
        .unwrap_or_default()
        .collapse_repeated(&REPEATABLE_PARAMS)
}

/// JSON object body, or a 400 describing why it was rejected
pub(crate) fn json_body(body: Result<Json<Document>, JsonRejection>) -> Result<Document, ApiError> {
    body.map(|Json(document)| document)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

/// CRUD routes for one collection
#[derive(Debug, Clone)]
pub struct ResourceRoutes {
    collection: &'static str,
    populate: Arc<[Populate]>,
}

impl ResourceRoutes {
    pub fn new(collection: &'static str) -> Self {
        Self {
            collection,
            populate: Arc::from(Vec::new()),
        }
    }

    /// Relations expanded when a single document is read
    #[must_use]
    pub fn populate_on_read(mut self, populate: Vec<Populate>) -> Self {
        self.populate = Arc::from(populate);
        self
    }

    pub fn collection(&self) -> &'static str {
        self.collection
    }

    pub fn handlers(&self, state: &AppState) -> Result<ResourceHandlers<MemoryModel>, ApiError> {
        Ok(ResourceHandlers::new(state.store().model(self.collection)?))
    }

    pub async fn list(
        &self,
        state: &AppState,
        params: RawQueryParams,
        scope: Option<ScopeFilter>,
    ) -> Result<Envelope, ApiError> {
        let request = RequestDescriptor::new().with_query(params);
        Ok(self.handlers(state)?.get_all(&request, scope).await?)
    }

    pub async fn read(&self, state: &AppState, id: String) -> Result<Envelope, ApiError> {
        let request = RequestDescriptor::for_id(id);
        Ok(self.handlers(state)?.get_one(&request, &self.populate).await?)
    }

    pub async fn create(&self, state: &AppState, body: Document) -> Result<Envelope, ApiError> {
        let request = RequestDescriptor::new().with_body(body);
        Ok(self.handlers(state)?.create_one(request).await?)
    }

    pub async fn update(
        &self,
        state: &AppState,
        id: String,
        body: Document,
    ) -> Result<Envelope, ApiError> {
        let request = RequestDescriptor::for_id(id).with_body(body);
        Ok(self.handlers(state)?.update_one(request).await?)
    }

    pub async fn remove(&self, state: &AppState, id: String) -> Result<Envelope, ApiError> {
        let request = RequestDescriptor::for_id(id);
        Ok(self.handlers(state)?.delete_one(&request).await?)
    }

    /// `GET` list
    pub fn list_route(&self) -> MethodRouter<AppState> {
        let routes = self.clone();
        get(
            move |State(state): State<AppState>, RawQuery(query): RawQuery| async move {
                routes.list(&state, query_params(query.as_deref()), None).await
            },
        )
    }

    /// `GET` list and `POST` create
    pub fn collection_routes(&self) -> MethodRouter<AppState> {
        let routes = self.clone();
        self.list_route().post(
            move |State(state): State<AppState>,
                  body: Result<Json<Document>, JsonRejection>| async move {
                routes.create(&state, json_body(body)?).await
            },
        )
    }

    /// `GET` and `DELETE` one document
    pub fn read_delete_routes(&self) -> MethodRouter<AppState> {
        let read = self.clone();
        let remove = self.clone();
        get(
            move |State(state): State<AppState>, Path(id): Path<String>| async move {
                read.read(&state, id).await
            },
        )
        .delete(
            move |State(state): State<AppState>, Path(id): Path<String>| async move {
                remove.remove(&state, id).await
            },
        )
    }

    /// `GET`, `PATCH` and `DELETE` one document
    pub fn document_routes(&self) -> MethodRouter<AppState> {
        let routes = self.clone();
        self.read_delete_routes().patch(
            move |State(state): State<AppState>,
                  Path(id): Path<String>,
                  body: Result<Json<Document>, JsonRejection>| async move {
                routes.update(&state, id, json_body(body)?).await
            },
        )
    }

    /// `/` and `/{id}` with all five operations
    pub fn router(&self) -> Router<AppState> {
        Router::new()
            .route("/", self.collection_routes())
            .route("/{id}", self.document_routes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ParamValue;

    #[test]
    fn test_query_params_collapse_outside_whitelist() {
        let params = query_params(Some("name=A&name=B&difficulty=easy&difficulty=medium"));
        assert_eq!(params.get("name"), Some(&ParamValue::Single("B".into())));
        assert_eq!(
            params.get("difficulty"),
            Some(&ParamValue::Many(vec!["easy".into(), "medium".into()]))
        );
        assert!(query_params(None).is_empty());
    }
}
