//! Reviews, including the nested `/tours/{id}/reviews` routes

use axum::{
    extract::{rejection::JsonRejection, Path, RawQuery, State},
    routing::{get, MethodRouter},
    Json, Router,
};
use serde_json::Value;

use super::{json_body, query_params, ResourceRoutes};
use crate::query::{ProjectionSpec, ScopeFilter};
use crate::repository::{Document, FieldSpec, Populate, RatingRollup, Schema};
use crate::state::AppState;

pub const COLLECTION: &str = "reviews";

/// Field linking a review to its tour
const TOUR_FIELD: &str = "tour";

pub fn schema() -> Schema {
    Schema::new("Review", COLLECTION)
        .field(FieldSpec::string("review").required("Review cannot be empty"))
        .field(
            FieldSpec::number("rating")
                .min(1.0, "Rating must be at least 1")
                .max(5.0, "Rating must be at most 5"),
        )
        .field(FieldSpec::date("createdAt").default_now().hidden())
        .field(
            FieldSpec::reference(TOUR_FIELD, super::tours::COLLECTION)
                .required("Review must have a tour"),
        )
        .field(
            FieldSpec::reference("user", super::users::COLLECTION)
                .required("Review must have a user"),
        )
        .unique_together([TOUR_FIELD, "user"])
        .auto_populate(Populate::path("user").select(ProjectionSpec::including(["name", "photo"])))
        .rollup(RatingRollup {
            parent_collection: super::tours::COLLECTION.to_string(),
            parent_field: TOUR_FIELD.to_string(),
            value_field: "rating".to_string(),
            count_field: "ratingsQuantity".to_string(),
            average_field: "ratingsAverage".to_string(),
            empty_average: 4.5,
        })
}

pub fn router() -> Router<AppState> {
    ResourceRoutes::new(COLLECTION).router()
}

/// Body with `tour` taken from the path unless the client supplied one
fn with_tour(mut body: Document, tour_id: String) -> Document {
    let missing = body.get(TOUR_FIELD).map_or(true, |tour| match tour {
        Value::Null => true,
        Value::String(id) => id.is_empty(),
        _ => false,
    });
    if missing {
        body.insert(TOUR_FIELD.to_string(), Value::String(tour_id));
    }
    body
}

/// `GET` reviews of one tour and `POST` a review of it
pub fn nested_routes() -> MethodRouter<AppState> {
    let list = ResourceRoutes::new(COLLECTION);
    let create = list.clone();

    get(
        move |State(state): State<AppState>,
              Path(tour_id): Path<String>,
              RawQuery(query): RawQuery| async move {
            let scope = ScopeFilter::field_eq(TOUR_FIELD, tour_id);
            list.list(&state, query_params(query.as_deref()), Some(scope)).await
        },
    )
    .post(
        move |State(state): State<AppState>,
              Path(tour_id): Path<String>,
              body: Result<Json<Document>, JsonRejection>| async move {
            let body = with_tour(json_body(body)?, tour_id);
            create.create(&state, body).await
        },
    )
}
