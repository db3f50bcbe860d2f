//! Tour bookings

use axum::Router;

use super::ResourceRoutes;
use crate::query::ProjectionSpec;
use crate::repository::{FieldSpec, Populate, Schema};
use crate::state::AppState;

pub const COLLECTION: &str = "bookings";

pub fn schema() -> Schema {
    Schema::new("Booking", COLLECTION)
        .field(
            FieldSpec::reference("tour", super::tours::COLLECTION)
                .required("Booking must have a tour"),
        )
        .field(
            FieldSpec::reference("user", super::users::COLLECTION)
                .required("Booking must have a user"),
        )
        .field(FieldSpec::number("price").required("Booking must have a price"))
        .field(FieldSpec::date("createdAt").default_now())
        .field(FieldSpec::boolean("paid").default_value(true))
        .auto_populate(Populate::path("tour").select(ProjectionSpec::including(["name", "duration"])))
        .auto_populate(Populate::path("user"))
}

pub fn router() -> Router<AppState> {
    ResourceRoutes::new(COLLECTION).router()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_booking_defaults() {
        let body = json!({"tour": "t1", "user": "u1", "price": 497})
            .as_object()
            .cloned()
            .unwrap();
        let booking = schema().prepare_create(body).unwrap();
        assert_eq!(booking["paid"], json!(true));
        assert!(booking["createdAt"].is_string());
    }

    #[test]
    fn test_booking_requires_price() {
        let body = json!({"tour": "t1", "user": "u1"}).as_object().cloned().unwrap();
        let err = schema().prepare_create(body).unwrap_err();
        assert_eq!(err.violations[0].path, "price");
    }
}
