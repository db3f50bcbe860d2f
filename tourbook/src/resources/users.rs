//! User accounts
//!
//! Accounts are created through signup, which lives outside this service, so
//! `POST /users` answers with a pointer instead of creating anything. Updates
//! through `PATCH /users/{id}` may not touch the password.
//!
//! Passwords are stored as Argon2id hashes and the confirmation is never
//! stored at all.

use std::sync::LazyLock;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json, Router,
};
use chrono::{TimeDelta, Utc};
use regex::Regex;
use serde_json::Value;

use super::{json_body, ResourceRoutes};
use crate::handlers::ApiError;
use crate::password::{self, PasswordHasher};
use crate::query::FilterPredicate;
use crate::repository::{format_date, Document, FieldSpec, Schema};
use crate::state::AppState;

pub const COLLECTION: &str = "users";

pub const ROLES: [&str; 4] = ["user", "guide", "lead-guide", "admin"];

const PASSWORD_FIELDS: [&str; 2] = ["password", "passwordConfirm"];

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid")
});

fn valid_email(value: &Value, _: &Document) -> bool {
    value.as_str().is_some_and(|email| EMAIL.is_match(email))
}

fn matches_password(value: &Value, document: &Document) -> bool {
    document.get("password") == Some(value)
}

/// Hash a new or changed password and drop the confirmation
///
/// Values that are already Argon2 hashes are kept, so exported accounts can
/// be loaded back as they are. A changed password stamps `passwordChangedAt`
/// one second in the past.
fn secure_password(document: &mut Document, previous: Option<&Document>) -> Result<(), String> {
    document.remove("passwordConfirm");

    let changed = previous.map_or(true, |p| p.get("password") != document.get("password"));
    let Some(plain) = document.get("password").and_then(Value::as_str) else {
        return Ok(());
    };
    if !changed || password::is_hashed(plain) {
        return Ok(());
    }

    let hash = PasswordHasher::default()
        .hash(plain)
        .map_err(|e| e.to_string())?;
    document.insert("password".into(), Value::String(hash));
    if previous.is_some() {
        let changed_at = format_date(Utc::now() - TimeDelta::seconds(1));
        document.insert("passwordChangedAt".into(), Value::String(changed_at));
    }
    Ok(())
}

pub fn schema() -> Schema {
    Schema::new("User", COLLECTION)
        .field(FieldSpec::string("name").trim().required("Please input a user name"))
        .field(
            FieldSpec::string("email")
                .trim()
                .lowercase()
                .unique()
                .required("Please input your email")
                .validate(valid_email, "Please input a valid email"),
        )
        .field(FieldSpec::string("photo").default_value("default.jpg"))
        .field(
            FieldSpec::string("role")
                .one_of(ROLES, "Role is either: user, guide, lead-guide, admin")
                .default_value("user"),
        )
        .field(
            FieldSpec::string("password")
                .required("Please input a password")
                .min_length(8, "The password must be at least 8 characters")
                .hidden(),
        )
        .field(
            FieldSpec::string("passwordConfirm")
                .hidden()
                .validate_on_create(matches_password, "Passwords are not the same"),
        )
        .field(FieldSpec::date("passwordChangedAt"))
        .field(FieldSpec::boolean("active").default_value(true).hidden())
        .always_filter(FilterPredicate::ne("active", false))
        .before_save(secure_password)
}

async fn signup_only() -> ApiError {
    ApiError::not_implemented("This route is not defined! Please use /signup instead")
}

/// Reject bodies that try to change the password
fn profile_changes(body: Document) -> Result<Document, ApiError> {
    if PASSWORD_FIELDS.iter().any(|field| body.contains_key(*field)) {
        return Err(ApiError::bad_request("This route is not for password updates."));
    }
    Ok(body)
}

pub fn router() -> Router<AppState> {
    let routes = ResourceRoutes::new(COLLECTION);
    let update = routes.clone();

    Router::new()
        .route("/", routes.list_route().post(signup_only))
        .route(
            "/{id}",
            routes.read_delete_routes().patch(
                move |State(state): State<AppState>,
                      Path(id): Path<String>,
                      body: Result<Json<Document>, JsonRejection>| async move {
                    let changes = profile_changes(json_body(body)?)?;
                    update.update(&state, id, changes).await
                },
            ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::RepositoryErrorKind;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn valid_user() -> Document {
        doc(json!({
            "name": "Ada",
            "email": " Ada@Example.COM ",
            "password": "correct horse",
            "passwordConfirm": "correct horse"
        }))
    }

    #[test]
    fn test_schema_defaults_and_normalises() {
        let user = schema().prepare_create(valid_user()).unwrap();
        assert_eq!(user["email"], json!("ada@example.com"));
        assert_eq!(user["role"], json!("user"));
        assert_eq!(user["photo"], json!("default.jpg"));
        assert_eq!(user["active"], json!(true));
    }

    #[test]
    fn test_password_is_hashed_and_confirmation_dropped() {
        let user = schema().prepare_create(valid_user()).unwrap();
        let hash = user["password"].as_str().unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(PasswordHasher::default().verify("correct horse", hash).unwrap());
        assert!(!user.contains_key("passwordConfirm"));
        assert!(!user.contains_key("passwordChangedAt"));
    }

    #[test]
    fn test_password_change_rehashes_and_stamps() {
        let schema = schema();
        let user = schema.prepare_create(valid_user()).unwrap();

        let renamed = schema.prepare_update(&user, doc(json!({"name": "Ada L"}))).unwrap();
        assert_eq!(renamed["password"], user["password"]);
        assert!(!renamed.contains_key("passwordChangedAt"));

        let changed = schema
            .prepare_update(&user, doc(json!({"password": "battery staple"})))
            .unwrap();
        let hash = changed["password"].as_str().unwrap();
        assert!(PasswordHasher::default().verify("battery staple", hash).unwrap());
        assert!(changed["passwordChangedAt"].is_string());
    }

    #[test]
    fn test_existing_hash_is_kept() {
        let hash = PasswordHasher::default().hash("correct horse").unwrap();
        let mut body = valid_user();
        body.insert("password".into(), json!(hash.clone()));
        body.remove("passwordConfirm");
        let user = schema().prepare_create(body).unwrap();
        assert_eq!(user["password"], json!(hash));
    }

    #[test]
    fn test_schema_rejects_mismatched_confirmation() {
        let mut body = valid_user();
        body.insert("passwordConfirm".into(), json!("something else"));
        let err = schema().prepare_create(body).unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::ValidationFailed);
        assert_eq!(err.violations[0].message, "Passwords are not the same");
    }

    #[test]
    fn test_schema_rejects_bad_email_and_short_password() {
        let mut body = valid_user();
        body.insert("email".into(), json!("not-an-email"));
        body.insert("password".into(), json!("short"));
        body.remove("passwordConfirm");
        let err = schema().prepare_create(body).unwrap_err();
        let messages: Vec<_> = err.violations.iter().map(|v| v.message.as_str()).collect();
        assert!(messages.contains(&"Please input a valid email"));
        assert!(messages.contains(&"The password must be at least 8 characters"));
    }

    #[test]
    fn test_schema_rejects_unknown_role() {
        let mut body = valid_user();
        body.insert("role".into(), json!("emperor"));
        let err = schema().prepare_create(body).unwrap_err();
        assert_eq!(err.violations[0].path, "role");
    }

    #[test]
    fn test_profile_changes_rejects_password() {
        let err = profile_changes(doc(json!({"name": "Ada", "password": "x"}))).unwrap_err();
        assert_eq!(err.message, "This route is not for password updates.");
        assert!(profile_changes(doc(json!({"name": "Ada"}))).is_ok());
    }

    #[tokio::test]
    async fn test_signup_only() {
        let err = signup_only().await;
        assert_eq!(err.status_label(), "error");
        assert!(err.operational);
    }
}
