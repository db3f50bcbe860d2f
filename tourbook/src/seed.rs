//! Startup seed data
//!
//! A seed directory holds one JSON array per collection, named
//! `{collection}.json`. Missing files are skipped. Every document goes
//! through the normal create path, so schema rules and unique indexes apply
//! and a supplied `_id` is kept for cross-references.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::repository::{MemoryStore, Model};

/// Load every present seed file into `store`, in collection registration order
///
/// Returns the number of documents inserted per collection.
pub async fn seed_store(store: &MemoryStore, dir: impl AsRef<Path>) -> Result<BTreeMap<String, usize>> {
    let dir = dir.as_ref();
    let mut inserted = BTreeMap::new();

    for schema in crate::resources::schemas() {
        let collection = schema.collection().to_string();
        let path = dir.join(format!("{}.json", collection));

        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No seed file for {}", collection);
                continue;
            }
            Err(e) => {
                return Err(Error::SeedFile {
                    path,
                    message: e.to_string(),
                })
            }
        };

        let documents = match serde_json::from_str::<Value>(&contents) {
            Ok(Value::Array(documents)) => documents,
            Ok(_) => {
                return Err(Error::SeedFile {
                    path,
                    message: "expected a JSON array of documents".to_string(),
                })
            }
            Err(e) => {
                return Err(Error::SeedFile {
                    path,
                    message: e.to_string(),
                })
            }
        };

        let model = store.model(&collection)?;
        let mut count = 0;
        for (index, document) in documents.into_iter().enumerate() {
            let Value::Object(document) = document else {
                return Err(Error::SeedFile {
                    path,
                    message: format!("entry {} is not a JSON object", index),
                });
            };
            model.create(document).await.map_err(|source| Error::Seed {
                collection: collection.clone(),
                source,
            })?;
            count += 1;
        }

        tracing::info!(collection = %collection, documents = count, "Seeded collection");
        inserted.insert(collection, count);
    }

    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::RepositoryErrorKind;
    use serde_json::json;
    use std::fs;

    fn write(dir: &Path, name: &str, value: Value) {
        fs::write(dir.join(name), value.to_string()).unwrap();
    }

    #[tokio::test]
    async fn test_seed_loads_present_files() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "users.json",
            json!([{"_id": "u1", "name": "Ada", "email": "ada@example.com", "password": "pass1234"}]),
        );
        write(
            dir.path(),
            "tours.json",
            json!([{
                "_id": "t1",
                "name": "The Forest Hiker",
                "duration": 5,
                "maxGroupSize": 25,
                "difficulty": "easy",
                "price": 397,
                "summary": "Breathtaking hike",
                "imageCover": "tour-1-cover.jpg",
                "guides": ["u1"]
            }]),
        );
        write(
            dir.path(),
            "reviews.json",
            json!([{"review": "Great", "rating": 5, "tour": "t1", "user": "u1"}]),
        );

        let store = crate::resources::store();
        let inserted = seed_store(&store, dir.path()).await.unwrap();
        assert_eq!(inserted["users"], 1);
        assert_eq!(inserted["tours"], 1);
        assert_eq!(inserted["reviews"], 1);
        assert!(!inserted.contains_key("bookings"));

        let tour = store.model("tours").unwrap().find_by_id("t1", &[]).await.unwrap().unwrap();
        assert_eq!(tour["ratingsQuantity"], 1);
        assert_eq!(tour["ratingsAverage"], 5);
    }

    #[tokio::test]
    async fn test_seed_rejects_invalid_document() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "users.json", json!([{"name": "No Email"}]));

        let err = seed_store(&crate::resources::store(), dir.path()).await.unwrap_err();
        match err {
            Error::Seed { collection, source } => {
                assert_eq!(collection, "users");
                assert_eq!(source.kind, RepositoryErrorKind::ValidationFailed);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_seed_rejects_non_array() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "tours.json", json!({"name": "not a list"}));

        let err = seed_store(&crate::resources::store(), dir.path()).await.unwrap_err();
        assert!(matches!(err, Error::SeedFile { .. }));
    }

    #[tokio::test]
    async fn test_seed_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let inserted = seed_store(&crate::resources::store(), dir.path()).await.unwrap();
        assert!(inserted.is_empty());
    }
}
