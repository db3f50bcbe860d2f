//! In-memory document store
//!
//! [`MemoryStore`] keeps every registered collection behind one async
//! read/write lock, so each operation is atomic across collections (writes
//! that recompute a parent's ratings included). Documents are kept ordered
//! by `_id`, which is time-ordered, so an unsorted scan is creation order.
//!
//! # Example
//!
//! ```rust,no_run
//! use tourbook::repository::{FieldSpec, MemoryStore, Model, Schema};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), tourbook::repository::RepositoryError> {
//! let store = MemoryStore::new([
//!     Schema::new("Tour", "tours").field(FieldSpec::string("name").required("A tour must have a name")),
//! ]);
//! let tours = store.model("tours")?;
//! let created = tours.create(json!({"name": "The Park Camper"}).as_object().cloned().unwrap()).await?;
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;

use super::document::{document_id, lookup, new_object_id, Document, Populate};
use super::error::{FieldViolation, RepositoryError, RepositoryOperation};
use super::matcher::{
    compare_documents, effective_sort, ensure_known_operators, ensure_projection, equals,
    matches_all, project,
};
use super::schema::{number_value, RatingRollup, Schema};
use super::traits::{Model, RepositoryResult};
use crate::query::{FilterPredicate, ProjectionSpec, ResourceQuery, ID_FIELD, VERSION_FIELD};

/// How many levels of references a read expands
const POPULATE_DEPTH: u8 = 2;

type Collection = BTreeMap<String, Document>;

#[derive(Debug)]
struct StoreInner {
    schemas: HashMap<String, Arc<Schema>>,
    collections: RwLock<HashMap<String, Collection>>,
}

/// Schema-validated document store held in process memory
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

impl MemoryStore {
    /// Store with one empty collection per schema
    pub fn new<I>(schemas: I) -> Self
    where
        I: IntoIterator<Item = Schema>,
    {
        let schemas = schemas
            .into_iter()
            .map(|schema| (schema.collection().to_string(), Arc::new(schema)))
            .collect::<HashMap<_, _>>();
        let collections = schemas
            .keys()
            .map(|name| (name.clone(), Collection::new()))
            .collect();

        Self {
            inner: Arc::new(StoreInner {
                schemas,
                collections: RwLock::new(collections),
            }),
        }
    }

    /// Handle on one collection
    pub fn model(&self, collection: &str) -> RepositoryResult<MemoryModel> {
        let schema = self.inner.schemas.get(collection).cloned().ok_or_else(|| {
            RepositoryError::store_failure(
                RepositoryOperation::Find,
                format!("Schema hasn't been registered for collection \"{}\"", collection),
            )
        })?;
        Ok(MemoryModel {
            store: self.clone(),
            schema,
        })
    }

    pub fn collection_names(&self) -> Vec<String> {
        let mut names = self.inner.schemas.keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }

    /// Stored document count per collection, ignoring read filters
    pub async fn counts(&self) -> BTreeMap<String, usize> {
        let collections = self.inner.collections.read().await;
        collections
            .iter()
            .map(|(name, docs)| (name.clone(), docs.len()))
            .collect()
    }
}

/// One collection of a [`MemoryStore`]
#[derive(Debug, Clone)]
pub struct MemoryModel {
    store: MemoryStore,
    schema: Arc<Schema>,
}

/// Read access to every collection under one lock
struct View<'a> {
    schemas: &'a HashMap<String, Arc<Schema>>,
    collections: &'a HashMap<String, Collection>,
}

impl<'a> View<'a> {
    fn schema(&self, collection: &str) -> RepositoryResult<&'a Arc<Schema>> {
        self.schemas.get(collection).ok_or_else(|| {
            RepositoryError::store_failure(
                RepositoryOperation::Populate,
                format!("Schema hasn't been registered for collection \"{}\"", collection),
            )
        })
    }

    fn documents(&self, collection: &str) -> impl Iterator<Item = &'a Document> {
        self.collections
            .get(collection)
            .into_iter()
            .flat_map(|docs| docs.values())
    }

    /// Document `id` if the schema's read filter lets it through
    fn visible(&self, schema: &Schema, id: &str) -> Option<&'a Document> {
        self.collections
            .get(schema.collection())
            .and_then(|docs| docs.get(id))
            .filter(|doc| matches_all(doc, schema.base_filter()))
    }

    /// Projected, populated, read-ready copy of `document`
    fn present(
        &self,
        schema: &Schema,
        document: &Document,
        projection: &ProjectionSpec,
        populate: &[Populate],
        depth: u8,
    ) -> RepositoryResult<Document> {
        let mut presented = project(document, projection, schema);
        if depth > 0 {
            for relation in populate {
                self.populate(schema, &mut presented, relation, depth - 1)?;
            }
        }
        for computed in schema.computed_fields() {
            if let Some(value) = (computed.compute)(&presented) {
                presented.insert(computed.name.clone(), value);
            }
        }
        Ok(presented)
    }

    fn populate(
        &self,
        schema: &Schema,
        document: &mut Document,
        relation: &Populate,
        depth: u8,
    ) -> RepositoryResult<()> {
        let select = relation.select.clone().unwrap_or_default();

        if let Some(target) = schema
            .field_spec(&relation.path)
            .and_then(|spec| spec.referenced_collection())
        {
            let target = self.schema(target)?;
            let expanded = match document.get(&relation.path) {
                Some(Value::String(id)) => match self.visible(target, id) {
                    Some(found) => Value::Object(self.present(
                        target,
                        found,
                        &select,
                        target.auto_populated(),
                        depth,
                    )?),
                    None => Value::Null,
                },
                Some(Value::Array(ids)) => {
                    let mut expanded = Vec::with_capacity(ids.len());
                    for id in ids.iter().filter_map(Value::as_str) {
                        if let Some(found) = self.visible(target, id) {
                            expanded.push(Value::Object(self.present(
                                target,
                                found,
                                &select,
                                target.auto_populated(),
                                depth,
                            )?));
                        }
                    }
                    Value::Array(expanded)
                }
                _ => return Ok(()),
            };
            document.insert(relation.path.clone(), expanded);
            return Ok(());
        }

        if let Some(virtual_relation) = schema.virtual_named(&relation.path) {
            let target = self.schema(&virtual_relation.collection)?;
            let Some(local) = document.get(&virtual_relation.local_field).cloned() else {
                return Ok(());
            };
            let mut related = self
                .documents(target.collection())
                .filter(|doc| matches_all(doc, target.base_filter()))
                .filter(|doc| equals(lookup(doc, &virtual_relation.foreign_field), &local))
                .collect::<Vec<_>>();
            related.sort_by(|a, b| compare_documents(a, b, &effective_sort(&Default::default())));

            let mut expanded = Vec::with_capacity(related.len());
            for doc in related {
                expanded.push(Value::Object(self.present(
                    target,
                    doc,
                    &select,
                    target.auto_populated(),
                    depth,
                )?));
            }
            document.insert(virtual_relation.name.clone(), Value::Array(expanded));
            return Ok(());
        }

        Err(RepositoryError::store_failure(
            RepositoryOperation::Populate,
            format!(
                "Cannot populate path `{}` because it is not in your schema.",
                relation.path
            ),
        )
        .with_entity_type(schema.entity()))
    }
}

/// Uniqueness violations `candidate` would cause, ignoring document `own_id`
fn unique_violations(
    schema: &Schema,
    existing: &Collection,
    candidate: &Document,
    own_id: &str,
) -> Vec<FieldViolation> {
    let others = || existing.iter().filter(|(id, _)| id.as_str() != own_id).map(|(_, doc)| doc);

    for spec in schema.fields().iter().filter(|spec| spec.is_unique()) {
        let Some(value) = candidate.get(spec.name()).filter(|v| !v.is_null()) else {
            continue;
        };
        if others().any(|doc| doc.get(spec.name()) == Some(value)) {
            return vec![FieldViolation::duplicate(spec.name(), value)];
        }
    }

    for group in schema.unique_groups() {
        let values = group
            .iter()
            .map(|field| candidate.get(field).filter(|v| !v.is_null()))
            .collect::<Option<Vec<_>>>();
        let Some(values) = values else {
            continue;
        };
        let clash = others().any(|doc| {
            group
                .iter()
                .zip(&values)
                .all(|(field, value)| doc.get(field) == Some(*value))
        });
        if clash {
            return group
                .iter()
                .zip(values)
                .map(|(field, value)| FieldViolation::duplicate(field, value))
                .collect();
        }
    }

    Vec::new()
}

/// Recompute the rating summary of parent `parent_id`
fn apply_rollup(
    schemas: &HashMap<String, Arc<Schema>>,
    collections: &mut HashMap<String, Collection>,
    child_collection: &str,
    rollup: &RatingRollup,
    parent_id: &str,
) {
    let ratings = collections
        .get(child_collection)
        .into_iter()
        .flat_map(|docs| docs.values())
        .filter(|doc| doc.get(&rollup.parent_field).and_then(Value::as_str) == Some(parent_id))
        .filter_map(|doc| doc.get(&rollup.value_field).and_then(Value::as_f64))
        .collect::<Vec<_>>();

    let count = ratings.len();
    let average = if count == 0 {
        rollup.empty_average
    } else {
        ratings.iter().sum::<f64>() / count as f64
    };
    let average = schemas
        .get(&rollup.parent_collection)
        .and_then(|schema| schema.field_spec(&rollup.average_field))
        .and_then(|spec| spec.normalize(&Value::from(average)).ok())
        .unwrap_or_else(|| number_value(average));

    if let Some(parent) = collections
        .get_mut(&rollup.parent_collection)
        .and_then(|docs| docs.get_mut(parent_id))
    {
        parent.insert(rollup.count_field.clone(), Value::from(count));
        parent.insert(rollup.average_field.clone(), average);
        tracing::debug!(
            collection = %rollup.parent_collection,
            id = %parent_id,
            count,
            "Recomputed rating summary"
        );
    }
}

impl MemoryModel {
    pub fn collection(&self) -> &str {
        self.schema.collection()
    }

    fn rollup_after_write(
        &self,
        collections: &mut HashMap<String, Collection>,
        touched: &[Option<&Document>],
    ) {
        let Some(rollup) = self.schema.rating_rollup() else {
            return;
        };
        let mut parents = touched
            .iter()
            .flatten()
            .filter_map(|doc| doc.get(&rollup.parent_field).and_then(Value::as_str))
            .map(str::to_string)
            .collect::<Vec<_>>();
        parents.dedup();
        for parent in parents {
            apply_rollup(
                &self.store.inner.schemas,
                collections,
                self.schema.collection(),
                rollup,
                &parent,
            );
        }
    }
}

impl Model for MemoryModel {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    async fn find(&self, query: &ResourceQuery) -> RepositoryResult<Vec<Document>> {
        let operation = RepositoryOperation::Find;
        let mut predicates = self.schema.base_filter().to_vec();
        predicates.extend(query.filter.iter().cloned());
        let predicates = self.schema.cast_filter(&predicates, operation)?;
        ensure_known_operators(&predicates, operation)?;
        ensure_projection(&query.projection, operation)?;

        let collections = self.store.inner.collections.read().await;
        let view = View {
            schemas: &self.store.inner.schemas,
            collections: &collections,
        };

        let mut matched = view
            .documents(self.schema.collection())
            .filter(|doc| matches_all(doc, &predicates))
            .collect::<Vec<_>>();
        let sort = effective_sort(&query.sort);
        matched.sort_by(|a, b| compare_documents(a, b, &sort));

        let skip = usize::try_from(query.skip()).unwrap_or(usize::MAX);
        let take = query
            .limit()
            .map_or(usize::MAX, |limit| usize::try_from(limit).unwrap_or(usize::MAX));

        let results = matched
            .into_iter()
            .skip(skip)
            .take(take)
            .map(|doc| {
                view.present(
                    &self.schema,
                    doc,
                    &query.projection,
                    self.schema.auto_populated(),
                    POPULATE_DEPTH,
                )
            })
            .collect::<RepositoryResult<Vec<_>>>()?;

        tracing::debug!(
            collection = %self.schema.collection(),
            sort = %query.sort,
            skip,
            returned = results.len(),
            "Query executed"
        );
        Ok(results)
    }

    async fn find_by_id(&self, id: &str, populate: &[Populate]) -> RepositoryResult<Option<Document>> {
        let collections = self.store.inner.collections.read().await;
        let view = View {
            schemas: &self.store.inner.schemas,
            collections: &collections,
        };

        let Some(found) = view.visible(&self.schema, id) else {
            return Ok(None);
        };

        let mut relations = self.schema.auto_populated().to_vec();
        relations.extend(populate.iter().cloned());
        view.present(
            &self.schema,
            found,
            &ProjectionSpec::default(),
            &relations,
            POPULATE_DEPTH,
        )
        .map(Some)
        .map_err(|err| err.with_operation(RepositoryOperation::FindById))
    }

    async fn create(&self, fields: Document) -> RepositoryResult<Document> {
        let mut document = self
            .schema
            .prepare_create(fields)
            .map_err(|err| err.with_operation(RepositoryOperation::Create))?;

        let mut collections = self.store.inner.collections.write().await;
        let collection = self.schema.collection().to_string();
        let existing = collections.entry(collection.clone()).or_default();

        let id = document_id(&document)
            .map(str::to_string)
            .unwrap_or_else(new_object_id);
        if existing.contains_key(&id) {
            return Err(RepositoryError::duplicate_key(
                RepositoryOperation::Create,
                &collection,
                vec![FieldViolation::duplicate(ID_FIELD, &Value::String(id))],
            ));
        }
        let violations = unique_violations(&self.schema, existing, &document, &id);
        if !violations.is_empty() {
            return Err(RepositoryError::duplicate_key(
                RepositoryOperation::Create,
                &collection,
                violations,
            ));
        }

        document.insert(ID_FIELD.to_string(), Value::String(id.clone()));
        document.insert(VERSION_FIELD.to_string(), Value::from(0));
        existing.insert(id.clone(), document.clone());
        self.rollup_after_write(&mut collections, &[Some(&document)]);

        tracing::debug!(collection = %collection, id = %id, "Document created");
        Ok(project(&document, &ProjectionSpec::default(), &self.schema))
    }

    async fn update_by_id(&self, id: &str, fields: Document) -> RepositoryResult<Option<Document>> {
        let mut collections = self.store.inner.collections.write().await;
        let collection = self.schema.collection().to_string();

        let previous = {
            let view = View {
                schemas: &self.store.inner.schemas,
                collections: &collections,
            };
            match view.visible(&self.schema, id) {
                Some(found) => found.clone(),
                None => return Ok(None),
            }
        };

        let updated = self.schema.prepare_update(&previous, fields)?;
        let existing = collections.entry(collection.clone()).or_default();
        let violations = unique_violations(&self.schema, existing, &updated, id);
        if !violations.is_empty() {
            return Err(RepositoryError::duplicate_key(
                RepositoryOperation::Update,
                &collection,
                violations,
            ));
        }
        existing.insert(id.to_string(), updated.clone());
        self.rollup_after_write(&mut collections, &[Some(&previous), Some(&updated)]);
        tracing::debug!(collection = %collection, id = %id, "Document updated");

        // The write is committed; an update that moves the document out of
        // the base filter still answers with the stored result.
        let view = View {
            schemas: &self.store.inner.schemas,
            collections: &collections,
        };
        view.present(
            &self.schema,
            &updated,
            &ProjectionSpec::default(),
            self.schema.auto_populated(),
            POPULATE_DEPTH,
        )
        .map(Some)
        .map_err(|err| err.with_operation(RepositoryOperation::Update))
    }

    async fn delete_by_id(&self, id: &str) -> RepositoryResult<bool> {
        let mut collections = self.store.inner.collections.write().await;
        let visible = {
            let view = View {
                schemas: &self.store.inner.schemas,
                collections: &collections,
            };
            view.visible(&self.schema, id).is_some()
        };
        if !visible {
            return Ok(false);
        }

        let removed = collections
            .get_mut(self.schema.collection())
            .and_then(|docs| docs.remove(id));
        self.rollup_after_write(&mut collections, &[removed.as_ref()]);
        tracing::debug!(collection = %self.schema.collection(), id = %id, "Document deleted");
        Ok(removed.is_some())
    }

    async fn count(&self, filter: &[FilterPredicate]) -> RepositoryResult<u64> {
        let mut predicates = self.schema.base_filter().to_vec();
        predicates.extend(filter.iter().cloned());
        let predicates = self.schema.cast_filter(&predicates, RepositoryOperation::Find)?;
        ensure_known_operators(&predicates, RepositoryOperation::Find)?;

        let collections = self.store.inner.collections.read().await;
        let count = collections
            .get(self.schema.collection())
            .map_or(0, |docs| {
                docs.values().filter(|doc| matches_all(doc, &predicates)).count()
            });
        Ok(count as u64)
    }
}
