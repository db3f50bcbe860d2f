//! Schema-validated document storage
//!
//! # Features
//!
//! - **Schemas**: [`Schema`] and [`FieldSpec`] describe each collection's
//!   fields, casting, defaults and validation rules
//! - **Storage**: the [`Model`] trait, implemented by [`MemoryModel`] over a
//!   shared [`MemoryStore`]
//! - **Relations**: reference fields and virtual relations expanded with
//!   [`Populate`]
//! - **Errors**: [`RepositoryError`] with an operation, a kind and the
//!   rejected fields

mod document;
mod error;
mod matcher;
mod memory;
mod schema;
mod traits;

pub use document::{document_id, lookup, new_object_id, Document, Populate};
pub use error::{
    FieldViolation, RepositoryError, RepositoryErrorKind, RepositoryOperation, ViolationKind,
};
pub use memory::{MemoryModel, MemoryStore};
pub use schema::{
    format_date, slugify, ComputedField, DefaultValue, FieldSpec, FieldType, RatingRollup, Schema,
    SlugRule, Validator, VirtualRelation, WriteHook,
};
pub use traits::{Model, RepositoryResult};
