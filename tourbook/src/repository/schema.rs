//! Collection schemas
//!
//! A [`Schema`] describes one collection: its fields, their types and rules,
//! and the hooks the store runs around reads and writes. Incoming values are
//! cast to the declared type before any rule runs, so `"497"` stored in a
//! `Number` field becomes `497`.
//!
//! # Example
//!
//! ```rust
//! use tourbook::repository::{FieldSpec, Schema};
//! use serde_json::json;
//!
//! let schema = Schema::new("Tour", "tours")
//!     .field(FieldSpec::string("name").required("A tour must have a name").trim())
//!     .field(FieldSpec::number("price").required("A tour must have a price"));
//!
//! let body = json!({"name": "  The Forest Hiker ", "price": "397"});
//! let doc = schema.prepare_create(body.as_object().cloned().unwrap()).unwrap();
//! assert_eq!(doc["name"], json!("The Forest Hiker"));
//! assert_eq!(doc["price"], json!(397));
//! ```

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value;

use super::document::{Document, Populate};
use super::error::{display_value, FieldViolation, RepositoryError, RepositoryOperation};
use crate::query::{ComparisonOperator, FilterPredicate, ID_FIELD, VERSION_FIELD};

/// Declared type of a field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    String,
    Number,
    Boolean,
    /// Stored as an RFC 3339 UTC string with millisecond precision
    Date,
    /// Identifier of a document, possibly in another collection
    ObjectId,
    Array(Box<FieldType>),
    /// Nested object, stored as given
    Object,
    /// Anything
    Mixed,
}

impl FieldType {
    pub fn type_name(&self) -> String {
        match self {
            Self::String => "String".to_string(),
            Self::Number => "Number".to_string(),
            Self::Boolean => "Boolean".to_string(),
            Self::Date => "Date".to_string(),
            Self::ObjectId => "ObjectId".to_string(),
            Self::Array(inner) => format!("[{}]", inner.type_name()),
            Self::Object => "Object".to_string(),
            Self::Mixed => "Mixed".to_string(),
        }
    }

    /// Type of a single element; arrays compare element-wise
    pub fn element_type(&self) -> &FieldType {
        match self {
            Self::Array(inner) => inner.element_type(),
            other => other,
        }
    }

    /// Convert `value` to this type, or `None` if it cannot be
    pub fn cast(&self, value: &Value) -> Option<Value> {
        if value.is_null() {
            return Some(Value::Null);
        }
        match self {
            Self::String => match value {
                Value::String(_) => Some(value.clone()),
                Value::Number(n) => Some(Value::String(n.to_string())),
                Value::Bool(b) => Some(Value::String(b.to_string())),
                _ => None,
            },
            Self::Number => match value {
                Value::Number(n) => n.as_f64().map(number_value),
                Value::String(text) => {
                    let text = text.trim();
                    if text.is_empty() {
                        return None;
                    }
                    text.parse::<f64>()
                        .ok()
                        .filter(|n| n.is_finite())
                        .map(number_value)
                }
                Value::Bool(b) => Some(Value::from(i64::from(*b))),
                _ => None,
            },
            Self::Boolean => match value {
                Value::Bool(_) => Some(value.clone()),
                Value::String(text) => match text.trim() {
                    "true" | "1" | "yes" => Some(Value::Bool(true)),
                    "false" | "0" | "no" => Some(Value::Bool(false)),
                    _ => None,
                },
                Value::Number(n) => match n.as_f64() {
                    Some(x) if x == 1.0 => Some(Value::Bool(true)),
                    Some(x) if x == 0.0 => Some(Value::Bool(false)),
                    _ => None,
                },
                _ => None,
            },
            Self::Date => cast_date(value),
            Self::ObjectId => match value {
                Value::String(text) if !text.trim().is_empty() => {
                    Some(Value::String(text.trim().to_string()))
                }
                Value::Object(map) => map.get(ID_FIELD).and_then(|id| self.cast(id)),
                _ => None,
            },
            Self::Array(inner) => match value {
                Value::Array(items) => items
                    .iter()
                    .map(|item| inner.cast(item))
                    .collect::<Option<Vec<_>>>()
                    .map(Value::Array),
                single => inner.cast(single).map(|v| Value::Array(vec![v])),
            },
            Self::Object => value.is_object().then(|| value.clone()),
            Self::Mixed => Some(value.clone()),
        }
    }
}

/// JSON number, integral when the value has no fractional part
pub(crate) fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}

fn cast_date(value: &Value) -> Option<Value> {
    let parsed: Option<DateTime<Utc>> = match value {
        Value::String(text) => {
            let text = text.trim();
            DateTime::parse_from_rfc3339(text)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                        .ok()
                        .or_else(|| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M").ok())
                        .or_else(|| {
                            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                                .ok()
                                .and_then(|date| date.and_hms_opt(0, 0, 0))
                        })
                        .map(|naive| naive.and_utc())
                })
        }
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    };
    parsed.map(|dt| Value::String(format_date(dt)))
}

/// Storage format for dates
pub fn format_date(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Value a field takes when a new document omits it
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    Value(Value),
    /// Creation time
    Now,
}

/// Custom predicate over a field value and its document
#[derive(Debug, Clone)]
pub struct Validator {
    check: fn(&Value, &Document) -> bool,
    message: String,
    create_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Create,
    Update,
}

/// One field of a schema
#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: String,
    ty: FieldType,
    required: Option<String>,
    unique: bool,
    trim: bool,
    lowercase: bool,
    hidden: bool,
    default: Option<DefaultValue>,
    min: Option<(f64, String)>,
    max: Option<(f64, String)>,
    min_length: Option<(usize, String)>,
    max_length: Option<(usize, String)>,
    one_of: Option<(Vec<String>, String)>,
    validators: Vec<Validator>,
    reference: Option<String>,
    round_to: Option<u32>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: None,
            unique: false,
            trim: false,
            lowercase: false,
            hidden: false,
            default: None,
            min: None,
            max: None,
            min_length: None,
            max_length: None,
            one_of: None,
            validators: Vec::new(),
            reference: None,
            round_to: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::String)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Number)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Date)
    }

    pub fn object(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Object)
    }

    pub fn array(name: impl Into<String>, element: FieldType) -> Self {
        Self::new(name, FieldType::Array(Box::new(element)))
    }

    /// Identifier of a document in `collection`
    pub fn reference(name: impl Into<String>, collection: impl Into<String>) -> Self {
        let mut spec = Self::new(name, FieldType::ObjectId);
        spec.reference = Some(collection.into());
        spec
    }

    /// List of identifiers of documents in `collection`
    pub fn references(name: impl Into<String>, collection: impl Into<String>) -> Self {
        let mut spec = Self::array(name, FieldType::ObjectId);
        spec.reference = Some(collection.into());
        spec
    }

    #[must_use]
    pub fn required(mut self, message: impl Into<String>) -> Self {
        self.required = Some(message.into());
        self
    }

    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    #[must_use]
    pub fn trim(mut self) -> Self {
        self.trim = true;
        self
    }

    #[must_use]
    pub fn lowercase(mut self) -> Self {
        self.lowercase = true;
        self
    }

    /// Left out of reads unless a projection names it
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Value(value.into()));
        self
    }

    #[must_use]
    pub fn default_now(mut self) -> Self {
        self.default = Some(DefaultValue::Now);
        self
    }

    #[must_use]
    pub fn min(mut self, bound: f64, message: impl Into<String>) -> Self {
        self.min = Some((bound, message.into()));
        self
    }

    #[must_use]
    pub fn max(mut self, bound: f64, message: impl Into<String>) -> Self {
        self.max = Some((bound, message.into()));
        self
    }

    #[must_use]
    pub fn min_length(mut self, bound: usize, message: impl Into<String>) -> Self {
        self.min_length = Some((bound, message.into()));
        self
    }

    #[must_use]
    pub fn max_length(mut self, bound: usize, message: impl Into<String>) -> Self {
        self.max_length = Some((bound, message.into()));
        self
    }

    #[must_use]
    pub fn one_of<I, S>(mut self, values: I, message: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.one_of = Some((values.into_iter().map(Into::into).collect(), message.into()));
        self
    }

    /// Custom check; `{VALUE}` in the message is replaced by the rejected value
    #[must_use]
    pub fn validate(mut self, check: fn(&Value, &Document) -> bool, message: impl Into<String>) -> Self {
        self.validators.push(Validator {
            check,
            message: message.into(),
            create_only: false,
        });
        self
    }

    /// Custom check that only runs when a document is created
    #[must_use]
    pub fn validate_on_create(
        mut self,
        check: fn(&Value, &Document) -> bool,
        message: impl Into<String>,
    ) -> Self {
        self.validators.push(Validator {
            check,
            message: message.into(),
            create_only: true,
        });
        self
    }

    /// Round numbers to `decimals` places on write
    #[must_use]
    pub fn round_to(mut self, decimals: u32) -> Self {
        self.round_to = Some(decimals);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> &FieldType {
        &self.ty
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Collection this field points into, for reference fields
    pub fn referenced_collection(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    fn initial_value(&self) -> Option<Value> {
        match &self.default {
            Some(DefaultValue::Value(value)) => Some(value.clone()),
            Some(DefaultValue::Now) => Some(Value::String(format_date(Utc::now()))),
            None => None,
        }
    }

    /// Cast and apply setters (trim, lowercase, rounding)
    pub fn normalize(&self, value: &Value) -> Result<Value, FieldViolation> {
        let cast = self
            .ty
            .cast(value)
            .ok_or_else(|| FieldViolation::cast(&self.name, &self.ty.type_name(), value))?;

        Ok(match cast {
            Value::String(text) => {
                let text = if self.trim { text.trim().to_string() } else { text };
                let text = if self.lowercase { text.to_lowercase() } else { text };
                Value::String(text)
            }
            Value::Number(n) => match (self.round_to, n.as_f64()) {
                (Some(decimals), Some(x)) => {
                    let factor = 10f64.powi(decimals as i32);
                    number_value((x * factor).round() / factor)
                }
                _ => Value::Number(n),
            },
            other => other,
        })
    }

    fn check(&self, value: Option<&Value>, document: &Document, mode: WriteMode) -> Option<FieldViolation> {
        let blank = match value {
            None | Some(Value::Null) => true,
            Some(Value::String(text)) => self.ty == FieldType::String && text.is_empty(),
            Some(_) => false,
        };
        if blank {
            return self.required.as_ref().map(|message| {
                FieldViolation::rule(&self.name, value.unwrap_or(&Value::Null), message.clone())
            });
        }
        let value = value?;

        if let Some(n) = value.as_f64() {
            if let Some((bound, message)) = &self.min {
                if n < *bound {
                    return Some(FieldViolation::rule(&self.name, value, message.clone()));
                }
            }
            if let Some((bound, message)) = &self.max {
                if n > *bound {
                    return Some(FieldViolation::rule(&self.name, value, message.clone()));
                }
            }
        }

        if let Some(text) = value.as_str() {
            let length = text.chars().count();
            if let Some((bound, message)) = &self.max_length {
                if length > *bound {
                    return Some(FieldViolation::rule(&self.name, value, message.clone()));
                }
            }
            if let Some((bound, message)) = &self.min_length {
                if length < *bound {
                    return Some(FieldViolation::rule(&self.name, value, message.clone()));
                }
            }
            if let Some((allowed, message)) = &self.one_of {
                if !allowed.iter().any(|candidate| candidate == text) {
                    return Some(FieldViolation::rule(&self.name, value, message.clone()));
                }
            }
        }

        self.validators
            .iter()
            .filter(|validator| mode == WriteMode::Create || !validator.create_only)
            .find(|validator| !(validator.check)(value, document))
            .map(|validator| {
                let message = validator.message.replace("{VALUE}", &display_value(value));
                FieldViolation::rule(&self.name, value, message)
            })
    }
}

/// Relation resolved by looking for documents that point back at this one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualRelation {
    pub name: String,
    pub collection: String,
    pub foreign_field: String,
    pub local_field: String,
}

/// Read-only field derived from stored ones
#[derive(Debug, Clone)]
pub struct ComputedField {
    pub name: String,
    pub compute: fn(&Document) -> Option<Value>,
}

/// Keeps a parent's rating summary in step with its children
///
/// After any write to the child collection the parent named by
/// `parent_field` gets `count_field` (number of children) and
/// `average_field` (mean of `value_field`, or `empty_average` when there are
/// no children).
#[derive(Debug, Clone, PartialEq)]
pub struct RatingRollup {
    pub parent_collection: String,
    pub parent_field: String,
    pub value_field: String,
    pub count_field: String,
    pub average_field: String,
    pub empty_average: f64,
}

/// Derive a URL slug from one field into another on creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlugRule {
    pub source: String,
    pub target: String,
}

/// Runs after validation on every create and update
///
/// Gets the document about to be stored and, on update, the stored version
/// it replaces. An `Err` aborts the write as a store failure.
pub type WriteHook = fn(&mut Document, Option<&Document>) -> Result<(), String>;

/// Description of one collection
#[derive(Debug, Clone)]
pub struct Schema {
    entity: String,
    collection: String,
    fields: Vec<FieldSpec>,
    unique_together: Vec<Vec<String>>,
    base_filter: Vec<FilterPredicate>,
    auto_populate: Vec<Populate>,
    virtuals: Vec<VirtualRelation>,
    computed: Vec<ComputedField>,
    slug: Option<SlugRule>,
    rollup: Option<RatingRollup>,
    before_save: Vec<WriteHook>,
}

impl Schema {
    /// `entity` names one document ("Tour"); `collection` names the set ("tours")
    pub fn new(entity: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            collection: collection.into(),
            fields: Vec::new(),
            unique_together: Vec::new(),
            base_filter: Vec::new(),
            auto_populate: Vec::new(),
            virtuals: Vec::new(),
            computed: Vec::new(),
            slug: None,
            rollup: None,
            before_save: Vec::new(),
        }
    }

    #[must_use]
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    /// Compound uniqueness over `fields`
    #[must_use]
    pub fn unique_together<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unique_together
            .push(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Predicate every lookup, update and delete implicitly carries
    #[must_use]
    pub fn always_filter(mut self, predicate: FilterPredicate) -> Self {
        self.base_filter.push(predicate);
        self
    }

    /// Relation expanded on every read
    #[must_use]
    pub fn auto_populate(mut self, populate: Populate) -> Self {
        self.auto_populate.push(populate);
        self
    }

    #[must_use]
    pub fn virtual_relation(
        mut self,
        name: impl Into<String>,
        collection: impl Into<String>,
        foreign_field: impl Into<String>,
        local_field: impl Into<String>,
    ) -> Self {
        self.virtuals.push(VirtualRelation {
            name: name.into(),
            collection: collection.into(),
            foreign_field: foreign_field.into(),
            local_field: local_field.into(),
        });
        self
    }

    #[must_use]
    pub fn computed(mut self, name: impl Into<String>, compute: fn(&Document) -> Option<Value>) -> Self {
        self.computed.push(ComputedField {
            name: name.into(),
            compute,
        });
        self
    }

    #[must_use]
    pub fn slug(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.slug = Some(SlugRule {
            source: source.into(),
            target: target.into(),
        });
        self
    }

    #[must_use]
    pub fn rollup(mut self, rollup: RatingRollup) -> Self {
        self.rollup = Some(rollup);
        self
    }

    #[must_use]
    pub fn before_save(mut self, hook: WriteHook) -> Self {
        self.before_save.push(hook);
        self
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field_spec(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|spec| spec.name == name)
    }

    pub fn base_filter(&self) -> &[FilterPredicate] {
        &self.base_filter
    }

    pub fn auto_populated(&self) -> &[Populate] {
        &self.auto_populate
    }

    pub fn virtual_named(&self, name: &str) -> Option<&VirtualRelation> {
        self.virtuals.iter().find(|relation| relation.name == name)
    }

    pub fn computed_fields(&self) -> &[ComputedField] {
        &self.computed
    }

    pub fn unique_groups(&self) -> &[Vec<String>] {
        &self.unique_together
    }

    pub fn rating_rollup(&self) -> Option<&RatingRollup> {
        self.rollup.as_ref()
    }

    pub fn is_hidden(&self, field: &str) -> bool {
        self.field_spec(field).is_some_and(FieldSpec::is_hidden)
    }

    /// Validate a new document
    ///
    /// Unknown fields are dropped, defaults fill gaps, values are cast and
    /// every rule runs. The result carries no `__v`; it keeps a caller
    /// supplied `_id`.
    pub fn prepare_create(&self, body: Document) -> Result<Document, RepositoryError> {
        let mut document = Document::new();
        let mut violations = Vec::new();

        if let Some(id) = body.get(ID_FIELD) {
            match FieldType::ObjectId.cast(id) {
                Some(Value::String(id)) => {
                    document.insert(ID_FIELD.to_string(), Value::String(id));
                }
                _ => violations.push(FieldViolation::cast(ID_FIELD, "ObjectId", id)),
            }
        }

        for spec in &self.fields {
            let supplied = body.get(&spec.name).filter(|value| !value.is_null());
            let value = match supplied {
                Some(raw) => match spec.normalize(raw) {
                    Ok(value) => Some(value),
                    Err(violation) => {
                        violations.push(violation);
                        continue;
                    }
                },
                None => spec.initial_value(),
            };
            if let Some(value) = value {
                document.insert(spec.name.clone(), value);
            }
        }

        for spec in &self.fields {
            if violations.iter().any(|v| v.path == spec.name) {
                continue;
            }
            if let Some(violation) = spec.check(document.get(&spec.name), &document, WriteMode::Create) {
                violations.push(violation);
            }
        }

        if !violations.is_empty() {
            return Err(RepositoryError::validation(&self.entity, violations));
        }

        if let Some(rule) = &self.slug {
            if let Some(source) = document.get(&rule.source).and_then(Value::as_str) {
                let slug = slugify(source);
                document.insert(rule.target.clone(), Value::String(slug));
            }
        }

        self.run_hooks(&mut document, None, RepositoryOperation::Create)?;
        Ok(document)
    }

    /// Apply `changes` to `existing`, validating only the supplied fields
    ///
    /// `_id` and `__v` cannot be changed and unknown fields are ignored.
    /// Creation-only validators are skipped.
    pub fn prepare_update(&self, existing: &Document, changes: Document) -> Result<Document, RepositoryError> {
        let mut merged = existing.clone();
        let mut touched = Vec::new();
        let mut violations = Vec::new();

        for (key, value) in changes {
            if key == ID_FIELD || key == VERSION_FIELD {
                continue;
            }
            let Some(spec) = self.field_spec(&key) else {
                continue;
            };
            if value.is_null() {
                merged.insert(key.clone(), Value::Null);
                touched.push(key);
                continue;
            }
            match spec.normalize(&value) {
                Ok(value) => {
                    merged.insert(key.clone(), value);
                    touched.push(key);
                }
                Err(violation) => violations.push(violation),
            }
        }

        for key in &touched {
            if let Some(spec) = self.field_spec(key) {
                if let Some(violation) = spec.check(merged.get(key), &merged, WriteMode::Update) {
                    violations.push(violation);
                }
            }
        }

        if !violations.is_empty() {
            return Err(RepositoryError::validation(&self.entity, violations)
                .with_operation(RepositoryOperation::Update));
        }

        self.run_hooks(&mut merged, Some(existing), RepositoryOperation::Update)?;
        Ok(merged)
    }

    fn run_hooks(
        &self,
        document: &mut Document,
        previous: Option<&Document>,
        operation: RepositoryOperation,
    ) -> Result<(), RepositoryError> {
        for hook in &self.before_save {
            hook(document, previous).map_err(|message| {
                RepositoryError::store_failure(operation, message).with_entity_type(&self.entity)
            })?;
        }
        Ok(())
    }

    /// Cast filter operands to the types of the fields they compare against
    ///
    /// Fields the schema does not know are compared as given. Operands of
    /// unrecognised operators are left alone for the matcher to reject.
    pub fn cast_filter(
        &self,
        predicates: &[FilterPredicate],
        operation: RepositoryOperation,
    ) -> Result<Vec<FilterPredicate>, RepositoryError> {
        predicates
            .iter()
            .map(|predicate| {
                let Some(spec) = self.field_spec(&predicate.field) else {
                    return Ok(predicate.clone());
                };
                if matches!(predicate.operator, ComparisonOperator::Other(_)) {
                    return Ok(predicate.clone());
                }

                let element = spec.ty.element_type();
                let cast_one = |value: &Value| {
                    element.cast(value).ok_or_else(|| {
                        RepositoryError::cast(
                            operation,
                            FieldViolation::cast(&predicate.field, &element.type_name(), value),
                        )
                        .with_entity_type(&self.entity)
                    })
                };

                let value = match &predicate.value {
                    Value::Array(items) => Value::Array(
                        items.iter().map(cast_one).collect::<Result<Vec<_>, _>>()?,
                    ),
                    other => cast_one(other)?,
                };

                Ok(FilterPredicate {
                    field: predicate.field.clone(),
                    operator: predicate.operator.clone(),
                    value,
                })
            })
            .collect()
    }
}

/// Lower-case, hyphen-separated form of `text`
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else if c.is_whitespace() || c == '-' || c == '_' {
            pending_dash = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::error::{RepositoryErrorKind, ViolationKind};
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn below_price(value: &Value, document: &Document) -> bool {
        match (value.as_f64(), document.get("price").and_then(Value::as_f64)) {
            (Some(discount), Some(price)) => discount < price,
            _ => true,
        }
    }

    fn tour_schema() -> Schema {
        Schema::new("Tour", "tours")
            .field(
                FieldSpec::string("name")
                    .required("A tour must have a name")
                    .unique()
                    .trim()
                    .max_length(40, "A tour name must have at most 40 characters")
                    .min_length(10, "A tour name must have at least 10 characters"),
            )
            .field(FieldSpec::string("slug"))
            .field(FieldSpec::number("price").required("A tour must have a price"))
            .field(
                FieldSpec::number("priceDiscount")
                    .validate(below_price, "Discount price ({VALUE}) must be below the regular price"),
            )
            .field(
                FieldSpec::string("difficulty")
                    .one_of(["easy", "medium", "difficult"], "Available options: easy, medium, difficult"),
            )
            .field(
                FieldSpec::number("ratingsAverage")
                    .default_value(4.5)
                    .min(1.0, "Rating must be at least 1.0")
                    .max(5.0, "Rating must be at most 5.0")
                    .round_to(1),
            )
            .field(FieldSpec::date("createdAt").default_now().hidden())
            .field(FieldSpec::array("startDates", FieldType::Date))
            .slug("name", "slug")
    }

    #[test]
    fn test_cast_number() {
        assert_eq!(FieldType::Number.cast(&json!("497")), Some(json!(497)));
        assert_eq!(FieldType::Number.cast(&json!("4.7")), Some(json!(4.7)));
        assert_eq!(FieldType::Number.cast(&json!(" ")), None);
        assert_eq!(FieldType::Number.cast(&json!("abc")), None);
        assert_eq!(FieldType::Number.cast(&json!({"gte": 1})), None);
    }

    #[test]
    fn test_cast_boolean() {
        assert_eq!(FieldType::Boolean.cast(&json!("true")), Some(json!(true)));
        assert_eq!(FieldType::Boolean.cast(&json!("0")), Some(json!(false)));
        assert_eq!(FieldType::Boolean.cast(&json!("maybe")), None);
    }

    #[test]
    fn test_cast_date_normalizes() {
        assert_eq!(
            FieldType::Date.cast(&json!("2021-06-19")),
            Some(json!("2021-06-19T00:00:00.000Z"))
        );
        assert_eq!(
            FieldType::Date.cast(&json!("2021-07-20T09:00:00+02:00")),
            Some(json!("2021-07-20T07:00:00.000Z"))
        );
        assert_eq!(FieldType::Date.cast(&json!("yesterday")), None);
    }

    #[test]
    fn test_cast_array_wraps_scalar() {
        let ty = FieldType::Array(Box::new(FieldType::Number));
        assert_eq!(ty.cast(&json!("3")), Some(json!([3])));
        assert_eq!(ty.cast(&json!(["1", 2])), Some(json!([1, 2])));
        assert_eq!(ty.type_name(), "[Number]");
    }

    #[test]
    fn test_create_applies_defaults_and_slug() {
        let created = tour_schema()
            .prepare_create(doc(json!({
                "name": "The Forest Hiker",
                "price": 397,
                "unknown": "dropped"
            })))
            .unwrap();
        assert_eq!(created["ratingsAverage"], json!(4.5));
        assert_eq!(created["slug"], json!("the-forest-hiker"));
        assert!(created.contains_key("createdAt"));
        assert!(!created.contains_key("unknown"));
        assert!(!created.contains_key("__v"));
    }

    #[test]
    fn test_create_collects_every_violation() {
        let err = tour_schema()
            .prepare_create(doc(json!({"name": "Short", "difficulty": "extreme"})))
            .unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::ValidationFailed);
        let paths: Vec<_> = err.violations.iter().map(|v| v.path.as_str()).collect();
        assert_eq!(paths, vec!["name", "price", "difficulty"]);
        assert_eq!(
            err.violations[0].message,
            "A tour name must have at least 10 characters"
        );
    }

    #[test]
    fn test_create_cast_failure_skips_rules() {
        let err = tour_schema()
            .prepare_create(doc(json!({"name": "The Forest Hiker", "price": "lots"})))
            .unwrap_err();
        assert_eq!(err.violations.len(), 1);
        assert_eq!(err.violations[0].kind, ViolationKind::Cast);
        assert!(err.sole_cast().is_some());
    }

    #[test]
    fn test_validator_sees_sibling_fields() {
        let err = tour_schema()
            .prepare_create(doc(json!({
                "name": "The Forest Hiker",
                "price": 100,
                "priceDiscount": 150
            })))
            .unwrap_err();
        assert_eq!(
            err.violations[0].message,
            "Discount price (150) must be below the regular price"
        );
    }

    #[test]
    fn test_rounding_setter() {
        let created = tour_schema()
            .prepare_create(doc(json!({
                "name": "The Forest Hiker",
                "price": 100,
                "ratingsAverage": 4.666
            })))
            .unwrap();
        assert_eq!(created["ratingsAverage"], json!(4.7));
    }

    #[test]
    fn test_update_validates_only_supplied_fields() {
        let schema = tour_schema();
        let existing = doc(json!({"_id": "t1", "__v": 0, "name": "The Forest Hiker", "price": 397}));

        let merged = schema
            .prepare_update(&existing, doc(json!({"price": "420", "_id": "other"})))
            .unwrap();
        assert_eq!(merged["price"], json!(420));
        assert_eq!(merged["_id"], json!("t1"));

        let err = schema
            .prepare_update(&existing, doc(json!({"ratingsAverage": 7})))
            .unwrap_err();
        assert_eq!(err.violations[0].message, "Rating must be at most 5.0");

        let err = schema
            .prepare_update(&existing, doc(json!({"name": null})))
            .unwrap_err();
        assert_eq!(err.violations[0].message, "A tour must have a name");
    }

    #[test]
    fn test_cast_filter() {
        let schema = tour_schema();
        let cast = schema
            .cast_filter(
                &[
                    FilterPredicate::gte("price", "500"),
                    FilterPredicate::eq("color", "blue"),
                    FilterPredicate::gte("startDates", "2021-01-01"),
                ],
                RepositoryOperation::Find,
            )
            .unwrap();
        assert_eq!(cast[0].value, json!(500));
        assert_eq!(cast[1].value, json!("blue"));
        assert_eq!(cast[2].value, json!("2021-01-01T00:00:00.000Z"));

        let err = schema
            .cast_filter(&[FilterPredicate::lt("price", "cheap")], RepositoryOperation::Find)
            .unwrap_err();
        assert_eq!(err.sole_cast().map(|v| v.value.as_str()), Some("cheap"));
    }

    fn stamp_revision(document: &mut Document, previous: Option<&Document>) -> Result<(), String> {
        let revision = previous.map_or(0, |p| p["revision"].as_i64().unwrap_or(0) + 1);
        if revision > 1 {
            return Err("too many revisions".to_string());
        }
        document.insert("revision".into(), json!(revision));
        Ok(())
    }

    #[test]
    fn test_before_save_runs_on_create_and_update() {
        let schema = Schema::new("Note", "notes")
            .field(FieldSpec::string("text").required("A note needs text"))
            .field(FieldSpec::number("revision"))
            .before_save(stamp_revision);

        assert!(schema.prepare_create(doc(json!({}))).is_err());
        let created = schema.prepare_create(doc(json!({"text": "a"}))).unwrap();
        assert_eq!(created["revision"], json!(0));

        let updated = schema.prepare_update(&created, doc(json!({"text": "b"}))).unwrap();
        assert_eq!(updated["revision"], json!(1));

        let err = schema.prepare_update(&updated, doc(json!({"text": "c"}))).unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::StoreFailure);
        assert_eq!(err.operation, RepositoryOperation::Update);
        assert_eq!(err.message, "too many revisions");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("The Sea Explorer"), "the-sea-explorer");
        assert_eq!(slugify("  Snow  Adventurer "), "snow-adventurer");
    }
}
