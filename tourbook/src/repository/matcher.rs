//! Predicate evaluation, ordering and projection over stored documents

use std::cmp::Ordering;

use serde_json::Value;

use super::document::{lookup, Document};
use super::error::{RepositoryError, RepositoryOperation};
use super::schema::Schema;
use crate::query::{
    ComparisonOperator, FilterPredicate, ProjectionSpec, SortDirection, SortField, SortSpec,
    ID_FIELD,
};

/// Reject operators the store does not implement
pub(crate) fn ensure_known_operators(
    predicates: &[FilterPredicate],
    operation: RepositoryOperation,
) -> Result<(), RepositoryError> {
    match predicates
        .iter()
        .find(|p| matches!(p.operator, ComparisonOperator::Other(_)))
    {
        Some(predicate) => Err(RepositoryError::store_failure(
            operation,
            format!("unknown operator: {}", predicate.operator),
        )),
        None => Ok(()),
    }
}

/// Whether `document` satisfies every predicate
///
/// Operators must already have passed [`ensure_known_operators`]; anything
/// unrecognised here simply fails to match.
pub(crate) fn matches_all(document: &Document, predicates: &[FilterPredicate]) -> bool {
    predicates.iter().all(|predicate| matches_one(document, predicate))
}

fn matches_one(document: &Document, predicate: &FilterPredicate) -> bool {
    let actual = lookup(document, &predicate.field);
    match &predicate.operator {
        ComparisonOperator::Eq => equals(actual, &predicate.value),
        ComparisonOperator::Ne => !equals(actual, &predicate.value),
        ComparisonOperator::In => match &predicate.value {
            Value::Array(candidates) => candidates.iter().any(|c| equals(actual, c)),
            single => equals(actual, single),
        },
        ComparisonOperator::Gt => in_range(actual, &predicate.value, |o| o == Ordering::Greater),
        ComparisonOperator::Gte => in_range(actual, &predicate.value, |o| o != Ordering::Less),
        ComparisonOperator::Lt => in_range(actual, &predicate.value, |o| o == Ordering::Less),
        ComparisonOperator::Lte => in_range(actual, &predicate.value, |o| o != Ordering::Greater),
        ComparisonOperator::Other(_) => false,
    }
}

/// Equality; a stored array matches when any element does
pub(crate) fn equals(actual: Option<&Value>, expected: &Value) -> bool {
    match actual {
        None | Some(Value::Null) => expected.is_null(),
        Some(Value::Array(items)) if !expected.is_array() => {
            items.iter().any(|item| scalar_equals(item, expected))
        }
        Some(value) => scalar_equals(value, expected),
    }
}

fn scalar_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

fn in_range(actual: Option<&Value>, bound: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    match actual {
        Some(Value::Array(items)) => items
            .iter()
            .any(|item| same_type_cmp(item, bound).is_some_and(&accept)),
        Some(value) => same_type_cmp(value, bound).is_some_and(accept),
        None => false,
    }
}

/// Range comparisons only hold between values of the same kind
fn same_type_cmp(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// The sort actually applied: the requested keys, then `_id` to break ties
pub(crate) fn effective_sort(sort: &SortSpec) -> Vec<SortField> {
    let mut fields = sort.fields().to_vec();
    if !sort.contains(ID_FIELD) {
        fields.push(SortField::ascending(ID_FIELD));
    }
    fields
}

pub(crate) fn compare_documents(a: &Document, b: &Document, sort: &[SortField]) -> Ordering {
    for key in sort {
        let ordering = sort_cmp(lookup(a, &key.field), lookup(b, &key.field));
        let ordering = match key.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 5,
    }
}

fn sort_cmp(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Array(x)), Some(Value::Array(y))) => sort_cmp(x.first(), y.first()),
        _ => Ordering::Equal,
    }
}

/// Reject projections the store cannot express
pub(crate) fn ensure_projection(
    projection: &ProjectionSpec,
    operation: RepositoryOperation,
) -> Result<(), RepositoryError> {
    if projection.is_inclusion() && projection.exclude().iter().any(|f| f != ID_FIELD) {
        return Err(RepositoryError::store_failure(
            operation,
            "Projection cannot have a mix of inclusion and exclusion.",
        ));
    }
    Ok(())
}

/// Copy of `document` limited to what `projection` and the schema allow
pub(crate) fn project(document: &Document, projection: &ProjectionSpec, schema: &Schema) -> Document {
    if projection.is_inclusion() {
        let mut projected = Document::new();
        let keep_id = !projection.exclude().iter().any(|f| f == ID_FIELD);
        if keep_id {
            if let Some(id) = document.get(ID_FIELD) {
                projected.insert(ID_FIELD.to_string(), id.clone());
            }
        }
        for field in projection.include() {
            insert_path(&mut projected, document, field);
        }
        return projected;
    }

    let mut projected = document.clone();
    projected.retain(|key, _| !schema.is_hidden(key));
    for field in projection.exclude() {
        remove_path(&mut projected, field);
    }
    projected
}

/// Copy the value at a dotted `path` of `source` into `projected`
///
/// Intermediate objects keep only the selected keys. Arrays of objects are
/// narrowed element by element.
fn insert_path(projected: &mut Document, source: &Document, path: &str) {
    let Some((head, rest)) = path.split_once('.') else {
        if let Some(value) = source.get(path) {
            projected.insert(path.to_string(), value.clone());
        }
        return;
    };

    match source.get(head) {
        Some(Value::Object(inner)) => {
            let entry = projected
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Document::new()));
            if let Value::Object(target) = entry {
                insert_path(target, inner, rest);
            }
        }
        Some(Value::Array(items)) => {
            let inner: Vec<&Document> = items.iter().filter_map(Value::as_object).collect();
            let entry = projected.entry(head.to_string()).or_insert_with(|| {
                Value::Array(inner.iter().map(|_| Value::Object(Document::new())).collect())
            });
            if let Value::Array(targets) = entry {
                for (target, item) in targets.iter_mut().zip(inner) {
                    if let Value::Object(target) = target {
                        insert_path(target, item, rest);
                    }
                }
            }
        }
        _ => {}
    }
}

fn remove_path(document: &mut Document, path: &str) {
    match path.split_once('.') {
        Some((head, rest)) => {
            if let Some(Value::Object(inner)) = document.get_mut(head) {
                remove_path(inner, rest);
            }
        }
        None => {
            document.remove(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::schema::FieldSpec;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_equality_and_arrays() {
        let d = doc(json!({"difficulty": "easy", "guides": ["u1", "u2"], "price": 397}));
        assert!(matches_all(&d, &[FilterPredicate::eq("difficulty", "easy")]));
        assert!(matches_all(&d, &[FilterPredicate::eq("guides", "u2")]));
        assert!(matches_all(&d, &[FilterPredicate::eq("price", 397.0)]));
        assert!(!matches_all(&d, &[FilterPredicate::eq("missing", "x")]));
    }

    #[test]
    fn test_not_equal_matches_missing_field() {
        let d = doc(json!({"name": "a"}));
        assert!(matches_all(&d, &[FilterPredicate::ne("secretTour", true)]));
        let d = doc(json!({"secretTour": true}));
        assert!(!matches_all(&d, &[FilterPredicate::ne("secretTour", true)]));
    }

    #[test]
    fn test_ranges() {
        let d = doc(json!({"price": 100}));
        assert!(matches_all(&d, &[FilterPredicate::gte("price", 50)]));
        assert!(matches_all(&d, &[FilterPredicate::gte("price", 100)]));
        assert!(!matches_all(&d, &[FilterPredicate::gt("price", 100)]));
        assert!(!matches_all(&d, &[FilterPredicate::gte("price", 150)]));
        assert!(matches_all(&d, &[FilterPredicate::lt("price", 150), FilterPredicate::lte("price", 100)]));
        // mismatched kinds never compare
        assert!(!matches_all(&d, &[FilterPredicate::gte("price", "50")]));
    }

    #[test]
    fn test_membership() {
        let d = doc(json!({"duration": 5}));
        assert!(matches_all(&d, &[FilterPredicate::is_in("duration", [5, 9])]));
        assert!(!matches_all(&d, &[FilterPredicate::is_in("duration", [7])]));
    }

    #[test]
    fn test_unknown_operator_rejected() {
        let predicates = [FilterPredicate::new(
            "price",
            ComparisonOperator::Other("regex".into()),
            "1",
        )];
        let err = ensure_known_operators(&predicates, RepositoryOperation::Find).unwrap_err();
        assert_eq!(err.message, "unknown operator: regex");
    }

    #[test]
    fn test_sort_with_tiebreak() {
        let a = doc(json!({"_id": "a", "price": 10}));
        let b = doc(json!({"_id": "b", "price": 10}));
        let c = doc(json!({"_id": "c", "price": 5}));
        let sort = effective_sort(&SortSpec::parse("-price").unwrap());
        let mut docs = vec![&b, &c, &a];
        docs.sort_by(|x, y| compare_documents(x, y, &sort));
        let ids: Vec<_> = docs.iter().map(|d| d["_id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_missing_values_sort_first() {
        let a = doc(json!({"_id": "a"}));
        let b = doc(json!({"_id": "b", "price": 1}));
        let sort = effective_sort(&SortSpec::parse("price").unwrap());
        assert_eq!(compare_documents(&a, &b, &sort), Ordering::Less);
    }

    #[test]
    fn test_projection_inclusion_keeps_id() {
        let schema = Schema::new("Tour", "tours");
        let d = doc(json!({"_id": "a", "__v": 0, "name": "n", "price": 1, "summary": "s"}));
        let projected = project(&d, &ProjectionSpec::parse("name,price").unwrap(), &schema);
        assert_eq!(projected, doc(json!({"_id": "a", "name": "n", "price": 1})));
    }

    #[test]
    fn test_projection_default_hides_internal_fields() {
        let schema = Schema::new("Tour", "tours").field(FieldSpec::date("createdAt").hidden());
        let d = doc(json!({"_id": "a", "__v": 0, "name": "n", "createdAt": "2021-01-01T00:00:00.000Z"}));
        let projected = project(&d, &ProjectionSpec::default(), &schema);
        assert_eq!(projected, doc(json!({"_id": "a", "name": "n"})));

        let projected = project(&d, &ProjectionSpec::parse("createdAt").unwrap(), &schema);
        assert!(projected.contains_key("createdAt"));
    }

    #[test]
    fn test_projection_inclusion_narrows_dotted_paths() {
        let schema = Schema::new("Tour", "tours");
        let d = doc(json!({
            "_id": "a",
            "name": "n",
            "startLocation": {"address": "Miami", "coordinates": [-80.1, 25.7], "type": "Point"},
            "locations": [
                {"day": 1, "description": "Beach"},
                {"day": 2, "description": "Reef"},
                "stray"
            ]
        }));

        let spec = ProjectionSpec::parse("startLocation.address,locations.day").unwrap();
        let projected = project(&d, &spec, &schema);
        assert_eq!(
            projected,
            doc(json!({
                "_id": "a",
                "startLocation": {"address": "Miami"},
                "locations": [{"day": 1}, {"day": 2}]
            }))
        );

        let spec = ProjectionSpec::parse("startLocation.address,startLocation.type,name.first").unwrap();
        let projected = project(&d, &spec, &schema);
        assert_eq!(projected["startLocation"], json!({"address": "Miami", "type": "Point"}));
        assert!(!projected.contains_key("name"));
    }

    #[test]
    fn test_mixed_projection_rejected() {
        let mixed = ProjectionSpec::parse("name,-price").unwrap();
        assert!(ensure_projection(&mixed, RepositoryOperation::Find).is_err());
        let without_id = ProjectionSpec::parse("name,-_id").unwrap();
        assert!(ensure_projection(&without_id, RepositoryOperation::Find).is_ok());
    }
}
