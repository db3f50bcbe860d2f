//! Query-string driven filtering, sorting, projection and pagination
//!
//! A request's query string becomes [`RawQueryParams`]; the staged
//! [`QueryBuilder`] turns it into a [`ResourceQuery`] descriptor that a
//! [`Model`](crate::repository::Model) executes.
//!
//! Reserved keys (`page`, `sort`, `limit`, `fields`) steer the query; every
//! other key is a filter on the resource's fields. Bracketed operators
//! (`gte`, `gt`, `lte`, `lt`) become range comparisons.

mod builder;
mod directives;
mod filter;
mod params;
mod preset;

pub use builder::{build_query, stage, QueryBuilder, ResourceQuery};
pub use directives::{
    parse_positive_or, PageSpec, ProjectionSpec, SortDirection, SortField, SortSpec,
    DEFAULT_LIMIT, DEFAULT_PAGE, ID_FIELD, VERSION_FIELD,
};
pub use filter::{ComparisonOperator, FilterPredicate, ScopeFilter};
pub use params::{is_reserved, ParamValue, RawQueryParams, RESERVED_KEYS};
pub use preset::QueryPreset;
