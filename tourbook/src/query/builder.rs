//! Immutable, staged query builder
//!
//! The four steps run in a fixed order, filter → sort → project → paginate,
//! and the type system holds that order: each step consumes the builder and
//! returns the next stage. Nothing here touches a store; the finished
//! [`ResourceQuery`] is a plain value that the caller hands to one.
//!
//! # Example
//!
//! ```rust
//! use tourbook::query::{QueryBuilder, RawQueryParams, ScopeFilter};
//!
//! let params = RawQueryParams::parse("rating[gte]=4&sort=-rating&page=2&limit=10");
//! let query = QueryBuilder::scoped(Some(ScopeFilter::field_eq("tour", "t1")))
//!     .filter(&params)
//!     .sort(&params)
//!     .limit_fields(&params)
//!     .paginate(&params);
//!
//! assert_eq!(query.filter.len(), 2);
//! assert_eq!(query.skip(), 10);
//! ```

use std::marker::PhantomData;

use super::directives::{PageSpec, ProjectionSpec, SortSpec};
use super::filter::{predicates_from_params, FilterPredicate, ScopeFilter};
use super::params::RawQueryParams;

/// Builder stages
pub mod stage {
    /// Waiting for `filter`
    #[derive(Debug)]
    pub struct Filter;
    /// Waiting for `sort`
    #[derive(Debug)]
    pub struct Sort;
    /// Waiting for `limit_fields`
    #[derive(Debug)]
    pub struct Project;
    /// Waiting for `paginate`
    #[derive(Debug)]
    pub struct Paginate;
}

/// Fully specified query against one collection
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceQuery {
    /// Conjunctive predicates, ambient scope first
    pub filter: Vec<FilterPredicate>,
    pub sort: SortSpec,
    pub projection: ProjectionSpec,
    /// `None` reads every matching document
    pub page: Option<PageSpec>,
}

impl ResourceQuery {
    /// Every document matching `filter`, default order and projection
    pub fn unbounded(filter: Vec<FilterPredicate>) -> Self {
        Self {
            filter,
            sort: SortSpec::default(),
            projection: ProjectionSpec::default(),
            page: None,
        }
    }

    pub fn skip(&self) -> u64 {
        self.page.map_or(0, |page| page.skip())
    }

    pub fn limit(&self) -> Option<u64> {
        self.page.map(|page| u64::from(page.limit))
    }
}

/// Query under construction
#[derive(Debug)]
pub struct QueryBuilder<S> {
    filter: Vec<FilterPredicate>,
    sort: SortSpec,
    projection: ProjectionSpec,
    _stage: PhantomData<S>,
}

impl QueryBuilder<stage::Filter> {
    /// Builder over the whole collection
    pub fn new() -> Self {
        Self::scoped(None)
    }

    /// Builder whose base query is already confined by `scope`
    pub fn scoped(scope: Option<ScopeFilter>) -> Self {
        Self {
            filter: scope.map(ScopeFilter::into_predicates).unwrap_or_default(),
            sort: SortSpec::default(),
            projection: ProjectionSpec::default(),
            _stage: PhantomData,
        }
    }

    /// Add a predicate per non-reserved key
    pub fn filter(self, params: &RawQueryParams) -> QueryBuilder<stage::Sort> {
        let mut filter = self.filter;
        filter.extend(predicates_from_params(params));
        QueryBuilder {
            filter,
            sort: self.sort,
            projection: self.projection,
            _stage: PhantomData,
        }
    }
}

impl Default for QueryBuilder<stage::Filter> {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryBuilder<stage::Sort> {
    /// Order by `sort`, or by identifier when absent
    pub fn sort(self, params: &RawQueryParams) -> QueryBuilder<stage::Project> {
        let sort = params
            .scalar("sort")
            .and_then(SortSpec::parse)
            .unwrap_or(self.sort);
        QueryBuilder {
            filter: self.filter,
            sort,
            projection: self.projection,
            _stage: PhantomData,
        }
    }
}

impl QueryBuilder<stage::Project> {
    /// Project onto `fields`, or hide the version counter when absent
    pub fn limit_fields(self, params: &RawQueryParams) -> QueryBuilder<stage::Paginate> {
        let projection = params
            .scalar("fields")
            .and_then(ProjectionSpec::parse)
            .unwrap_or(self.projection);
        QueryBuilder {
            filter: self.filter,
            sort: self.sort,
            projection,
            _stage: PhantomData,
        }
    }
}

impl QueryBuilder<stage::Paginate> {
    /// Resolve `page`/`limit` and finish the query
    pub fn paginate(self, params: &RawQueryParams) -> ResourceQuery {
        ResourceQuery {
            filter: self.filter,
            sort: self.sort,
            projection: self.projection,
            page: Some(PageSpec::from_raw(params.scalar("page"), params.scalar("limit"))),
        }
    }
}

/// Run all four steps over `params`
pub fn build_query(params: &RawQueryParams, scope: Option<ScopeFilter>) -> ResourceQuery {
    QueryBuilder::scoped(scope)
        .filter(params)
        .sort(params)
        .limit_fields(params)
        .paginate(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::directives::{SortField, DEFAULT_LIMIT};

    #[test]
    fn test_empty_params_resolve_defaults() {
        let query = build_query(&RawQueryParams::new(), None);
        assert!(query.filter.is_empty());
        assert_eq!(query.sort, SortSpec::default());
        assert_eq!(query.projection, ProjectionSpec::default());
        assert_eq!(query.page, Some(PageSpec::default()));
        assert_eq!(query.skip(), 0);
        assert_eq!(query.limit(), Some(u64::from(DEFAULT_LIMIT)));
    }

    #[test]
    fn test_non_numeric_page_behaves_like_absent() {
        let absent = build_query(&RawQueryParams::new(), None);
        let garbage = build_query(&RawQueryParams::parse("page=abc"), None);
        assert_eq!(absent.page, garbage.page);
    }

    #[test]
    fn test_reserved_keys_never_filter() {
        let params = RawQueryParams::parse("page=1&sort=name&limit=3&fields=name");
        let query = build_query(&params, None);
        assert!(query.filter.is_empty());
    }

    #[test]
    fn test_scope_precedes_query_filters() {
        let params = RawQueryParams::parse("rating=5");
        let query = build_query(&params, Some(ScopeFilter::field_eq("tour", "t1")));
        assert_eq!(
            query.filter,
            vec![
                FilterPredicate::eq("tour", "t1"),
                FilterPredicate::eq("rating", "5"),
            ]
        );
    }

    #[test]
    fn test_steps_return_new_values() {
        let params = RawQueryParams::parse("sort=-price&fields=name,price&limit=2&page=3");
        let query = QueryBuilder::new()
            .filter(&params)
            .sort(&params)
            .limit_fields(&params)
            .paginate(&params);
        assert_eq!(query.sort.fields(), &[SortField::descending("price")]);
        assert!(query.projection.names("name"));
        assert_eq!(query.skip(), 4);
        assert_eq!(query.limit(), Some(2));
    }

    #[test]
    fn test_unbounded_query() {
        let query = ResourceQuery::unbounded(vec![FilterPredicate::gte("ratingsAverage", 4.5)]);
        assert_eq!(query.skip(), 0);
        assert_eq!(query.limit(), None);
    }
}
