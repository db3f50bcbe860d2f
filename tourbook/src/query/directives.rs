//! Sort, projection and page directives

use std::fmt;

/// Field every document carries and the default sort key
pub const ID_FIELD: &str = "_id";

/// Internal version counter hidden by the default projection
pub const VERSION_FIELD: &str = "__v";

/// Page used when `page` is absent or unusable
pub const DEFAULT_PAGE: u32 = 1;

/// Page size used when `limit` is absent or unusable
pub const DEFAULT_LIMIT: u32 = 100;

/// Direction for ordering results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => write!(f, "asc"),
            Self::Descending => write!(f, "desc"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortField {
    pub field: String,
    pub direction: SortDirection,
}

impl SortField {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// Ordered list of sort keys, most significant first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    fields: Vec<SortField>,
}

impl SortSpec {
    /// Parse `-ratingsAverage,price`; a leading `-` means descending
    ///
    /// Returns `None` when the input names no field at all.
    pub fn parse(raw: &str) -> Option<Self> {
        let fields = raw
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty() && *part != "-")
            .map(|part| match part.strip_prefix('-') {
                Some(field) => SortField::descending(field),
                None => SortField::ascending(part),
            })
            .collect::<Vec<_>>();

        if fields.is_empty() {
            None
        } else {
            Some(Self { fields })
        }
    }

    pub fn fields(&self) -> &[SortField] {
        &self.fields
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|sort| sort.field == field)
    }
}

impl Default for SortSpec {
    /// Ascending by the document identifier
    fn default() -> Self {
        Self {
            fields: vec![SortField::ascending(ID_FIELD)],
        }
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = self
            .fields
            .iter()
            .map(|sort| match sort.direction {
                SortDirection::Ascending => sort.field.clone(),
                SortDirection::Descending => format!("-{}", sort.field),
            })
            .collect::<Vec<_>>();
        write!(f, "{}", parts.join(" "))
    }
}

/// Which fields a returned document exposes
///
/// `include` and `exclude` are kept apart so the store can reject a mixed
/// projection the same way it would a malformed one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionSpec {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl ProjectionSpec {
    /// Parse `name,price` (inclusion) or `-summary` (exclusion)
    pub fn parse(raw: &str) -> Option<Self> {
        let mut include = Vec::new();
        let mut exclude = Vec::new();
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part.strip_prefix('-') {
                Some(field) if !field.is_empty() => exclude.push(field.to_string()),
                Some(_) => {}
                None => include.push(part.trim_start_matches('+').to_string()),
            }
        }

        if include.is_empty() && exclude.is_empty() {
            None
        } else {
            Some(Self { include, exclude })
        }
    }

    pub fn including<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            include: fields.into_iter().map(Into::into).collect(),
            exclude: Vec::new(),
        }
    }

    pub fn excluding<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            include: Vec::new(),
            exclude: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn include(&self) -> &[String] {
        &self.include
    }

    pub fn exclude(&self) -> &[String] {
        &self.exclude
    }

    pub fn is_inclusion(&self) -> bool {
        !self.include.is_empty()
    }

    /// Whether `field` was named explicitly in an inclusion list
    pub fn names(&self, field: &str) -> bool {
        self.include.iter().any(|f| f == field)
    }
}

impl Default for ProjectionSpec {
    /// Everything except the version counter
    fn default() -> Self {
        Self::excluding([VERSION_FIELD])
    }
}

/// Resolved page number and size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpec {
    pub page: u32,
    pub limit: u32,
}

impl PageSpec {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
        }
    }

    /// Resolve raw `page`/`limit` strings, falling back to the defaults
    pub fn from_raw(page: Option<&str>, limit: Option<&str>) -> Self {
        Self {
            page: parse_positive_or(page, DEFAULT_PAGE),
            limit: parse_positive_or(limit, DEFAULT_LIMIT),
        }
    }

    /// Number of documents to skip: `limit * (page - 1)`
    pub fn skip(&self) -> u64 {
        u64::from(self.limit) * u64::from(self.page.saturating_sub(1))
    }
}

impl Default for PageSpec {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Parse a positive integer, or return `default`
///
/// Absent, empty, non-numeric, fractional, zero and negative inputs all
/// yield `default`.
pub fn parse_positive_or(raw: Option<&str>, default: u32) -> u32 {
    raw.map(str::trim)
        .and_then(|value| value.parse::<u32>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_parse_directions() {
        let spec = SortSpec::parse("-ratingsAverage,price").unwrap();
        assert_eq!(
            spec.fields(),
            &[
                SortField::descending("ratingsAverage"),
                SortField::ascending("price"),
            ]
        );
        assert_eq!(spec.to_string(), "-ratingsAverage price");
    }

    #[test]
    fn test_sort_parse_empty() {
        assert!(SortSpec::parse("").is_none());
        assert!(SortSpec::parse(" , -").is_none());
    }

    #[test]
    fn test_sort_default_is_id() {
        let spec = SortSpec::default();
        assert_eq!(spec.fields(), &[SortField::ascending("_id")]);
        assert!(spec.contains("_id"));
    }

    #[test]
    fn test_projection_parse() {
        let spec = ProjectionSpec::parse("name, price").unwrap();
        assert_eq!(spec.include(), &["name".to_string(), "price".to_string()]);
        assert!(spec.exclude().is_empty());
        assert!(spec.is_inclusion());

        let spec = ProjectionSpec::parse("-summary,-description").unwrap();
        assert!(!spec.is_inclusion());
        assert_eq!(spec.exclude().len(), 2);
    }

    #[test]
    fn test_projection_default_hides_version() {
        let spec = ProjectionSpec::default();
        assert_eq!(spec.exclude(), &["__v".to_string()]);
        assert!(spec.include().is_empty());
    }

    #[test]
    fn test_page_defaults() {
        let page = PageSpec::from_raw(None, None);
        assert_eq!(page, PageSpec { page: 1, limit: 100 });
        assert_eq!(page.skip(), 0);
    }

    #[test]
    fn test_page_non_numeric_falls_back() {
        let page = PageSpec::from_raw(Some("abc"), Some("xyz"));
        assert_eq!(page, PageSpec::default());
    }

    #[test]
    fn test_page_non_positive_falls_back() {
        assert_eq!(PageSpec::from_raw(Some("0"), Some("0")), PageSpec::default());
        assert_eq!(PageSpec::from_raw(Some("-3"), None).page, 1);
        assert_eq!(PageSpec::from_raw(Some("2.5"), None).page, 1);
    }

    #[test]
    fn test_page_skip() {
        let page = PageSpec::from_raw(Some("3"), Some("10"));
        assert_eq!(page.skip(), 20);
        assert_eq!(PageSpec::new(2, 2).skip(), 2);
    }

    #[test]
    fn test_parse_positive_trims() {
        assert_eq!(parse_positive_or(Some(" 7 "), 1), 7);
        assert_eq!(parse_positive_or(Some(""), 4), 4);
    }
}
