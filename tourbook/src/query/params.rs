//! Raw query-string parameters
//!
//! [`RawQueryParams`] is the per-request view of the URL query string. Plain
//! `key=value` pairs stay scalar, `key[op]=value` pairs nest under their key,
//! and a key that appears more than once collects every value. Once a key
//! has bracketed operators, a plain value for the same key is ignored.
//!
//! # Example
//!
//! ```rust
//! use tourbook::query::{ParamValue, RawQueryParams};
//!
//! let params = RawQueryParams::parse("price[gte]=500&difficulty=easy&page=2");
//! assert_eq!(params.scalar("page"), Some("2"));
//! assert!(matches!(params.get("price"), Some(ParamValue::Nested(_))));
//! ```

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

/// Keys that steer the query instead of filtering it
pub const RESERVED_KEYS: [&str; 4] = ["page", "sort", "limit", "fields"];

static BRACKET_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^\[\]]+)\[([^\[\]]*)\]$").expect("bracket key regex is valid")
});

/// A single query-string value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// `key=value`
    Single(String),
    /// `key=a&key=b`
    Many(Vec<String>),
    /// `key[op]=value`
    Nested(BTreeMap<String, ParamValue>),
}

impl ParamValue {
    /// The value a scalar consumer should see; repeated keys resolve to the last one
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Self::Single(value) => Some(value),
            Self::Many(values) => values.last().map(String::as_str),
            Self::Nested(_) => None,
        }
    }

    fn push(&mut self, value: String) {
        match self {
            Self::Single(existing) => {
                *self = Self::Many(vec![std::mem::take(existing), value]);
            }
            Self::Many(values) => values.push(value),
            Self::Nested(_) => {}
        }
    }

    fn collapse(self) -> Self {
        match self {
            Self::Many(mut values) => Self::Single(values.pop().unwrap_or_default()),
            Self::Nested(operators) => Self::Nested(
                operators
                    .into_iter()
                    .map(|(operator, value)| (operator, value.collapse()))
                    .collect(),
            ),
            single => single,
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Single(value)
    }
}

/// Mapping from query key to value, as delivered by an HTTP query string
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawQueryParams {
    entries: BTreeMap<String, ParamValue>,
}

impl RawQueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an undecoded query string (`a=1&b[gte]=2`)
    pub fn parse(query: &str) -> Self {
        Self::from_pairs(url::form_urlencoded::parse(query.as_bytes()).into_owned())
    }

    /// Build from already-decoded key/value pairs, in request order
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut params = Self::new();
        for (key, value) in pairs {
            params.append(key.as_ref(), value.into());
        }
        params
    }

    /// Add one pair, applying bracket and repetition rules
    pub fn append(&mut self, key: &str, value: String) {
        if key.is_empty() {
            return;
        }

        if let Some(captures) = BRACKET_KEY.captures(key) {
            let field = captures[1].to_string();
            let operator = captures[2].to_string();
            if operator.is_empty() {
                self.append_plain(field, value);
                return;
            }

            let entry = self
                .entries
                .entry(field)
                .or_insert_with(|| ParamValue::Nested(BTreeMap::new()));
            if !matches!(entry, ParamValue::Nested(_)) {
                *entry = ParamValue::Nested(BTreeMap::new());
            }
            if let ParamValue::Nested(operators) = entry {
                match operators.get_mut(&operator) {
                    Some(existing) => existing.push(value),
                    None => {
                        operators.insert(operator, ParamValue::Single(value));
                    }
                }
            }
            return;
        }

        self.append_plain(key.to_string(), value);
    }

    fn append_plain(&mut self, key: String, value: String) {
        match self.entries.get_mut(&key) {
            Some(existing) => existing.push(value),
            None => {
                self.entries.insert(key, ParamValue::Single(value));
            }
        }
    }

    /// Reduce repeated values to the last one, except under `keep`
    ///
    /// ```rust
    /// use tourbook::query::{ParamValue, RawQueryParams};
    ///
    /// let params = RawQueryParams::parse("name=A&name=B&duration=5&duration=9")
    ///     .collapse_repeated(&["duration"]);
    /// assert_eq!(params.get("name"), Some(&ParamValue::Single("B".into())));
    /// assert!(matches!(params.get("duration"), Some(ParamValue::Many(_))));
    /// ```
    #[must_use]
    pub fn collapse_repeated(self, keep: &[&str]) -> Self {
        let entries = self
            .entries
            .into_iter()
            .map(|(key, value)| {
                let value = if keep.contains(&key.as_str()) {
                    value
                } else {
                    value.collapse()
                };
                (key, value)
            })
            .collect();
        Self { entries }
    }

    /// Replace whatever is stored under `key`
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.get(key)
    }

    /// Scalar value of `key`, if it has one
    pub fn scalar(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ParamValue::as_scalar)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Entries that are not reserved keys
    pub fn filter_entries(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.iter().filter(|(key, _)| !is_reserved(key))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Whether `key` is one of [`RESERVED_KEYS`]
pub fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}
