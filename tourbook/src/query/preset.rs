//! Named query presets
//!
//! A preset overwrites reserved keys of an incoming [`RawQueryParams`] before
//! the builder sees it, so an alias route reuses the ordinary list path.

use super::params::RawQueryParams;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPreset {
    overrides: Vec<(&'static str, String)>,
}

impl QueryPreset {
    pub fn new() -> Self {
        Self {
            overrides: Vec::new(),
        }
    }

    #[must_use]
    pub fn set(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.overrides.push((key, value.into()));
        self
    }

    /// Five best-rated tours, cheapest first among equals
    pub fn top_five_cheap() -> Self {
        Self::new()
            .set("limit", "5")
            .set("sort", "-ratingsAverage,price")
            .set("fields", "name,price,ratingsAverage,summary,difficulty")
    }

    /// `params` with every override applied; other keys are untouched
    pub fn apply(&self, params: RawQueryParams) -> RawQueryParams {
        self.overrides
            .iter()
            .fold(params, |params, (key, value)| params.with(*key, value.as_str()))
    }
}

impl Default for QueryPreset {
    fn default() -> Self {
        Self::new()
    }
}
