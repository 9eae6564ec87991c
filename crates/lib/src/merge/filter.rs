//! Path predicates restricting which leaves a merge touches.
//!
//! A filter sees the leaf path and the candidate values on both sides and
//! returns whether the path takes part in the operation. Filters carry no
//! state between calls and compose with [`ItemFilter::and`] and
//! [`ItemFilter::or`].
//!
//! ```
//! use ctxsync::merge::ItemFilter;
//!
//! let filter = ItemFilter::and([
//!     ItemFilter::allow_only(["x"]),
//!     ItemFilter::block_only(["x.y"]),
//! ]);
//! assert!(filter.matches("x.z", None, None));
//! assert!(!filter.matches("x.y", None, None));
//! assert!(!filter.matches("other", None, None));
//! ```

use std::{fmt, sync::Arc};

use regex::Regex;

use super::SyncError;
use crate::{Value, path};

type Predicate = dyn Fn(&str, Option<&Value>, Option<&Value>) -> bool + Send + Sync;

/// A composable path predicate.
#[derive(Clone)]
pub struct ItemFilter {
    label: String,
    predicate: Arc<Predicate>,
}

impl ItemFilter {
    fn new(
        label: impl Into<String>,
        predicate: impl Fn(&str, Option<&Value>, Option<&Value>) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// Accepts every path.
    pub fn allow_all() -> Self {
        Self::new("allowAll", |_, _, _| true)
    }

    /// Accepts paths equal to or underneath one of `paths`.
    pub fn allow_only<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let prefixes = normalized(paths);
        let label = format!("allowOnly({})", prefixes.join(", "));
        Self::new(label, move |candidate, _, _| {
            let candidate = path::normalize_path(candidate);
            prefixes.iter().any(|prefix| path::is_within(&candidate, prefix))
        })
    }

    /// Rejects paths equal to or underneath one of `paths`.
    pub fn block_only<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let prefixes = normalized(paths);
        let label = format!("blockOnly({})", prefixes.join(", "));
        Self::new(label, move |candidate, _, _| {
            let candidate = path::normalize_path(candidate);
            !prefixes.iter().any(|prefix| path::is_within(&candidate, prefix))
        })
    }

    /// Accepts paths matching a regular expression.
    pub fn match_pattern(pattern: &str) -> Result<Self, SyncError> {
        let regex = Regex::new(pattern).map_err(|err| SyncError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: err.to_string(),
        })?;
        Ok(Self::from_regex(regex))
    }

    /// Accepts paths matching an already compiled expression.
    pub fn from_regex(regex: Regex) -> Self {
        let label = format!("matchPattern({})", regex.as_str());
        Self::new(label, move |candidate, _, _| regex.is_match(candidate))
    }

    /// Delegates entirely to caller logic.
    pub fn custom(
        predicate: impl Fn(&str, Option<&Value>, Option<&Value>) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::new("custom", predicate)
    }

    /// Accepts a path only if every filter does. An empty list accepts all.
    pub fn and(filters: impl IntoIterator<Item = ItemFilter>) -> Self {
        let filters: Vec<ItemFilter> = filters.into_iter().collect();
        let label = format!("and({})", labels(&filters));
        Self::new(label, move |candidate, source, target| {
            filters.iter().all(|f| f.matches(candidate, source, target))
        })
    }

    /// Accepts a path if any filter does. An empty list accepts nothing.
    pub fn or(filters: impl IntoIterator<Item = ItemFilter>) -> Self {
        let filters: Vec<ItemFilter> = filters.into_iter().collect();
        let label = format!("or({})", labels(&filters));
        Self::new(label, move |candidate, source, target| {
            filters.iter().any(|f| f.matches(candidate, source, target))
        })
    }

    pub fn matches(&self, path: &str, source: Option<&Value>, target: Option<&Value>) -> bool {
        (self.predicate)(path, source, target)
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for ItemFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ItemFilter").field(&self.label).finish()
    }
}

fn normalized<I, S>(paths: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    paths
        .into_iter()
        .map(|p| path::normalize_path(p.as_ref()))
        .collect()
}

fn labels(filters: &[ItemFilter]) -> String {
    filters
        .iter()
        .map(ItemFilter::label)
        .collect::<Vec<_>>()
        .join(", ")
}
