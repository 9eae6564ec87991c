//! Dot-separated paths into context trees.
//!
//! A path such as `"user.profile.name"` addresses nested containers. Paths
//! are normalized on construction, so leading, trailing and repeated dots are
//! ignored.
//!
//! ```rust
//! use ctxsync::path::PathBuf;
//!
//! let path = PathBuf::new().push("user").push("profile.name");
//! assert_eq!(path.as_str(), "user.profile.name");
//! assert_eq!(path.parent().unwrap().as_str(), "user.profile");
//! assert!(path.is_within("user"));
//! ```

use std::{fmt, str::FromStr};

/// Normalizes a path string by dropping empty components.
///
/// ```rust
/// # use ctxsync::path::normalize_path;
/// assert_eq!(normalize_path(""), "");
/// assert_eq!(normalize_path(".user"), "user");
/// assert_eq!(normalize_path("user..profile."), "user.profile");
/// assert_eq!(normalize_path("..."), "");
/// ```
pub fn normalize_path(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }

    input
        .split('.')
        .filter(|component| !component.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

/// Joins a parent path and a key without re-normalizing the parent.
pub fn join(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

/// Returns true if `path` equals `prefix` or lies underneath it.
pub fn is_within(path: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('.'),
        None => false,
    }
}

/// An owned, normalized path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathBuf {
    inner: String,
}

impl PathBuf {
    /// Creates a new empty path (the container itself).
    pub fn new() -> Self {
        Self {
            inner: String::new(),
        }
    }

    /// Creates a path by normalizing the input string.
    pub fn normalize(path: &str) -> Self {
        Self {
            inner: normalize_path(path),
        }
    }

    /// Appends one or more components.
    pub fn push(mut self, path: impl AsRef<str>) -> Self {
        let normalized = normalize_path(path.as_ref());
        if normalized.is_empty() {
            return self;
        }

        if self.inner.is_empty() {
            self.inner = normalized;
        } else {
            self.inner.push('.');
            self.inner.push_str(&normalized);
        }
        self
    }

    /// Returns an iterator over the path components.
    pub fn components(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.inner.split('.').filter(|s| !s.is_empty())
    }

    /// Returns the number of components in the path.
    pub fn len(&self) -> usize {
        self.components().count()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the parent path, or `None` for single-component and empty paths.
    pub fn parent(&self) -> Option<PathBuf> {
        self.inner.rfind('.').map(|last_dot| PathBuf {
            inner: self.inner[..last_dot].to_string(),
        })
    }

    /// Returns the last component of the path.
    pub fn file_name(&self) -> Option<&str> {
        self.components().next_back()
    }

    /// Splits into the components leading to the final key, and the key.
    pub fn split_last(&self) -> Option<(Vec<&str>, &str)> {
        let mut components: Vec<&str> = self.components().collect();
        let last = components.pop()?;
        Some((components, last))
    }

    /// Returns true if this path equals `prefix` or lies underneath it.
    pub fn is_within(&self, prefix: &str) -> bool {
        is_within(&self.inner, &normalize_path(prefix))
    }

    pub fn as_str(&self) -> &str {
        &self.inner
    }
}

impl FromStr for PathBuf {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(PathBuf::normalize(s))
    }
}

impl From<&str> for PathBuf {
    fn from(s: &str) -> Self {
        PathBuf::normalize(s)
    }
}

impl From<String> for PathBuf {
    fn from(s: String) -> Self {
        PathBuf::normalize(&s)
    }
}

impl AsRef<str> for PathBuf {
    fn as_ref(&self) -> &str {
        &self.inner
    }
}

impl fmt::Display for PathBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner)
    }
}
