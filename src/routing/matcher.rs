//! Base path matching.
//!
//! # Responsibilities
//! - Decide whether a pathname belongs to a dispatcher
//!
//! # Design Decisions
//! - Plain byte-prefix comparison, not segment-aware: `/foo` matches
//!   `/foobar` as well as `/foo/bar`
//! - Case-sensitive, no normalization of either side
//! - No regex to guarantee O(n) matching

/// Errors raised when building a [`BasePath`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BasePathError {
    #[error("base path must not be empty")]
    Empty,

    #[error("base path `{0}` must start with `/`")]
    NotAbsolute(String),
}

/// The path prefix a dispatcher claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasePath {
    prefix: String,
}

impl BasePath {
    /// Create a new base path. The value is kept verbatim.
    pub fn new(prefix: impl Into<String>) -> Result<Self, BasePathError> {
        let prefix = prefix.into();
        if prefix.is_empty() {
            return Err(BasePathError::Empty);
        }
        if !prefix.starts_with('/') {
            return Err(BasePathError::NotAbsolute(prefix));
        }
        Ok(Self { prefix })
    }

    pub fn as_str(&self) -> &str {
        &self.prefix
    }

    /// Returns true if the first `len(prefix)` bytes of `pathname` equal the prefix.
    pub fn matches(&self, pathname: &str) -> bool {
        pathname.as_bytes().get(..self.prefix.len()) == Some(self.prefix.as_bytes())
    }
}

impl std::fmt::Display for BasePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.prefix)
    }
}
