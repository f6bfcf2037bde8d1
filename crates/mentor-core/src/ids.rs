//! Newtype wrapper for run identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path};

use crate::error::CoreError;

/// Identifier of a training run.
///
/// Run ids double as directory names under the results root, so they are
/// caller-chosen or derived from the trainer config rather than random.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Create a new RunId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parse a caller-supplied id.
    ///
    /// The id becomes a directory under the results root, so it must be a
    /// single normal path component: no separators, `.`, `..` or roots.
    pub fn parse(id: &str) -> Result<Self, CoreError> {
        let mut components = Path::new(id).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) if name == id => Ok(Self::new(id)),
            _ => Err(CoreError::InvalidOptions(format!(
                "Run id '{id}' must be a single directory name."
            ))),
        }
    }

    /// Get the inner string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RunId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl AsRef<str> for RunId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display() {
        let id = RunId::new("run-3dball-20250101-120000");
        assert_eq!(format!("{}", id), "run-3dball-20250101-120000");
    }

    #[test]
    fn test_parse_accepts_plain_names() {
        assert_eq!(RunId::parse("run-3dball_1").unwrap().as_str(), "run-3dball_1");
        assert_eq!(RunId::parse("v1.2").unwrap().as_str(), "v1.2");
    }

    #[test]
    fn test_parse_rejects_paths() {
        for bad in ["../escaped", "..", ".", "/abs", "a/b", "a/", "./a", ""] {
            let err = RunId::parse(bad).unwrap_err();
            assert!(matches!(err, CoreError::InvalidOptions(_)), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_id_serializes_as_plain_string() {
        let id = RunId::from("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
    }
}
