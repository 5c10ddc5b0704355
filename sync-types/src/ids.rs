//! Identity and scoping types for issue-sync.

use crate::RecordError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The scope key every stored row carries: a repository in `owner/name` form.
///
/// Scope keys are compared exactly as written. `Owner/Repo` and `owner/repo`
/// are two different scopes.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoScope {
    full_name: String,
    split: usize,
}

impl RepoScope {
    /// Parse an `owner/name` repository identifier.
    pub fn parse(value: &str) -> Result<Self, RecordError> {
        let invalid = || RecordError::InvalidScope(value.to_string());

        let (owner, name) = value.split_once('/').ok_or_else(invalid)?;
        let well_formed = |part: &str| {
            !part.is_empty() && !part.contains('/') && !part.chars().any(char::is_whitespace)
        };
        if !well_formed(owner) || !well_formed(name) {
            return Err(invalid());
        }

        Ok(Self {
            full_name: value.to_string(),
            split: owner.len(),
        })
    }

    /// Repository owner (user or organization).
    pub fn owner(&self) -> &str {
        &self.full_name[..self.split]
    }

    /// Repository name without the owner.
    pub fn name(&self) -> &str {
        &self.full_name[self.split + 1..]
    }

    /// The full `owner/name` string, as stored in the scope column.
    pub fn as_str(&self) -> &str {
        &self.full_name
    }
}

impl FromStr for RepoScope {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RepoScope {
    type Error = RecordError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RepoScope> for String {
    fn from(scope: RepoScope) -> Self {
        scope.full_name
    }
}

impl fmt::Display for RepoScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}

impl fmt::Debug for RepoScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RepoScope({})", self.full_name)
    }
}

/// Stable remote id of an issue (primary key of the issues table).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueId(i64);

impl IssueId {
    /// Wrap a remote issue id.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Get the numeric value of this id.
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IssueId({})", self.0)
    }
}

/// Stable remote id of a comment.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(i64);

impl CommentId {
    /// Wrap a remote comment id.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Get the numeric value of this id.
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommentId({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_splits_owner_and_name() {
        let scope = RepoScope::parse("rust-lang/cargo").unwrap();
        assert_eq!(scope.owner(), "rust-lang");
        assert_eq!(scope.name(), "cargo");
        assert_eq!(scope.as_str(), "rust-lang/cargo");
        assert_eq!(scope.to_string(), "rust-lang/cargo");
    }

    #[test]
    fn scope_rejects_malformed_names() {
        for bad in ["", "cargo", "/cargo", "rust-lang/", "a/b/c", "a b/c", "a/ b"] {
            assert!(RepoScope::parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn scope_is_case_sensitive() {
        let lower = RepoScope::parse("owner/repo").unwrap();
        let upper = RepoScope::parse("Owner/Repo").unwrap();
        assert_ne!(lower, upper);
    }

    #[test]
    fn scope_serde_validates() {
        let scope: RepoScope = serde_json::from_str("\"octo/hello\"").unwrap();
        assert_eq!(scope.name(), "hello");
        assert!(serde_json::from_str::<RepoScope>("\"nope\"").is_err());
        assert_eq!(serde_json::to_string(&scope).unwrap(), "\"octo/hello\"");
    }

    #[test]
    fn issue_id_ordering() {
        assert!(IssueId::new(1) < IssueId::new(2));
        assert_eq!(IssueId::new(7).value(), 7);
        assert_eq!(format!("{:?}", CommentId::new(3)), "CommentId(3)");
    }
}
