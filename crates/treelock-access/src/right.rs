//! Hierarchical rights and their conflict relation

use std::fmt;

use serde::{Deserialize, Serialize};

/// One path segment of a hierarchical right
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RightKey(String);

impl RightKey {
    pub fn new(key: impl Into<String>) -> Self {
        RightKey(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RightKey {
    fn from(key: &str) -> Self {
        RightKey(key.to_string())
    }
}

impl From<String> for RightKey {
    fn from(key: String) -> Self {
        RightKey(key)
    }
}

impl fmt::Display for RightKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A path-identified resource locus in a right tree
///
/// Rights form a tree keyed by path segments. The empty path is the
/// universal right. Two rights conflict iff one's path is a prefix of the
/// other's (so a right conflicts with itself, every ancestor and every
/// descendant), which makes the universal right conflict with everything.
/// Instances are immutable value types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HierarchicalRight {
    path: Vec<RightKey>,
}

impl HierarchicalRight {
    /// The universal right (empty path)
    pub fn universal() -> Self {
        Self { path: Vec::new() }
    }

    /// Right identified by the given path; an empty path is the universal
    /// right
    pub fn create<I, K>(path: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<RightKey>,
    {
        Self {
            path: path.into_iter().map(Into::into).collect(),
        }
    }

    /// New right with one more path segment appended
    pub fn sub_right(&self, key: impl Into<RightKey>) -> Self {
        let mut path = self.path.clone();
        path.push(key.into());
        Self { path }
    }

    /// Parent right, or `None` for the universal right
    pub fn parent(&self) -> Option<Self> {
        if self.path.is_empty() {
            return None;
        }
        Some(Self {
            path: self.path[..self.path.len() - 1].to_vec(),
        })
    }

    pub fn is_universal(&self) -> bool {
        self.path.is_empty()
    }

    pub fn keys(&self) -> &[RightKey] {
        &self.path
    }

    /// Whether `other` is this right or one of its descendants
    pub fn is_parent_or_self_of(&self, other: &HierarchicalRight) -> bool {
        other.path.starts_with(&self.path)
    }

    /// Symmetric conflict relation: prefix comparison in O(min(|a|, |b|))
    pub fn conflicts_with(&self, other: &HierarchicalRight) -> bool {
        self.is_parent_or_self_of(other) || other.is_parent_or_self_of(self)
    }
}

impl fmt::Display for HierarchicalRight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            return write!(f, "/");
        }
        for key in &self.path {
            write!(f, "/{key}")?;
        }
        Ok(())
    }
}
