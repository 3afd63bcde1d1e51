//! Access request value types

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::right::HierarchicalRight;

/// Identifier correlating grants, releases and diagnostics
///
/// Identifies the logical owner of a request; not used for conflict
/// computation and not required to be unique across requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccessId(String);

impl AccessId {
    pub fn new(id: impl Into<String>) -> Self {
        AccessId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AccessId {
    fn from(id: &str) -> Self {
        AccessId(id.to_string())
    }
}

impl From<String> for AccessId {
    fn from(id: String) -> Self {
        AccessId(id)
    }
}

impl fmt::Display for AccessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Named bundle of read and write rights requested together
///
/// Built by the caller per acquisition attempt; immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessRequest {
    id: AccessId,
    read_rights: Vec<HierarchicalRight>,
    write_rights: Vec<HierarchicalRight>,
}

impl AccessRequest {
    /// Request for the given read and write rights
    ///
    /// Fails with `Error::EmptyRequest` when both collections are empty.
    pub fn new(
        id: impl Into<AccessId>,
        read_rights: Vec<HierarchicalRight>,
        write_rights: Vec<HierarchicalRight>,
    ) -> Result<Self> {
        if read_rights.is_empty() && write_rights.is_empty() {
            return Err(Error::EmptyRequest);
        }
        Ok(Self {
            id: id.into(),
            read_rights,
            write_rights,
        })
    }

    /// Request for a single read right
    pub fn read(id: impl Into<AccessId>, right: HierarchicalRight) -> Self {
        Self {
            id: id.into(),
            read_rights: vec![right],
            write_rights: Vec::new(),
        }
    }

    /// Request for a single write right
    pub fn write(id: impl Into<AccessId>, right: HierarchicalRight) -> Self {
        Self {
            id: id.into(),
            read_rights: Vec::new(),
            write_rights: vec![right],
        }
    }

    pub fn id(&self) -> &AccessId {
        &self.id
    }

    pub fn read_rights(&self) -> &[HierarchicalRight] {
        &self.read_rights
    }

    pub fn write_rights(&self) -> &[HierarchicalRight] {
        &self.write_rights
    }
}
