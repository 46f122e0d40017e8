use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque catalog item identifier. Stable across the system; a UUID for catalog-created
/// items, but never parsed as one by this crate — callers that mint new ones use `Uuid`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GoodId(pub String);

impl GoodId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GoodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for GoodId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for GoodId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Opaque warehouse identifier, embedded in subject names so each warehouse self-filters
/// (e.g. `stock_updates.<warehouse-id>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WarehouseId(pub String);

impl WarehouseId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WarehouseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for WarehouseId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for WarehouseId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
