//! Identifier types for exchange entities

use serde::{Deserialize, Serialize};
use std::fmt;

/// Client-supplied identifier for an order.
///
/// Ids arrive from the submitting client as plain 64-bit integers. The
/// engine does not require them to be globally unique; two orders carrying
/// the same id are distinct orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(u64);

impl OrderId {
    /// Create an OrderId from a raw client-supplied value
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw id value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for OrderId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
