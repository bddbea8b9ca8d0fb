//! Correlation ID for request/response matching.
//!
//! Unlike a generated identifier, the harness picks these itself so the id is
//! readable in logs (`create_order_3`, `delete_order_3`).

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Caller-assigned token linking an outstanding request to its response.
///
/// Messages that carry no correlation id are keyed under the empty id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Create from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id used for messages that carry no correlation
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// Correlation id for the create phase of iteration `iteration`
    pub fn create_order(iteration: usize) -> Self {
        Self(format!("create_order_{}", iteration))
    }

    /// Correlation id for the cancel phase of iteration `iteration`
    pub fn delete_order(iteration: usize) -> Self {
        Self(format!("delete_order_{}", iteration))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for CorrelationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for CorrelationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for CorrelationId {
    fn borrow(&self) -> &str {
        &self.0
    }
}
