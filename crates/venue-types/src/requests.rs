//! # Session Requests
//!
//! Requests produced by the harness. The session decides how they are framed
//! on the wire; this crate only fixes their shape.

use crate::correlation::CorrelationId;
use crate::events::fields;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Request operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    CreateOrder,
    CancelOrder,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::CreateOrder => f.write_str("CREATE_ORDER"),
            Operation::CancelOrder => f.write_str("CANCEL_ORDER"),
        }
    }
}

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            other => Err(format!("unknown side '{}' (expected BUY or SELL)", other)),
        }
    }
}

/// Named credential values for a venue.
///
/// `Debug` never prints the raw values.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    values: BTreeMap<String, String>,
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Name to masked-value pairs, safe to log.
    pub fn masked(&self) -> BTreeMap<&str, String> {
        self.values
            .iter()
            .map(|(k, v)| (k.as_str(), mask(v)))
            .collect()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.masked()).finish()
    }
}

/// Keep a short prefix of long secrets so operators can tell keys apart.
fn mask(value: &str) -> String {
    if value.chars().count() > 8 {
        let prefix: String = value.chars().take(4).collect();
        format!("{}****", prefix)
    } else {
        "****".to_string()
    }
}

/// A request sent through a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub operation: Operation,
    /// Target venue, e.g. `kucoin`
    pub venue: String,
    /// Venue instrument symbol
    pub instrument: String,
    #[serde(skip)]
    pub credentials: Credentials,
    /// Operation-specific parameters
    pub params: BTreeMap<String, String>,
    pub correlation_id: CorrelationId,
}

impl Request {
    pub fn new(
        operation: Operation,
        venue: impl Into<String>,
        instrument: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        Self {
            operation,
            venue: venue.into(),
            instrument: instrument.into(),
            credentials,
            params: BTreeMap::new(),
            correlation_id: CorrelationId::empty(),
        }
    }

    /// Build a limit order creation request
    pub fn create_order(
        venue: impl Into<String>,
        instrument: impl Into<String>,
        credentials: Credentials,
        side: Side,
        quantity: &str,
        limit_price: &str,
        client_order_id: &str,
    ) -> Self {
        Self::new(Operation::CreateOrder, venue, instrument, credentials)
            .with_param(fields::SIDE, side.as_str())
            .with_param(fields::QUANTITY, quantity)
            .with_param(fields::LIMIT_PRICE, limit_price)
            .with_param(fields::CLIENT_ORDER_ID, client_order_id)
    }

    /// Build a cancellation request for a venue order id
    pub fn cancel_order(
        venue: impl Into<String>,
        instrument: impl Into<String>,
        credentials: Credentials,
        order_id: &str,
    ) -> Self {
        Self::new(Operation::CancelOrder, venue, instrument, credentials)
            .with_param(fields::ORDER_ID, order_id)
    }

    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn set_correlation_id(&mut self, correlation_id: CorrelationId) {
        self.correlation_id = correlation_id;
    }
}
