//! # Session Events
//!
//! Everything a trading session delivers to its handler is an `Event`: a type
//! tag, a timestamp and an ordered list of `Message`s. Each message carries at
//! most one correlation id and an ordered list of `Element`s.

use crate::correlation::CorrelationId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Well-known element names.
pub mod fields {
    pub const ORDER_ID: &str = "ORDER_ID";
    pub const CLIENT_ORDER_ID: &str = "CLIENT_ORDER_ID";
    pub const SIDE: &str = "SIDE";
    pub const QUANTITY: &str = "QUANTITY";
    pub const LIMIT_PRICE: &str = "LIMIT_PRICE";
    pub const ERROR_MESSAGE: &str = "ERROR_MESSAGE";
    pub const BID_PRICE: &str = "BID_PRICE";
    pub const BID_SIZE: &str = "BID_SIZE";
    pub const ASK_PRICE: &str = "ASK_PRICE";
    pub const ASK_SIZE: &str = "ASK_SIZE";
}

/// Event classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// Answer to a request; the only type that carries correlations.
    Response,
    /// Subscription lifecycle notice.
    SubscriptionStatus,
    /// Market data pushed for an active subscription.
    SubscriptionData,
    /// Connection lifecycle notice.
    SessionStatus,
}

/// What a single message inside an event is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    CreateOrder,
    CancelOrder,
    /// The venue rejected the request; see `ERROR_MESSAGE`.
    ResponseError,
    MarketDepth,
    SubscriptionStarted,
    SessionConnectionUp,
    SessionConnectionDown,
}

/// Ordered name to value mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Element {
    values: BTreeMap<String, String>,
}

impl Element {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Look up a value by element name
    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One unit of an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Zero or one correlation ids
    correlation_id: Option<CorrelationId>,
    /// Message kind
    pub kind: MessageKind,
    /// When the venue produced this message
    pub time: DateTime<Utc>,
    /// Ordered elements
    pub elements: Vec<Element>,
}

impl Message {
    /// Create an uncorrelated message stamped with the current time
    pub fn new(kind: MessageKind) -> Self {
        Self {
            correlation_id: None,
            kind,
            time: Utc::now(),
            elements: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    #[must_use]
    pub fn with_element(mut self, element: Element) -> Self {
        self.elements.push(element);
        self
    }

    pub fn correlation_id(&self) -> Option<&CorrelationId> {
        self.correlation_id.as_ref()
    }

    /// Correlation id, or the empty id when the message carries none.
    pub fn correlation_id_or_empty(&self) -> CorrelationId {
        self.correlation_id.clone().unwrap_or_default()
    }

    /// Value of `name` in the first element, if any
    pub fn first_value(&self, name: &str) -> Option<&str> {
        self.elements.first().and_then(|e| e.value(name))
    }
}

/// Immutable record delivered by a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub time: DateTime<Utc>,
    pub messages: Vec<Message>,
}

impl Event {
    pub fn new(event_type: EventType, messages: Vec<Message>) -> Self {
        Self {
            event_type,
            time: Utc::now(),
            messages,
        }
    }

    /// Convenience constructor for a `RESPONSE` event
    pub fn response(messages: Vec<Message>) -> Self {
        Self::new(EventType::Response, messages)
    }

    /// Value of `name` in the first element of the first message.
    pub fn first_value(&self, name: &str) -> Option<&str> {
        self.messages.first().and_then(|m| m.first_value(name))
    }

    /// Correlation ids of all messages, in message order.
    pub fn correlation_ids(&self) -> impl Iterator<Item = CorrelationId> + '_ {
        self.messages.iter().map(Message::correlation_id_or_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_response(id: &str, order_id: &str) -> Event {
        Event::response(vec![Message::new(MessageKind::CreateOrder)
            .with_correlation_id(CorrelationId::from(id))
            .with_element(Element::new().with(fields::ORDER_ID, order_id))])
    }

    #[test]
    fn test_first_value() {
        let event = order_response("create_order_0", "42");
        assert_eq!(event.first_value(fields::ORDER_ID), Some("42"));
        assert_eq!(event.first_value(fields::CLIENT_ORDER_ID), None);
    }

    #[test]
    fn test_first_value_without_elements() {
        let event = Event::response(vec![Message::new(MessageKind::CreateOrder)]);
        assert_eq!(event.first_value(fields::ORDER_ID), None);

        let empty = Event::response(vec![]);
        assert_eq!(empty.first_value(fields::ORDER_ID), None);
    }

    #[test]
    fn test_uncorrelated_message_maps_to_empty_id() {
        let event = Event::response(vec![
            Message::new(MessageKind::CreateOrder),
            Message::new(MessageKind::CancelOrder).with_correlation_id("x".into()),
        ]);
        let ids: Vec<_> = event.correlation_ids().collect();
        assert_eq!(ids, vec![CorrelationId::empty(), CorrelationId::from("x")]);
    }

    #[test]
    fn test_element_iteration_is_ordered() {
        let element = Element::new()
            .with(fields::BID_PRICE, "99.5")
            .with(fields::ASK_PRICE, "100.5");
        let names: Vec<_> = element.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec![fields::ASK_PRICE, fields::BID_PRICE]);
    }

    #[test]
    fn test_event_type_serialization() {
        let json = serde_json::to_string(&EventType::SubscriptionData).unwrap();
        assert_eq!(json, "\"SUBSCRIPTION_DATA\"");
    }
}
