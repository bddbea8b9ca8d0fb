//! Inbound event classification.
//!
//! RESPONSE events are published into the `EventStore` once per contained
//! message, keyed by that message's correlation id. Everything else is only
//! logged.

use crate::ports::EventHandler;
use crate::store::EventStore;
use chrono::SecondsFormat;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};
use venue_types::{Event, EventType};

/// Counters by event type
#[derive(Debug, Default)]
pub struct HandlerStats {
    pub responses: AtomicU64,
    pub subscription_status: AtomicU64,
    pub subscription_data: AtomicU64,
    pub session_status: AtomicU64,
}

/// Handler that feeds RESPONSE events into an `EventStore`.
pub struct CorrelatingEventHandler {
    store: Arc<EventStore>,
    stats: HandlerStats,
}

impl CorrelatingEventHandler {
    pub fn new(store: Arc<EventStore>) -> Self {
        Self {
            store,
            stats: HandlerStats::default(),
        }
    }

    pub fn store(&self) -> &Arc<EventStore> {
        &self.store
    }

    pub fn stats(&self) -> &HandlerStats {
        &self.stats
    }

    fn handle_response(&self, event: Event) {
        self.stats.responses.fetch_add(1, Ordering::Relaxed);
        // Every message gets the whole event under its own id.
        for correlation_id in event.correlation_ids() {
            debug!(
                correlation_id = %correlation_id,
                messages = event.messages.len(),
                "Received response"
            );
            self.store.publish(correlation_id, event.clone());
        }
    }

    fn log_subscription_data(&self, event: &Event) {
        self.stats.subscription_data.fetch_add(1, Ordering::Relaxed);
        for message in &event.messages {
            let at = message.time.to_rfc3339_opts(SecondsFormat::Millis, true);
            for element in &message.elements {
                let values: Vec<String> = element
                    .iter()
                    .map(|(name, value)| format!("{}={}", name, value))
                    .collect();
                debug!(kind = ?message.kind, at = %at, values = %values.join(" "), "Market data");
            }
        }
    }
}

impl EventHandler for CorrelatingEventHandler {
    fn on_event(&self, event: Event) {
        match event.event_type {
            EventType::Response => self.handle_response(event),
            EventType::SubscriptionData => self.log_subscription_data(&event),
            EventType::SubscriptionStatus => {
                self.stats.subscription_status.fetch_add(1, Ordering::Relaxed);
                for message in &event.messages {
                    info!(kind = ?message.kind, "Subscription status");
                }
            }
            EventType::SessionStatus => {
                self.stats.session_status.fetch_add(1, Ordering::Relaxed);
                for message in &event.messages {
                    info!(kind = ?message.kind, "Session status");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use venue_types::{fields, CorrelationId, Element, Message, MessageKind};

    fn handler() -> CorrelatingEventHandler {
        CorrelatingEventHandler::new(Arc::new(EventStore::new()))
    }

    #[test]
    fn test_response_published_per_message() {
        let handler = handler();
        let event = Event::response(vec![
            Message::new(MessageKind::CreateOrder).with_correlation_id("a".into()),
            Message::new(MessageKind::CreateOrder).with_correlation_id("b".into()),
        ]);

        handler.on_event(event.clone());

        let store = handler.store();
        assert_eq!(store.len(), 2);
        assert_eq!(store.wait_for(&CorrelationId::from("a")), event);
        assert_eq!(store.wait_for(&CorrelationId::from("b")), event);
        assert_eq!(handler.stats().responses.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_uncorrelated_response_keyed_by_empty_id() {
        let handler = handler();
        handler.on_event(Event::response(vec![Message::new(MessageKind::CancelOrder)]));
        assert!(handler.store().contains(&CorrelationId::empty()));
    }

    #[test]
    fn test_non_response_events_do_not_touch_store() {
        let handler = handler();
        let data = Event::new(
            EventType::SubscriptionData,
            vec![Message::new(MessageKind::MarketDepth)
                .with_correlation_id("sub".into())
                .with_element(
                    Element::new()
                        .with(fields::BID_PRICE, "99.5")
                        .with(fields::ASK_PRICE, "100.5"),
                )],
        );
        let status = Event::new(
            EventType::SubscriptionStatus,
            vec![Message::new(MessageKind::SubscriptionStarted)],
        );
        let session = Event::new(
            EventType::SessionStatus,
            vec![Message::new(MessageKind::SessionConnectionUp)],
        );

        handler.on_event(data);
        handler.on_event(status);
        handler.on_event(session);

        assert!(handler.store().is_empty());
        assert_eq!(handler.stats().subscription_data.load(Ordering::Relaxed), 1);
        assert_eq!(handler.stats().subscription_status.load(Ordering::Relaxed), 1);
        assert_eq!(handler.stats().session_status.load(Ordering::Relaxed), 1);
    }
}
