//! Request correlator - sends a request and blocks for its response.

use crate::error::{LatencyError, LatencyResult};
use crate::ports::Session;
use crate::store::EventStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use venue_types::{CorrelationId, Event, Request};

/// Bridges a fire-and-forget session into blocking request/response calls.
///
/// The entry left in the store after a successful call belongs to the
/// caller, who removes it with [`RequestCorrelator::release`] once the
/// fields it needs have been read.
pub struct RequestCorrelator {
    session: Arc<dyn Session>,
    store: Arc<EventStore>,
    /// Per-request deadline; `None` waits indefinitely
    timeout: Option<Duration>,
}

impl RequestCorrelator {
    pub fn new(
        session: Arc<dyn Session>,
        store: Arc<EventStore>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            session,
            store,
            timeout,
        }
    }

    /// Send `request` tagged with `correlation_id` and wait for the matching event.
    ///
    /// A failed send returns `Transport` without waiting.
    pub fn send_and_await(
        &self,
        mut request: Request,
        correlation_id: &CorrelationId,
    ) -> LatencyResult<Event> {
        if self.store.contains(correlation_id) {
            warn!(
                correlation_id = %correlation_id,
                "Correlation ID already has an unconsumed event; match is ambiguous"
            );
        }

        let operation = request.operation;
        request.set_correlation_id(correlation_id.clone());

        self.session
            .send(request)
            .map_err(|source| LatencyError::Transport {
                correlation_id: correlation_id.clone(),
                source,
            })?;

        debug!(
            correlation_id = %correlation_id,
            operation = %operation,
            "Sent request"
        );

        self.store.wait(correlation_id, self.timeout)
    }

    /// Drop the stored event for `correlation_id`.
    pub fn release(&self, correlation_id: &CorrelationId) {
        self.store.remove(correlation_id);
    }

    /// Stop the underlying session.
    pub fn shutdown(&self) {
        self.session.stop();
    }

    pub fn store(&self) -> &Arc<EventStore> {
        &self.store
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use parking_lot::Mutex;
    use std::time::Instant;
    use venue_types::{fields, Credentials, Element, Message, MessageKind};

    /// Session that records requests and optionally answers them inline.
    struct RecordingSession {
        store: Arc<EventStore>,
        fail_with: Option<TransportError>,
        answer: bool,
        sent: Mutex<Vec<Request>>,
    }

    impl Session for RecordingSession {
        fn send(&self, request: Request) -> Result<(), TransportError> {
            if let Some(err) = &self.fail_with {
                return Err(err.clone());
            }
            if self.answer {
                let event = Event::response(vec![Message::new(MessageKind::CreateOrder)
                    .with_correlation_id(request.correlation_id.clone())
                    .with_element(Element::new().with(fields::ORDER_ID, "42"))]);
                self.store.publish(request.correlation_id.clone(), event);
            }
            self.sent.lock().push(request);
            Ok(())
        }

        fn stop(&self) {}
    }

    fn setup(
        fail_with: Option<TransportError>,
        answer: bool,
    ) -> (Arc<RecordingSession>, RequestCorrelator) {
        let store = Arc::new(EventStore::new());
        let session = Arc::new(RecordingSession {
            store: Arc::clone(&store),
            fail_with,
            answer,
            sent: Mutex::new(Vec::new()),
        });
        let correlator = RequestCorrelator::new(
            Arc::clone(&session) as Arc<dyn Session>,
            store,
            Some(Duration::from_millis(50)),
        );
        (session, correlator)
    }

    fn create_request() -> Request {
        Request::create_order(
            "sim",
            "BTC-USDT",
            Credentials::new(),
            venue_types::Side::Buy,
            "0.05",
            "100",
            "client-1",
        )
    }

    #[test]
    fn test_request_is_tagged_with_correlation_id() {
        let (session, correlator) = setup(None, true);
        let id = CorrelationId::create_order(0);

        let event = correlator.send_and_await(create_request(), &id).unwrap();

        assert_eq!(event.first_value(fields::ORDER_ID), Some("42"));
        assert_eq!(session.sent.lock()[0].correlation_id, id);
        assert!(correlator.store().contains(&id));

        correlator.release(&id);
        assert!(correlator.store().is_empty());
    }

    #[test]
    fn test_transport_failure_skips_wait() {
        let (_session, correlator) = setup(Some(TransportError::SessionStopped), false);
        let id = CorrelationId::create_order(0);

        let start = Instant::now();
        let result = correlator.send_and_await(create_request(), &id);

        assert!(matches!(
            result,
            Err(LatencyError::Transport {
                source: TransportError::SessionStopped,
                ..
            })
        ));
        assert!(start.elapsed() < Duration::from_millis(50));
        assert_eq!(
            correlator
                .store()
                .stats()
                .total_timeouts
                .load(std::sync::atomic::Ordering::Relaxed),
            0
        );
    }

    #[test]
    fn test_unanswered_request_times_out() {
        let (session, correlator) = setup(None, false);
        let id = CorrelationId::delete_order(3);

        let result = correlator.send_and_await(create_request(), &id);

        assert!(matches!(
            result,
            Err(LatencyError::CorrelationTimeout { timeout, .. }) if timeout == Duration::from_millis(50)
        ));
        assert_eq!(session.sent.lock().len(), 1);
    }
}
