//! # Simulated Venue Session
//!
//! A `Session` backed by an in-process venue. The session owns a tokio
//! runtime; `send` only enqueues, and every response is delivered to the
//! handler from a runtime worker thread after a jittered delay, the way a
//! real exchange connection would call back.
//!
//! ## Venue Behaviour
//!
//! | Request | Response message |
//! |---------|------------------|
//! | `CREATE_ORDER` | `CREATE_ORDER` with a fresh `ORDER_ID` and the echoed `CLIENT_ORDER_ID` |
//! | `CANCEL_ORDER`, known order | `CANCEL_ORDER` with the cancelled `ORDER_ID` |
//! | `CANCEL_ORDER`, unknown order | `RESPONSE_ERROR` with `ERROR_MESSAGE` |

use latency_core::{EventHandler, Session, TransportError};
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};
use uuid::Uuid;
use venue_types::{fields, Element, Event, EventType, Message, MessageKind, Operation, Request};

/// Simulated venue timing and feeds.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Base one-way response delay
    pub latency: Duration,
    /// Uniform spread applied around `latency`
    pub jitter: Duration,
    /// Emit periodic best bid/ask events
    pub market_data: bool,
    pub market_data_interval: Duration,
    /// Mid price the book starts from
    pub reference_price: f64,
    pub worker_threads: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(20),
            jitter: Duration::from_millis(5),
            market_data: false,
            market_data_interval: Duration::from_millis(500),
            reference_price: 100.0,
            worker_threads: 2,
        }
    }
}

impl SimulationConfig {
    /// Pick a delay in `[latency - jitter, latency + jitter]`.
    pub fn sample_delay<R: Rng>(&self, rng: &mut R) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.latency;
        }
        let offset = rng.gen_range(0..=2 * jitter_ms);
        self.latency.saturating_sub(self.jitter) + Duration::from_millis(offset)
    }
}

/// Order book of the simulated venue: open order id to client order id.
#[derive(Debug, Default)]
pub struct SimulatedVenue {
    open_orders: HashMap<String, String>,
}

impl SimulatedVenue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce the RESPONSE event for `request`.
    pub fn respond(&mut self, request: &Request) -> Event {
        let message = match request.operation {
            Operation::CreateOrder => {
                let order_id = Uuid::new_v4().to_string();
                let client_order_id = request
                    .param(fields::CLIENT_ORDER_ID)
                    .unwrap_or_default()
                    .to_string();
                self.open_orders
                    .insert(order_id.clone(), client_order_id.clone());

                Message::new(MessageKind::CreateOrder).with_element(
                    Element::new()
                        .with(fields::ORDER_ID, order_id)
                        .with(fields::CLIENT_ORDER_ID, client_order_id),
                )
            }
            Operation::CancelOrder => {
                let order_id = request.param(fields::ORDER_ID).unwrap_or_default();
                if self.open_orders.remove(order_id).is_some() {
                    Message::new(MessageKind::CancelOrder)
                        .with_element(Element::new().with(fields::ORDER_ID, order_id))
                } else {
                    Message::new(MessageKind::ResponseError).with_element(
                        Element::new()
                            .with(fields::ERROR_MESSAGE, format!("order {} not found", order_id)),
                    )
                }
            }
        };

        Event::response(vec![message.with_correlation_id(request.correlation_id.clone())])
    }

    pub fn open_orders(&self) -> usize {
        self.open_orders.len()
    }
}

/// Session statistics
#[derive(Debug, Default)]
pub struct SessionStats {
    pub requests_sent: AtomicU64,
    pub responses_delivered: AtomicU64,
    pub market_data_events: AtomicU64,
}

/// Session talking to a [`SimulatedVenue`].
pub struct SimulatedSession {
    runtime: Mutex<Option<Runtime>>,
    sender: Mutex<Option<mpsc::UnboundedSender<Request>>>,
    shutdown_tx: watch::Sender<bool>,
    handler: Arc<dyn EventHandler>,
    stats: Arc<SessionStats>,
}

impl SimulatedSession {
    /// Start the runtime and connect.
    ///
    /// A `SESSION_STATUS` connection-up event is delivered before any response.
    pub fn start(
        config: SimulationConfig,
        instrument: &str,
        handler: Arc<dyn EventHandler>,
    ) -> Result<Self, TransportError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.worker_threads.max(1))
            .thread_name("sim-venue")
            .enable_time()
            .build()
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel::<Request>();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stats = Arc::new(SessionStats::default());

        // Connection-up is delivered before `start` returns.
        let connected = Arc::clone(&handler);
        runtime
            .block_on(runtime.spawn(async move {
                connected.on_event(Event::new(
                    EventType::SessionStatus,
                    vec![Message::new(MessageKind::SessionConnectionUp)],
                ));
            }))
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;

        runtime.spawn(deliver_responses(
            rx,
            config.clone(),
            Arc::clone(&handler),
            Arc::clone(&stats),
        ));

        if config.market_data {
            runtime.spawn(stream_market_data(
                instrument.to_string(),
                config.clone(),
                Arc::clone(&handler),
                Arc::clone(&stats),
                shutdown_rx,
            ));
        }

        info!(
            instrument = %instrument,
            latency_ms = config.latency.as_millis() as u64,
            jitter_ms = config.jitter.as_millis() as u64,
            market_data = config.market_data,
            "Simulated session started"
        );

        Ok(Self {
            runtime: Mutex::new(Some(runtime)),
            sender: Mutex::new(Some(tx)),
            shutdown_tx,
            handler,
            stats,
        })
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }
}

impl Session for SimulatedSession {
    fn send(&self, request: Request) -> Result<(), TransportError> {
        let guard = self.sender.lock();
        let Some(tx) = guard.as_ref() else {
            return Err(TransportError::SessionStopped);
        };
        tx.send(request).map_err(|_| TransportError::ChannelClosed)?;
        self.stats.requests_sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn stop(&self) {
        if self.sender.lock().take().is_none() {
            return;
        }
        let _ = self.shutdown_tx.send(true);

        if let Some(runtime) = self.runtime.lock().take() {
            runtime.shutdown_timeout(Duration::from_secs(1));
        }

        self.handler.on_event(Event::new(
            EventType::SessionStatus,
            vec![Message::new(MessageKind::SessionConnectionDown)],
        ));
        info!(
            requests = self.stats.requests_sent.load(Ordering::Relaxed),
            responses = self.stats.responses_delivered.load(Ordering::Relaxed),
            "Simulated session stopped"
        );
    }
}

impl Drop for SimulatedSession {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn deliver_responses(
    mut rx: mpsc::UnboundedReceiver<Request>,
    config: SimulationConfig,
    handler: Arc<dyn EventHandler>,
    stats: Arc<SessionStats>,
) {
    let venue = Arc::new(Mutex::new(SimulatedVenue::new()));

    while let Some(request) = rx.recv().await {
        let delay = config.sample_delay(&mut rand::thread_rng());
        let venue = Arc::clone(&venue);
        let handler = Arc::clone(&handler);
        let stats = Arc::clone(&stats);

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let event = venue.lock().respond(&request);
            debug!(
                correlation_id = %request.correlation_id,
                operation = %request.operation,
                delay_ms = delay.as_millis() as u64,
                "Delivering simulated response"
            );
            handler.on_event(event);
            stats.responses_delivered.fetch_add(1, Ordering::Relaxed);
        });
    }
    debug!("Request channel closed; delivery loop exiting");
}

async fn stream_market_data(
    instrument: String,
    config: SimulationConfig,
    handler: Arc<dyn EventHandler>,
    stats: Arc<SessionStats>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    handler.on_event(Event::new(
        EventType::SubscriptionStatus,
        vec![Message::new(MessageKind::SubscriptionStarted).with_element(
            Element::new().with("INSTRUMENT", instrument.as_str()),
        )],
    ));

    let mut interval = tokio::time::interval(config.market_data_interval);
    let mut mid = config.reference_price;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let (bid, ask, bid_size, ask_size) = {
                    let mut rng = rand::thread_rng();
                    mid *= 1.0 + rng.gen_range(-0.0005..0.0005);
                    let half_spread = mid * 0.0001;
                    (
                        mid - half_spread,
                        mid + half_spread,
                        rng.gen_range(0.1..5.0),
                        rng.gen_range(0.1..5.0),
                    )
                };
                handler.on_event(Event::new(
                    EventType::SubscriptionData,
                    vec![Message::new(MessageKind::MarketDepth).with_element(
                        Element::new()
                            .with(fields::BID_PRICE, format!("{:.4}", bid))
                            .with(fields::BID_SIZE, format!("{:.4}", bid_size))
                            .with(fields::ASK_PRICE, format!("{:.4}", ask))
                            .with(fields::ASK_SIZE, format!("{:.4}", ask_size)),
                    )],
                ));
                stats.market_data_events.fetch_add(1, Ordering::Relaxed);
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
    debug!(instrument = %instrument, "Market data stream ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use latency_core::{CorrelatingEventHandler, EventStore};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use venue_types::{CorrelationId, Credentials, Side};

    fn create(id: CorrelationId) -> Request {
        let mut request = Request::create_order(
            "sim",
            "BTC-USDT",
            Credentials::new(),
            Side::Sell,
            "0.05",
            "100",
            "client-9",
        );
        request.set_correlation_id(id);
        request
    }

    fn cancel(id: CorrelationId, order_id: &str) -> Request {
        let mut request = Request::cancel_order("sim", "BTC-USDT", Credentials::new(), order_id);
        request.set_correlation_id(id);
        request
    }

    #[test]
    fn test_venue_create_then_cancel() {
        let mut venue = SimulatedVenue::new();

        let created = venue.respond(&create(CorrelationId::create_order(0)));
        let order_id = created.first_value(fields::ORDER_ID).unwrap().to_string();
        assert_eq!(created.first_value(fields::CLIENT_ORDER_ID), Some("client-9"));
        assert_eq!(
            created.correlation_ids().next(),
            Some(CorrelationId::create_order(0))
        );
        assert_eq!(venue.open_orders(), 1);

        let cancelled = venue.respond(&cancel(CorrelationId::delete_order(0), &order_id));
        assert_eq!(cancelled.messages[0].kind, MessageKind::CancelOrder);
        assert_eq!(cancelled.first_value(fields::ORDER_ID), Some(order_id.as_str()));
        assert_eq!(venue.open_orders(), 0);
    }

    #[test]
    fn test_venue_rejects_unknown_cancel() {
        let mut venue = SimulatedVenue::new();
        let event = venue.respond(&cancel(CorrelationId::delete_order(1), "nope"));
        assert_eq!(event.messages[0].kind, MessageKind::ResponseError);
        assert_eq!(
            event.first_value(fields::ERROR_MESSAGE),
            Some("order nope not found")
        );
    }

    #[test]
    fn test_delay_within_jitter_band() {
        let config = SimulationConfig {
            latency: Duration::from_millis(20),
            jitter: Duration::from_millis(5),
            ..SimulationConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let delay = config.sample_delay(&mut rng);
            assert!(delay >= Duration::from_millis(15) && delay <= Duration::from_millis(25));
        }

        let fixed = SimulationConfig {
            jitter: Duration::ZERO,
            ..config
        };
        assert_eq!(fixed.sample_delay(&mut rng), Duration::from_millis(20));
    }

    #[test]
    fn test_session_delivers_to_store() {
        let store = Arc::new(EventStore::new());
        let handler = Arc::new(CorrelatingEventHandler::new(Arc::clone(&store)));
        let config = SimulationConfig {
            latency: Duration::from_millis(2),
            jitter: Duration::from_millis(1),
            ..SimulationConfig::default()
        };
        let session = SimulatedSession::start(config, "BTC-USDT", handler.clone()).unwrap();

        session.send(create(CorrelationId::create_order(0))).unwrap();
        let event = store
            .wait_for_timeout(&CorrelationId::create_order(0), Duration::from_secs(5))
            .unwrap();
        assert!(event.first_value(fields::ORDER_ID).is_some());

        session.stop();
        assert_eq!(
            session.send(create(CorrelationId::create_order(1))),
            Err(TransportError::SessionStopped)
        );
        assert_eq!(handler.stats().session_status.load(Ordering::Relaxed), 2);
    }
}
