//! # Correlation Flow Tests
//!
//! Drive `LatencySampler` end to end against a `LoopbackSession`, so every
//! response is delivered from a thread other than the one waiting for it.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use latency_core::loopback::{acknowledge, reject};
use latency_core::{
    ClientOrderId, CorrelatingEventHandler, EventHandler, EventStore, LatencyError,
    LatencySampler, LoopbackSession, OrderTemplate, RequestCorrelator, SamplerConfig, Session,
    TransportError,
};
use venue_types::{
    fields, CorrelationId, Credentials, Element, Event, Message, MessageKind, Operation, Request,
    Side,
};

fn template() -> OrderTemplate {
    OrderTemplate {
        venue: "sim".to_string(),
        instrument: "BTC-USDT".to_string(),
        credentials: Credentials::new().with("API_KEY", "key-0123456789"),
        side: Side::Buy,
        quantity: "0.05".to_string(),
        limit_price: "100".to_string(),
        client_order_id: ClientOrderId::Generated,
    }
}

fn harness<F>(
    iterations: usize,
    responder: F,
) -> (Arc<EventStore>, Arc<LoopbackSession>, LatencySampler)
where
    F: FnMut(&Request) -> Vec<Event> + Send + 'static,
{
    let store = Arc::new(EventStore::new());
    let handler: Arc<dyn EventHandler> =
        Arc::new(CorrelatingEventHandler::new(Arc::clone(&store)));
    let session = Arc::new(LoopbackSession::spawn(handler, responder));
    let correlator = RequestCorrelator::new(
        Arc::clone(&session) as Arc<dyn Session>,
        Arc::clone(&store),
        Some(Duration::from_secs(5)),
    );
    let sampler = LatencySampler::new(
        correlator,
        template(),
        SamplerConfig {
            iterations,
            iteration_delay: Duration::ZERO,
        },
    );
    (store, session, sampler)
}

#[test]
fn test_order_id_extracted_and_cancel_sent() {
    let (store, session, sampler) = harness(1, |req| vec![acknowledge(req, "42")]);

    let sample = sampler.run_iteration(0).unwrap();

    assert_eq!(sample.order_id, "42");
    assert_eq!(session.sent(), 2);
    // Both entries were released after their phase.
    assert!(store.is_empty());
}

#[test]
fn test_cancel_carries_order_id_from_create() {
    let (_store, _session, sampler) = harness(1, |req: &Request| {
        if req.operation == Operation::CancelOrder {
            assert_eq!(req.param(fields::ORDER_ID), Some("order-7"));
            assert_eq!(req.correlation_id, CorrelationId::delete_order(0));
        } else {
            assert_eq!(req.correlation_id, CorrelationId::create_order(0));
            assert!(req.param(fields::CLIENT_ORDER_ID).is_some());
        }
        vec![acknowledge(req, "order-7")]
    });

    let sample = sampler.run_iteration(0).unwrap();
    assert_eq!(sample.order_id, "order-7");
}

#[test]
fn test_full_run_produces_report() {
    let mut next = 0u32;
    let (store, session, sampler) = harness(3, move |req: &Request| {
        if req.operation == Operation::CreateOrder {
            next += 1;
        }
        vec![acknowledge(req, &format!("order-{}", next))]
    });

    let mut seen = Vec::new();
    let report = sampler.run_with(|s| seen.push(s.iteration)).unwrap();

    assert_eq!(seen, vec![0, 1, 2]);
    assert_eq!(report.samples.len(), 3);
    assert_eq!(report.samples[2].order_id, "order-3");
    assert_eq!(report.create.count, 3);
    assert!(report.create.min <= report.create.max);
    assert_eq!(session.sent(), 6);
    assert!(store.is_empty());
}

#[test]
fn test_stale_events_do_not_leak_into_next_iteration() {
    let mut creates = 0u32;
    let (store, _session, sampler) = harness(2, move |req: &Request| {
        match req.operation {
            Operation::CreateOrder => {
                creates += 1;
                vec![acknowledge(req, &format!("order-{}", creates))]
            }
            // A late duplicate for the previous create arrives alongside the cancel ack.
            Operation::CancelOrder => {
                let stale = Event::response(vec![Message::new(MessageKind::CreateOrder)
                    .with_correlation_id(CorrelationId::create_order(0))
                    .with_element(Element::new().with(fields::ORDER_ID, "stale"))]);
                vec![stale, acknowledge(req, "")]
            }
        }
    });

    let report = sampler.run().unwrap();

    assert_eq!(report.samples[0].order_id, "order-1");
    assert_eq!(report.samples[1].order_id, "order-2");

    // Late responses for a released id are stored again and never evicted.
    assert_eq!(store.len(), 1);
    assert!(store.contains(&CorrelationId::create_order(0)));
    assert_eq!(store.stats().total_overwritten.load(Ordering::Relaxed), 1);
}

#[test]
fn test_missing_order_id_stops_before_cancel() {
    let (store, session, sampler) = harness(1, |req: &Request| {
        vec![Event::response(vec![Message::new(MessageKind::CreateOrder)
            .with_correlation_id(req.correlation_id.clone())
            .with_element(Element::new().with(fields::CLIENT_ORDER_ID, "client-1"))])]
    });

    let err = sampler.run().unwrap_err();

    match err {
        LatencyError::MissingOrderId {
            correlation_id,
            detail,
        } => {
            assert_eq!(correlation_id, CorrelationId::create_order(0));
            assert_eq!(detail, None);
        }
        other => panic!("expected MissingOrderId, got {:?}", other),
    }
    assert_eq!(session.sent(), 1);
    assert!(store.is_empty());
}

#[test]
fn test_rejected_create_reports_venue_reason() {
    let (_store, session, sampler) = harness(1, |req| vec![reject(req, "insufficient balance")]);

    let err = sampler.run().unwrap_err();

    assert!(err.to_string().contains("insufficient balance"));
    assert_eq!(session.sent(), 1);
}

#[test]
fn test_stopped_session_fails_without_waiting() {
    let (store, session, sampler) = harness(1, |req| vec![acknowledge(req, "42")]);
    session.stop();

    let start = Instant::now();
    let err = sampler.run().unwrap_err();

    assert!(matches!(
        err,
        LatencyError::Transport {
            source: TransportError::SessionStopped,
            ..
        }
    ));
    assert!(start.elapsed() < Duration::from_secs(1));
    assert!(store.is_empty());
}

#[test]
fn test_huge_iteration_count_fails_cleanly() {
    let (_store, session, sampler) = harness(usize::MAX, |req| vec![acknowledge(req, "42")]);
    session.stop();

    let err = sampler.run().unwrap_err();

    assert!(matches!(err, LatencyError::Transport { .. }));
    assert_eq!(session.sent(), 0);
}

#[test]
fn test_silent_venue_times_out() {
    let store = Arc::new(EventStore::new());
    let handler: Arc<dyn EventHandler> =
        Arc::new(CorrelatingEventHandler::new(Arc::clone(&store)));
    let session = Arc::new(LoopbackSession::spawn(handler, |_| Vec::new()));
    let correlator = RequestCorrelator::new(
        session as Arc<dyn Session>,
        Arc::clone(&store),
        Some(Duration::from_millis(30)),
    );
    let sampler = LatencySampler::new(correlator, template(), SamplerConfig::default());

    let err = sampler.run_iteration(4).unwrap_err();

    assert!(matches!(
        err,
        LatencyError::CorrelationTimeout { ref correlation_id, .. }
            if *correlation_id == CorrelationId::create_order(4)
    ));
}
