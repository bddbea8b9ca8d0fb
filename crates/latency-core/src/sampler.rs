//! # Latency Sampler
//!
//! Runs N strictly sequential create → cancel cycles through a
//! [`RequestCorrelator`] and times each phase.
//!
//! ## Iteration State Machine
//!
//! ```text
//! CreateSent → CreateAwaiting → CreateReceived
//!     → DeleteSent → DeleteAwaiting → DeleteReceived → Done
//! ```
//!
//! Correlation entries are released as soon as the fields needed from them
//! have been read, on the failure path too, so the store never grows across
//! iterations.

use crate::correlator::RequestCorrelator;
use crate::error::{LatencyError, LatencyResult};
use crate::stats::{LatencyReport, LatencySample};
use std::fmt;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, trace, warn};
use uuid::Uuid;
use venue_types::{fields, CorrelationId, Credentials, Event, MessageKind, Request, Side};

/// How client order ids are chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientOrderId {
    /// Same id on every create
    Fixed(String),
    /// Fresh UUID v4 per create
    Generated,
}

impl ClientOrderId {
    fn next(&self) -> String {
        match self {
            ClientOrderId::Fixed(id) => id.clone(),
            ClientOrderId::Generated => Uuid::new_v4().to_string(),
        }
    }
}

/// The order placed and cancelled on every iteration.
#[derive(Debug, Clone)]
pub struct OrderTemplate {
    pub venue: String,
    pub instrument: String,
    pub credentials: Credentials,
    pub side: Side,
    pub quantity: String,
    pub limit_price: String,
    pub client_order_id: ClientOrderId,
}

impl OrderTemplate {
    fn create_request(&self) -> Request {
        Request::create_order(
            &self.venue,
            &self.instrument,
            self.credentials.clone(),
            self.side,
            &self.quantity,
            &self.limit_price,
            &self.client_order_id.next(),
        )
    }

    fn cancel_request(&self, order_id: &str) -> Request {
        Request::cancel_order(
            &self.venue,
            &self.instrument,
            self.credentials.clone(),
            order_id,
        )
    }
}

/// Run shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerConfig {
    pub iterations: usize,
    /// Pause between iterations, excluded from measurements
    pub iteration_delay: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            iteration_delay: Duration::from_secs(1),
        }
    }
}

/// Per-iteration progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationPhase {
    CreateSent,
    CreateAwaiting,
    CreateReceived,
    DeleteSent,
    DeleteAwaiting,
    DeleteReceived,
    Done,
}

impl fmt::Display for IterationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IterationPhase::CreateSent => "create_sent",
            IterationPhase::CreateAwaiting => "create_awaiting",
            IterationPhase::CreateReceived => "create_received",
            IterationPhase::DeleteSent => "delete_sent",
            IterationPhase::DeleteAwaiting => "delete_awaiting",
            IterationPhase::DeleteReceived => "delete_received",
            IterationPhase::Done => "done",
        };
        f.write_str(name)
    }
}

const MAX_PREALLOCATED_SAMPLES: usize = 1024;

/// Sequential create/cancel latency sampler.
pub struct LatencySampler {
    correlator: RequestCorrelator,
    template: OrderTemplate,
    config: SamplerConfig,
}

impl LatencySampler {
    pub fn new(
        correlator: RequestCorrelator,
        template: OrderTemplate,
        config: SamplerConfig,
    ) -> Self {
        Self {
            correlator,
            template,
            config,
        }
    }

    /// Run all iterations.
    pub fn run(&self) -> LatencyResult<LatencyReport> {
        self.run_with(|_| {})
    }

    /// Run all iterations, calling `on_sample` as each one completes.
    ///
    /// Stops at the first error; samples gathered so far are discarded with it.
    pub fn run_with<F>(&self, mut on_sample: F) -> LatencyResult<LatencyReport>
    where
        F: FnMut(&LatencySample),
    {
        // Grow as samples arrive; the count is caller-controlled.
        let mut samples = Vec::with_capacity(self.config.iterations.min(MAX_PREALLOCATED_SAMPLES));

        for iteration in 0..self.config.iterations {
            let sample = self.run_iteration(iteration)?;
            on_sample(&sample);
            samples.push(sample);

            let last = iteration + 1 == self.config.iterations;
            if !last && !self.config.iteration_delay.is_zero() {
                thread::sleep(self.config.iteration_delay);
            }
        }

        let report = LatencyReport::from_samples(samples)
            .ok_or_else(|| LatencyError::Configuration("iterations must be at least 1".into()))?;

        info!(
            iterations = report.samples.len(),
            mean_create_ms = report.mean_create().as_millis() as u64,
            mean_cancel_ms = report.mean_cancel().as_millis() as u64,
            "Sampling complete"
        );
        Ok(report)
    }

    /// One create → cancel cycle.
    pub fn run_iteration(&self, iteration: usize) -> LatencyResult<LatencySample> {
        let create_id = CorrelationId::create_order(iteration);
        let request = self.template.create_request();

        phase(iteration, IterationPhase::CreateSent);
        let (create, created) =
            self.timed(request, &create_id, iteration, IterationPhase::CreateAwaiting);
        let created = created?;
        phase(iteration, IterationPhase::CreateReceived);

        let order_id = extract_order_id(&created, &create_id);
        self.correlator.release(&create_id);
        let order_id = order_id?;

        let delete_id = CorrelationId::delete_order(iteration);
        let request = self.template.cancel_request(&order_id);

        phase(iteration, IterationPhase::DeleteSent);
        let (cancel, cancelled) =
            self.timed(request, &delete_id, iteration, IterationPhase::DeleteAwaiting);
        let cancelled = cancelled?;
        phase(iteration, IterationPhase::DeleteReceived);

        if let Some(reason) = rejection(&cancelled) {
            warn!(
                iteration,
                order_id = %order_id,
                reason = %reason,
                "Cancel rejected by venue"
            );
        }
        self.correlator.release(&delete_id);

        let sample = LatencySample {
            iteration,
            order_id,
            create,
            cancel,
        };
        info!(
            iteration,
            create_ms = sample.create.as_millis() as u64,
            cancel_ms = sample.cancel.as_millis() as u64,
            round_trip_ms = sample.round_trip().as_millis() as u64,
            "Iteration complete"
        );
        phase(iteration, IterationPhase::Done);
        Ok(sample)
    }

    /// Time one request; the entry is released here if the wait failed.
    fn timed(
        &self,
        request: Request,
        correlation_id: &CorrelationId,
        iteration: usize,
        awaiting: IterationPhase,
    ) -> (Duration, LatencyResult<Event>) {
        phase(iteration, awaiting);
        let start = Instant::now();
        let result = self.correlator.send_and_await(request, correlation_id);
        let elapsed = start.elapsed();
        if result.is_err() {
            self.correlator.release(correlation_id);
        }
        (elapsed, result)
    }

    pub fn correlator(&self) -> &RequestCorrelator {
        &self.correlator
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }
}

fn phase(iteration: usize, phase: IterationPhase) {
    trace!(iteration, phase = %phase, "Phase transition");
}

/// Venue error text if the first message is a rejection
fn rejection(event: &Event) -> Option<&str> {
    event
        .messages
        .first()
        .filter(|m| m.kind == MessageKind::ResponseError)
        .map(|m| m.first_value(fields::ERROR_MESSAGE).unwrap_or("unspecified"))
}

/// Read `ORDER_ID` from the first element of the first message.
pub fn extract_order_id(event: &Event, correlation_id: &CorrelationId) -> LatencyResult<String> {
    if let Some(reason) = rejection(event) {
        return Err(LatencyError::MissingOrderId {
            correlation_id: correlation_id.clone(),
            detail: Some(reason.to_string()),
        });
    }

    event
        .first_value(fields::ORDER_ID)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| LatencyError::MissingOrderId {
            correlation_id: correlation_id.clone(),
            detail: None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use venue_types::{Element, Message};

    fn create_response(elements: Vec<Element>) -> Event {
        let mut message =
            Message::new(MessageKind::CreateOrder).with_correlation_id(CorrelationId::create_order(0));
        for element in elements {
            message = message.with_element(element);
        }
        Event::response(vec![message])
    }

    #[test]
    fn test_extract_order_id() {
        let event = create_response(vec![Element::new().with(fields::ORDER_ID, "42")]);
        let id = extract_order_id(&event, &CorrelationId::create_order(0)).unwrap();
        assert_eq!(id, "42");
    }

    #[test]
    fn test_extract_reads_first_element_only() {
        let event = create_response(vec![
            Element::new().with(fields::CLIENT_ORDER_ID, "c-1"),
            Element::new().with(fields::ORDER_ID, "42"),
        ]);
        assert!(matches!(
            extract_order_id(&event, &CorrelationId::create_order(0)),
            Err(LatencyError::MissingOrderId { detail: None, .. })
        ));
    }

    #[test]
    fn test_extract_empty_order_id() {
        let event = create_response(vec![Element::new().with(fields::ORDER_ID, "")]);
        assert!(extract_order_id(&event, &CorrelationId::create_order(0)).is_err());
    }

    #[test]
    fn test_extract_from_rejection() {
        let event = Event::response(vec![Message::new(MessageKind::ResponseError)
            .with_correlation_id(CorrelationId::create_order(0))
            .with_element(Element::new().with(fields::ERROR_MESSAGE, "insufficient balance"))]);

        match extract_order_id(&event, &CorrelationId::create_order(0)) {
            Err(LatencyError::MissingOrderId { detail, .. }) => {
                assert_eq!(detail.as_deref(), Some("insufficient balance"));
            }
            other => panic!("expected MissingOrderId, got {:?}", other),
        }
    }

    #[test]
    fn test_client_order_id_generation() {
        let fixed = ClientOrderId::Fixed("abc".into());
        assert_eq!(fixed.next(), "abc");
        assert_eq!(fixed.next(), "abc");

        let generated = ClientOrderId::Generated;
        assert_ne!(generated.next(), generated.next());
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(IterationPhase::CreateAwaiting.to_string(), "create_awaiting");
        assert_eq!(IterationPhase::Done.to_string(), "done");
    }
}
