//! In-memory session for tests and dry runs.
//!
//! Requests go through an unbounded channel to a dedicated delivery thread,
//! which asks a responder closure what to emit and hands the resulting
//! events to the handler. Responses therefore always arrive on a thread
//! other than the caller's, as they would from a real session.

use crate::error::TransportError;
use crate::ports::{EventHandler, Session};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use venue_types::{fields, Element, Event, Message, MessageKind, Operation, Request};

/// Session whose "venue" is a closure.
pub struct LoopbackSession {
    sender: Mutex<Option<mpsc::UnboundedSender<Request>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    sent: Arc<AtomicU64>,
}

impl LoopbackSession {
    /// Start the delivery thread.
    ///
    /// `responder` runs on the delivery thread for every request and returns
    /// the events to deliver, in order.
    pub fn spawn<F>(handler: Arc<dyn EventHandler>, mut responder: F) -> Self
    where
        F: FnMut(&Request) -> Vec<Event> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<Request>();
        let worker = thread::spawn(move || {
            while let Some(request) = rx.blocking_recv() {
                for event in responder(&request) {
                    handler.on_event(event);
                }
            }
            debug!("Loopback delivery thread exiting");
        });

        Self {
            sender: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            sent: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Requests accepted so far
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

impl Session for LoopbackSession {
    fn send(&self, request: Request) -> Result<(), TransportError> {
        let guard = self.sender.lock();
        let Some(tx) = guard.as_ref() else {
            return Err(TransportError::SessionStopped);
        };
        tx.send(request).map_err(|_| TransportError::ChannelClosed)?;
        self.sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn stop(&self) {
        // Dropping the sender ends the delivery loop once the queue drains.
        self.sender.lock().take();
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                warn!("Loopback delivery thread panicked");
            }
        }
    }
}

impl Drop for LoopbackSession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Acknowledge `request` the way a well-behaved venue would.
///
/// Creates answer with `order_id`; cancels echo the `ORDER_ID` they carried.
pub fn acknowledge(request: &Request, order_id: &str) -> Event {
    let (kind, order_id) = match request.operation {
        Operation::CreateOrder => (MessageKind::CreateOrder, order_id),
        Operation::CancelOrder => (
            MessageKind::CancelOrder,
            request.param(fields::ORDER_ID).unwrap_or(order_id),
        ),
    };
    Event::response(vec![Message::new(kind)
        .with_correlation_id(request.correlation_id.clone())
        .with_element(Element::new().with(fields::ORDER_ID, order_id))])
}

/// Reject `request` with a venue error message.
pub fn reject(request: &Request, reason: &str) -> Event {
    Event::response(vec![Message::new(MessageKind::ResponseError)
        .with_correlation_id(request.correlation_id.clone())
        .with_element(Element::new().with(fields::ERROR_MESSAGE, reason))])
}
