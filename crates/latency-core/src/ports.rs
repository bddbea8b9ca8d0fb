//! Ports at the session boundary.
//!
//! The session (transport, protocol framing, authentication) lives outside
//! this crate. It is driven through `Session` and calls back into an
//! `EventHandler` supplied when it is constructed.

use crate::error::TransportError;
use venue_types::{Event, Request};

/// Callback for every event a session delivers (Driving Port).
///
/// Called on a thread owned by the session, possibly concurrently for
/// unrelated events. Implementations must return quickly.
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: Event);
}

/// Asynchronous request sink (Driven Port).
///
/// `send` is fire-and-forget: success only means the request was handed to
/// the transport. The answer arrives later through the session's handler.
pub trait Session: Send + Sync {
    /// Hand a request to the transport
    fn send(&self, request: Request) -> Result<(), TransportError>;

    /// Graceful shutdown; further sends fail with `SessionStopped`.
    fn stop(&self);
}
