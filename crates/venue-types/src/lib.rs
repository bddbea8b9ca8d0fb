//! # Venue Types Crate
//!
//! Request and event shapes exchanged with an asynchronous trading session.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every crate in the workspace uses these types
//!   for requests, events and correlation identifiers.
//! - **Opaque Correlation**: a `CorrelationId` is a caller-chosen string and is
//!   the only join key between a request and its response.
//! - **Immutable Events**: an `Event` is built once by the session and then only
//!   read; handlers clone it when they need to keep it.

pub mod correlation;
pub mod events;
pub mod requests;

pub use correlation::CorrelationId;
pub use events::{fields, Element, Event, EventType, Message, MessageKind};
pub use requests::{Credentials, Operation, Request, Side};
