//! Core infrastructure for tower-fortify.
//!
//! This crate provides the pieces every fault-tolerance policy shares:
//! - Event system for observability
//! - The error taxonomy ([`ResilienceError`], [`Rejection`], [`ConfigError`])
//! - Hierarchical error kinds used for classification
//! - A monotonic [`Clock`] abstraction
//! - A name-keyed [`Registry`] handing out one shared instance per name

pub mod clock;
pub mod error;
pub mod events;
pub mod kind;
pub mod registry;

pub use clock::{Clock, ManualClock, SharedClock, TokioClock};
pub use error::{ConfigError, Rejection, ResilienceError};
pub use events::{EventListener, EventListeners, FnListener, ResilienceEvent};
pub use kind::{Classify, ErrorKind};
pub use registry::{Policy, Registry, RegistryEvent};
