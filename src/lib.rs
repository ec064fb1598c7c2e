//! # dbevent: typed event notifications for an embedded database engine
//!
//! The engine reports lifecycle events (panic, replication role changes,
//! write failures) through a callback carrying a raw integer code. This crate
//! turns those codes into typed values and routes them to application code.
//!
//! - Engine codes ([`consts`])
//! - Closed event type registry with reverse lookup ([`event_registry`])
//! - Callback boundary and handler fan-out ([`dispatch`])
//! - Async broadcast of decoded events ([`event_bus`])
//! - Dispatcher settings ([`config`])
//! - Error handling ([`error`])
//!
//! ```text
//! engine callback (code, info) → EventType::from_code → EventDispatcher → EventHandler / EventBus
//! ```
//!
//! An unknown code is a version mismatch between this crate and the engine.
//! It is always returned to the caller, never mapped to a default.

pub mod config;
pub mod consts;
pub mod dispatch;
pub mod error;
pub mod event_bus;
pub mod event_registry;
pub mod timestamp;

// Re-exports
pub use dispatch::{DispatchOutcome, EngineEvent, EventDispatcher, EventHandler, EventInfo};
pub use error::*;
pub use event_registry::{EventType, EventTypeError};
