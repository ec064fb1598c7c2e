//! Event codes as defined by the engine's public header.
//!
//! These must stay in sync with the engine version being linked. A code the
//! engine emits that is missing here surfaces as
//! [`EventTypeError::UnknownEventCode`](crate::event_registry::EventTypeError).

/// Out-of-band sentinel, never delivered as a real event.
pub const DB_EVENT_NO_SUCH_EVENT: i32 = 0;
pub const DB_EVENT_PANIC: i32 = 1;
pub const DB_EVENT_REP_CLIENT: i32 = 2;
pub const DB_EVENT_REP_MASTER: i32 = 3;
pub const DB_EVENT_REP_NEWMASTER: i32 = 4;
pub const DB_EVENT_REP_PERM_FAILED: i32 = 5;
pub const DB_EVENT_REP_STARTUPDONE: i32 = 6;
pub const DB_EVENT_WRITE_FAILED: i32 = 7;

/// Environment id the engine uses for "no site".
pub const DB_EID_INVALID: i32 = -1;
