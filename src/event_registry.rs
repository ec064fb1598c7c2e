use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use thiserror::Error;

use crate::consts::{
    DB_EVENT_PANIC, DB_EVENT_REP_CLIENT, DB_EVENT_REP_MASTER, DB_EVENT_REP_NEWMASTER,
    DB_EVENT_REP_PERM_FAILED, DB_EVENT_REP_STARTUPDONE, DB_EVENT_WRITE_FAILED,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventTypeError {
    #[error("Unknown event type: {code}")]
    UnknownEventCode { code: i32 },
    #[error("Unknown event name: {name}")]
    UnknownEventName { name: String },
}

/// Kinds of notification the engine delivers through its event callback.
///
/// The set is closed: the discriminant of each variant is the engine's own
/// code, and [`EventType::from_code`] is the only way to get from a raw code
/// to a variant.
#[repr(i32)]
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
    strum::EnumIter,
    strum::EnumCount,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// The environment has panicked and must be recovered.
    Panic = DB_EVENT_PANIC,
    /// This site is now a replication client.
    RepClient = DB_EVENT_REP_CLIENT,
    /// This site is now the replication master.
    RepMaster = DB_EVENT_REP_MASTER,
    /// Another site became master.
    RepNewMaster = DB_EVENT_REP_NEWMASTER,
    /// A permanent record was not acknowledged by enough clients.
    RepPermFailed = DB_EVENT_REP_PERM_FAILED,
    /// The client finished internal initialization.
    #[serde(alias = "REP_STARTUPDONE")]
    #[strum(to_string = "REP_STARTUP_DONE", serialize = "REP_STARTUPDONE")]
    RepStartupDone = DB_EVENT_REP_STARTUPDONE,
    /// A write to stable storage failed.
    WriteFailed = DB_EVENT_WRITE_FAILED,
}

impl EventType {
    pub fn from_code(code: i32) -> Result<Self, EventTypeError> {
        match code {
            DB_EVENT_PANIC => Ok(Self::Panic),
            DB_EVENT_REP_CLIENT => Ok(Self::RepClient),
            DB_EVENT_REP_MASTER => Ok(Self::RepMaster),
            DB_EVENT_REP_NEWMASTER => Ok(Self::RepNewMaster),
            DB_EVENT_REP_PERM_FAILED => Ok(Self::RepPermFailed),
            DB_EVENT_REP_STARTUPDONE => Ok(Self::RepStartupDone),
            DB_EVENT_WRITE_FAILED => Ok(Self::WriteFailed),
            _ => Err(EventTypeError::UnknownEventCode { code }),
        }
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Parse a display name, or the header spelling `REP_STARTUPDONE`.
    pub fn from_name(name: &str) -> Result<Self, EventTypeError> {
        name.parse()
            .map_err(|_: strum::ParseError| EventTypeError::UnknownEventName {
                name: name.to_string(),
            })
    }

    /// All known event types in code order.
    pub fn all() -> impl Iterator<Item = EventType> {
        Self::iter()
    }

    pub fn is_replication(self) -> bool {
        matches!(
            self,
            Self::RepClient
                | Self::RepMaster
                | Self::RepNewMaster
                | Self::RepPermFailed
                | Self::RepStartupDone
        )
    }

    /// The engine cannot continue normal operation after these.
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::Panic | Self::WriteFailed)
    }
}

impl TryFrom<i32> for EventType {
    type Error = EventTypeError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        Self::from_code(code)
    }
}

impl From<EventType> for i32 {
    fn from(event_type: EventType) -> Self {
        event_type.code()
    }
}
