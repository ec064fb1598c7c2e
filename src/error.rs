use thiserror::Error;

use crate::config::ConfigError;
use crate::event_bus::EventError;
use crate::event_registry::EventTypeError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Event type error: {0}")]
    EventType(#[from] EventTypeError),
    #[error("Event error: {0}")]
    Event(#[from] EventError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

pub type InternalResult<T> = Result<T, Error>;

impl Error {
    /// The raw code, if this error is an unrecognised engine event.
    pub fn unknown_event_code(&self) -> Option<i32> {
        match self {
            Error::EventType(EventTypeError::UnknownEventCode { code }) => Some(*code),
            _ => None,
        }
    }
}
