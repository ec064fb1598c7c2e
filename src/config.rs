use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fs::File, io::BufReader, path::Path};
use thiserror::Error;

use crate::{event_bus::MAX_BUS_CAPACITY, event_registry::EventType};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Settings for [`EventDispatcher`](crate::dispatch::EventDispatcher).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotifierConfig {
    /// Event types forwarded to handlers. Others are decoded and dropped.
    #[serde(default = "default_enabled_events")]
    pub enabled_events: BTreeSet<EventType>,

    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,

    #[serde(default = "default_true")]
    pub publish_to_bus: bool,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            enabled_events: default_enabled_events(),
            bus_capacity: default_bus_capacity(),
            publish_to_bus: default_true(),
        }
    }
}

impl NotifierConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.publish_to_bus && !(1..=MAX_BUS_CAPACITY).contains(&self.bus_capacity) {
            return Err(ConfigError::InvalidValue {
                field: "bus_capacity".to_string(),
                message: format!("must be between 1 and {}", MAX_BUS_CAPACITY),
            });
        }
        Ok(())
    }

    pub fn is_enabled(&self, event_type: EventType) -> bool {
        self.enabled_events.contains(&event_type)
    }
}

fn default_enabled_events() -> BTreeSet<EventType> {
    EventType::all().collect()
}

fn default_bus_capacity() -> usize {
    256
}

fn default_true() -> bool {
    true
}
