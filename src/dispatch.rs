//! Callback boundary between the engine and application code.
//!
//! The engine reports events as a raw `(code, info)` pair from one of its own
//! threads. [`EventDispatcher::dispatch_raw`] decodes the pair through the
//! [`EventType`] registry and hands the typed event to every registered
//! [`EventHandler`] and, if enabled, to the [`EventBus`].

use std::{
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    config::NotifierConfig,
    consts::DB_EID_INVALID,
    event_bus::{EventBus, EventReceiver},
    event_registry::{EventType, EventTypeError},
    timestamp::Timestamp,
    InternalResult,
};

/// Payload the engine passes along with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EventInfo {
    #[default]
    None,
    /// Environment id of the new replication master.
    EnvId(i32),
    /// Engine error code of a failed write.
    ErrorCode(i32),
}

impl EventInfo {
    pub fn env_id(&self) -> Option<i32> {
        match self {
            EventInfo::EnvId(id) => Some(*id),
            _ => None,
        }
    }

    pub fn error_code(&self) -> Option<i32> {
        match self {
            EventInfo::ErrorCode(code) => Some(*code),
            _ => None,
        }
    }
}

/// A decoded engine notification.
///
/// The payload kind always matches the event type: only `REP_NEW_MASTER`
/// carries an env id and only `WRITE_FAILED` carries an error code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineEvent {
    event_type: EventType,
    info: EventInfo,
    received_at: Timestamp,
}

impl EngineEvent {
    /// `info` is only meaningful for `REP_NEW_MASTER` and `WRITE_FAILED`; it
    /// is ignored for other kinds.
    pub fn new(event_type: EventType, info: Option<i32>) -> Self {
        let info = match event_type {
            EventType::RepNewMaster => EventInfo::EnvId(info.unwrap_or(DB_EID_INVALID)),
            EventType::WriteFailed => EventInfo::ErrorCode(info.unwrap_or(0)),
            _ => EventInfo::None,
        };
        Self {
            event_type,
            info,
            received_at: Timestamp::now(),
        }
    }

    /// Decode a raw engine notification.
    pub fn from_raw(code: i32, info: Option<i32>) -> Result<Self, EventTypeError> {
        Ok(Self::new(EventType::from_code(code)?, info))
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn info(&self) -> EventInfo {
        self.info
    }

    pub fn received_at(&self) -> Timestamp {
        self.received_at
    }

    /// Call the one handler method matching this event's type.
    pub fn deliver<H: EventHandler + ?Sized>(&self, handler: &H) {
        match self.event_type {
            EventType::Panic => handler.handle_panic(),
            EventType::RepClient => handler.handle_rep_client(),
            EventType::RepMaster => handler.handle_rep_master(),
            EventType::RepNewMaster => {
                handler.handle_rep_new_master(self.info.env_id().unwrap_or(DB_EID_INVALID))
            }
            EventType::RepPermFailed => handler.handle_rep_perm_failed(),
            EventType::RepStartupDone => handler.handle_rep_startup_done(),
            EventType::WriteFailed => {
                handler.handle_write_failed(self.info.error_code().unwrap_or(0))
            }
        }
    }
}

/// Application-side receiver of engine events.
///
/// Every method defaults to a no-op so implementors only override what they
/// care about. Methods are called on the engine's callback thread and should
/// return quickly.
#[cfg_attr(test, mockall::automock)]
pub trait EventHandler: Send + Sync {
    fn handle_panic(&self) {}
    fn handle_rep_client(&self) {}
    fn handle_rep_master(&self) {}
    fn handle_rep_new_master(&self, _env_id: i32) {}
    fn handle_rep_perm_failed(&self) {}
    fn handle_rep_startup_done(&self) {}
    fn handle_write_failed(&self, _error_code: i32) {}
}

/// Writes every event to the `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn handle_panic(&self) {
        error!(event = %EventType::Panic, "engine panicked, environment must be recovered");
    }

    fn handle_rep_client(&self) {
        info!(event = %EventType::RepClient, "site is now a replication client");
    }

    fn handle_rep_master(&self) {
        info!(event = %EventType::RepMaster, "site is now the replication master");
    }

    fn handle_rep_new_master(&self, env_id: i32) {
        info!(event = %EventType::RepNewMaster, env_id, "new replication master elected");
    }

    fn handle_rep_perm_failed(&self) {
        warn!(event = %EventType::RepPermFailed, "permanent record not acknowledged");
    }

    fn handle_rep_startup_done(&self) {
        info!(event = %EventType::RepStartupDone, "client startup done");
    }

    fn handle_write_failed(&self, error_code: i32) {
        error!(event = %EventType::WriteFailed, error_code, "write to stable storage failed");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(Uuid);

impl HandlerId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The event type is disabled in the config.
    Filtered,
    Delivered {
        handlers: usize,
        failed_handlers: usize,
        subscribers: usize,
    },
}

#[derive(Clone)]
pub struct EventDispatcher {
    config: NotifierConfig,
    handlers: Arc<DashMap<HandlerId, Arc<dyn EventHandler>>>,
    bus: Option<EventBus>,
}

impl EventDispatcher {
    pub fn new(config: NotifierConfig) -> InternalResult<Self> {
        config.validate()?;
        let bus = if config.publish_to_bus {
            Some(EventBus::new(config.bus_capacity)?)
        } else {
            None
        };
        Ok(Self {
            config,
            handlers: Arc::new(DashMap::new()),
            bus,
        })
    }

    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }

    pub fn register(&self, handler: Arc<dyn EventHandler>) -> HandlerId {
        let id = HandlerId::new();
        self.handlers.insert(id, handler);
        debug!("Registered event handler {}", id);
        id
    }

    pub fn unregister(&self, id: &HandlerId) -> bool {
        self.handlers.remove(id).is_some()
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// `None` when the bus is disabled in the config.
    pub fn subscribe(&self) -> Option<EventReceiver> {
        self.bus.as_ref().map(EventBus::subscribe)
    }

    /// Entry point for the engine's event callback.
    ///
    /// An unknown code is never filtered or defaulted: it is logged and
    /// returned so the caller can abort handling of this notification.
    pub fn dispatch_raw(&self, code: i32, info: Option<i32>) -> InternalResult<DispatchOutcome> {
        let event = EngineEvent::from_raw(code, info).inspect_err(|e| {
            error!(code, "Engine delivered an unrecognised event: {}", e);
        })?;
        Ok(self.dispatch(event))
    }

    pub fn dispatch(&self, event: EngineEvent) -> DispatchOutcome {
        if !self.config.is_enabled(event.event_type) {
            debug!(event = %event.event_type, "event type disabled, dropping");
            return DispatchOutcome::Filtered;
        }

        // Snapshot so handlers may (un)register without holding shard locks.
        let handlers: Vec<Arc<dyn EventHandler>> = self
            .handlers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let mut failed_handlers = 0;
        for handler in &handlers {
            let result = panic::catch_unwind(AssertUnwindSafe(|| event.deliver(handler.as_ref())));
            if result.is_err() {
                error!(event = %event.event_type, "event handler panicked");
                failed_handlers += 1;
            }
        }

        let event_type = event.event_type;
        let received_at = event.received_at;
        let subscribers = match &self.bus {
            Some(bus) => bus.publish(event).unwrap_or_else(|e| {
                debug!(event = %event_type, "not published to bus: {}", e);
                0
            }),
            None => 0,
        };
        debug!(
            event = %event_type,
            latency_us = received_at.elapsed().as_micros() as u64,
            "dispatched engine event"
        );

        DispatchOutcome::Delivered {
            handlers: handlers.len(),
            failed_handlers,
            subscribers,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::BTreeSet,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use mockall::predicate::eq;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::consts::{DB_EVENT_PANIC, DB_EVENT_REP_NEWMASTER, DB_EVENT_WRITE_FAILED};

    fn dispatcher() -> EventDispatcher {
        EventDispatcher::new(NotifierConfig::default()).unwrap()
    }

    #[test]
    fn test_from_raw_payloads() {
        let event = EngineEvent::from_raw(DB_EVENT_REP_NEWMASTER, Some(3)).unwrap();
        assert_eq!(event.event_type(), EventType::RepNewMaster);
        assert_eq!(event.info(), EventInfo::EnvId(3));

        let event = EngineEvent::from_raw(DB_EVENT_REP_NEWMASTER, None).unwrap();
        assert_eq!(event.info(), EventInfo::EnvId(DB_EID_INVALID));

        let event = EngineEvent::from_raw(DB_EVENT_WRITE_FAILED, Some(28)).unwrap();
        assert_eq!(event.info(), EventInfo::ErrorCode(28));

        let event = EngineEvent::from_raw(DB_EVENT_PANIC, Some(5)).unwrap();
        assert_eq!(event.info(), EventInfo::None);

        assert_eq!(
            EngineEvent::from_raw(0, None),
            Err(EventTypeError::UnknownEventCode { code: 0 })
        );
    }

    #[test]
    fn test_payload_kind_follows_event_type() {
        let event = EngineEvent::new(EventType::RepNewMaster, Some(5));
        assert_eq!(event.info(), EventInfo::EnvId(5));
        assert_eq!(event.info().error_code(), None);

        let event = EngineEvent::new(EventType::WriteFailed, Some(5));
        assert_eq!(event.info(), EventInfo::ErrorCode(5));
        assert_eq!(event.info().env_id(), None);

        for event_type in [EventType::Panic, EventType::RepClient, EventType::RepPermFailed] {
            assert_eq!(EngineEvent::new(event_type, Some(5)).info(), EventInfo::None);
        }

        let mut mock = MockEventHandler::new();
        mock.expect_handle_rep_new_master()
            .with(eq(5))
            .times(1)
            .return_const(());
        EngineEvent::new(EventType::RepNewMaster, Some(5)).deliver(&mock);
    }

    #[test]
    fn test_deliver_calls_matching_method() {
        let mut mock = MockEventHandler::new();
        mock.expect_handle_rep_new_master()
            .with(eq(3))
            .times(1)
            .return_const(());
        mock.expect_handle_write_failed()
            .with(eq(28))
            .times(1)
            .return_const(());
        mock.expect_handle_panic().times(1).return_const(());

        EngineEvent::new(EventType::RepNewMaster, Some(3)).deliver(&mock);
        EngineEvent::new(EventType::WriteFailed, Some(28)).deliver(&mock);
        EngineEvent::new(EventType::Panic, None).deliver(&mock);
    }

    #[test]
    fn test_dispatch_raw_reaches_handler() {
        let dispatcher = dispatcher();
        let mut mock = MockEventHandler::new();
        mock.expect_handle_rep_master().times(1).return_const(());
        dispatcher.register(Arc::new(mock));

        let outcome = dispatcher
            .dispatch_raw(EventType::RepMaster.code(), None)
            .unwrap();
        assert_eq!(
            outcome,
            DispatchOutcome::Delivered {
                handlers: 1,
                failed_handlers: 0,
                subscribers: 0,
            }
        );
    }

    #[derive(Default)]
    struct CountingHandler {
        calls: AtomicUsize,
    }

    impl CountingHandler {
        fn hit(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl EventHandler for CountingHandler {
        fn handle_panic(&self) {
            self.hit();
        }
        fn handle_rep_client(&self) {
            self.hit();
        }
        fn handle_rep_master(&self) {
            self.hit();
        }
        fn handle_rep_new_master(&self, _env_id: i32) {
            self.hit();
        }
        fn handle_rep_perm_failed(&self) {
            self.hit();
        }
        fn handle_rep_startup_done(&self) {
            self.hit();
        }
        fn handle_write_failed(&self, _error_code: i32) {
            self.hit();
        }
    }

    #[test]
    fn test_unknown_code_is_propagated() {
        let dispatcher = dispatcher();
        let handler = Arc::new(CountingHandler::default());
        dispatcher.register(handler.clone());

        for code in [9999, 0, -1] {
            let err = dispatcher.dispatch_raw(code, Some(1)).unwrap_err();
            assert_eq!(err.unknown_event_code(), Some(code));
        }
        assert_eq!(handler.calls(), 0);

        // the same handler does see known codes
        dispatcher
            .dispatch_raw(EventType::RepClient.code(), None)
            .unwrap();
        assert_eq!(handler.calls(), 1);
    }

    #[test]
    fn test_disabled_event_is_filtered() {
        let config = NotifierConfig {
            enabled_events: BTreeSet::from([EventType::Panic]),
            ..Default::default()
        };
        let dispatcher = EventDispatcher::new(config).unwrap();
        let handler = Arc::new(CountingHandler::default());
        dispatcher.register(handler.clone());

        let outcome = dispatcher
            .dispatch_raw(EventType::RepClient.code(), None)
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Filtered);
        assert_eq!(handler.calls(), 0);

        // filtering never hides an unknown code
        assert!(dispatcher.dispatch_raw(-1, None).is_err());
    }

    struct PanickingHandler;

    impl EventHandler for PanickingHandler {
        fn handle_rep_perm_failed(&self) {
            panic!("handler bug");
        }
    }

    #[test]
    fn test_panicking_handler_does_not_stop_others() {
        let dispatcher = dispatcher();
        dispatcher.register(Arc::new(PanickingHandler));
        let mut mock = MockEventHandler::new();
        mock.expect_handle_rep_perm_failed()
            .times(1)
            .return_const(());
        dispatcher.register(Arc::new(mock));

        let outcome = dispatcher
            .dispatch_raw(EventType::RepPermFailed.code(), None)
            .unwrap();
        assert_eq!(
            outcome,
            DispatchOutcome::Delivered {
                handlers: 2,
                failed_handlers: 1,
                subscribers: 0,
            }
        );
    }

    #[test]
    fn test_register_and_unregister() {
        let dispatcher = dispatcher();
        let id = dispatcher.register(Arc::new(LoggingHandler));
        assert_eq!(dispatcher.handler_count(), 1);
        assert!(dispatcher.unregister(&id));
        assert!(!dispatcher.unregister(&id));
        assert_eq!(dispatcher.handler_count(), 0);
    }

    #[test]
    fn test_logging_handler_handles_every_event() {
        let dispatcher = dispatcher();
        dispatcher.register(Arc::new(LoggingHandler));
        for event_type in EventType::all() {
            let outcome = dispatcher.dispatch_raw(event_type.code(), Some(1)).unwrap();
            assert_eq!(
                outcome,
                DispatchOutcome::Delivered {
                    handlers: 1,
                    failed_handlers: 0,
                    subscribers: 0,
                }
            );
        }
    }

    #[tokio::test]
    async fn test_dispatch_publishes_to_bus() {
        let dispatcher = dispatcher();
        let mut rx = dispatcher.subscribe().unwrap();

        let outcome = dispatcher
            .dispatch_raw(EventType::RepNewMaster.code(), Some(2))
            .unwrap();
        assert_eq!(
            outcome,
            DispatchOutcome::Delivered {
                handlers: 0,
                failed_handlers: 0,
                subscribers: 1,
            }
        );

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type(), EventType::RepNewMaster);
        assert_eq!(received.info(), EventInfo::EnvId(2));
        assert!(received.received_at().elapsed().as_secs() < 1);
    }

    #[test]
    fn test_bus_disabled() {
        let config = NotifierConfig {
            publish_to_bus: false,
            ..Default::default()
        };
        let dispatcher = EventDispatcher::new(config).unwrap();
        assert!(dispatcher.subscribe().is_none());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = NotifierConfig {
            bus_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(
            EventDispatcher::new(config),
            Err(crate::Error::Config(_))
        ));

        let config = NotifierConfig {
            bus_capacity: usize::MAX,
            ..Default::default()
        };
        assert!(EventDispatcher::new(config).is_err());
    }
}
