use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};

use crate::dispatch::EngineEvent;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("No subscribers")]
    NoSubscribers,
    #[error("Lagged: {count} events skipped")]
    Lagged { count: u64 },
    #[error("Event bus closed")]
    Closed,
    #[error("Invalid bus capacity {capacity}: must be between 1 and {max}", max = MAX_BUS_CAPACITY)]
    InvalidCapacity { capacity: usize },
}

/// Largest capacity accepted for an [`EventBus`].
pub const MAX_BUS_CAPACITY: usize = 1 << 20;

/// Fan-out of decoded engine events to async consumers.
///
/// `publish` never blocks and needs no runtime, so it can be called straight
/// from the engine's callback thread.
#[derive(Clone)]
pub struct EventBus {
    event_sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Result<Self, EventError> {
        if capacity == 0 || capacity > MAX_BUS_CAPACITY {
            return Err(EventError::InvalidCapacity { capacity });
        }
        let (event_sender, _) = broadcast::channel(capacity);
        Ok(Self { event_sender })
    }

    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver::new(self.event_sender.subscribe())
    }

    /// Returns the number of receivers the event was handed to.
    pub fn publish(&self, event: EngineEvent) -> Result<usize, EventError> {
        self.event_sender
            .send(event)
            .map_err(|_| EventError::NoSubscribers)
    }

    pub fn subscriber_count(&self) -> usize {
        self.event_sender.receiver_count()
    }
}

pub struct EventReceiver {
    receiver: broadcast::Receiver<EngineEvent>,
}

impl EventReceiver {
    fn new(receiver: broadcast::Receiver<EngineEvent>) -> Self {
        Self { receiver }
    }

    /// イベントを受信する。Laggedの場合はスキップ数を返し、次のrecvは残っている最古のイベントから続く。
    pub async fn recv(&mut self) -> Result<EngineEvent, EventError> {
        match self.receiver.recv().await {
            Ok(event) => Ok(event),
            Err(broadcast::error::RecvError::Lagged(count)) => Err(EventError::Lagged { count }),
            Err(broadcast::error::RecvError::Closed) => Err(EventError::Closed),
        }
    }

    /// Lag notifications are dropped from the stream.
    pub fn into_stream(self) -> impl Stream<Item = EngineEvent> {
        BroadcastStream::new(self.receiver).filter_map(|result| result.ok())
    }
}
