//! Broadcast channel for arisan events.
//!
//! Every state change in [`crate::service::ArisanService`] is published
//! here. WebSocket connections and the persistence recorder take the
//! full feed with [`EventBus::subscribe`]; code that follows a single
//! arisan uses [`EventBus::subscribe_arisan`].

use tokio::sync::broadcast;

use super::{ArisanEvent, ArisanId};

/// Broadcast bus for [`ArisanEvent`]s.
///
/// Capacity comes from `EVENT_BUS_CAPACITY`. A receiver that falls more
/// than that many events behind loses the oldest ones.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ArisanEvent>,
}

impl EventBus {
    /// Creates a bus holding up to `capacity` undelivered events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event and returns how many receivers got it.
    ///
    /// Events published while nobody listens are dropped.
    pub fn publish(&self, event: ArisanEvent) -> usize {
        let arisan_id = event.arisan_id();
        let event_type = event.event_type_str();
        let delivered = self.sender.send(event).unwrap_or(0);
        tracing::debug!(%arisan_id, event_type, delivered, "event published");
        delivered
    }

    /// Returns a receiver for every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ArisanEvent> {
        self.sender.subscribe()
    }

    /// Returns a stream of the events of one arisan, starting now.
    #[must_use]
    pub fn subscribe_arisan(&self, arisan_id: ArisanId) -> ArisanEventStream {
        ArisanEventStream {
            arisan_id,
            receiver: self.sender.subscribe(),
            ended: false,
        }
    }

    /// Number of live receivers, filtered streams included.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Events of a single arisan, in publication order.
#[derive(Debug)]
pub struct ArisanEventStream {
    arisan_id: ArisanId,
    receiver: broadcast::Receiver<ArisanEvent>,
    ended: bool,
}

impl ArisanEventStream {
    /// Arisan this stream follows.
    #[must_use]
    pub const fn arisan_id(&self) -> ArisanId {
        self.arisan_id
    }

    /// Waits for the next event of the followed arisan.
    ///
    /// Events lost to lag are skipped with a warning. Returns `None` once
    /// the bus is gone, or right after the arisan's `arisan_deleted`
    /// event has been returned.
    pub async fn next(&mut self) -> Option<ArisanEvent> {
        while !self.ended {
            match self.receiver.recv().await {
                Ok(event) if event.arisan_id() == self.arisan_id => {
                    return Some(self.yield_event(event));
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        arisan_id = %self.arisan_id,
                        lagged = n,
                        "arisan event stream lagged behind event bus"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => self.ended = true,
            }
        }
        None
    }

    /// Returns an already-published event of the followed arisan without
    /// waiting, or `None` if there is none buffered.
    pub fn try_next(&mut self) -> Option<ArisanEvent> {
        while !self.ended {
            match self.receiver.try_recv() {
                Ok(event) if event.arisan_id() == self.arisan_id => {
                    return Some(self.yield_event(event));
                }
                Ok(_) => {}
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    tracing::warn!(
                        arisan_id = %self.arisan_id,
                        lagged = n,
                        "arisan event stream lagged behind event bus"
                    );
                }
                Err(broadcast::error::TryRecvError::Closed) => self.ended = true,
                Err(broadcast::error::TryRecvError::Empty) => return None,
            }
        }
        None
    }

    fn yield_event(&mut self, event: ArisanEvent) -> ArisanEvent {
        if matches!(event, ArisanEvent::ArisanDeleted { .. }) {
            self.ended = true;
        }
        event
    }
}
