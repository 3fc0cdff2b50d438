//! Sequenced fan-out of committed changes

use ballotbox_core::{BallotError, BallotResult, BroadcastConfig, ChangeEvent, ChangePublisher};
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::message::SequencedEvent;
use crate::observer::{
    create_observer_registry, ObserverSession, SessionId, SharedObserverRegistry,
};

/// Why an observer stopped receiving events
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ObserverError {
    /// The observer fell behind by this many events and must resync
    #[error("observer lagged behind by {0} events")]
    Lagged(u64),

    #[error("broadcaster closed")]
    Closed,
}

/// Change broadcaster.
///
/// One sequencing lock covers stamping and sending, so the channel order is
/// the sequence order and every observer sees the same order.
pub struct ChangeBroadcaster {
    sender: broadcast::Sender<SequencedEvent>,
    sequence: Mutex<u64>,
    observers: SharedObserverRegistry,
}

impl ChangeBroadcaster {
    pub fn new(config: &BroadcastConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity);
        Self {
            sender,
            sequence: Mutex::new(0),
            observers: create_observer_registry(config.max_sessions),
        }
    }

    /// Register a new observer session
    pub fn subscribe(&self, remote: Option<String>) -> BallotResult<Subscription> {
        let session = ObserverSession::new(remote);
        let session_id = session.id;

        if !self.observers.add_session(session) {
            return Err(BallotError::TooManyObservers(self.observers.max_sessions()));
        }

        info!("Observer {} connected", session_id);

        Ok(Subscription {
            session_id,
            receiver: self.sender.subscribe(),
            observers: self.observers.clone(),
        })
    }

    /// Sequence of the most recently published event
    pub fn last_sequence(&self) -> u64 {
        *self.sequence.lock()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.session_count()
    }

    pub fn observers(&self) -> &SharedObserverRegistry {
        &self.observers
    }
}

impl ChangePublisher for ChangeBroadcaster {
    fn publish(&self, event: ChangeEvent) -> u64 {
        let mut sequence = self.sequence.lock();
        *sequence += 1;

        let kind = event.kind();
        let option_id = event.option_id();
        let frame = SequencedEvent::new(*sequence, event);

        // Sending on a broadcast channel never waits on receivers.
        match self.sender.send(frame) {
            Ok(receivers) => debug!(
                "Published {} #{} for {} to {} observers",
                kind, *sequence, option_id, receivers
            ),
            Err(_) => debug!("Published {} #{} with no observers", kind, *sequence),
        }

        *sequence
    }
}

/// Shared broadcaster
pub type SharedBroadcaster = Arc<ChangeBroadcaster>;

/// Create a shared broadcaster
pub fn create_broadcaster(config: &BroadcastConfig) -> SharedBroadcaster {
    Arc::new(ChangeBroadcaster::new(config))
}

/// One observer's view of the event stream. Dropping it ends the session.
pub struct Subscription {
    session_id: SessionId,
    receiver: broadcast::Receiver<SequencedEvent>,
    observers: SharedObserverRegistry,
}

impl Subscription {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Next event in publish order
    pub async fn recv(&mut self) -> Result<SequencedEvent, ObserverError> {
        match self.receiver.recv().await {
            Ok(event) => {
                self.observers.record_delivery(&self.session_id, event.sequence);
                Ok(event)
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => Err(ObserverError::Lagged(missed)),
            Err(broadcast::error::RecvError::Closed) => Err(ObserverError::Closed),
        }
    }

    /// Next already-published event, if any, without waiting
    pub fn try_recv(&mut self) -> Option<Result<SequencedEvent, ObserverError>> {
        match self.receiver.try_recv() {
            Ok(event) => {
                self.observers.record_delivery(&self.session_id, event.sequence);
                Some(Ok(event))
            }
            Err(broadcast::error::TryRecvError::Empty) => None,
            Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                Some(Err(ObserverError::Lagged(missed)))
            }
            Err(broadcast::error::TryRecvError::Closed) => Some(Err(ObserverError::Closed)),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.observers.remove_session(&self.session_id).is_some() {
            info!("Observer {} disconnected", self.session_id);
        }
    }
}
