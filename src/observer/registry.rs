//! Observer registry — at most one live push channel per job id.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, warn};

use crate::error::DeliveryError;
use crate::session::ProgressEvent;

/// A push endpoint for serialized progress events.
#[async_trait]
pub trait ObserverChannel: Send + Sync {
    /// Deliver one serialized event.
    async fn send(&self, frame: String) -> Result<(), DeliveryError>;

    /// Release the transport. Called when the channel is replaced or has
    /// failed; must be idempotent.
    fn close(&self) {}
}

/// Identifies one particular attachment of a channel to a job id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverToken(u64);

struct Slot {
    token: ObserverToken,
    channel: Arc<dyn ObserverChannel>,
}

/// Maps job ids to their single observer channel.
pub struct ObserverRegistry {
    slots: RwLock<HashMap<String, Slot>>,
    next_token: AtomicU64,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            next_token: AtomicU64::new(1),
        }
    }

    /// Register `channel` for `id`, replacing (and closing) any previous one.
    pub async fn attach(&self, id: &str, channel: Arc<dyn ObserverChannel>) -> ObserverToken {
        let token = ObserverToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        let previous = self
            .slots
            .write()
            .await
            .insert(id.to_string(), Slot { token, channel });

        if let Some(previous) = previous {
            debug!(job_id = %id, "Replacing existing observer");
            previous.channel.close();
        }
        info!(job_id = %id, "Observer attached");
        token
    }

    /// Remove whatever channel is registered for `id`.
    pub async fn detach(&self, id: &str) {
        if let Some(slot) = self.slots.write().await.remove(id) {
            slot.channel.close();
            info!(job_id = %id, "Observer detached");
        }
    }

    /// Remove the channel for `id` only if it is still the attachment
    /// identified by `token`. A stale connection going away must not evict
    /// the one that replaced it.
    pub async fn detach_if_current(&self, id: &str, token: ObserverToken) -> bool {
        let mut slots = self.slots.write().await;
        if slots.get(id).is_some_and(|slot| slot.token == token) {
            if let Some(slot) = slots.remove(id) {
                slot.channel.close();
            }
            info!(job_id = %id, "Observer detached");
            true
        } else {
            false
        }
    }

    /// Whether a channel is registered for `id`.
    pub async fn is_attached(&self, id: &str) -> bool {
        self.slots.read().await.contains_key(id)
    }

    /// Best-effort delivery of `event` to the channel registered for `id`.
    ///
    /// Never fails: on any delivery error the channel is detached and the
    /// error is logged.
    pub async fn push(&self, id: &str, event: &ProgressEvent) {
        let (token, channel) = match self.slots.read().await.get(id) {
            Some(slot) => (slot.token, Arc::clone(&slot.channel)),
            None => return,
        };

        let result = match serde_json::to_string(event) {
            Ok(frame) => channel.send(frame).await,
            Err(e) => Err(DeliveryError::from(e)),
        };

        match result {
            Ok(()) => debug!(
                job_id = %id,
                status = %event.status,
                progress = event.progress_percentage,
                "Progress pushed"
            ),
            Err(e) => {
                warn!(job_id = %id, error = %e, "Failed to push progress, detaching observer");
                self.detach_if_current(id, token).await;
            }
        }
    }
}

impl Default for ObserverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// In-process channel backed by an unbounded mpsc queue.
///
/// Sending never waits on the consumer, so a slow client cannot stall the
/// job pushing to it. Closing drops the sender, which ends the receiver.
pub struct QueueChannel {
    tx: Mutex<Option<mpsc::UnboundedSender<String>>>,
}

impl QueueChannel {
    /// Create a channel and the receiver its frames arrive on.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                tx: Mutex::new(Some(tx)),
            }),
            rx,
        )
    }

    fn sender(&self) -> Option<mpsc::UnboundedSender<String>> {
        self.tx.lock().ok().and_then(|tx| tx.clone())
    }
}

#[async_trait]
impl ObserverChannel for QueueChannel {
    async fn send(&self, frame: String) -> Result<(), DeliveryError> {
        let tx = self.sender().ok_or(DeliveryError::Closed)?;
        tx.send(frame).map_err(|_| DeliveryError::Closed)
    }

    fn close(&self) {
        if let Ok(mut tx) = self.tx.lock() {
            tx.take();
        }
    }
}
