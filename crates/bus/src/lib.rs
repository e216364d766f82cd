//! Workflow event bus — ordered, replayable event channels.
//!
//! Each workflow id owns an append-only log plus a broadcast channel for
//! live fan-out. Publishing appends to the log first (that append must
//! succeed or the publish fails loudly) and then fans out fire-and-forget:
//! a slow, lagging, or absent subscriber can never block or fail a publish.
//!
//! `subscribe` hands back the backlog and a live receiver captured under
//! the same lock `publish` writes under, so the replay/tail seam delivers
//! every event exactly once.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;
use workloom_core::error::BusError;
use workloom_core::event::{WorkflowEvent, WorkflowId};

/// One observer's attachment to a workflow.
///
/// Owned by (and dropped with) the connection that created it. Dropping the
/// `live` receiver is all it takes to detach; the bus holds no per-observer
/// state.
#[derive(Debug)]
pub struct Subscription {
    /// Everything published before this subscription attached, in order.
    pub backlog: Vec<WorkflowEvent>,

    /// Live tail. `RecvError::Lagged` here means this subscriber fell more
    /// than the channel capacity behind — the bus kept publishing.
    pub live: broadcast::Receiver<WorkflowEvent>,
}

struct WorkflowChannel {
    log: Vec<WorkflowEvent>,
    tx: broadcast::Sender<WorkflowEvent>,
}

impl WorkflowChannel {
    fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            log: Vec::new(),
            tx,
        }
    }
}

/// The per-workflow ordered, replayable event bus.
pub struct WorkflowBus {
    channels: RwLock<HashMap<WorkflowId, WorkflowChannel>>,
    /// Workflows whose logs were purged. Publishing to these is a lifecycle
    /// bug upstream and fails with `StaleCleanup`.
    tombstones: RwLock<HashSet<WorkflowId>>,
    capacity: usize,
}

impl WorkflowBus {
    /// Create a bus whose live channels buffer `capacity` events per
    /// subscriber before a slow subscriber starts lagging.
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            tombstones: RwLock::new(HashSet::new()),
            capacity,
        }
    }

    /// Append `event` to the workflow's log and fan it out to live
    /// subscribers. The first publish for a workflow id creates its log.
    pub async fn publish(&self, event: WorkflowEvent) -> Result<(), BusError> {
        if self.tombstones.read().await.contains(&event.workflow_id) {
            return Err(BusError::StaleCleanup(event.workflow_id.clone()));
        }

        let mut channels = self.channels.write().await;
        let channel = channels
            .entry(event.workflow_id.clone())
            .or_insert_with(|| WorkflowChannel::new(self.capacity));

        channel.log.push(event.clone());
        // Fan-out is fire-and-forget: no receivers is fine, and a lagging
        // receiver only hurts itself.
        let _ = channel.tx.send(event);
        Ok(())
    }

    /// Everything published for `workflow_id` so far, in publish order.
    pub async fn history(&self, workflow_id: &str) -> Vec<WorkflowEvent> {
        self.channels
            .read()
            .await
            .get(workflow_id)
            .map(|c| c.log.clone())
            .unwrap_or_default()
    }

    /// Attach a new observer: backlog snapshot plus live tail.
    ///
    /// Holding the channels write lock across snapshot + subscribe keeps
    /// the pair atomic with respect to `publish`: no event lands between
    /// the end of the backlog and the start of the tail.
    ///
    /// Attaching to a cleaned-up workflow fails with `StaleCleanup` rather
    /// than recreating an empty channel nothing will ever publish to.
    pub async fn subscribe(&self, workflow_id: &str) -> Result<Subscription, BusError> {
        if self.tombstones.read().await.contains(workflow_id) {
            return Err(BusError::StaleCleanup(workflow_id.to_string()));
        }

        let mut channels = self.channels.write().await;
        let channel = channels
            .entry(workflow_id.to_string())
            .or_insert_with(|| WorkflowChannel::new(self.capacity));

        debug!(workflow_id, backlog = channel.log.len(), "Observer attached");
        Ok(Subscription {
            backlog: channel.log.clone(),
            live: channel.tx.subscribe(),
        })
    }

    /// Number of live subscribers for a workflow (diagnostics).
    pub async fn subscriber_count(&self, workflow_id: &str) -> usize {
        self.channels
            .read()
            .await
            .get(workflow_id)
            .map(|c| c.tx.receiver_count())
            .unwrap_or(0)
    }

    /// Purge a workflow's log once it is terminal and no further events are
    /// expected. Live receivers see their channel close. Publishing after
    /// cleanup fails with `StaleCleanup`.
    pub async fn cleanup(&self, workflow_id: &str) -> Result<(), BusError> {
        let removed = self.channels.write().await.remove(workflow_id);
        self.tombstones
            .write()
            .await
            .insert(workflow_id.to_string());
        match removed {
            Some(channel) => {
                debug!(workflow_id, events = channel.log.len(), "Workflow log purged");
                Ok(())
            }
            None => Err(BusError::UnknownWorkflow(workflow_id.to_string())),
        }
    }
}

impl Default for WorkflowBus {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Shared handle type used across worker and gateway.
pub type SharedBus = Arc<WorkflowBus>;
