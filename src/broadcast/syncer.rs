//! Anti-entropy state exchange
//!
//! Point-to-point retry cannot repair a neighbor that was down through
//! every retry window, or a value that traveled a path bypassing it. The
//! syncer sends the full value snapshot to neighbors; the receiver unions
//! it into its own store. No delta encoding and no acknowledgment: the
//! union is idempotent, so a lost sync is simply covered by the next one.
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::Result;
use crate::node::messages::{Body, Payload};
use crate::node::NodeId;
use crate::store::ValueStore;
use crate::topology::TopologyView;
use crate::transport::PeerSender;

pub struct Syncer {
    transport: Arc<dyn PeerSender>,
    store: Arc<ValueStore>,
    topology: Arc<TopologyView>,
}

impl Syncer {
    pub fn new(
        transport: Arc<dyn PeerSender>,
        store: Arc<ValueStore>,
        topology: Arc<TopologyView>,
    ) -> Self {
        Self {
            transport,
            store,
            topology,
        }
    }

    /// Fire-and-forget the full snapshot at one neighbor.
    /// An empty store is skipped: there is nothing to repair with.
    pub async fn sync_with(&self, neighbor: &NodeId) -> Result<()> {
        send_snapshot(
            Arc::clone(&self.transport),
            Arc::clone(&self.store),
            neighbor,
        )
        .await
    }

    /// Snapshot to every neighbor except an optional origin, each in its
    /// own detached task. Failures are logged and dropped; the next sync
    /// round carries the same state again.
    pub fn sync_all(&self, exclude: Option<&NodeId>) {
        for neighbor in self.topology.neighbors() {
            if Some(&neighbor) == exclude {
                continue;
            }

            let transport = Arc::clone(&self.transport);
            let store = Arc::clone(&self.store);
            tokio::spawn(async move {
                if let Err(err) = send_snapshot(transport, store, &neighbor).await {
                    debug!(dest = %neighbor, error = %err, "Sync send failed, next round will retry");
                }
            });
        }
    }

    /// Background loop syncing all neighbors on a fixed interval.
    ///
    /// Runs for the process lifetime. Ticks before topology configuration
    /// see no neighbors and do nothing.
    pub fn spawn_interval(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.sync_all(None);
            }
        })
    }
}

async fn send_snapshot(
    transport: Arc<dyn PeerSender>,
    store: Arc<ValueStore>,
    neighbor: &NodeId,
) -> Result<()> {
    let values = store.snapshot();
    if values.is_empty() {
        return Ok(());
    }

    debug!(dest = %neighbor, count = values.len(), "Sending sync to neighbour");
    transport
        .send(neighbor, Body::new(Payload::Sync { values }))
        .await
}
