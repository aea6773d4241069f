//! Broadcast node
//!
//! Wires the value store, topology view, disseminator and syncer together
//! behind the platform's handler-by-name contract: `init`, `broadcast`,
//! `read`, `topology` and `sync` events in, acknowledgment replies and
//! detached fan-out/sync traffic out.
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::broadcast::{Disseminator, Syncer};
use crate::error::Result;
use crate::protocol_error;
use crate::settings::{Settings, SyncTrigger};
use crate::store::{Value, ValueStore};
use crate::topology::TopologyView;
use crate::transport::PeerSender;

pub mod messages;
pub mod node_id;

use messages::{Envelope, Payload};
pub use node_id::NodeId;

pub struct Node {
    id: RwLock<Option<NodeId>>,
    known_nodes: RwLock<Vec<NodeId>>,
    store: Arc<ValueStore>,
    topology: Arc<TopologyView>,
    disseminator: Disseminator,
    syncer: Arc<Syncer>,
    settings: Settings,
}

impl Node {
    pub fn new(settings: Settings, transport: Arc<dyn PeerSender>) -> Self {
        let store = Arc::new(ValueStore::new());
        let topology = Arc::new(TopologyView::new());

        let disseminator = Disseminator::new(
            Arc::clone(&transport),
            Arc::clone(&topology),
            settings.fan_out_retry_policy(),
            settings.delivery_mode,
        );
        let syncer = Arc::new(Syncer::new(
            transport,
            Arc::clone(&store),
            Arc::clone(&topology),
        ));

        Self {
            id: RwLock::new(None),
            known_nodes: RwLock::new(Vec::new()),
            store,
            topology,
            disseminator,
            syncer,
            settings,
        }
    }

    /// This node's identity, once init has been processed.
    pub fn id(&self) -> Option<NodeId> {
        let guard = match self.id.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.clone()
    }

    pub fn store(&self) -> Arc<ValueStore> {
        Arc::clone(&self.store)
    }

    pub fn topology(&self) -> Arc<TopologyView> {
        Arc::clone(&self.topology)
    }

    /// Start the interval anti-entropy loop, when configured. Returns the
    /// task handle so callers can keep or drop it; the loop itself runs
    /// until process shutdown either way.
    pub fn start_background(&self) -> Option<JoinHandle<()>> {
        match self.settings.sync_trigger {
            SyncTrigger::Interval => Some(
                Arc::clone(&self.syncer).spawn_interval(self.settings.sync_interval()),
            ),
            SyncTrigger::OnBroadcast => None,
        }
    }

    /// Dispatch one inbound event. Returns the reply payload the transport
    /// should send back, or None for events that take no reply.
    pub async fn handle(&self, envelope: Envelope) -> Result<Option<Payload>> {
        match envelope.body.payload.clone() {
            Payload::Init { node_id, node_ids } => {
                Ok(Some(self.handle_init(node_id, node_ids)))
            }
            Payload::Broadcast { message } => {
                Ok(Some(self.handle_broadcast(message, &envelope.src)))
            }
            Payload::Read => Ok(Some(self.handle_read())),
            Payload::Topology { topology } => {
                self.handle_topology(&topology).map(Some)
            }
            Payload::Sync { values } => {
                self.handle_sync(values);
                Ok(None)
            }
            other => Err(protocol_error!("unexpected inbound event: {:?}", other)),
        }
    }

    fn handle_init(&self, node_id: NodeId, node_ids: Vec<NodeId>) -> Payload {
        {
            let mut guard = match self.id.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(existing) = guard.as_ref() {
                warn!("[Node<{}>] Duplicate init ignored", existing);
                return Payload::InitOk;
            }
            info!(
                "[Node<{}>] Initialized, {} nodes in cluster",
                node_id,
                node_ids.len()
            );
            *guard = Some(node_id);
        }

        let mut known = match self.known_nodes.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *known = node_ids;

        Payload::InitOk
    }

    /// Dedup check, durable local record, then acknowledgment. Fan-out and
    /// sync run detached, so the ack is observable before any neighbor
    /// delivery completes. Duplicates are acknowledged but spawn nothing:
    /// an unacknowledged duplicate would keep the sending peer's retry
    /// loop running forever.
    fn handle_broadcast(&self, message: Value, origin: &NodeId) -> Payload {
        if !self.store.insert(message) {
            debug!(%message, "Already seen");
            return Payload::BroadcastOk;
        }

        self.disseminator.fan_out(message, Some(origin));
        if self.settings.sync_trigger == SyncTrigger::OnBroadcast {
            self.syncer.sync_all(Some(origin));
        }

        Payload::BroadcastOk
    }

    fn handle_read(&self) -> Payload {
        let messages = self.store.snapshot();
        debug!(count = messages.len(), "Returning messages I've seen");
        Payload::ReadOk { messages }
    }

    fn handle_topology(&self, adjacency: &HashMap<NodeId, Vec<NodeId>>) -> Result<Payload> {
        let id = self
            .id()
            .ok_or_else(|| protocol_error!("topology delivered before init"))?;

        let configured = if adjacency.contains_key(&id) {
            self.topology.configure(adjacency, &id)
        } else {
            // no row for this node: fall back to a full mesh over the
            // cluster membership from init
            let known = match self.known_nodes.read() {
                Ok(guard) => guard.clone(),
                Err(poisoned) => poisoned.into_inner().clone(),
            };
            self.topology.configure_mesh(&known, &id)
        };

        if !configured {
            warn!("[Node<{}>] Topology re-delivery ignored, view is immutable", id);
        }

        Ok(Payload::TopologyOk)
    }

    /// Pure union, no reply. Never rejects a value; the store only grows.
    fn handle_sync(&self, values: Vec<Value>) {
        debug!(count = values.len(), "Merging sync payload");
        self.store.store(values);
    }
}
