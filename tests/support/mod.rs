//! In-memory cluster harness for integration tests
//!
//! Routes envelopes between real `Node` instances without any I/O.
//! Links can be made lossy (fail the next N RPC attempts) or cut
//! entirely, which is how the partition and retry scenarios are driven.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use starling::error::Result;
use starling::node::messages::{Body, Envelope, Payload};
use starling::node::{Node, NodeId};
use starling::settings::Settings;
use starling::store::Value;
use starling::transport::PeerSender;
use starling::transport_error;

#[derive(Default)]
pub struct ClusterRouter {
    nodes: Mutex<HashMap<NodeId, Arc<Node>>>,
    // (from, to) -> number of upcoming RPC attempts to black-hole
    lossy_links: Mutex<HashMap<(NodeId, NodeId), u32>>,
    unreachable: Mutex<HashSet<NodeId>>,
}

impl ClusterRouter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, id: NodeId, node: Arc<Node>) {
        self.nodes.lock().unwrap().insert(id, node);
    }

    fn node(&self, id: &NodeId) -> Option<Arc<Node>> {
        self.nodes.lock().unwrap().get(id).cloned()
    }

    /// Black-hole the next `count` RPC attempts from `from` to `to`.
    pub fn drop_next(&self, from: &str, to: &str, count: u32) {
        self.lossy_links
            .lock()
            .unwrap()
            .insert((NodeId::new(from), NodeId::new(to)), count);
    }

    pub fn mark_unreachable(&self, id: &str) {
        self.unreachable.lock().unwrap().insert(NodeId::new(id));
    }

    pub fn mark_reachable(&self, id: &str) {
        self.unreachable.lock().unwrap().remove(&NodeId::new(id));
    }

    fn is_unreachable(&self, id: &NodeId) -> bool {
        self.unreachable.lock().unwrap().contains(id)
    }

    fn take_planned_drop(&self, from: &NodeId, to: &NodeId) -> bool {
        let mut links = self.lossy_links.lock().unwrap();
        let key = (from.clone(), to.clone());
        match links.get_mut(&key) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

/// Per-node transport backed by the shared router. Records every outbound
/// body so tests can assert on fan-out behavior.
pub struct RouterTransport {
    src: NodeId,
    router: Arc<ClusterRouter>,
    sent: Mutex<Vec<(NodeId, Payload)>>,
}

impl RouterTransport {
    pub fn new(src: NodeId, router: Arc<ClusterRouter>) -> Self {
        Self {
            src,
            router,
            sent: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, dest: &NodeId, body: &Body) {
        self.sent
            .lock()
            .unwrap()
            .push((dest.clone(), body.payload.clone()));
    }

    /// Destinations of every recorded outbound `broadcast`.
    pub fn broadcast_dests(&self) -> Vec<NodeId> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, payload)| matches!(payload, Payload::Broadcast { .. }))
            .map(|(dest, _)| dest.clone())
            .collect()
    }

    /// Destinations of every recorded outbound `sync`.
    pub fn sync_dests(&self) -> Vec<NodeId> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, payload)| matches!(payload, Payload::Sync { .. }))
            .map(|(dest, _)| dest.clone())
            .collect()
    }
}

#[async_trait]
impl PeerSender for RouterTransport {
    async fn send(&self, dest: &NodeId, body: Body) -> Result<()> {
        self.record(dest, &body);

        // fire-and-forget into a dead link is silently lost, like UDP
        if self.router.is_unreachable(dest) {
            return Ok(());
        }

        if let Some(node) = self.router.node(dest) {
            let envelope = Envelope {
                src: self.src.clone(),
                dest: dest.clone(),
                body,
            };
            tokio::spawn(async move {
                let _ = node.handle(envelope).await;
            });
        }
        Ok(())
    }

    async fn rpc(&self, dest: &NodeId, mut body: Body) -> Result<Body> {
        self.record(dest, &body);
        body.msg_id = Some(1);

        // a partitioned or lossy link never answers; the caller's
        // per-attempt timeout is what turns this into a retry
        if self.router.is_unreachable(dest) || self.router.take_planned_drop(&self.src, dest)
        {
            std::future::pending::<()>().await;
            unreachable!();
        }

        let node = self
            .router
            .node(dest)
            .ok_or_else(|| transport_error!("peer {} not registered", dest))?;

        let envelope = Envelope {
            src: self.src.clone(),
            dest: dest.clone(),
            body,
        };
        match node.handle(envelope).await? {
            Some(payload) => Ok(Body {
                msg_id: None,
                in_reply_to: Some(1),
                payload,
            }),
            None => {
                std::future::pending::<()>().await;
                unreachable!();
            }
        }
    }
}

/// Fast timings so retry/sync scenarios settle quickly under test.
pub fn test_settings() -> Settings {
    Settings {
        sync_interval_ms: 20,
        retry_delay_ms: 2,
        rpc_timeout_ms: 10,
        ..Settings::default()
    }
}

pub fn spawn_node(
    router: &Arc<ClusterRouter>,
    id: &str,
    settings: Settings,
) -> (Arc<Node>, Arc<RouterTransport>) {
    let transport = Arc::new(RouterTransport::new(NodeId::new(id), Arc::clone(router)));
    let node = Arc::new(Node::new(
        settings,
        Arc::clone(&transport) as Arc<dyn PeerSender>,
    ));
    router.register(NodeId::new(id), Arc::clone(&node));
    (node, transport)
}

pub fn envelope(src: &str, dest: &str, payload: Payload) -> Envelope {
    Envelope {
        src: NodeId::new(src),
        dest: NodeId::new(dest),
        body: Body {
            msg_id: Some(1),
            in_reply_to: None,
            payload,
        },
    }
}

pub async fn init_node(node: &Node, id: &str, all_nodes: &[&str]) {
    let payload = Payload::Init {
        node_id: NodeId::new(id),
        node_ids: all_nodes.iter().map(|n| NodeId::new(*n)).collect(),
    };
    let reply = node.handle(envelope("c0", id, payload)).await.unwrap();
    assert_eq!(reply, Some(Payload::InitOk));
}

pub async fn configure_topology(node: &Node, id: &str, adjacency: &[(&str, &[&str])]) {
    let topology: HashMap<NodeId, Vec<NodeId>> = adjacency
        .iter()
        .map(|(from, neighbors)| {
            (
                NodeId::new(*from),
                neighbors.iter().map(|n| NodeId::new(*n)).collect(),
            )
        })
        .collect();
    let reply = node
        .handle(envelope("c0", id, Payload::Topology { topology }))
        .await
        .unwrap();
    assert_eq!(reply, Some(Payload::TopologyOk));
}

pub async fn broadcast_value(node: &Node, from: &str, dest: &str, value: i64) -> Option<Payload> {
    node.handle(envelope(
        from,
        dest,
        Payload::Broadcast {
            message: Value(value),
        },
    ))
    .await
    .unwrap()
}

/// Poll until every node's store contains `value`, or panic after 5s.
pub async fn await_convergence(nodes: &[&Arc<Node>], value: i64) {
    let deadline = std::time::Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            if nodes.iter().all(|node| node.store().seen(Value(value))) {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("cluster failed to converge within 5s");
}
