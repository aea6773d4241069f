//! Stdin/stdout JSON transport
//!
//! One JSON envelope per line. Inbound lines are either replies to an
//! in-flight RPC (routed to the waiting task by msg_id) or fresh events
//! (dispatched to the node handler, one spawned task per event so a slow
//! handler never blocks the read loop). Outbound writes share stdout
//! behind a lock; logs must go to stderr only.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

use crate::error::{Result, StarlingError};
use crate::node::messages::{Body, Envelope, Payload};
use crate::node::{Node, NodeId};
use crate::transport::PeerSender;
use crate::transport_error;

type PendingReplies = Arc<Mutex<HashMap<u64, oneshot::Sender<Body>>>>;

pub struct StdioTransport {
    local: RwLock<Option<NodeId>>,
    next_msg_id: AtomicU64,
    pending: PendingReplies,
    stdout: tokio::sync::Mutex<tokio::io::Stdout>,
}

/// Deregisters an in-flight RPC when its waiting future goes away,
/// whether it got a reply or was dropped by an attempt timeout.
struct PendingGuard {
    msg_id: u64,
    pending: PendingReplies,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        let mut pending = match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        pending.remove(&self.msg_id);
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl StdioTransport {
    pub fn new() -> Self {
        Self {
            local: RwLock::new(None),
            next_msg_id: AtomicU64::new(1),
            pending: Arc::new(Mutex::new(HashMap::new())),
            stdout: tokio::sync::Mutex::new(tokio::io::stdout()),
        }
    }

    fn local_id(&self) -> Result<NodeId> {
        let guard = match self.local.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard
            .clone()
            .ok_or_else(|| transport_error!("no identity assigned yet (init not received)"))
    }

    fn set_local_id(&self, id: NodeId) {
        let mut guard = match self.local.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(id);
    }

    async fn write_envelope(&self, envelope: &Envelope) -> Result<()> {
        let mut line = serde_json::to_string(envelope)?;
        line.push('\n');

        let mut stdout = self.stdout.lock().await;
        stdout.write_all(line.as_bytes()).await?;
        stdout.flush().await?;
        Ok(())
    }

    /// Send a handler reply back to the event's source.
    async fn reply(&self, request: &Envelope, payload: Payload) -> Result<()> {
        let body = Body::reply_to(&request.body, payload);
        self.send(&request.src, body).await
    }

    /// Read envelopes off stdin until EOF, dispatching each to `node`.
    ///
    /// Replies to in-flight RPCs are routed to their waiters; everything
    /// else gets its own handler task. A malformed line is logged and
    /// skipped: the same bytes would fail identically on redelivery.
    pub async fn run(self: Arc<Self>, node: Arc<Node>) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            let envelope: Envelope = match serde_json::from_str(&line) {
                Ok(envelope) => envelope,
                Err(err) => {
                    error!(error = %err, "Dropping undecodable inbound line");
                    continue;
                }
            };

            if let Some(in_reply_to) = envelope.body.in_reply_to {
                self.route_reply(in_reply_to, envelope.body);
                continue;
            }

            // The transport needs its own identity before it can stamp
            // outbound envelopes, so it peeks at init on the way through.
            if let Payload::Init { node_id, .. } = &envelope.body.payload {
                self.set_local_id(node_id.clone());
            }

            let transport = Arc::clone(&self);
            let node = Arc::clone(&node);
            tokio::spawn(async move {
                match node.handle(envelope.clone()).await {
                    Ok(Some(payload)) => {
                        if let Err(err) = transport.reply(&envelope, payload).await {
                            error!(src = %envelope.src, error = %err, "Failed sending reply");
                        }
                    }
                    Ok(None) => {}
                    Err(err) => {
                        error!(src = %envelope.src, error = %err, "Handler failed");
                        // Surface handler failures to the original sender
                        // when it is waiting on a correlated reply.
                        if envelope.body.msg_id.is_some() {
                            let failure = Payload::Error {
                                code: 13,
                                text: err.to_string(),
                            };
                            if let Err(err) = transport.reply(&envelope, failure).await {
                                error!(src = %envelope.src, error = %err, "Failed sending error reply");
                            }
                        }
                    }
                }
            });
        }

        debug!("stdin closed, transport shutting down");
        Ok(())
    }

    fn route_reply(&self, in_reply_to: u64, body: Body) {
        let waiter = {
            let mut pending = match self.pending.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            pending.remove(&in_reply_to)
        };

        match waiter {
            Some(tx) => {
                // the waiter may have timed out between lookup and send
                let _ = tx.send(body);
            }
            None => {
                // late reply after the attempt that requested it timed out
                debug!(in_reply_to, "No waiter for reply, dropping");
            }
        }
    }
}

#[async_trait]
impl PeerSender for StdioTransport {
    async fn send(&self, dest: &NodeId, body: Body) -> Result<()> {
        let envelope = Envelope {
            src: self.local_id()?,
            dest: dest.clone(),
            body,
        };
        self.write_envelope(&envelope).await
    }

    async fn rpc(&self, dest: &NodeId, mut body: Body) -> Result<Body> {
        let msg_id = self.next_msg_id.fetch_add(1, Ordering::Relaxed);
        body.msg_id = Some(msg_id);

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = match self.pending.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            pending.insert(msg_id, tx);
        }
        let _guard = PendingGuard {
            msg_id,
            pending: Arc::clone(&self.pending),
        };

        self.send(dest, body).await?;

        match rx.await {
            Ok(reply) => Ok(reply),
            Err(_) => {
                warn!(dest = %dest, msg_id, "Reply channel closed before a reply arrived");
                Err(StarlingError::Transport(format!(
                    "rpc {} to {} abandoned",
                    msg_id, dest
                )))
            }
        }
    }
}
