//! Neighbor fan-out for newly-learned values
//!
//! Called exactly once per value this node has never seen before. Each
//! neighbor gets its own detached task driving delivery under the retry
//! policy, so fan-out outlives the inbound request that triggered it; the
//! client is acknowledged long before the cluster has converged. Detached
//! tasks have no cancellation path short of process shutdown, which is
//! deliberate: indefinite background retry is how partitions that heal
//! late are tolerated.
use std::sync::Arc;

use tracing::{debug, error};

use crate::broadcast::retry::RetryPolicy;
use crate::error::{Result, StarlingError};
use crate::node::messages::{Body, Payload};
use crate::node::NodeId;
use crate::protocol_error;
use crate::settings::DeliveryMode;
use crate::store::Value;
use crate::topology::TopologyView;
use crate::transport::PeerSender;

pub struct Disseminator {
    transport: Arc<dyn PeerSender>,
    topology: Arc<TopologyView>,
    policy: RetryPolicy,
    mode: DeliveryMode,
}

impl Disseminator {
    pub fn new(
        transport: Arc<dyn PeerSender>,
        topology: Arc<TopologyView>,
        policy: RetryPolicy,
        mode: DeliveryMode,
    ) -> Self {
        Self {
            transport,
            topology,
            policy,
            mode,
        }
    }

    /// Propagate `value` to every neighbor except the peer it arrived from.
    ///
    /// Returns immediately; all delivery happens in detached tasks. The
    /// origin is excluded only from this fan-out round, not from future
    /// sync repair.
    pub fn fan_out(&self, value: Value, origin: Option<&NodeId>) {
        for neighbor in self.topology.neighbors() {
            if Some(&neighbor) == origin {
                continue;
            }

            let transport = Arc::clone(&self.transport);
            let policy = self.policy.clone();
            let mode = self.mode;
            tokio::spawn(async move {
                debug!(dest = %neighbor, %value, "Sending broadcast to neighbour");
                let result =
                    deliver_with_retry(transport, &policy, mode, &neighbor, value).await;
                if let Err(err) = result {
                    // Terminal for this task only; the inbound request that
                    // spawned us was acknowledged long ago.
                    error!(dest = %neighbor, %value, error = %err, "Unable to broadcast");
                }
            });
        }
    }
}

async fn deliver_with_retry(
    transport: Arc<dyn PeerSender>,
    policy: &RetryPolicy,
    mode: DeliveryMode,
    dest: &NodeId,
    value: Value,
) -> Result<()> {
    policy
        .run(
            || {
                let transport = Arc::clone(&transport);
                let dest = dest.clone();
                async move {
                    let body = Body::new(Payload::Broadcast { message: value });
                    match mode {
                        DeliveryMode::FireAndForget => transport.send(&dest, body).await,
                        DeliveryMode::Acked => {
                            let reply = transport.rpc(&dest, body).await?;
                            match reply.payload {
                                Payload::BroadcastOk => Ok(()),
                                Payload::Error { code, text } => {
                                    Err(protocol_error!("peer error {}: {}", code, text))
                                }
                                other => Err(protocol_error!(
                                    "expected broadcast_ok, got {:?}",
                                    other
                                )),
                            }
                        }
                    }
                }
            },
            StarlingError::is_retryable,
        )
        .await
}
