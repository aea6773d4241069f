//! Message transport
//!
//! The boundary between the broadcast engine and whatever carries its
//! messages. The engine only ever talks to the [`PeerSender`] trait; the
//! concrete implementation here rides the platform's line-delimited JSON
//! protocol over stdin/stdout, correlating request/response by msg_id.
pub mod stdio;

use async_trait::async_trait;

use crate::error::Result;
use crate::node::messages::Body;
use crate::node::NodeId;

pub use stdio::StdioTransport;

/// Outbound half of the transport collaborator.
#[async_trait]
pub trait PeerSender: Send + Sync {
    /// Fire-and-forget send: no reply is awaited or expected.
    async fn send(&self, dest: &NodeId, body: Body) -> Result<()>;

    /// Request/response send: resolves with the correlated reply body.
    ///
    /// No timeout is applied here; callers that need one bound the call
    /// themselves (the retry policy's per-attempt timeout does exactly
    /// that for fan-out sends).
    async fn rpc(&self, dest: &NodeId, body: Body) -> Result<Body>;
}
