//! Broadcast wire protocol
//!
//! Line-delimited JSON envelopes exchanged with the platform and with peer
//! nodes. The body is internally tagged on "type" so the wire shape matches
//! the platform's handler-by-name dispatch, e.g.
//! `{"src":"c1","dest":"n1","body":{"type":"broadcast","message":42,"msg_id":1}}`.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::node::NodeId;
use crate::store::Value;

/// A routed message: who sent it, who it is for, and the typed body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub src: NodeId,
    pub dest: NodeId,
    pub body: Body,
}

/// Message body: correlation ids plus the typed payload, flattened so the
/// payload fields sit alongside msg_id/in_reply_to on the wire.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Body {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<u64>,

    #[serde(flatten)]
    pub payload: Payload,
}

impl Body {
    pub fn new(payload: Payload) -> Self {
        Self {
            msg_id: None,
            in_reply_to: None,
            payload,
        }
    }

    /// A reply body correlated to the message that carried `msg_id`.
    pub fn reply_to(request: &Body, payload: Payload) -> Self {
        Self {
            msg_id: None,
            in_reply_to: request.msg_id,
            payload,
        }
    }
}

/// All inbound events and outbound effects of the broadcast protocol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    /// Identity assignment; delivered exactly once, before any other event
    Init {
        node_id: NodeId,
        node_ids: Vec<NodeId>,
    },
    InitOk,

    /// A value to record and disseminate
    Broadcast { message: Value },
    BroadcastOk,

    /// Request for every value this node has seen
    Read,
    ReadOk { messages: Vec<Value> },

    /// Cluster-wide adjacency map; this node keeps only its own row
    Topology {
        topology: HashMap<NodeId, Vec<NodeId>>,
    },
    TopologyOk,

    /// Anti-entropy payload: a peer's full value snapshot. No reply.
    Sync { values: Vec<Value> },

    /// Platform error body (e.g. RPC to a crashed node)
    Error { code: u64, text: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_platform_broadcast_line() {
        let line = r#"{"src":"c1","dest":"n1","body":{"type":"broadcast","message":42,"msg_id":7}}"#;
        let envelope: Envelope = serde_json::from_str(line).unwrap();

        assert_eq!(envelope.src, NodeId::new("c1"));
        assert_eq!(envelope.dest, NodeId::new("n1"));
        assert_eq!(envelope.body.msg_id, Some(7));
        assert_eq!(
            envelope.body.payload,
            Payload::Broadcast { message: Value(42) }
        );
    }

    #[test]
    fn test_decodes_topology_adjacency() {
        let line = r#"{"src":"c0","dest":"n2","body":{"type":"topology","msg_id":1,
            "topology":{"n1":["n2"],"n2":["n1","n3"],"n3":["n2"]}}}"#;
        let envelope: Envelope = serde_json::from_str(line).unwrap();

        match envelope.body.payload {
            Payload::Topology { topology } => {
                assert_eq!(topology.len(), 3);
                assert_eq!(
                    topology[&NodeId::new("n2")],
                    vec![NodeId::new("n1"), NodeId::new("n3")]
                );
            }
            other => panic!("expected topology payload, got {:?}", other),
        }
    }

    #[test]
    fn test_reply_carries_in_reply_to() {
        let mut request = Body::new(Payload::Broadcast { message: Value(5) });
        request.msg_id = Some(12);

        let reply = Body::reply_to(&request, Payload::BroadcastOk);
        assert_eq!(reply.in_reply_to, Some(12));

        let encoded = serde_json::to_string(&reply).unwrap();
        assert!(encoded.contains(r#""in_reply_to":12"#));
        assert!(encoded.contains(r#""type":"broadcast_ok"#));
        // absent correlation ids stay off the wire
        assert!(!encoded.contains("msg_id"));
    }

    #[test]
    fn test_sync_round_trip() {
        let body = Body::new(Payload::Sync {
            values: vec![Value(1), Value(2), Value(3)],
        });
        let encoded = serde_json::to_string(&body).unwrap();
        let decoded: Body = serde_json::from_str(&encoded).unwrap();

        assert_eq!(decoded.payload, body.payload);
    }

    #[test]
    fn test_rejects_unknown_event_type() {
        let line = r#"{"src":"c1","dest":"n1","body":{"type":"compare_and_swap","from":1,"to":2}}"#;
        assert!(serde_json::from_str::<Envelope>(line).is_err());
    }
}
