//! Starling: replicated broadcast as a service
//!
//! Each process is one node of a broadcast cluster. Values arrive from
//! clients or peers, are recorded in a grow-only store, and are pushed to
//! topology neighbors with unbounded retry plus periodic anti-entropy
//! sync, so every value eventually reaches every reachable node despite
//! lost, delayed, or reordered delivery. The wire protocol is
//! at-least-once by design; the receiver's dedup makes redelivery
//! harmless.
pub mod broadcast;
pub mod cli;
pub mod error;
pub mod node;
pub mod settings;
pub mod store;
pub mod topology;
pub mod transport;
