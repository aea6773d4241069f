//! Dissemination engine
//!
//! The retry-until-delivered fan-out and anti-entropy machinery that turns
//! "deliver once, to one node" into "eventually consistent across the
//! cluster under faults". Correctness rests entirely on the value store's
//! union semantics: values may arrive via any path, in any order, any
//! number of times, with identical end state.
pub mod disseminator;
pub mod retry;
pub mod syncer;

pub use disseminator::Disseminator;
pub use retry::RetryPolicy;
pub use syncer::Syncer;
