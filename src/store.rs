//! Grow-only value store
//!
//! The deduplication ground truth for the broadcast protocol. Values are
//! opaque tokens; only identity matters. The set never shrinks, which is
//! what makes merge-by-union commutative and idempotent no matter how many
//! times or in what order a value arrives.
use std::collections::HashSet;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

/// An opaque broadcast value. Carried on the wire as a bare JSON number.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Value(pub i64);

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value(v)
    }
}

/// Concurrent set of every value this node has observed.
///
/// Writers exclude readers and other writers; readers run concurrently.
/// Callers need no external synchronization.
#[derive(Debug, Default)]
pub struct ValueStore {
    values: RwLock<HashSet<Value>>,
}

impl ValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert all given values. Already-present values are a no-op.
    /// Never fails: a poisoned lock still holds a usable grow-only set.
    pub fn store<I>(&self, values: I)
    where
        I: IntoIterator<Item = Value>,
    {
        let mut guard = match self.values.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.extend(values);
    }

    /// Insert a single value, reporting whether it was new.
    ///
    /// The check and the insert happen under one write lock, so exactly
    /// one of any set of concurrent duplicate deliveries observes `true`.
    /// That is what keeps fan-out at one round per value.
    pub fn insert(&self, value: Value) -> bool {
        let mut guard = match self.values.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.insert(value)
    }

    /// All values known so far, in no particular order. The store may grow
    /// immediately after this returns.
    pub fn snapshot(&self) -> Vec<Value> {
        let guard = match self.values.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.iter().copied().collect()
    }

    /// Pure membership query.
    pub fn seen(&self, value: Value) -> bool {
        let guard = match self.values.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.contains(&value)
    }

    pub fn len(&self) -> usize {
        let guard = match self.values.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
