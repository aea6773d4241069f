//! Starling application settings
use std::time::Duration;

use crate::broadcast::retry::RetryPolicy;

pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_RETRY_DELAY_MS: &str = "5";
pub const DEFAULT_RPC_TIMEOUT_MS: &str = "10";
pub const DEFAULT_SYNC_INTERVAL_MS: &str = "500";

/// How a newly-learned value is delivered to each neighbor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryMode {
    /// RPC awaiting a broadcast_ok reply; retried on timeout until
    /// acknowledged. The retry loop ends once the neighbor confirms.
    Acked,
    /// Plain send with no reply awaited. Relies on anti-entropy sync to
    /// repair any delivery the network swallows.
    FireAndForget,
}

impl std::fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryMode::Acked => write!(f, "acked"),
            DeliveryMode::FireAndForget => write!(f, "fire-and-forget"),
        }
    }
}

impl std::str::FromStr for DeliveryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "acked" => Ok(DeliveryMode::Acked),
            "fire-and-forget" | "fire_and_forget" => Ok(DeliveryMode::FireAndForget),
            _ => Err(format!("Invalid delivery mode: {}", s)),
        }
    }
}

/// When anti-entropy sync rounds happen.
///
/// `Interval` repairs divergence even when no new values arrive, so a
/// neighbor that was down through every retry window still catches up.
/// `OnBroadcast` piggy-backs full state on every dissemination event:
/// faster repair under traffic, no repair at all during quiet periods.
/// The two are alternatives, never combined.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncTrigger {
    Interval,
    OnBroadcast,
}

impl std::fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncTrigger::Interval => write!(f, "interval"),
            SyncTrigger::OnBroadcast => write!(f, "on-broadcast"),
        }
    }
}

impl std::str::FromStr for SyncTrigger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "interval" => Ok(SyncTrigger::Interval),
            "on-broadcast" | "on_broadcast" => Ok(SyncTrigger::OnBroadcast),
            _ => Err(format!("Invalid sync trigger: {}", s)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    // How neighbor fan-out sends are delivered
    pub delivery_mode: DeliveryMode,

    // When anti-entropy sync rounds run
    pub sync_trigger: SyncTrigger,

    // Interval between sync rounds (interval trigger only)
    pub sync_interval_ms: u64,

    // Delay between fan-out retry attempts
    pub retry_delay_ms: u64,

    // Per-attempt timeout for acked fan-out sends
    pub rpc_timeout_ms: u64,

    // Cap on fan-out retry attempts; None retries until process shutdown
    pub retry_max_attempts: Option<u32>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            delivery_mode: DeliveryMode::Acked,
            sync_trigger: SyncTrigger::Interval,
            sync_interval_ms: 500,
            retry_delay_ms: 5,
            rpc_timeout_ms: 10,
            retry_max_attempts: None,
        }
    }
}

impl Settings {
    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }

    /// The retry policy applied to every per-neighbor fan-out task.
    pub fn fan_out_retry_policy(&self) -> RetryPolicy {
        let mut policy = RetryPolicy::new(Duration::from_millis(self.retry_delay_ms));
        policy.max_attempts = self.retry_max_attempts;
        if self.delivery_mode == DeliveryMode::Acked {
            policy.attempt_timeout = Some(Duration::from_millis(self.rpc_timeout_ms));
        }
        policy
    }
}
