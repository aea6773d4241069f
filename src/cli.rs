//! CLI for this application
//!
use crate::settings;

pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Clone, Debug, clap::Parser)]
pub struct Cli {
    // Delivery mode for neighbor fan-out
    #[clap(
        long,
        default_value = "acked",
        env("STARLING_DELIVERY_MODE"),
        help = "delivery-mode: 'acked' (RPC until acknowledged) or 'fire-and-forget'"
    )]
    pub delivery_mode: settings::DeliveryMode,

    // Anti-entropy trigger policy
    #[clap(
        long,
        default_value = "interval",
        env("STARLING_SYNC_TRIGGER"),
        help = "sync-trigger: 'interval' or 'on-broadcast'"
    )]
    pub sync_trigger: settings::SyncTrigger,

    // Anti-entropy sync interval
    #[clap(
        long,
        default_value = settings::DEFAULT_SYNC_INTERVAL_MS,
        env("STARLING_SYNC_INTERVAL_MS"),
        help = "Milliseconds between anti-entropy sync rounds"
    )]
    pub sync_interval_ms: u64,

    // Delay between retry attempts
    #[clap(
        long,
        default_value = settings::DEFAULT_RETRY_DELAY_MS,
        env("STARLING_RETRY_DELAY_MS"),
        help = "Milliseconds to wait between fan-out retry attempts"
    )]
    pub retry_delay_ms: u64,

    // Per-attempt RPC timeout
    #[clap(
        long,
        default_value = settings::DEFAULT_RPC_TIMEOUT_MS,
        env("STARLING_RPC_TIMEOUT_MS"),
        help = "Milliseconds before a single acked send attempt times out"
    )]
    pub rpc_timeout_ms: u64,

    // Optional bound on retries
    #[clap(
        long,
        env("STARLING_RETRY_MAX_ATTEMPTS"),
        help = "Cap fan-out retry attempts (default: retry until shutdown)"
    )]
    pub retry_max_attempts: Option<u32>,
}

impl Cli {
    pub fn into_settings(self) -> settings::Settings {
        settings::Settings {
            delivery_mode: self.delivery_mode,
            sync_trigger: self.sync_trigger,
            sync_interval_ms: self.sync_interval_ms,
            retry_delay_ms: self.retry_delay_ms,
            rpc_timeout_ms: self.rpc_timeout_ms,
            retry_max_attempts: self.retry_max_attempts,
        }
    }
}
