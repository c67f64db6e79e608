//! Watcher configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing knobs for [`TxRegistry`](crate::registry::TxRegistry).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Delay between fallback status polls.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Grace period a terminal entry stays readable before removal.
    #[serde(default = "default_removal_delay_ms")]
    pub removal_delay_ms: u64,
    /// Entries older than this are evicted by `cleanup()`. Matches the
    /// validity window of a submitted transaction.
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
    /// How often the background sweeper calls `cleanup()`.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Capacity of the status update broadcast channel.
    #[serde(default = "default_update_channel_capacity")]
    pub update_channel_capacity: usize,
}

fn default_poll_interval_ms() -> u64 { 6_000 }
fn default_removal_delay_ms() -> u64 { 60_000 }
fn default_max_age_secs() -> u64 { 900 }
fn default_sweep_interval_secs() -> u64 { 60 }
fn default_update_channel_capacity() -> usize { 256 }

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            removal_delay_ms: default_removal_delay_ms(),
            max_age_secs: default_max_age_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            update_channel_capacity: default_update_channel_capacity(),
        }
    }
}

impl WatcherConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn removal_delay(&self) -> Duration {
        Duration::from_millis(self.removal_delay_ms)
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    /// Never zero; a zero-period ticker would panic.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}
