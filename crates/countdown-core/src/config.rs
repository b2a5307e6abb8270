use std::time::Duration;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_PAUSE_POLL_MS: u64 = 1_000;
pub const DEFAULT_EDIT_TIMEOUT_MS: u64 = 5_000; // one slow edit must not stall the cadence
pub const DEFAULT_PIN_DELAY_SECS: u64 = 3;
pub const DEFAULT_PROPOSAL_TTL_SECS: u64 = 3_600;
pub const DEFAULT_MILESTONES: [u64; 4] = [3_600, 600, 60, 10];

/// Top-level config (countdown.toml + COUNTDOWN_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CountdownConfig {
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub telegram: Option<TelegramConfig>,
}

/// Knobs for the tick engine, the display adapter and the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Length of one tick. One second in production; the value exists so the
    /// cadence is named in one place.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// How often a paused loop re-reads its timer state.
    #[serde(default = "default_pause_poll_ms")]
    pub pause_poll_ms: u64,
    /// Upper bound on any single transport call.
    #[serde(default = "default_edit_timeout_ms")]
    pub edit_timeout_ms: u64,
    /// Pin the countdown message shortly after it starts.
    #[serde(default = "bool_true")]
    pub pin: bool,
    #[serde(default = "default_pin_delay_secs")]
    pub pin_delay_secs: u64,
    /// Remaining-seconds values at which a separate reminder is posted.
    #[serde(default = "default_milestones")]
    pub milestones: Vec<u64>,
    /// Allow only one live countdown per conversation.
    #[serde(default)]
    pub one_per_conversation: bool,
    /// Unconfirmed proposals older than this are dropped.
    #[serde(default = "default_proposal_ttl_secs")]
    pub proposal_ttl_secs: u64,
}

impl TimerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn pause_poll(&self) -> Duration {
        Duration::from_millis(self.pause_poll_ms.max(1))
    }

    pub fn edit_timeout(&self) -> Duration {
        Duration::from_millis(self.edit_timeout_ms.max(1))
    }

    pub fn pin_delay(&self) -> Duration {
        Duration::from_secs(self.pin_delay_secs)
    }

    pub fn proposal_ttl(&self) -> Duration {
        Duration::from_secs(self.proposal_ttl_secs)
    }

    pub fn is_milestone(&self, remaining: u64) -> bool {
        remaining > 0 && self.milestones.contains(&remaining)
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            pause_poll_ms: DEFAULT_PAUSE_POLL_MS,
            edit_timeout_ms: DEFAULT_EDIT_TIMEOUT_MS,
            pin: true,
            pin_delay_secs: DEFAULT_PIN_DELAY_SECS,
            milestones: DEFAULT_MILESTONES.to_vec(),
            one_per_conversation: false,
            proposal_ttl_secs: DEFAULT_PROPOSAL_TTL_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
}

fn bool_true() -> bool {
    true
}
fn default_tick_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}
fn default_pause_poll_ms() -> u64 {
    DEFAULT_PAUSE_POLL_MS
}
fn default_edit_timeout_ms() -> u64 {
    DEFAULT_EDIT_TIMEOUT_MS
}
fn default_pin_delay_secs() -> u64 {
    DEFAULT_PIN_DELAY_SECS
}
fn default_proposal_ttl_secs() -> u64 {
    DEFAULT_PROPOSAL_TTL_SECS
}
fn default_milestones() -> Vec<u64> {
    DEFAULT_MILESTONES.to_vec()
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.countdown/countdown.db", home)
}

impl CountdownConfig {
    /// Load config from a TOML file with COUNTDOWN_* env var overrides.
    ///
    /// Nested keys use a double underscore: `COUNTDOWN_TIMER__PAUSE_POLL_MS=500`.
    /// A missing file is not an error; every field has a default.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);
        debug!(path = %path, "loading config");

        Self::figment(&path)
            .extract()
            .map_err(|e| crate::error::CoreError::Config(e.to_string()))
    }

    fn figment(path: &str) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("COUNTDOWN_").split("__"))
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.countdown/countdown.toml", home)
}
