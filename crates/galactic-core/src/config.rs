//! Configuration loading and typed config structures for the engine.
//!
//! The canonical configuration lives in `galactic-config.yaml` at the
//! project root. Every field has a default, so a missing file or a partial
//! file both produce a usable configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use galactic_types::{AiTier, Priority};
use serde::{Deserialize, Serialize};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value is out of its allowed range.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level engine configuration.
///
/// Mirrors the structure of `galactic-config.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Real milliseconds per game day.
    #[serde(default = "default_day_tick_rate_ms")]
    pub day_tick_rate_ms: u64,

    /// Real milliseconds per game quarter.
    #[serde(default = "default_quarter_tick_rate_ms")]
    pub quarter_tick_rate_ms: u64,

    /// Soft player limit; exceeding it only logs a warning.
    #[serde(default = "default_max_players")]
    pub max_players: usize,

    /// Hard player limit.
    #[serde(default = "default_target_max_players")]
    pub target_max_players: usize,

    /// Capacity of each galaxy region.
    #[serde(default = "default_players_per_shard")]
    pub players_per_shard: u32,

    /// Maximum actions popped from one queue at a time.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum batches dispatched in parallel.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Time budget of one processing pass, in milliseconds.
    #[serde(default = "default_processing_time_slice_ms")]
    pub processing_time_slice_ms: u64,

    /// Quarterly AI decision budgets.
    #[serde(default)]
    pub ai_processing_budget: AiBudgetConfig,

    /// Maximum entries in the decision cache.
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,

    /// Hit rate below which the performance monitor warns.
    #[serde(default = "default_cache_hit_rate_target")]
    pub cache_hit_rate_target: f64,

    /// Interval between auto-saves, in milliseconds.
    #[serde(default = "default_auto_save_interval_ms")]
    pub auto_save_interval_ms: u64,

    /// Interval between durable snapshots, in milliseconds of game time.
    #[serde(default = "default_snapshot_interval_ms")]
    pub snapshot_interval_ms: u64,

    /// Interval between performance samples, in milliseconds.
    #[serde(default = "default_metrics_interval_ms")]
    pub metrics_interval_ms: u64,

    /// A player is active if they acted within this many milliseconds.
    #[serde(default = "default_active_player_threshold_ms")]
    pub active_player_threshold_ms: u64,

    /// Load attributed to a region for each AI-backed decision.
    #[serde(default = "default_ai_load_per_call")]
    pub ai_load_per_call: f64,

    /// Per-priority latency targets, drain weights and queue capacities.
    #[serde(default)]
    pub processing_priorities: ProcessingPriorities,

    /// Observer HTTP server settings.
    #[serde(default)]
    pub observer: ObserverConfig,

    /// Where game state is persisted.
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            day_tick_rate_ms: default_day_tick_rate_ms(),
            quarter_tick_rate_ms: default_quarter_tick_rate_ms(),
            max_players: default_max_players(),
            target_max_players: default_target_max_players(),
            players_per_shard: default_players_per_shard(),
            batch_size: default_batch_size(),
            max_concurrency: default_max_concurrency(),
            processing_time_slice_ms: default_processing_time_slice_ms(),
            ai_processing_budget: AiBudgetConfig::default(),
            cache_size: default_cache_size(),
            cache_hit_rate_target: default_cache_hit_rate_target(),
            auto_save_interval_ms: default_auto_save_interval_ms(),
            snapshot_interval_ms: default_snapshot_interval_ms(),
            metrics_interval_ms: default_metrics_interval_ms(),
            active_player_threshold_ms: default_active_player_threshold_ms(),
            ai_load_per_call: default_ai_load_per_call(),
            processing_priorities: ProcessingPriorities::default(),
            observer: ObserverConfig::default(),
            persistence: PersistenceConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a YAML file, apply environment overrides,
    /// and validate the result.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, apply environment
    /// overrides, and validate the result.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Override file values from `GALACTIC_DATA_DIR` and
    /// `GALACTIC_OBSERVER_PORT` when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("GALACTIC_DATA_DIR")
            && !dir.is_empty()
        {
            self.persistence.data_dir = Some(PathBuf::from(dir));
        }
        if let Ok(port) = std::env::var("GALACTIC_OBSERVER_PORT") {
            match port.parse::<u16>() {
                Ok(port) => self.observer.port = port,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid GALACTIC_OBSERVER_PORT"),
            }
        }
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.day_tick_rate_ms == 0 || self.quarter_tick_rate_ms == 0 {
            return Err(invalid("tick rates must be at least 1ms"));
        }
        if self.quarter_tick_rate_ms < self.day_tick_rate_ms {
            return Err(invalid("a quarter cannot be shorter than a day"));
        }
        if self.batch_size == 0 {
            return Err(invalid("batch_size must be at least 1"));
        }
        if self.max_concurrency == 0 {
            return Err(invalid("max_concurrency must be at least 1"));
        }
        if self.processing_time_slice_ms == 0 {
            return Err(invalid("processing_time_slice_ms must be at least 1"));
        }
        if self.players_per_shard == 0 {
            return Err(invalid("players_per_shard must be at least 1"));
        }
        if self.auto_save_interval_ms == 0 || self.metrics_interval_ms == 0 {
            return Err(invalid("auto-save and metrics intervals must be at least 1ms"));
        }
        if !(self.ai_load_per_call.is_finite() && self.ai_load_per_call >= 0.0) {
            return Err(ConfigError::Invalid {
                reason: format!("ai_load_per_call must be finite and non-negative, got {}", self.ai_load_per_call),
            });
        }
        if !(0.0..=1.0).contains(&self.cache_hit_rate_target) {
            return Err(ConfigError::Invalid {
                reason: format!("cache_hit_rate_target must be in [0, 1], got {}", self.cache_hit_rate_target),
            });
        }
        for priority in Priority::ALL {
            let settings = self.processing_priorities.get(priority);
            if !(settings.weight > 0.0 && settings.weight <= 1.0) {
                return Err(ConfigError::Invalid {
                    reason: format!("weight for {priority} must be in (0, 1], got {}", settings.weight),
                });
            }
            if settings.capacity == 0 {
                return Err(ConfigError::Invalid {
                    reason: format!("queue capacity for {priority} must be at least 1"),
                });
            }
        }
        Ok(())
    }

    /// Real duration of one game day.
    pub const fn day_tick_rate(&self) -> Duration {
        Duration::from_millis(self.day_tick_rate_ms)
    }

    /// Real duration of one game quarter.
    pub const fn quarter_tick_rate(&self) -> Duration {
        Duration::from_millis(self.quarter_tick_rate_ms)
    }

    /// Time budget of one processing pass.
    pub const fn processing_time_slice(&self) -> Duration {
        Duration::from_millis(self.processing_time_slice_ms)
    }

    /// Interval between auto-saves.
    pub const fn auto_save_interval(&self) -> Duration {
        Duration::from_millis(self.auto_save_interval_ms)
    }

    /// Interval between performance samples.
    pub const fn metrics_interval(&self) -> Duration {
        Duration::from_millis(self.metrics_interval_ms)
    }

    /// Activity window for the active-player count.
    pub const fn active_player_threshold(&self) -> Duration {
        Duration::from_millis(self.active_player_threshold_ms)
    }

    /// Day ticks between durable snapshots (at least 1).
    pub fn ticks_per_snapshot(&self) -> u64 {
        self.snapshot_interval_ms
            .checked_div(self.day_tick_rate_ms)
            .unwrap_or(1)
            .max(1)
    }
}

fn invalid(reason: &str) -> ConfigError {
    ConfigError::Invalid {
        reason: reason.to_owned(),
    }
}

/// Quarterly AI decision budgets per tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiBudgetConfig {
    /// Premium tier (human players).
    #[serde(default = "default_tier1_budget")]
    pub tier1: u32,

    /// Standard tier (important AI civilizations).
    #[serde(default = "default_tier2_budget")]
    pub tier2: u32,

    /// Basic tier (background civilizations).
    #[serde(default = "default_tier3_budget")]
    pub tier3: u32,

    /// Rule-based fallback is never rationed.
    #[serde(default = "default_true")]
    pub rule_based_unlimited: bool,
}

impl Default for AiBudgetConfig {
    fn default() -> Self {
        Self {
            tier1: default_tier1_budget(),
            tier2: default_tier2_budget(),
            tier3: default_tier3_budget(),
            rule_based_unlimited: true,
        }
    }
}

impl AiBudgetConfig {
    /// Configured quarterly maximum for a tier.
    pub const fn for_tier(&self, tier: AiTier) -> u32 {
        match tier {
            AiTier::Tier1 => self.tier1,
            AiTier::Tier2 => self.tier2,
            AiTier::Tier3 => self.tier3,
        }
    }
}

/// Scheduling settings of one priority class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriorityConfig {
    /// Latency target, also used as the batch deadline.
    pub max_latency_ms: u64,

    /// Fraction of the time slice after which the drain stops lingering
    /// on this queue.
    pub weight: f64,

    /// Maximum queued actions before new ones are shed.
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,
}

impl PriorityConfig {
    const fn new(max_latency_ms: u64, weight: f64) -> Self {
        Self {
            max_latency_ms,
            weight,
            capacity: default_queue_capacity(),
        }
    }

    /// Latency target as a duration.
    pub const fn max_latency(&self) -> Duration {
        Duration::from_millis(self.max_latency_ms)
    }
}

/// Settings for all five priority classes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingPriorities {
    /// Player-facing actions.
    #[serde(default = "default_critical")]
    pub critical: PriorityConfig,
    /// Economic and daily updates.
    #[serde(default = "default_high")]
    pub high: PriorityConfig,
    /// AI decisions.
    #[serde(default = "default_medium")]
    pub medium: PriorityConfig,
    /// Background simulation.
    #[serde(default = "default_low")]
    pub low: PriorityConfig,
    /// Quarterly roll-ups.
    #[serde(default = "default_batch")]
    pub batch: PriorityConfig,
}

impl Default for ProcessingPriorities {
    fn default() -> Self {
        Self {
            critical: default_critical(),
            high: default_high(),
            medium: default_medium(),
            low: default_low(),
            batch: default_batch(),
        }
    }
}

impl ProcessingPriorities {
    /// Settings for one priority class.
    pub const fn get(&self, priority: Priority) -> &PriorityConfig {
        match priority {
            Priority::Critical => &self.critical,
            Priority::High => &self.high,
            Priority::Medium => &self.medium,
            Priority::Low => &self.low,
            Priority::Batch => &self.batch,
        }
    }
}

/// Observer HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObserverConfig {
    /// Whether the binary starts the observer server.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Bind address.
    #[serde(default = "default_observer_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_observer_port")]
    pub port: u16,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_observer_host(),
            port: default_observer_port(),
        }
    }
}

/// Persistence settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Directory for `state.json` and `snapshots/`. When unset, state is
    /// not written anywhere.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

const fn default_day_tick_rate_ms() -> u64 {
    1_000
}

const fn default_quarter_tick_rate_ms() -> u64 {
    90_000
}

const fn default_max_players() -> usize {
    50
}

const fn default_target_max_players() -> usize {
    10_000
}

const fn default_players_per_shard() -> u32 {
    2_500
}

const fn default_batch_size() -> usize {
    1_000
}

fn default_max_concurrency() -> usize {
    std::thread::available_parallelism()
        .map_or(1, std::num::NonZero::get)
        .min(8)
}

const fn default_processing_time_slice_ms() -> u64 {
    50
}

const fn default_tier1_budget() -> u32 {
    20
}

const fn default_tier2_budget() -> u32 {
    100
}

const fn default_tier3_budget() -> u32 {
    500
}

const fn default_cache_size() -> usize {
    100_000
}

const fn default_cache_hit_rate_target() -> f64 {
    0.85
}

const fn default_auto_save_interval_ms() -> u64 {
    300_000
}

const fn default_snapshot_interval_ms() -> u64 {
    900_000
}

const fn default_metrics_interval_ms() -> u64 {
    60_000
}

const fn default_active_player_threshold_ms() -> u64 {
    300_000
}

const fn default_ai_load_per_call() -> f64 {
    0.01
}

const fn default_queue_capacity() -> usize {
    100_000
}

const fn default_critical() -> PriorityConfig {
    PriorityConfig::new(100, 1.0)
}

const fn default_high() -> PriorityConfig {
    PriorityConfig::new(1_000, 0.8)
}

const fn default_medium() -> PriorityConfig {
    PriorityConfig::new(10_000, 0.6)
}

const fn default_low() -> PriorityConfig {
    PriorityConfig::new(60_000, 0.4)
}

const fn default_batch() -> PriorityConfig {
    PriorityConfig::new(90_000, 0.2)
}

fn default_observer_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_observer_port() -> u16 {
    8080
}

const fn default_true() -> bool {
    true
}
