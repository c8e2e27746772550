//! Configuration loaded from `~/.sphere/config.toml`.
//!
//! Every field has a default, so a missing file or a partial file is fine.
//! The path can be overridden with the `SPHERE_CONFIG` environment variable.

use crate::session::{SignalRules, SizingRules};
use crate::types::DEFAULT_CASH;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Starting cash of the virtual (paper) account.
pub const PAPER_INITIAL_CASH: f64 = 100_000.0;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SphereConfig {
    pub ledger: LedgerConfig,
    pub engine: EngineConfig,
}

/// Ledger settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LedgerConfig {
    /// Cash the live account is reset to
    pub initial_cash: f64,
    /// Cash the paper account is reset to
    pub paper_initial_cash: f64,
    /// Directory holding the portfolio files (defaults to `~/.sphere`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            initial_cash: DEFAULT_CASH,
            paper_initial_cash: PAPER_INITIAL_CASH,
            data_dir: None,
        }
    }
}

/// Trading session engine settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum model confidence (exclusive) before a signal is emitted
    pub confidence_threshold: f64,
    /// Minimum absolute prediction (exclusive) before a signal is emitted
    pub prediction_threshold: f64,
    /// Fraction of available capital used as the base share count
    pub base_fraction: f64,
    /// Fraction of available capital capping the share count
    pub max_fraction: f64,
    /// Floor for any position size
    pub min_position: u64,
    /// Timeout applied to every provider call
    pub provider_timeout_ms: u64,
    /// Interval between scheduled trading cycles
    pub cycle_interval_secs: u64,
    /// Symbols traded when a session is created without any
    pub default_symbols: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            prediction_threshold: 0.3,
            base_fraction: 0.02,
            max_fraction: 0.10,
            min_position: 1,
            provider_timeout_ms: 5_000,
            cycle_interval_secs: 60,
            default_symbols: ["AAPL", "MSFT", "GOOGL", "TSLA", "NVDA"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl EngineConfig {
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }

    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs.max(1))
    }

    pub fn signal_rules(&self) -> SignalRules {
        SignalRules {
            confidence_threshold: self.confidence_threshold,
            prediction_threshold: self.prediction_threshold,
        }
    }

    pub fn sizing(&self) -> SizingRules {
        SizingRules {
            base_fraction: self.base_fraction,
            max_fraction: self.max_fraction,
            min_position: self.min_position,
        }
    }
}

impl SphereConfig {
    /// Get the default config file path.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = env::var("SPHERE_CONFIG") {
            return PathBuf::from(path);
        }

        data_home().join("config.toml")
    }

    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::default_path())
    }

    /// Load configuration from a specific path.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// `~/.sphere`, or the working directory when no home is available.
pub(crate) fn data_home() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".sphere"))
        .unwrap_or_else(|| PathBuf::from("."))
}
