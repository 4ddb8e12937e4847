use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Shortest refresh period the scheduler accepts.
pub const MIN_REFRESH_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertWatchConfig {
    /// Directory holding `data.db`; created on first use.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
}

impl Default for CertWatchConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            probe: ProbeConfig::default(),
            history: HistoryConfig::default(),
            refresh: RefreshConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Used when `history` is called without a positive limit.
    #[serde(default = "default_history_limit")]
    pub default_limit: i64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            default_limit: default_history_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_refresh_interval_secs")]
    pub interval_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_refresh_interval_secs(),
        }
    }
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_history_limit() -> i64 {
    certwatch_storage::DEFAULT_HISTORY_LIMIT
}

fn default_refresh_interval_secs() -> u64 {
    3600
}

impl CertWatchConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let mut config: Self = toml::from_str(content)?;
        if config.refresh.interval_secs < MIN_REFRESH_INTERVAL_SECS {
            tracing::warn!(
                configured = config.refresh.interval_secs,
                minimum = MIN_REFRESH_INTERVAL_SECS,
                "Refresh interval below minimum, clamping"
            );
            config.refresh.interval_secs = MIN_REFRESH_INTERVAL_SECS;
        }
        if config.probe.connect_timeout_secs == 0 {
            anyhow::bail!("probe.connect_timeout_secs must be greater than 0");
        }
        Ok(config)
    }

    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.probe.connect_timeout_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh.interval_secs)
    }
}
