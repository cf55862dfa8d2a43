use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::domain::nonce::{DEFAULT_HISTORY_DAYS, DEFAULT_REFRESH_INTERVAL};
use crate::domain::Chain;

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    pub name: Option<String>,
    pub rpc: Option<String>,
    pub ipc: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CalculatorConfig {
    #[serde(default)]
    pub chain: Chain,
    pub gas_limit: Option<u64>,
    #[serde(default)]
    pub amount: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Account to connect on startup
    pub address: Option<String>,

    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Fail nonce lookups that take longer than this
    pub provider_timeout_secs: Option<u64>,

    #[serde(default = "default_history_days")]
    pub history_days: usize,

    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,

    #[serde(default)]
    pub calculator: CalculatorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: None,
            refresh_interval_secs: default_refresh_interval_secs(),
            provider_timeout_secs: None,
            history_days: default_history_days(),
            endpoints: Vec::new(),
            calculator: CalculatorConfig::default(),
        }
    }
}

impl Config {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    pub fn provider_timeout(&self) -> Option<Duration> {
        self.provider_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

fn default_refresh_interval_secs() -> u64 {
    DEFAULT_REFRESH_INTERVAL.as_secs()
}

fn default_history_days() -> usize {
    DEFAULT_HISTORY_DAYS
}

pub fn load() -> Config {
    let Some(path) = config_path() else {
        return Config::default();
    };
    load_from(&path)
}

/// Read a config file; a missing or malformed file yields defaults
pub fn load_from(path: &Path) -> Config {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => return Config::default(),
    };
    match toml::from_str::<Config>(&content) {
        Ok(config) => config,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring malformed config");
            Config::default()
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os("TALLY_CONFIG").map(PathBuf::from) {
        return Some(path);
    }
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from) {
        return Some(xdg.join("tally").join("config.toml"));
    }
    if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
        return Some(home.join(".config").join("tally").join("config.toml"));
    }

    directories::ProjectDirs::from("io", "tally", "tally")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

pub fn data_dir() -> Option<PathBuf> {
    if let Some(xdg) = std::env::var_os("XDG_DATA_HOME").map(PathBuf::from) {
        return Some(xdg.join("tally"));
    }
    if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
        return Some(home.join(".local").join("share").join("tally"));
    }
    directories::ProjectDirs::from("io", "tally", "tally").map(|dirs| dirs.data_dir().to_path_buf())
}

pub fn state_db_path() -> Option<PathBuf> {
    data_dir().map(|dir| dir.join("state.sqlite3"))
}

pub fn log_path() -> Option<PathBuf> {
    data_dir().map(|dir| dir.join("tally.log"))
}

pub fn export_dir() -> Option<PathBuf> {
    data_dir().map(|dir| dir.join("exports"))
}

/// `0x1234..abcd` style abbreviation for narrow panels
pub fn short_addr(value: &str) -> String {
    let value = value.trim();
    if value.len() <= 10 {
        return value.to_string();
    }
    let start: String = value.chars().take(6).collect();
    let end: String = value
        .chars()
        .rev()
        .take(4)
        .collect::<String>()
        .chars()
        .rev()
        .collect();
    format!("{}..{}", start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.refresh_interval(), Duration::from_secs(30));
        assert_eq!(config.provider_timeout(), None);
        assert_eq!(config.history_days, 14);
    }

    #[test]
    fn test_parse_full_config() {
        let config: Config = toml::from_str(
            r#"
            address = "0x00000000000000000000000000000000000000aa"
            refresh_interval_secs = 10
            provider_timeout_secs = 4

            [[endpoints]]
            name = "local"
            rpc = "http://127.0.0.1:8545"

            [calculator]
            chain = "polygon"
            gas_limit = 50000
            amount = 1.5
            "#,
        )
        .unwrap();

        assert_eq!(config.refresh_interval(), Duration::from_secs(10));
        assert_eq!(config.provider_timeout(), Some(Duration::from_secs(4)));
        assert_eq!(config.history_days, 14);
        assert_eq!(config.endpoints.len(), 1);
        assert_eq!(config.calculator.chain, Chain::Polygon);
        assert_eq!(config.calculator.gas_limit, Some(50_000));
    }

    #[test]
    fn test_malformed_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "refresh_interval_secs = \"soon\"").unwrap();
        assert_eq!(load_from(&path).refresh_interval_secs, 30);
        assert_eq!(load_from(&dir.path().join("missing.toml")).history_days, 14);
    }

    #[test]
    fn test_short_addr() {
        assert_eq!(
            short_addr("0x00000000000000000000000000000000000000aa"),
            "0x0000..00aa"
        );
        assert_eq!(short_addr("0xabc"), "0xabc");
    }
}
