use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::task::{TraversalMode, TraversalSettings};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub discovery: DiscoverySection,
    #[serde(default)]
    pub engine: EngineConfig,
    pub content_source: ContentSourceConfig,
    #[serde(default)]
    pub http_server: HttpServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoverySection {
    pub db_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Traversal parameters applied to every task an engine starts.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub mode: TraversalMode,
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    #[serde(default = "default_branching_factor")]
    pub branching_factor: usize,
    /// Pause between two processed nodes of one task.
    #[serde(default = "default_node_delay_ms")]
    pub node_delay_ms: u64,
    /// Budget used when a request does not name one.
    #[serde(default = "default_max_total_items")]
    pub default_max_total_items: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: TraversalMode::default(),
            max_depth: default_max_depth(),
            branching_factor: default_branching_factor(),
            node_delay_ms: default_node_delay_ms(),
            default_max_total_items: default_max_total_items(),
        }
    }
}

impl EngineConfig {
    pub fn traversal_settings(&self) -> TraversalSettings {
        TraversalSettings {
            mode: self.mode,
            max_depth: self.max_depth,
            branching_factor: self.branching_factor,
        }
    }

    pub fn node_delay(&self) -> Duration {
        Duration::from_millis(self.node_delay_ms)
    }
}

/// Remote content gateway
#[derive(Debug, Clone, Deserialize)]
pub struct ContentSourceConfig {
    pub base_url: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Item metadata entries kept in memory; 0 disables the cache.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

impl ContentSourceConfig {
    /// API key from the configured environment variable, if set and non-empty.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "default_http_port")]
    pub port: u16,
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            port: default_http_port(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_depth() -> u32 {
    3
}

fn default_branching_factor() -> usize {
    5
}

fn default_node_delay_ms() -> u64 {
    500
}

fn default_max_total_items() -> usize {
    100
}

fn default_api_key_env() -> String {
    "DISCOVERY_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> usize {
    3
}

fn default_page_size() -> usize {
    50
}

fn default_cache_capacity() -> usize {
    1000
}

fn default_http_port() -> u16 {
    8080
}

fn default_allowed_origins() -> Vec<String> {
    vec![]
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in DISCOVERY_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // .env is optional
        let _ = dotenv::dotenv();

        let config_path = std::env::var("DISCOVERY_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        Self::from_file(&config_path)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&config_str)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn from_toml(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.engine.branching_factor == 0 {
            anyhow::bail!("engine.branching_factor must be greater than 0");
        }

        if self.engine.default_max_total_items == 0 {
            anyhow::bail!("engine.default_max_total_items must be greater than 0");
        }

        if self.content_source.base_url.trim().is_empty() {
            anyhow::bail!("content_source.base_url must be set");
        }

        url::Url::parse(&self.content_source.base_url).with_context(|| {
            format!(
                "content_source.base_url is not a valid URL: {}",
                self.content_source.base_url
            )
        })?;

        if self.content_source.max_retries == 0 {
            log::warn!("content_source.max_retries is 0; failed lookups will not be retried");
        }

        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.discovery.db_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serialize config tests that mutate process-wide env so they don't race.
    static CONFIG_TEST_LOCK: Mutex<()> = Mutex::new(());

    const FULL_CONFIG: &str = r#"
[discovery]
db_path = "./discovery.db"
log_level = "debug"

[engine]
mode = "depth_first"
max_depth = 4
branching_factor = 6
node_delay_ms = 0
default_max_total_items = 25

[content_source]
base_url = "http://localhost:9000/api/"
api_key_env = "TEST_DISCOVERY_KEY"
timeout_secs = 5
max_retries = 2
page_size = 20
cache_capacity = 10

[http_server]
port = 9090
"#;

    fn with_config_env(config_path: &Path, f: impl FnOnce()) {
        let original = std::env::var("DISCOVERY_CONFIG").ok();
        std::env::set_var("DISCOVERY_CONFIG", config_path);
        f();
        std::env::remove_var("DISCOVERY_CONFIG");
        if let Some(val) = original {
            std::env::set_var("DISCOVERY_CONFIG", val);
        }
    }

    #[test]
    fn test_config_load_success() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, FULL_CONFIG).unwrap();

        with_config_env(&config_path, || {
            let config = Config::load();
            assert!(config.is_ok(), "Config::load() failed: {:?}", config.err());
            let config = config.unwrap();
            assert_eq!(config.discovery.log_level, "debug");
            assert_eq!(config.engine.mode, TraversalMode::DepthFirst);
            assert_eq!(config.engine.max_depth, 4);
            assert_eq!(config.engine.node_delay(), Duration::ZERO);
            assert_eq!(config.content_source.page_size, 20);
            assert_eq!(config.http_server.port, 9090);
        });
    }

    #[test]
    fn test_defaults_for_optional_sections() {
        let config = Config::from_toml(
            r#"
[discovery]
db_path = "d.db"

[content_source]
base_url = "https://content.example.com/"
"#,
        )
        .unwrap();

        let settings = config.engine.traversal_settings();
        assert_eq!(settings.mode, TraversalMode::BreadthFirst);
        assert_eq!(settings.max_depth, 3);
        assert_eq!(settings.branching_factor, 5);
        assert_eq!(config.engine.node_delay(), Duration::from_millis(500));
        assert_eq!(config.engine.default_max_total_items, 100);
        assert_eq!(config.content_source.api_key_env, "DISCOVERY_API_KEY");
        assert_eq!(config.content_source.cache_capacity, 1000);
        assert_eq!(config.http_server.port, 8080);
        assert_eq!(config.discovery.log_level, "info");
    }

    #[test]
    fn test_rejects_zero_branching_factor() {
        let err = Config::from_toml(&FULL_CONFIG.replace("branching_factor = 6", "branching_factor = 0"))
            .unwrap_err();
        assert!(err.to_string().contains("branching_factor"));
    }

    #[test]
    fn test_rejects_zero_item_budget() {
        let err = Config::from_toml(
            &FULL_CONFIG.replace("default_max_total_items = 25", "default_max_total_items = 0"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("default_max_total_items"));
    }

    #[test]
    fn test_rejects_bad_base_url() {
        let empty = FULL_CONFIG.replace("http://localhost:9000/api/", "");
        assert!(Config::from_toml(&empty).is_err());

        let garbage = FULL_CONFIG.replace("http://localhost:9000/api/", "not a url");
        let err = Config::from_toml(&garbage).unwrap_err();
        assert!(format!("{:#}", err).contains("base_url"));
    }

    #[test]
    fn test_rejects_unknown_mode() {
        let bad = FULL_CONFIG.replace("depth_first", "random_walk");
        assert!(Config::from_toml(&bad).is_err());
    }

    #[test]
    fn test_api_key_from_env() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let config = Config::from_toml(FULL_CONFIG).unwrap();

        std::env::remove_var("TEST_DISCOVERY_KEY");
        assert!(config.content_source.api_key().is_none());

        std::env::set_var("TEST_DISCOVERY_KEY", "secret");
        assert_eq!(config.content_source.api_key().as_deref(), Some("secret"));

        std::env::set_var("TEST_DISCOVERY_KEY", "  ");
        assert!(config.content_source.api_key().is_none());
        std::env::remove_var("TEST_DISCOVERY_KEY");
    }

    #[test]
    fn test_config_invalid_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        with_config_env(Path::new("nonexistent.toml"), || {
            assert!(Config::load().is_err());
        });
    }
}
