//! Configuration infrastructure
//!
//! A single [`HarvestConfig`] is built once at process start and passed by
//! reference to everything that needs it. Sources, in priority order:
//! 1. Environment variables (`CHART_HARVEST__SECTION__KEY`)
//! 2. Optional config file (`chart-harvester.toml` or `--config PATH`)
//! 3. Built-in defaults (see [`defaults`])

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::domain::{Category, SourceKind};
use crate::domain::constants::{douban, netease};

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "CHART_HARVEST";

/// Config file looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "chart-harvester";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {message}")]
    Validation { message: String },
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub http: HttpConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    /// Netease playlist charts
    pub netease: SourceConfig,
    /// Douban genre rankings
    pub douban: SourceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Overall request timeout in seconds
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite URL of the relational store
    pub database_url: String,
    /// Path of the redb document store
    pub document_store_path: PathBuf,
    /// Directory holding the backup and cleaned exports
    pub data_dir: PathBuf,
    /// Directory for derived output (reports)
    pub output_dir: PathBuf,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Write JSON lines to the log file instead of plain text
    pub json_format: bool,

    pub console_output: bool,

    pub file_output: bool,

    pub log_dir: PathBuf,

    /// Module-specific log level filters (e.g., "sqlx": "warn")
    pub module_filters: HashMap<String, String>,
}

/// Per-source crawl settings: what to crawl and how politely
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub endpoint: String,
    pub categories: Vec<Category>,
    pub budget: BudgetConfig,
    /// Records per page for paginated sources; `None` means one request per category
    pub page_size: Option<usize>,
    /// Douban rating window (`interval_id` query parameter)
    pub interval_id: Option<String>,
    pub delay: DelayConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Ceiling on accepted records for the whole run
    pub global: usize,
    /// Ceiling on accepted records per category
    pub per_category: Option<usize>,
}

/// Uniform random pause between consecutive requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelayConfig {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayConfig {
    pub const NONE: Self = Self { min_ms: 0, max_ms: 0 };

    /// Draws a pause uniformly from `[min_ms, max_ms]`
    pub fn sample(&self) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(fastrand::u64(self.min_ms..=self.max_ms))
    }
}

impl HarvestConfig {
    /// Loads configuration from an optional file plus environment overrides.
    ///
    /// An explicit `path` must exist; without one, `chart-harvester.{toml,json,yaml}`
    /// in the working directory is used when present. Tables merge key by key
    /// over the defaults, arrays (category lists) replace them whole.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?)
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn source(&self, kind: SourceKind) -> &SourceConfig {
        match kind {
            SourceKind::Netease => &self.netease,
            SourceKind::Douban => &self.douban,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.http.request_timeout_seconds)
    }

    pub fn backup_path(&self, kind: SourceKind) -> PathBuf {
        self.storage.data_dir.join(kind.backup_file_name())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.request_timeout_seconds == 0 {
            return Err(ConfigError::Validation {
                message: "http.request_timeout_seconds must be greater than 0".to_string(),
            });
        }

        for (name, source) in [("netease", &self.netease), ("douban", &self.douban)] {
            source.validate(name)?;
        }

        Ok(())
    }
}

impl SourceConfig {
    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if self.categories.is_empty() {
            return Err(ConfigError::Validation {
                message: format!("{name}.categories must not be empty"),
            });
        }
        if self.budget.global == 0 {
            return Err(ConfigError::Validation {
                message: format!("{name}.budget.global must be greater than 0"),
            });
        }
        if self.budget.per_category == Some(0) {
            return Err(ConfigError::Validation {
                message: format!("{name}.budget.per_category must be greater than 0 when set"),
            });
        }
        if self.page_size == Some(0) {
            return Err(ConfigError::Validation {
                message: format!("{name}.page_size must be greater than 0"),
            });
        }
        if self.delay.min_ms > self.delay.max_ms {
            return Err(ConfigError::Validation {
                message: format!("{name}.delay.min_ms cannot be greater than max_ms"),
            });
        }
        Ok(())
    }

    /// Netease playlist charts, one request per chart
    pub fn netease_default() -> Self {
        Self {
            endpoint: netease::PLAYLIST_DETAIL_URL.to_string(),
            categories: defaults::NETEASE_PLAYLISTS
                .iter()
                .map(|(id, name)| Category::new(*id, *name))
                .collect(),
            budget: BudgetConfig {
                global: defaults::NETEASE_MAX_SONGS,
                per_category: None,
            },
            page_size: None,
            interval_id: None,
            delay: DelayConfig {
                min_ms: defaults::NETEASE_DELAY_MIN_MS,
                max_ms: defaults::NETEASE_DELAY_MAX_MS,
            },
        }
    }

    /// Douban genre rankings, paginated by `start`
    pub fn douban_default() -> Self {
        Self {
            endpoint: douban::TOP_LIST_URL.to_string(),
            categories: defaults::DOUBAN_MOVIE_TYPES
                .iter()
                .map(|(id, name)| Category::new(*id, *name))
                .collect(),
            budget: BudgetConfig {
                global: defaults::DOUBAN_MAX_MOVIES,
                per_category: Some(defaults::DOUBAN_MAX_PER_TYPE),
            },
            page_size: Some(douban::PAGE_SIZE),
            interval_id: Some(douban::DEFAULT_INTERVAL_ID.to_string()),
            delay: DelayConfig {
                min_ms: defaults::DOUBAN_DELAY_MIN_MS,
                max_ms: defaults::DOUBAN_DELAY_MAX_MS,
            },
        }
    }
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
            netease: SourceConfig::netease_default(),
            douban: SourceConfig::douban_default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: defaults::DATABASE_URL.to_string(),
            document_store_path: PathBuf::from(defaults::DOCUMENT_STORE_PATH),
            data_dir: PathBuf::from(defaults::DATA_DIR),
            output_dir: PathBuf::from(defaults::OUTPUT_DIR),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: defaults::LOG_JSON_FORMAT,
            console_output: defaults::LOG_CONSOLE_OUTPUT,
            file_output: defaults::LOG_FILE_OUTPUT,
            log_dir: PathBuf::from(defaults::LOG_DIR),
            module_filters: {
                let mut filters = HashMap::new();
                filters.insert("sqlx".to_string(), "warn".to_string());
                filters.insert("reqwest".to_string(), "info".to_string());
                filters.insert("hyper".to_string(), "warn".to_string());
                filters.insert("chart_harvester".to_string(), "info".to_string());
                filters
            },
        }
    }
}

impl Default for SourceConfig {
    /// Empty fallback; the two concrete sources get their defaults through
    /// [`HarvestConfig::default`].
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            categories: Vec::new(),
            budget: BudgetConfig::default(),
            page_size: None,
            interval_id: None,
            delay: DelayConfig::NONE,
        }
    }
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            global: defaults::NETEASE_MAX_SONGS,
            per_category: None,
        }
    }
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self::NONE
    }
}

/// Default crawl configuration values
pub mod defaults {
    /// Default request timeout in seconds
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 15;

    pub const DATABASE_URL: &str = "sqlite:data/harvest.db";
    pub const DOCUMENT_STORE_PATH: &str = "data/documents.redb";
    pub const DATA_DIR: &str = "data";
    pub const OUTPUT_DIR: &str = "output";

    // Netease
    pub const NETEASE_MAX_SONGS: usize = 1500;
    pub const NETEASE_DELAY_MIN_MS: u64 = 2000;
    pub const NETEASE_DELAY_MAX_MS: u64 = 4000;

    /// Playlist charts crawled in order: (playlist id, chart name)
    pub const NETEASE_PLAYLISTS: &[(&str, &str)] = &[
        ("19723756", "飙升榜"),
        ("3778678", "热歌榜"),
        ("3779629", "新歌榜"),
        ("2884035", "原创榜"),
        ("991319590", "中文说唱榜"),
        ("71385702", "ACG榜"),
        ("71384707", "古典榜"),
        ("1978921795", "电音榜"),
        ("2809513713", "欧美热歌榜"),
        ("2809577409", "欧美新歌榜"),
        ("5059644681", "日语榜"),
        ("3001835560", "ACG动画榜"),
        ("3001795926", "ACG游戏榜"),
        ("21845217", "KTV唛榜"),
        ("60131", "日本Oricon榜"),
        ("745956260", "网络热歌榜"),
        ("2250011882", "抖音排行榜"),
        ("5453912201", "黑胶VIP爱听榜"),
        ("180106", "UK排行榜周榜"),
        ("27135204", "法国NRJ Vos Hits周榜"),
        ("112463", "美国Billboard周榜"),
        ("4395559", "华语金曲榜"),
        ("5338990334", "云音乐民谣榜"),
        ("5059633707", "云音乐国电榜"),
        ("5059661515", "云音乐摇滚榜"),
        ("10520166", "云音乐电子榜"),
        ("6732051", "云音乐说唱榜"),
        ("6732014", "云音乐古风榜"),
        ("64016", "中国TOP排行榜"),
        ("11641012", "iTunes榜"),
        ("120001", "Hit FM Top榜"),
    ];

    // Douban
    pub const DOUBAN_MAX_MOVIES: usize = 1200;
    pub const DOUBAN_MAX_PER_TYPE: usize = 120;
    pub const DOUBAN_DELAY_MIN_MS: u64 = 1500;
    pub const DOUBAN_DELAY_MAX_MS: u64 = 3000;

    /// Genres crawled in order: (type id, genre name)
    pub const DOUBAN_MOVIE_TYPES: &[(&str, &str)] = &[
        ("11", "剧情"),
        ("24", "喜剧"),
        ("5", "动作"),
        ("13", "爱情"),
        ("17", "科幻"),
        ("25", "动画"),
        ("10", "悬疑"),
        ("19", "惊悚"),
        ("1", "恐怖"),
        ("3", "奇幻"),
        ("22", "战争"),
        ("14", "传记"),
    ];

    // Log configuration defaults
    pub const LOG_LEVEL: &str = "info";
    pub const LOG_JSON_FORMAT: bool = false;
    pub const LOG_CONSOLE_OUTPUT: bool = true;
    pub const LOG_FILE_OUTPUT: bool = true;
    pub const LOG_DIR: &str = "logs";
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_reproduce_both_crawlers() {
        let config = HarvestConfig::default();
        assert!(config.validate().is_ok());

        assert_eq!(config.netease.categories.len(), 31);
        assert_eq!(config.netease.budget.global, 1500);
        assert_eq!(config.netease.page_size, None);

        assert_eq!(config.douban.categories.len(), 12);
        assert_eq!(config.douban.budget.per_category, Some(120));
        assert_eq!(config.douban.page_size, Some(50));
        assert_eq!(config.douban.interval_id.as_deref(), Some("100:90"));
    }

    #[test]
    fn delay_sample_stays_in_window() {
        let delay = DelayConfig { min_ms: 1500, max_ms: 3000 };
        for _ in 0..200 {
            let pause = delay.sample();
            assert!(pause >= Duration::from_millis(1500));
            assert!(pause <= Duration::from_millis(3000));
        }
        assert_eq!(DelayConfig::NONE.sample(), Duration::ZERO);
    }

    #[test]
    fn inverted_delay_window_is_rejected() {
        let mut source = SourceConfig::douban_default();
        source.delay = DelayConfig { min_ms: 5000, max_ms: 1000 };
        assert!(matches!(
            source.validate("douban"),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let mut source = SourceConfig::douban_default();
        source.page_size = Some(0);
        assert!(source.validate("douban").is_err());
    }

    #[test]
    fn zero_per_category_budget_is_rejected() {
        let mut source = SourceConfig::douban_default();
        source.budget.per_category = Some(0);
        assert!(matches!(
            source.validate("douban"),
            Err(ConfigError::Validation { .. })
        ));

        source.budget.per_category = None;
        assert!(source.validate("douban").is_ok());
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harvest.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[http]
request_timeout_seconds = 5

[netease]
endpoint = "http://localhost:9000/playlist"
categories = [{{ id = "1", name = "Test Chart" }}]

[netease.budget]
global = 10

[douban]
endpoint = "http://localhost:9000/top_list"
page_size = 20
categories = [{{ id = "11", name = "Drama" }}]

[douban.budget]
global = 30
per_category = 15

[douban.delay]
min_ms = 10
max_ms = 20
"#
        )
        .unwrap();

        let config = HarvestConfig::load(Some(&path)).unwrap();
        assert_eq!(config.http.request_timeout_seconds, 5);
        assert_eq!(config.netease.categories, vec![Category::new("1", "Test Chart")]);
        assert_eq!(config.netease.budget.global, 10);
        assert_eq!(config.douban.page_size, Some(20));
        assert_eq!(config.douban.budget.per_category, Some(15));
        assert_eq!(config.douban.delay, DelayConfig { min_ms: 10, max_ms: 20 });
        // untouched keys keep their defaults
        assert_eq!(config.douban.interval_id.as_deref(), Some("100:90"));
        assert_eq!(config.netease.delay.min_ms, 2000);
        assert_eq!(config.storage.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let result = HarvestConfig::load(Some(Path::new("/nonexistent/chart-harvester.toml")));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }
}
