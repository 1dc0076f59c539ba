use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub crawler: CrawlerConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Crawler configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CrawlerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path of the bestseller landing page, relative to `base_url`.
    #[serde(default = "default_root_path")]
    pub root_path: String,

    /// The one navigation timeout, applied to every page load.
    #[serde(default = "default_nav_timeout_ms")]
    pub nav_timeout_ms: u64,

    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Optional log file; console output is always on.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_base_url() -> String {
    "https://www.amazon.com".to_string()
}
fn default_root_path() -> String {
    "/bestsellers".to_string()
}
fn default_nav_timeout_ms() -> u64 {
    20_000
}
fn default_request_delay_ms() -> u64 {
    1500
}
fn default_jitter_ms() -> u64 {
    500
}
fn default_db_path() -> PathBuf {
    PathBuf::from("data/catalog.duckdb")
}
fn default_true() -> bool {
    true
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("CATALOG").separator("__"))
            .build()?;

        let mut app_cfg: AppConfig = cfg.try_deserialize().unwrap_or_else(|_| AppConfig::default());

        // Legacy knob: a bare TARGET_URL wins over everything else.
        if let Ok(url) = std::env::var("TARGET_URL") {
            if !url.trim().is_empty() {
                app_cfg.crawler.base_url = url.trim().to_string();
            }
        }

        Ok(app_cfg)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            crawler: CrawlerConfig {
                base_url: default_base_url(),
                root_path: default_root_path(),
                nav_timeout_ms: default_nav_timeout_ms(),
                request_delay_ms: default_request_delay_ms(),
                jitter_ms: default_jitter_ms(),
            },
            storage: StorageConfig {
                db_path: default_db_path(),
                run_migrations: true,
            },
            logging: LoggingConfig { file: None },
        }
    }
}
