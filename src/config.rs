//! Configuration management for the earnings relay.
//!
//! A [`Config`] is what a config file holds; every field is optional. It is
//! folded over the built-in defaults to produce [`Settings`], and environment
//! variables are applied last.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::llm::LlmConfig;
use crate::repository::DbContext;

/// Default database filename.
pub const DEFAULT_DATABASE_FILENAME: &str = "earnings-relay.db";

/// Basename searched for when no config path is given.
const CONFIG_BASENAME: &str = "earnings-relay";

/// Default upload cap (20 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind
    #[serde(default = "default_port")]
    pub port: u16,
    /// Origins allowed to call the API from a browser
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
    /// Largest accepted upload in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// Include internal error detail in responses
    #[serde(default)]
    pub dev_mode: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

fn default_max_upload_bytes() -> usize {
    DEFAULT_MAX_UPLOAD_BYTES
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
            max_upload_bytes: default_max_upload_bytes(),
            dev_mode: false,
        }
    }
}

impl ServerConfig {
    /// Check if the config equals the default (for skip_serializing_if).
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `HOST`: interface to bind
    /// - `PORT`: port to bind
    /// - `CORS_ORIGINS`: comma-separated allowlist
    /// - `APP_ENV` / `NODE_ENV`: `development` enables dev mode
    pub fn with_env_overrides(mut self) -> Self {
        self.apply_env(|name| std::env::var(name).ok());
        self
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(host) = var("HOST").filter(|h| !h.trim().is_empty()) {
            self.host = host;
        }
        if let Some(port) = var("PORT").and_then(|p| p.trim().parse().ok()) {
            self.port = port;
        }
        if let Some(origins) = var("CORS_ORIGINS") {
            let parsed: Vec<String> = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
            if !parsed.is_empty() {
                self.cors_origins = parsed;
            }
        }
        if let Some(env) = var("APP_ENV").or_else(|| var("NODE_ENV")) {
            self.dev_mode = env.eq_ignore_ascii_case("development");
        }
    }
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Database filename.
    pub database_filename: String,
    /// Database URL (overrides data_dir/database_filename if set).
    /// Set via DATABASE_URL env var or config.
    pub database_url: Option<String>,
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Analysis client settings.
    pub llm: LlmConfig,
}

impl Default for Settings {
    fn default() -> Self {
        // Documents dir -> Home dir -> Current dir
        let data_dir = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("earnings-relay");

        Self {
            data_dir,
            database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
            database_url: None,
            server: ServerConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            ..Default::default()
        }
    }

    /// Get the database URL, constructing from path if not explicitly set.
    pub fn database_url(&self) -> String {
        if let Some(ref url) = self.database_url {
            url.clone()
        } else {
            format!("sqlite:{}", self.database_path().display())
        }
    }

    /// Get the full path to the database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_filename)
    }

    /// Ensure the data directory exists.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create data directory '{}': {}",
                    self.data_dir.display(),
                    e
                ),
            )
        })
    }

    /// Create a database context for these settings.
    pub fn create_db_context(&self) -> DbContext {
        DbContext::from_url(&self.database_url())
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data directory path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Database filename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Database URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    /// HTTP server configuration.
    #[serde(default, skip_serializing_if = "ServerConfig::is_default")]
    pub server: ServerConfig,
    /// Analysis client configuration.
    #[serde(default, skip_serializing_if = "LlmConfig::is_default")]
    pub llm: LlmConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a specific file path.
    /// Format is chosen by extension: TOML, YAML, or JSON otherwise.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved relative to `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = self.resolve_path(data_dir, base_dir);
        }
        if let Some(ref database) = self.database {
            settings.database_filename = database.clone();
        }
        if let Some(ref url) = self.database_url {
            settings.database_url = Some(url.clone());
        }
        settings.server = self.server.clone();
        settings.llm = self.llm.clone();
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides discovery).
    pub config_path: Option<PathBuf>,
    /// Data directory override (--data flag).
    pub data: Option<PathBuf>,
}

/// Look for `earnings-relay.{toml,yaml,yml,json}` next to the database.
fn find_config_next_to_db(data_dir: &Path) -> Option<PathBuf> {
    ["toml", "yaml", "yml", "json"]
        .iter()
        .map(|ext| data_dir.join(format!("{}.{}", CONFIG_BASENAME, ext)))
        .find(|path| path.exists())
}

impl Config {
    /// Load configuration using prefer for discovery.
    /// Falls back to defaults when no config file is found or it fails to parse.
    pub async fn load() -> Self {
        let discovered = match prefer::load(CONFIG_BASENAME).await {
            Ok(pref_config) => pref_config.source_path().map(|p| p.to_path_buf()),
            Err(e) => {
                tracing::debug!("No config file discovered: {}", e);
                None
            }
        };

        match discovered {
            Some(path) => Self::load_or_default(&path).await,
            None => Self::default(),
        }
    }

    async fn load_or_default(path: &Path) -> Self {
        match Self::load_from_path(path).await {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{}; using defaults", e);
                Self::default()
            }
        }
    }
}

/// Load the config file named by `options`, or the first one discovered.
async fn load_file_config(options: &LoadOptions) -> Config {
    // Priority 1: Explicit --config flag
    if let Some(ref config_path) = options.config_path {
        return Config::load_or_default(config_path).await;
    }

    // Priority 2: Config next to data dir
    if let Some(config_path) = options.data.as_deref().and_then(find_config_next_to_db) {
        tracing::debug!("Found config next to data dir: {}", config_path.display());
        return Config::load_or_default(&config_path).await;
    }

    // Priority 3: Auto-discover via prefer
    Config::load().await
}

/// Load settings with explicit options.
/// Returns (Settings, Config) tuple.
pub async fn load_settings_with_options(options: LoadOptions) -> (Settings, Config) {
    let config = load_file_config(&options).await;
    let mut settings = Settings::default();

    let base_dir = config
        .base_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    config.apply_to_settings(&mut settings, &base_dir);

    // --data override takes precedence over the config file
    if let Some(ref data) = options.data {
        settings.data_dir = config.resolve_path(&data.to_string_lossy(), &base_dir);
    }

    apply_env_overrides(&mut settings, |name| std::env::var(name).ok());
    (settings, config)
}

/// Environment variables take highest precedence.
fn apply_env_overrides(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(url) = var("DATABASE_URL").filter(|s| !s.is_empty()) {
        tracing::debug!("Using DATABASE_URL from environment: {}", url);
        settings.database_url = Some(url);
    }
    settings.server.apply_env(&var);
    settings.llm.apply_env(&var);
}
