//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\quezic\config.toml
//! - macOS: ~/Library/Application Support/quezic/config.toml
//! - Linux: ~/.config/quezic/config.toml
//!
//! The config file is human-readable and editable. Every section falls back
//! to defaults, so a partial file is always valid.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::download::BackoffPolicy;
use crate::extraction::domain::{RouteConfig, RoutingPolicy, StreamQuality};
use crate::extraction::{invidious, piped, soundcloud};
use crate::matcher::MatcherConfig;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API credentials (keep separate for potential future encryption)
    pub credentials: Credentials,

    /// Routing and per-attempt network settings
    pub network: NetworkConfig,

    /// Provider backends and their instances
    pub providers: ProvidersConfig,

    /// Metadata matching weights and thresholds
    pub matcher: MatcherSettings,

    /// Download orchestration
    pub downloads: DownloadConfig,

    /// Playback controller
    pub playback: PlaybackConfig,

    /// Catalog storage
    pub library: LibraryConfig,
}

/// API credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    /// SoundCloud API v2 client id
    pub soundcloud_client_id: Option<String>,

    /// Last.fm API key for similar-artist lookups
    pub lastfm_api_key: Option<String>,
}

/// Network settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Try proxy routes after the direct route fails
    pub use_proxy: bool,

    /// Proxy routes, tried in order
    pub proxy_routes: Vec<RouteConfig>,

    /// Upper bound for a single provider attempt
    pub attempt_timeout_secs: u64,

    /// Override the default user agent
    pub user_agent: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            use_proxy: false,
            proxy_routes: Vec::new(),
            attempt_timeout_secs: 15,
            user_agent: None,
        }
    }
}

impl NetworkConfig {
    pub fn routing_policy(&self) -> RoutingPolicy {
        RoutingPolicy {
            use_proxy: self.use_proxy,
            proxy_routes: self.proxy_routes.clone(),
        }
    }
}

/// Provider backends
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Relay backends for YouTube, in the order they are tried
    pub relay_order: Vec<String>,

    pub piped_instances: Vec<String>,

    pub invidious_instances: Vec<String>,

    pub soundcloud_api_url: String,

    /// Results requested per provider search
    pub search_limit: usize,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            relay_order: vec!["piped".to_string(), "invidious".to_string()],
            piped_instances: piped::DEFAULT_INSTANCES.iter().map(|s| s.to_string()).collect(),
            invidious_instances: invidious::DEFAULT_INSTANCES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            soundcloud_api_url: soundcloud::DEFAULT_API_URL.to_string(),
            search_limit: 10,
        }
    }
}

/// Matcher weights and thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherSettings {
    pub title_weight: f32,
    pub artist_weight: f32,
    pub duration_weight: f32,

    /// Minimum score for a catalog candidate to be accepted
    pub acceptance_threshold: f32,

    /// Pause between provider searches during playlist import
    pub import_delay_ms: u64,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        Self {
            title_weight: 0.5,
            artist_weight: 0.35,
            duration_weight: 0.15,
            acceptance_threshold: 0.6,
            import_delay_ms: 300,
        }
    }
}

impl MatcherSettings {
    pub fn to_matcher_config(&self, search_limit: usize) -> MatcherConfig {
        MatcherConfig {
            title_weight: self.title_weight,
            artist_weight: self.artist_weight,
            duration_weight: self.duration_weight,
            acceptance_threshold: self.acceptance_threshold,
            search_limit,
            ..MatcherConfig::default()
        }
    }

    pub fn import_delay(&self) -> Duration {
        Duration::from_millis(self.import_delay_ms)
    }
}

/// Download settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Where downloaded files go (default: music dir / Quezic)
    pub directory: Option<PathBuf>,

    /// Attempts before a task is marked failed
    pub max_attempts: u32,

    pub backoff_base_secs: u64,

    pub backoff_cap_secs: u64,

    /// Upper bound for resolve + transfer of one attempt
    pub attempt_timeout_secs: u64,

    /// Downloads running at once
    pub max_concurrent: usize,

    pub quality: StreamQuality,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            directory: None,
            max_attempts: 3,
            backoff_base_secs: 2,
            backoff_cap_secs: 60,
            attempt_timeout_secs: 600,
            max_concurrent: 2,
            quality: StreamQuality::High,
        }
    }
}

impl DownloadConfig {
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_secs(self.backoff_base_secs),
            Duration::from_secs(self.backoff_cap_secs),
        )
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    /// Configured directory, or the platform music/data dir.
    pub fn resolved_directory(&self) -> PathBuf {
        self.directory.clone().unwrap_or_else(|| {
            dirs::audio_dir()
                .map(|d| d.join("Quezic"))
                .or_else(|| dirs::data_dir().map(|d| d.join("quezic").join("music")))
                .unwrap_or_else(|| PathBuf::from("music"))
        })
    }
}

/// Playback settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub quality: StreamQuality,

    /// Extra resolution attempts per position before it is marked failed
    pub resolution_retries: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            quality: StreamQuality::High,
            resolution_retries: 1,
        }
    }
}

/// Catalog storage settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// SQLite database file (default: data dir / quezic / quezic.db)
    pub database: Option<PathBuf>,
}

impl LibraryConfig {
    pub fn resolved_database(&self) -> PathBuf {
        self.database.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|d| d.join("quezic").join(crate::db::DEFAULT_DB_NAME))
                .unwrap_or_else(|| PathBuf::from(crate::db::DEFAULT_DB_NAME))
        })
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("quezic"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from disk
///
/// Returns default config if file doesn't exist or can't be parsed.
/// Logs warnings but doesn't fail - we always return a usable config.
pub fn load() -> Config {
    let Some(path) = config_path() else {
        tracing::warn!("Could not determine config directory, using defaults");
        return Config::default();
    };
    load_from(&path)
}

/// Load configuration from an explicit path, with the same fallbacks as [`load`].
pub fn load_from(path: &std::path::Path) -> Config {
    if !path.exists() {
        tracing::info!("No config file found at {:?}, using defaults", path);
        return Config::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => {
                tracing::info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                tracing::error!("Failed to parse config file {:?}: {}", path, e);
                tracing::warn!("Using default configuration");
                Config::default()
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file {:?}: {}", path, e);
            Config::default()
        }
    }
}

/// Save configuration to disk
///
/// Creates the config directory if it doesn't exist.
pub fn save(config: &Config) -> Result<(), ConfigError> {
    let dir = config_dir().ok_or(ConfigError::NoConfigDir)?;
    save_to(config, &dir.join("config.toml"))
}

/// Save configuration to an explicit path (atomic temp-file + rename).
pub fn save_to(config: &Config, path: &std::path::Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::CreateDir(dir.to_path_buf(), e))?;
    }

    let contents = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, path)
        .map_err(|e| ConfigError::Rename(temp_path, path.to_path_buf(), e))?;

    tracing::info!("Saved config to {:?}", path);
    Ok(())
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),

}

// ============================================================================
// Tests
// ============================================================================
