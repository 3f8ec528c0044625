//! YAML configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.consync/
//!   config.yaml   (mode 0600: holds the API password)
//!   status.db     (default status store)
//!   source.db     (default source store)
//! ```
//!
//! # API pattern
//!
//! Every function that touches disk has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable that overrides `api.password` when set.
pub const PASSWORD_ENV: &str = "CONSYNC_API_PASSWORD";

pub const DEFAULT_BATCH_SIZE: u32 = 50;

/// Upper bound accepted for `api.token_ttl_secs` (30 days).
pub const MAX_TOKEN_TTL_SECS: u64 = 30 * 24 * 3600;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Root of `config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Town codes known to differ between the two systems (source → remote).
    #[serde(default)]
    pub town_overrides: BTreeMap<String, String>,
}

/// Remote API endpoint and credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_lang_code")]
    pub lang_code: String,
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    /// Timer period for the daemon.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

/// Database locations. Unset paths resolve under `~/.consync/`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_db: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_db: Option<PathBuf>,
}

fn default_lang_code() -> String {
    "zh_CN".to_string()
}

fn default_token_ttl_secs() -> u64 {
    3600
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_read_timeout_secs() -> u64 {
    30
}

fn default_batch_size() -> u32 {
    DEFAULT_BATCH_SIZE
}

fn default_interval_secs() -> u64 {
    300
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            interval_secs: default_interval_secs(),
        }
    }
}

impl ApiConfig {
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

impl SyncSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl StorageConfig {
    pub fn source_db_at(&self, home: &Path) -> PathBuf {
        self.source_db
            .clone()
            .unwrap_or_else(|| consync_root(home).join("source.db"))
    }

    pub fn status_db_at(&self, home: &Path) -> PathBuf {
        self.status_db
            .clone()
            .unwrap_or_else(|| consync_root(home).join("status.db"))
    }
}

impl Config {
    /// Starter config written by `consync config init`.
    pub fn template(base_url: &str, username: &str) -> Self {
        Self {
            api: ApiConfig {
                base_url: base_url.to_string(),
                username: username.to_string(),
                password: String::new(),
                lang_code: default_lang_code(),
                token_ttl_secs: default_token_ttl_secs(),
                connect_timeout_secs: default_connect_timeout_secs(),
                read_timeout_secs: default_read_timeout_secs(),
            },
            sync: SyncSettings::default(),
            storage: StorageConfig::default(),
            town_overrides: BTreeMap::new(),
        }
    }

    /// Check values serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "api.base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            return Err(ConfigError::Invalid {
                field: "api.base_url",
                reason: format!("expected an http(s) URL, got '{}'", self.api.base_url),
            });
        }
        if self.api.username.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "api.username",
                reason: "must not be empty".to_string(),
            });
        }
        if self.api.token_ttl_secs == 0 || self.api.token_ttl_secs > MAX_TOKEN_TTL_SECS {
            return Err(ConfigError::Invalid {
                field: "api.token_ttl_secs",
                reason: format!(
                    "must be between 1 and {MAX_TOKEN_TTL_SECS}, got {}",
                    self.api.token_ttl_secs
                ),
            });
        }
        if self.sync.batch_size == 0 {
            return Err(ConfigError::Invalid {
                field: "sync.batch_size",
                reason: "must be positive".to_string(),
            });
        }
        if self.sync.interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "sync.interval_secs",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(password) = std::env::var(PASSWORD_ENV) {
            if !password.is_empty() {
                self.api.password = password;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// `<home>/.consync/`
pub fn consync_root(home: &Path) -> PathBuf {
    home.join(".consync")
}

/// `<home>/.consync/config.yaml`: pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    consync_root(home).join("config.yaml")
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// Load and validate `<home>/.consync/config.yaml`, then apply env overrides.
///
/// Returns `ConfigError::ConfigNotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(home: &Path) -> Result<Config, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Err(ConfigError::ConfigNotFound { path });
    }
    let contents = std::fs::read_to_string(&path)?;
    let mut config: Config =
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })?;
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Config, ConfigError> {
    load_at(&home()?)
}

/// Atomically save the config.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, config: &Config) -> Result<PathBuf, ConfigError> {
    let root = consync_root(home);
    if !root.exists() {
        std::fs::create_dir_all(&root)?;
        set_dir_permissions(&root)?;
    }
    let path = config_path_at(home);
    let tmp_path = path.with_file_name("config.yaml.tmp");

    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp_path, yaml)?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path)?;
    Ok(path)
}

/// `save_at` convenience wrapper.
pub fn save(config: &Config) -> Result<PathBuf, ConfigError> {
    save_at(&home()?, config)
}

/// Resolve the user's home directory.
pub fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}
