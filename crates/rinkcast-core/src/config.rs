// Configuration loading and parsing (rinkcast.toml, credentials.toml).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub backend: BackendConfig,
    pub account: AccountConfig,
    pub timing: TimingConfig,
    pub credentials: CredentialsConfig,
}

// ---------------------------------------------------------------------------
// rinkcast.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire rinkcast.toml file.
#[derive(Debug, Clone, Deserialize)]
struct RinkcastFile {
    backend: BackendConfig,
    account: AccountConfig,
    #[serde(default)]
    timing: TimingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// NEAR JSON-RPC endpoint.
    pub rpc_url: String,
    /// Account id of the game contract.
    pub contract_id: String,
    #[serde(default = "default_games_method")]
    pub games_method: String,
    #[serde(default = "default_events_method")]
    pub events_method: String,
    #[serde(default = "default_games_page_limit")]
    pub games_page_limit: u32,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Signing relayer for team commands. Commands are unavailable without it.
    #[serde(default)]
    pub relayer_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    pub account_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_pacing_interval_ms")]
    pub pacing_interval_ms: u64,
}

impl TimingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn pacing_interval(&self) -> Duration {
        Duration::from_millis(self.pacing_interval_ms)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            poll_interval_ms: default_poll_interval_ms(),
            pacing_interval_ms: default_pacing_interval_ms(),
        }
    }
}

fn default_games_method() -> String {
    "get_available_games".to_string()
}

fn default_events_method() -> String {
    "get_game_events".to_string()
}

fn default_games_page_limit() -> u32 {
    50
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_pacing_interval_ms() -> u64 {
    1_000
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    /// Bearer token presented to the signing relayer.
    pub relayer_token: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/rinkcast.toml` and
/// (optionally) `config/credentials.toml`, relative to `base_dir`.
///
/// Does not copy defaults; `load_config()` does that first.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- rinkcast.toml (required) ---
    let main_path = config_dir.join("rinkcast.toml");
    let main_text = read_file(&main_path)?;
    let file: RinkcastFile = toml::from_str(&main_text).map_err(|e| ConfigError::ParseError {
        path: main_path.clone(),
        source: e,
    })?;

    // --- credentials.toml (optional) ---
    let credentials_path = config_dir.join("credentials.toml");
    let credentials = if credentials_path.exists() {
        let cred_text = read_file(&credentials_path)?;
        toml::from_str(&cred_text).map_err(|e| ConfigError::ParseError {
            path: credentials_path.clone(),
            source: e,
        })?
    } else {
        CredentialsConfig::default()
    };

    let config = Config {
        backend: file.backend,
        account: file.account,
        timing: file.timing,
        credentials,
    };

    validate(&config)?;

    Ok(config)
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied. Skips `.example` files.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the project root or ensure defaults/ is present",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let mut copied = Vec::new();

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }
        let target = config_dir.join(file_name);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Convenience wrapper: loads config relative to the current working directory.
/// Ensures default config files are copied before loading.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let required: &[(&str, &str)] = &[
        ("backend.rpc_url", config.backend.rpc_url.as_str()),
        ("backend.contract_id", config.backend.contract_id.as_str()),
        ("backend.games_method", config.backend.games_method.as_str()),
        ("backend.events_method", config.backend.events_method.as_str()),
        ("account.account_id", config.account.account_id.as_str()),
    ];
    for (name, val) in required {
        if val.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: "must not be empty".into(),
            });
        }
    }

    if !config.backend.rpc_url.starts_with("http://")
        && !config.backend.rpc_url.starts_with("https://")
    {
        return Err(ConfigError::ValidationError {
            field: "backend.rpc_url".into(),
            message: format!("must be an http(s) URL, got {}", config.backend.rpc_url),
        });
    }

    if config.backend.relayer_url.as_deref().is_some_and(|u| u.trim().is_empty()) {
        return Err(ConfigError::ValidationError {
            field: "backend.relayer_url".into(),
            message: "must be omitted or non-empty".into(),
        });
    }

    let positive: &[(&str, u64)] = &[
        ("backend.games_page_limit", u64::from(config.backend.games_page_limit)),
        ("backend.request_timeout_ms", config.backend.request_timeout_ms),
        ("timing.poll_interval_ms", config.timing.poll_interval_ms),
        ("timing.pacing_interval_ms", config.timing.pacing_interval_ms),
    ];
    for (name, val) in positive {
        if *val == 0 {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: "must be > 0".into(),
            });
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
