//! # Configuration
//!
//! TOML configuration for the Armory binary.
//!
//! Precedence, highest first: CLI flags, environment, `armory.toml`, defaults.
//! The CLI layer applies its own overrides after [`ArmoryConfig::load`].
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//!
//! [storage]
//! database = "armory.db"
//! backend = "redb"
//!
//! [limits]
//! rate_limit = 100
//!
//! [cors]
//! origins = ["http://localhost:3000"]
//! ```
//!
//! ## Environment Variables
//!
//! - `ARMORY_CONFIG`: config file path when `--config` is not given
//! - `ARMORY_RATE_LIMIT`: requests per second (0 disables limiting)
//! - `ARMORY_CORS_ORIGINS`: comma-separated origins, or "*" for all

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config file read when neither `--config` nor `ARMORY_CONFIG` is set.
pub const DEFAULT_CONFIG_FILE: &str = "armory.toml";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Storage backend selected by config or `--backend`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Disk-backed redb database.
    #[default]
    Redb,
    /// Volatile in-memory catalog.
    Memory,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Redb => f.write_str("redb"),
            Self::Memory => f.write_str("memory"),
        }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmoryConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub limits: LimitsConfig,
    pub cors: CorsConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    /// `host:port` for `TcpListener::bind`.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Storage location and backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database: PathBuf,
    pub backend: Backend,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("armory.db"),
            backend: Backend::Redb,
        }
    }
}

/// Request limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Requests per second across all clients; 0 disables limiting.
    pub rate_limit: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self { rate_limit: 100 }
    }
}

/// Allowed CORS origins. `None` means localhost only; `["*"]` allows any.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub origins: Option<Vec<String>>,
}

impl ArmoryConfig {
    /// Parse a TOML document.
    pub fn from_toml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load configuration from `explicit`, `ARMORY_CONFIG` or `armory.toml`, then apply
    /// environment overrides.
    ///
    /// An explicitly named file must exist; the default file is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = std::env::var_os("ARMORY_CONFIG").map(PathBuf::from);
        let (path, required) = match explicit.map(Path::to_path_buf).or(env_path) {
            Some(path) => (path, true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        let mut config = if required || path.exists() {
            let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            tracing::debug!(path = %path.display(), "loaded config file");
            Self::from_toml(&text, &path)?
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply `ARMORY_RATE_LIMIT` and `ARMORY_CORS_ORIGINS` from `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup("ARMORY_RATE_LIMIT") {
            match raw.trim().parse() {
                Ok(rate_limit) => self.limits.rate_limit = rate_limit,
                Err(e) => tracing::warn!(value = %raw, error = %e, "ignoring invalid ARMORY_RATE_LIMIT"),
            }
        }

        if let Some(raw) = lookup("ARMORY_CORS_ORIGINS") {
            let origins: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            self.cors.origins = Some(origins);
        }
    }
}
