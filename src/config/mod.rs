//! Configuration loading for the popcorn service.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `POPCORN_`, producing a typed [`AppConfig`].

use std::{collections::BTreeMap, env, net::SocketAddr, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Environment variable prefix for every setting
pub const ENV_PREFIX: &str = "POPCORN_";

/// Longest accepted throttle interval (30 days)
const MAX_SUBMISSION_INTERVAL_SECONDS: u64 = 30 * 24 * 60 * 60;

/// Application configuration derived from `POPCORN_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_api_bind_addr")]
    pub api_bind_addr: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_acquire_timeout_ms")]
    pub db_acquire_timeout_ms: u64,
    /// Minimum time between two accepted submissions of one system; 0 disables
    #[serde(default = "default_submission_min_interval_seconds")]
    pub submission_min_interval_seconds: u64,
    /// HTTP body limit for uploads, in KiB
    #[serde(default = "default_max_upload_kb")]
    pub max_upload_kb: usize,
    /// Limit on the decoded report, in KiB
    #[serde(default = "default_max_submission_kb")]
    pub max_submission_kb: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            api_bind_addr: default_api_bind_addr(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            database_url: default_database_url(),
            db_max_connections: default_db_max_connections(),
            db_acquire_timeout_ms: default_db_acquire_timeout_ms(),
            submission_min_interval_seconds: default_submission_min_interval_seconds(),
            max_upload_kb: default_max_upload_kb(),
            max_submission_kb: default_max_submission_kb(),
        }
    }
}

impl AppConfig {
    /// Returns the configured bind address as a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.api_bind_addr.parse()
    }

    /// Upload body limit in bytes.
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_kb.saturating_mul(1024)
    }

    /// Decoded report limit in bytes.
    pub fn max_submission_bytes(&self) -> usize {
        self.max_submission_kb.saturating_mul(1024)
    }

    pub fn submission_min_interval(&self) -> chrono::Duration {
        let seconds = i64::try_from(self.submission_min_interval_seconds).unwrap_or(i64::MAX);
        chrono::Duration::try_seconds(seconds).unwrap_or(chrono::Duration::MAX)
    }

    /// Returns a redacted JSON representation (database password masked).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        config.database_url = redact_database_url(&config.database_url);
        serde_json::to_string_pretty(&config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_upload_kb == 0 {
            return Err(ConfigError::InvalidLimit {
                field: "MAX_UPLOAD_KB",
            });
        }
        if self.max_submission_kb == 0 {
            return Err(ConfigError::InvalidLimit {
                field: "MAX_SUBMISSION_KB",
            });
        }
        if self.max_submission_kb < self.max_upload_kb {
            return Err(ConfigError::SubmissionLimitBelowUpload {
                submission_kb: self.max_submission_kb,
                upload_kb: self.max_upload_kb,
            });
        }

        if self.db_max_connections == 0 {
            return Err(ConfigError::InvalidPoolSize);
        }

        if self.submission_min_interval_seconds > MAX_SUBMISSION_INTERVAL_SECONDS {
            return Err(ConfigError::InvalidSubmissionInterval {
                value: self.submission_min_interval_seconds,
            });
        }

        if !matches!(self.log_format.as_str(), "json" | "pretty") {
            return Err(ConfigError::InvalidLogFormat {
                value: self.log_format.clone(),
            });
        }

        Ok(())
    }
}

/// Placeholder written over database passwords in logged configuration
const REDACTED: &str = "REDACTED";

/// Mask the password of a database URL.
///
/// Strings that do not parse as URLs pass through unless they look like they
/// carry credentials, in which case everything after the scheme is masked.
fn redact_database_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) if url.password().is_some() => match url.set_password(Some(REDACTED)) {
            Ok(()) => url.to_string(),
            Err(()) => REDACTED.to_string(),
        },
        Ok(_) => raw.to_string(),
        Err(_) if raw.contains('@') => match raw.split_once("://") {
            Some((scheme, _)) => format!("{scheme}://{REDACTED}"),
            None => REDACTED.to_string(),
        },
        Err(_) => raw.to_string(),
    }
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_api_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_database_url() -> String {
    "sqlite://popcorn.db?mode=rwc".to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_acquire_timeout_ms() -> u64 {
    5000
}

fn default_submission_min_interval_seconds() -> u64 {
    24 * 60 * 60
}

fn default_max_upload_kb() -> usize {
    2048
}

fn default_max_submission_kb() -> usize {
    8192
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("invalid api bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error("POPCORN_{key} must be a non-negative integer, got '{value}'")]
    InvalidNumber { key: String, value: String },
    #[error("POPCORN_{field} must be greater than zero")]
    InvalidLimit { field: &'static str },
    #[error(
        "POPCORN_MAX_SUBMISSION_KB ({submission_kb}) cannot be smaller than POPCORN_MAX_UPLOAD_KB ({upload_kb})"
    )]
    SubmissionLimitBelowUpload {
        submission_kb: usize,
        upload_kb: usize,
    },
    #[error("database pool must allow at least one connection")]
    InvalidPoolSize,
    #[error("submission interval must not exceed 30 days, got {value} seconds")]
    InvalidSubmissionInterval { value: u64 },
    #[error("log format must be 'json' or 'pretty', got '{value}'")]
    InvalidLogFormat { value: String },
}

/// Loads [`AppConfig`] from layered dotenv files and the process environment
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads `.env`, `.env.local`, `.env.{profile}`, `.env.{profile}.local`
    /// in that order, then the process environment, later sources winning.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        // Overlay process environment last so it wins.
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                layered.insert(stripped.to_string(), value);
            }
        }

        let profile = take_string(&mut layered, "PROFILE").unwrap_or(profile_hint);
        let api_bind_addr =
            take_string(&mut layered, "API_BIND_ADDR").unwrap_or_else(default_api_bind_addr);
        let log_level = take_string(&mut layered, "LOG_LEVEL").unwrap_or_else(default_log_level);
        let log_format =
            take_string(&mut layered, "LOG_FORMAT").unwrap_or_else(default_log_format);
        let database_url =
            take_string(&mut layered, "DATABASE_URL").unwrap_or_else(default_database_url);
        let db_max_connections = take_number(&mut layered, "DB_MAX_CONNECTIONS")?
            .unwrap_or_else(default_db_max_connections);
        let db_acquire_timeout_ms = take_number(&mut layered, "DB_ACQUIRE_TIMEOUT_MS")?
            .unwrap_or_else(default_db_acquire_timeout_ms);
        let submission_min_interval_seconds =
            take_number(&mut layered, "SUBMISSION_MIN_INTERVAL_SECONDS")?
                .unwrap_or_else(default_submission_min_interval_seconds);
        let max_upload_kb =
            take_number(&mut layered, "MAX_UPLOAD_KB")?.unwrap_or_else(default_max_upload_kb);
        let max_submission_kb = take_number(&mut layered, "MAX_SUBMISSION_KB")?
            .unwrap_or_else(default_max_submission_kb);

        let config = AppConfig {
            profile,
            api_bind_addr,
            log_level,
            log_format,
            database_url,
            db_max_connections,
            db_acquire_timeout_ms,
            submission_min_interval_seconds,
            max_upload_kb,
            max_submission_kb,
        };

        config.validate()?;

        match config.bind_addr() {
            Ok(_) => Ok(config),
            Err(source) => Err(ConfigError::InvalidBindAddr {
                value: config.api_bind_addr.clone(),
                source,
            }),
        }
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var(format!("{ENV_PREFIX}PROFILE"))
            .ok()
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn take_string(layered: &mut BTreeMap<String, String>, key: &str) -> Option<String> {
    layered.remove(key).filter(|v| !v.is_empty())
}

fn take_number<T: std::str::FromStr>(
    layered: &mut BTreeMap<String, String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    match take_string(layered, key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber {
                key: key.to_string(),
                value,
            }),
    }
}
