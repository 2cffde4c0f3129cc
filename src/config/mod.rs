//! Configuration loading for the Kylas relay.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `KYLAS_RELAY_`, producing a typed [`AppConfig`].

use std::{collections::BTreeMap, env, net::SocketAddr, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::hashing::HashNormalization;
use crate::normalization::StageGate;

const ENV_PREFIX: &str = "KYLAS_RELAY_";

/// Application configuration derived from `KYLAS_RELAY_*` environment variables.
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
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_log_path: Option<PathBuf>,
    #[serde(default)]
    pub redaction: RedactionConfig,
    #[serde(default)]
    pub meta: MetaConfig,
}

/// Which records are stored and how their PII is redacted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct RedactionConfig {
    /// Stage gate applied before any side effect (default: gated)
    ///
    /// Environment variable: `KYLAS_RELAY_STAGE_GATE` (`gated` | `ungated`)
    #[serde(default)]
    pub stage_gate: StageGate,

    /// Normalization applied before hashing (default: trim_lowercase)
    ///
    /// Environment variable: `KYLAS_RELAY_HASH_NORMALIZATION` (`trim_lowercase` | `raw`)
    #[serde(default)]
    pub hash_normalization: HashNormalization,

    /// Store plaintext email/mobile next to their hashes (default: false)
    ///
    /// Environment variable: `KYLAS_RELAY_RETAIN_PLAINTEXT_PII`
    #[serde(default)]
    pub retain_plaintext_pii: bool,
}

/// Meta Conversions API settings. Reporting is off unless both the pixel id
/// and the access token are present.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct MetaConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pixel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_event_code: Option<String>,
    #[serde(default = "default_meta_graph_base")]
    pub graph_base: String,
    #[serde(default = "default_meta_api_version")]
    pub api_version: String,
    #[serde(default = "default_meta_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_meta_currency")]
    pub currency: String,
}

impl MetaConfig {
    /// Returns `true` when conversions should be reported.
    pub fn is_enabled(&self) -> bool {
        self.pixel_id.is_some() && self.access_token.is_some()
    }

    /// Validate Meta settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pixel_id.is_some() != self.access_token.is_some() {
            return Err(ConfigError::IncompleteMetaCredentials);
        }

        match Url::parse(&self.graph_base) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => {
                return Err(ConfigError::InvalidMetaGraphBase {
                    value: self.graph_base.clone(),
                });
            }
        }

        if self.api_version.trim().is_empty() {
            return Err(ConfigError::InvalidMetaApiVersion);
        }

        if self.timeout_seconds == 0 {
            return Err(ConfigError::InvalidMetaTimeout {
                value: self.timeout_seconds,
            });
        }

        Ok(())
    }
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            pixel_id: None,
            access_token: None,
            test_event_code: None,
            graph_base: default_meta_graph_base(),
            api_version: default_meta_api_version(),
            timeout_seconds: default_meta_timeout_seconds(),
            currency: default_meta_currency(),
        }
    }
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
            audit_log_path: None,
            redaction: RedactionConfig::default(),
            meta: MetaConfig::default(),
        }
    }
}

impl AppConfig {
    /// Returns the configured bind address as a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.api_bind_addr.parse()
    }

    /// Returns a redacted JSON representation (secrets are redacted).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        if config.meta.access_token.is_some() {
            config.meta.access_token = Some("[REDACTED]".to_string());
        }
        serde_json::to_string_pretty(&config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::MissingDatabaseUrl);
        }

        if self.db_max_connections == 0 {
            return Err(ConfigError::InvalidDbMaxConnections {
                value: self.db_max_connections,
            });
        }

        if !matches!(self.log_format.as_str(), "json" | "pretty") {
            return Err(ConfigError::InvalidLogFormat {
                value: self.log_format.clone(),
            });
        }

        self.meta.validate()
    }
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_api_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_database_url() -> String {
    "sqlite://kylas_relay.db?mode=rwc".to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_acquire_timeout_ms() -> u64 {
    5000
}

fn default_meta_graph_base() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_meta_api_version() -> String {
    "v18.0".to_string()
}

fn default_meta_timeout_seconds() -> u64 {
    10
}

fn default_meta_currency() -> String {
    "INR".to_string()
}

/// Errors that can occur while loading configuration.
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
    #[error("database url is missing; set KYLAS_RELAY_DATABASE_URL")]
    MissingDatabaseUrl,
    #[error("database max connections must be at least 1, got {value}")]
    InvalidDbMaxConnections { value: u32 },
    #[error("log format must be 'json' or 'pretty', got '{value}'")]
    InvalidLogFormat { value: String },
    #[error("invalid stage gate '{value}'; expected 'gated' or 'ungated'")]
    InvalidStageGate { value: String },
    #[error("invalid hash normalization '{value}'; expected 'trim_lowercase' or 'raw'")]
    InvalidHashNormalization { value: String },
    #[error("invalid boolean for {key}: '{value}'")]
    InvalidBool { key: &'static str, value: String },
    #[error(
        "Meta pixel id and access token must be set together; set both KYLAS_RELAY_META_PIXEL_ID and KYLAS_RELAY_META_ACCESS_TOKEN"
    )]
    IncompleteMetaCredentials,
    #[error("Meta graph base must be an http(s) URL, got '{value}'")]
    InvalidMetaGraphBase { value: String },
    #[error("Meta API version must not be empty")]
    InvalidMetaApiVersion,
    #[error("Meta request timeout must be positive, got {value}")]
    InvalidMetaTimeout { value: u64 },
}

/// Loads configuration using layered `.env` files and `KYLAS_RELAY_*` env vars.
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
    /// and finally the process environment, later layers winning.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        // Overlay process environment last so it wins.
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                layered.insert(stripped.to_string(), value);
            }
        }

        let profile = take_non_empty(&mut layered, "PROFILE").unwrap_or(profile_hint);
        let api_bind_addr =
            take_non_empty(&mut layered, "API_BIND_ADDR").unwrap_or_else(default_api_bind_addr);
        let log_level =
            take_non_empty(&mut layered, "LOG_LEVEL").unwrap_or_else(default_log_level);
        let log_format =
            take_non_empty(&mut layered, "LOG_FORMAT").unwrap_or_else(default_log_format);
        let database_url =
            take_non_empty(&mut layered, "DATABASE_URL").unwrap_or_else(default_database_url);
        let db_max_connections = layered
            .remove("DB_MAX_CONNECTIONS")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_db_max_connections);
        let db_acquire_timeout_ms = layered
            .remove("DB_ACQUIRE_TIMEOUT_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_db_acquire_timeout_ms);
        let audit_log_path = take_non_empty(&mut layered, "AUDIT_LOG_PATH").map(PathBuf::from);

        let stage_gate = match take_non_empty(&mut layered, "STAGE_GATE") {
            Some(value) => value
                .parse::<StageGate>()
                .map_err(|value| ConfigError::InvalidStageGate { value })?,
            None => StageGate::default(),
        };
        let hash_normalization = match take_non_empty(&mut layered, "HASH_NORMALIZATION") {
            Some(value) => value
                .parse::<HashNormalization>()
                .map_err(|value| ConfigError::InvalidHashNormalization { value })?,
            None => HashNormalization::default(),
        };
        let retain_plaintext_pii = match take_non_empty(&mut layered, "RETAIN_PLAINTEXT_PII") {
            Some(value) => parse_bool("KYLAS_RELAY_RETAIN_PLAINTEXT_PII", &value)?,
            None => false,
        };

        let meta = MetaConfig {
            pixel_id: take_non_empty(&mut layered, "META_PIXEL_ID"),
            access_token: take_non_empty(&mut layered, "META_ACCESS_TOKEN"),
            test_event_code: take_non_empty(&mut layered, "META_TEST_EVENT_CODE"),
            graph_base: take_non_empty(&mut layered, "META_GRAPH_BASE")
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or_else(default_meta_graph_base),
            api_version: take_non_empty(&mut layered, "META_API_VERSION")
                .unwrap_or_else(default_meta_api_version),
            timeout_seconds: layered
                .remove("META_TIMEOUT_SECONDS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_meta_timeout_seconds),
            currency: take_non_empty(&mut layered, "META_CURRENCY")
                .unwrap_or_else(default_meta_currency),
        };

        let config = AppConfig {
            profile,
            api_bind_addr,
            log_level,
            log_format,
            database_url,
            db_max_connections,
            db_acquire_timeout_ms,
            audit_log_path,
            redaction: RedactionConfig {
                stage_gate,
                hash_normalization,
                retain_plaintext_pii,
            },
            meta,
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

fn take_non_empty(values: &mut BTreeMap<String, String>, key: &str) -> Option<String> {
    values
        .remove(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key,
            value: value.to_string(),
        }),
    }
}
