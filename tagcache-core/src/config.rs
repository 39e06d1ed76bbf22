//! Configuration types
//!
//! Every adapter takes an explicit, enumerated configuration struct that is
//! validated at construction. Each struct can be deserialized from TOML or
//! read from `TAGCACHE_*` environment variables.

use std::path::Path;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::validation::{Validator, DEFAULT_MAX_IDENTIFIER_LENGTH};

static TABLE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("static pattern compiles"));

/// Durations are written as whole seconds in config files.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

// ============================================================================
// CACHE OPTIONS
// ============================================================================

/// Behaviour shared by every adapter behind the facade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheOptions {
    /// Lifetime applied when `set` is called without one. Zero never expires.
    #[serde(rename = "default_lifetime_secs", with = "duration_secs")]
    pub default_lifetime: Duration,
    /// Upper bound on identifier and tag length.
    pub max_identifier_length: usize,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            default_lifetime: Duration::from_secs(3600),
            max_identifier_length: DEFAULT_MAX_IDENTIFIER_LENGTH,
        }
    }
}

impl CacheOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default lifetime.
    pub fn with_default_lifetime(mut self, lifetime: Duration) -> Self {
        self.default_lifetime = lifetime;
        self
    }

    /// Set the identifier length bound directly.
    pub fn with_max_identifier_length(mut self, max: usize) -> Self {
        self.max_identifier_length = max;
        self
    }

    /// Derive the identifier length bound from the environment's maximum
    /// path length minus what the storage layout adds around an identifier.
    pub fn with_max_path_length(mut self, max_path_length: usize, reserved: usize) -> Self {
        self.max_identifier_length =
            Validator::from_max_path_length(max_path_length, reserved).max_length();
        self
    }

    /// Environment variables:
    /// - `TAGCACHE_DEFAULT_LIFETIME_SECS` (default: 3600, 0 = never expires)
    /// - `TAGCACHE_MAX_IDENTIFIER_LENGTH` (default: 250)
    pub fn from_env() -> Self {
        Self {
            default_lifetime: Duration::from_secs(env_parse(
                "TAGCACHE_DEFAULT_LIFETIME_SECS",
                3600,
            )),
            max_identifier_length: env_parse(
                "TAGCACHE_MAX_IDENTIFIER_LENGTH",
                DEFAULT_MAX_IDENTIFIER_LENGTH,
            ),
        }
    }

    pub fn validator(&self) -> Validator {
        Validator::new(self.max_identifier_length)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_identifier_length == 0 {
            return Err(invalid(
                "max_identifier_length",
                self.max_identifier_length,
                "must allow at least one character",
            ));
        }
        if self.max_identifier_length > DEFAULT_MAX_IDENTIFIER_LENGTH {
            return Err(invalid(
                "max_identifier_length",
                self.max_identifier_length,
                "must not exceed 250",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// RELATIONAL ADAPTER
// ============================================================================

/// PostgreSQL connection and layout settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationalConfig {
    /// Connection string, e.g. `postgres://localhost:5432/app`.
    pub dsn: String,
    /// Overrides the user from the DSN when set.
    pub username: Option<String>,
    /// Overrides the password from the DSN when set.
    pub password: Option<String>,
    /// Maximum pooled connections.
    pub pool_size: usize,
    /// How long to wait for a pooled connection.
    #[serde(rename = "connect_timeout_secs", with = "duration_secs")]
    pub connect_timeout: Duration,
    /// Prefix for the entries/tags/meta table names.
    pub table_prefix: String,
}

impl Default for RelationalConfig {
    fn default() -> Self {
        Self {
            dsn: "postgres://localhost:5432/tagcache".to_string(),
            username: None,
            password: None,
            pool_size: 16,
            connect_timeout: Duration::from_secs(30),
            table_prefix: "tagcache_".to_string(),
        }
    }
}

impl RelationalConfig {
    /// Environment variables:
    /// - `TAGCACHE_PG_DSN`
    /// - `TAGCACHE_PG_USERNAME`, `TAGCACHE_PG_PASSWORD` (optional)
    /// - `TAGCACHE_PG_POOL_SIZE` (default: 16)
    /// - `TAGCACHE_PG_CONNECT_TIMEOUT_SECS` (default: 30)
    /// - `TAGCACHE_PG_TABLE_PREFIX` (default: `tagcache_`)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            dsn: env_or("TAGCACHE_PG_DSN", &defaults.dsn),
            username: std::env::var("TAGCACHE_PG_USERNAME").ok(),
            password: std::env::var("TAGCACHE_PG_PASSWORD").ok(),
            pool_size: env_parse("TAGCACHE_PG_POOL_SIZE", defaults.pool_size),
            connect_timeout: Duration::from_secs(env_parse(
                "TAGCACHE_PG_CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout.as_secs(),
            )),
            table_prefix: env_or("TAGCACHE_PG_TABLE_PREFIX", &defaults.table_prefix),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dsn.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "dsn".to_string(),
            });
        }
        if self.pool_size == 0 {
            return Err(invalid("pool_size", self.pool_size, "must be positive"));
        }
        if !TABLE_PREFIX.is_match(&self.table_prefix) {
            return Err(invalid(
                "table_prefix",
                &self.table_prefix,
                "must match ^[a-z_][a-z0-9_]*$",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// KEY-VALUE ADAPTER
// ============================================================================

/// Redis connection and key layout settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KvConfig {
    pub host: String,
    pub port: u16,
    /// Logical database index.
    pub database: i64,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Prepended to every key before the namespace.
    pub key_prefix: String,
    /// `COUNT` hint for SCAN/SSCAN batches.
    pub scan_batch_size: usize,
}

impl Default for KvConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            database: 0,
            username: None,
            password: None,
            key_prefix: "tagcache:".to_string(),
            scan_batch_size: 256,
        }
    }
}

impl KvConfig {
    /// Environment variables:
    /// - `TAGCACHE_REDIS_HOST` (default: 127.0.0.1)
    /// - `TAGCACHE_REDIS_PORT` (default: 6379)
    /// - `TAGCACHE_REDIS_DATABASE` (default: 0)
    /// - `TAGCACHE_REDIS_USERNAME`, `TAGCACHE_REDIS_PASSWORD` (optional)
    /// - `TAGCACHE_REDIS_KEY_PREFIX` (default: `tagcache:`)
    /// - `TAGCACHE_REDIS_SCAN_BATCH_SIZE` (default: 256)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env_or("TAGCACHE_REDIS_HOST", &defaults.host),
            port: env_parse("TAGCACHE_REDIS_PORT", defaults.port),
            database: env_parse("TAGCACHE_REDIS_DATABASE", defaults.database),
            username: std::env::var("TAGCACHE_REDIS_USERNAME").ok(),
            password: std::env::var("TAGCACHE_REDIS_PASSWORD").ok(),
            key_prefix: env_or("TAGCACHE_REDIS_KEY_PREFIX", &defaults.key_prefix),
            scan_batch_size: env_parse("TAGCACHE_REDIS_SCAN_BATCH_SIZE", defaults.scan_batch_size),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "host".to_string(),
            });
        }
        if self.database < 0 {
            return Err(invalid("database", self.database, "must not be negative"));
        }
        if self.scan_batch_size == 0 {
            return Err(invalid("scan_batch_size", self.scan_batch_size, "must be positive"));
        }
        // The prefix ends up in SCAN MATCH patterns.
        if self
            .key_prefix
            .chars()
            .any(|c| matches!(c, '*' | '?' | '[' | ']' | '\\'))
        {
            return Err(invalid(
                "key_prefix",
                &self.key_prefix,
                "must not contain glob characters",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// AGGREGATE
// ============================================================================

/// Full configuration for a process operating one cache namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagCacheConfig {
    pub namespace: String,
    pub cache: CacheOptions,
    pub relational: RelationalConfig,
    pub kv: KvConfig,
}

impl Default for TagCacheConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            cache: CacheOptions::default(),
            relational: RelationalConfig::default(),
            kv: KvConfig::default(),
        }
    }
}

impl TagCacheConfig {
    /// `TAGCACHE_NAMESPACE` plus the per-section variables.
    pub fn from_env() -> Self {
        Self {
            namespace: env_or("TAGCACHE_NAMESPACE", "default"),
            cache: CacheOptions::from_env(),
            relational: RelationalConfig::from_env(),
            kv: KvConfig::from_env(),
        }
    }

    /// Parse a TOML document.
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|e| ConfigError::Unreadable {
            path: "<toml>".to_string(),
            reason: e.to_string(),
        })
    }

    /// Load from a TOML file when a path is given, otherwise from the
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;
                Self::from_toml(&raw).map_err(|e| match e {
                    ConfigError::Unreadable { reason, .. } => ConfigError::Unreadable {
                        path: path.display().to_string(),
                        reason,
                    },
                    other => other,
                })?
            }
            None => Self::from_env(),
        };
        config.cache.validate()?;
        Ok(config)
    }

    /// Check the namespace against the identifier rules.
    pub fn validate_namespace(&self) -> Result<(), ConfigError> {
        self.cache
            .validator()
            .validate_identifier(&self.namespace)
            .map_err(|e| invalid("namespace", &self.namespace, &e.to_string()))
    }
}
