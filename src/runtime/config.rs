//! Worker pool configuration.
//!
//! # Configuration Precedence
//!
//! Settings are resolved in this order (highest priority first):
//!
//! 1. **Programmatic**: values set via builder methods (`max_threads(4)`)
//! 2. **Environment variables**: values from `EVENTUAL_POOL_*` env vars
//! 3. **Config file**: values loaded from a TOML file (requires `config-file` feature)
//! 4. **Defaults**: [`PoolConfig::default()`]
//!
//! # Supported Environment Variables
//!
//! | Variable | Type | Maps to |
//! |----------|------|---------|
//! | `EVENTUAL_POOL_MIN_THREADS` | `usize` | `min_threads` |
//! | `EVENTUAL_POOL_MAX_THREADS` | `usize` | `max_threads` |
//! | `EVENTUAL_POOL_IDLE_TIMEOUT_MS` | `u64` | `idle_timeout` |
//! | `EVENTUAL_POOL_THREAD_NAME_PREFIX` | `String` | `thread_name_prefix` |

use std::time::Duration;
use thiserror::Error;

/// Environment variable name for the minimum number of pool threads.
pub const ENV_MIN_THREADS: &str = "EVENTUAL_POOL_MIN_THREADS";
/// Environment variable name for the maximum number of pool threads.
pub const ENV_MAX_THREADS: &str = "EVENTUAL_POOL_MAX_THREADS";
/// Environment variable name for the idle timeout in milliseconds.
pub const ENV_IDLE_TIMEOUT_MS: &str = "EVENTUAL_POOL_IDLE_TIMEOUT_MS";
/// Environment variable name for the worker thread name prefix.
pub const ENV_THREAD_NAME_PREFIX: &str = "EVENTUAL_POOL_THREAD_NAME_PREFIX";

/// Default idle timeout before retiring threads above `min_threads`.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors produced while building a [`PoolConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable or file field held an unparseable value.
    #[error("invalid value for {name}: expected {expected}, got {value:?}")]
    InvalidValue {
        /// Variable or field name.
        name: String,
        /// Offending value.
        value: String,
        /// Human-readable description of the expected type.
        expected: &'static str,
    },
    /// `max_threads` was zero.
    #[error("max_threads must be at least 1")]
    NoThreads,
    /// `min_threads` exceeded `max_threads`.
    #[error("min_threads ({min}) exceeds max_threads ({max})")]
    MinExceedsMax {
        /// Configured minimum.
        min: usize,
        /// Configured maximum.
        max: usize,
    },
    /// A configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that was read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A configuration file could not be parsed.
    #[error("failed to parse TOML config: {0}")]
    Parse(String),
}

/// Configuration for a [`WorkerPool`](super::WorkerPool).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Threads kept alive even when idle.
    pub min_threads: usize,
    /// Upper bound on concurrently running threads.
    pub max_threads: usize,
    /// How long a thread above `min_threads` may idle before retiring.
    pub idle_timeout: Duration,
    /// Prefix for worker thread names.
    pub thread_name_prefix: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let parallelism = std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get);
        Self {
            min_threads: 1,
            max_threads: parallelism,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            thread_name_prefix: "eventual".to_string(),
        }
    }
}

impl PoolConfig {
    /// Defaults overridden by any `EVENTUAL_POOL_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        apply_env_overrides(&mut config)?;
        Ok(config)
    }

    /// A fixed-size pool of `threads` threads.
    #[must_use]
    pub fn fixed(threads: usize) -> Self {
        Self::default().min_threads(threads).max_threads(threads)
    }

    /// Sets the minimum thread count.
    #[must_use]
    pub fn min_threads(mut self, n: usize) -> Self {
        self.min_threads = n;
        self
    }

    /// Sets the maximum thread count.
    #[must_use]
    pub fn max_threads(mut self, n: usize) -> Self {
        self.max_threads = n;
        self
    }

    /// Sets the idle timeout.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets the thread name prefix.
    #[must_use]
    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Checks the thread bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_threads == 0 {
            return Err(ConfigError::NoThreads);
        }
        if self.min_threads > self.max_threads {
            return Err(ConfigError::MinExceedsMax {
                min: self.min_threads,
                max: self.max_threads,
            });
        }
        Ok(())
    }
}

/// Apply environment variable overrides to a [`PoolConfig`].
///
/// Only variables that are set are applied. A set but unparseable variable is
/// an error.
pub fn apply_env_overrides(config: &mut PoolConfig) -> Result<(), ConfigError> {
    if let Some(val) = read_env(ENV_MIN_THREADS) {
        config.min_threads = parse_usize(ENV_MIN_THREADS, &val)?;
    }
    if let Some(val) = read_env(ENV_MAX_THREADS) {
        config.max_threads = parse_usize(ENV_MAX_THREADS, &val)?;
    }
    if let Some(val) = read_env(ENV_IDLE_TIMEOUT_MS) {
        config.idle_timeout = Duration::from_millis(parse_u64(ENV_IDLE_TIMEOUT_MS, &val)?);
    }
    if let Some(val) = read_env(ENV_THREAD_NAME_PREFIX) {
        config.thread_name_prefix = val;
    }
    Ok(())
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse_usize(name: &str, val: &str) -> Result<usize, ConfigError> {
    val.trim()
        .parse::<usize>()
        .map_err(|_| invalid(name, val, "unsigned integer"))
}

fn parse_u64(name: &str, val: &str) -> Result<u64, ConfigError> {
    val.trim()
        .parse::<u64>()
        .map_err(|_| invalid(name, val, "milliseconds as u64"))
}

fn invalid(name: &str, val: &str, expected: &'static str) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        value: val.to_string(),
        expected,
    }
}

// =========================================================================
// TOML config file support (feature-gated)
// =========================================================================

/// TOML-deserializable pool configuration.
///
/// ```toml
/// [pool]
/// min_threads = 1
/// max_threads = 8
/// idle_timeout_ms = 10000
/// thread_name_prefix = "myapp-worker"
/// ```
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
pub struct PoolTomlConfig {
    /// Pool settings.
    #[serde(default)]
    pub pool: PoolToml,
}

/// Pool section of the TOML config.
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
pub struct PoolToml {
    /// Minimum thread count.
    pub min_threads: Option<usize>,
    /// Maximum thread count.
    pub max_threads: Option<usize>,
    /// Idle timeout in milliseconds.
    pub idle_timeout_ms: Option<u64>,
    /// Worker thread name prefix.
    pub thread_name_prefix: Option<String>,
}

/// Apply a parsed TOML config to a [`PoolConfig`].
#[cfg(feature = "config-file")]
pub fn apply_toml_config(config: &mut PoolConfig, toml: &PoolTomlConfig) {
    if let Some(v) = toml.pool.min_threads {
        config.min_threads = v;
    }
    if let Some(v) = toml.pool.max_threads {
        config.max_threads = v;
    }
    if let Some(v) = toml.pool.idle_timeout_ms {
        config.idle_timeout = Duration::from_millis(v);
    }
    if let Some(ref v) = toml.pool.thread_name_prefix {
        config.thread_name_prefix.clone_from(v);
    }
}

/// Parse a TOML string into a [`PoolTomlConfig`].
#[cfg(feature = "config-file")]
pub fn parse_toml_str(toml_str: &str) -> Result<PoolTomlConfig, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))
}

/// Resolve defaults, then the TOML file, then the environment.
#[cfg(feature = "config-file")]
pub fn load_with_file(path: &std::path::Path) -> Result<PoolConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mut config = PoolConfig::default();
    apply_toml_config(&mut config, &parse_toml_str(&content)?);
    apply_env_overrides(&mut config)?;
    Ok(config)
}
