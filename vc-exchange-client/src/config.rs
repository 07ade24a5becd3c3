//! Client configuration.
//!
//! # Examples
//!
//! ```rust
//! use vc_exchange_client::{ClientConfig, Environment, LogLevel};
//!
//! let config = ClientConfig::simplified("./issuer_storage");
//! assert_eq!(config.environment, Environment::Sandbox);
//! assert_eq!(config.log_level, LogLevel::Warn);
//! ```

use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::level_filters::LevelFilter;
use tracing::warn;
use zeroize::Zeroize;

use crate::error::{Error, Result};

/// Length of a storage encryption key in bytes.
pub const STORAGE_KEY_LENGTH: usize = 32;

/// Encryption key for the engine's local storage. Wiped on drop.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct StorageKey(Vec<u8>);

impl StorageKey {
    /// Generate a fresh key from the operating system RNG.
    ///
    /// If the RNG is unavailable the key is derived from a time-seeded hash,
    /// so the client can still start on constrained platforms.
    #[must_use]
    pub fn generate() -> Self {
        let mut key = vec![0u8; STORAGE_KEY_LENGTH];
        if let Err(e) = OsRng.try_fill_bytes(&mut key) {
            warn!("OS random source unavailable, deriving storage key: {e}");
            let nanos = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|elapsed| elapsed.as_nanos())
                .unwrap_or_default();
            key = Sha256::digest(format!("vc-exchange-{nanos}")).to_vec();
        }
        Self(key)
    }

    /// Wrap caller-provided key material.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidKeyLength`] unless the key is exactly 32 bytes
    pub fn from_bytes(key: &[u8]) -> Result<Self> {
        if key.len() != STORAGE_KEY_LENGTH {
            return Err(Error::InvalidKeyLength {
                expected: STORAGE_KEY_LENGTH,
                actual: key.len(),
            });
        }
        Ok(Self(key.to_vec()))
    }

    /// The raw key bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Whether no key material is present
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Drop for StorageKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorageKey([REDACTED; {}])", self.0.len())
    }
}

/// Service endpoints of an environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    /// RPC endpoint
    pub rpc: &'static str,
    /// Object storage endpoint
    pub object: &'static str,
    /// Message relay endpoint
    pub message: &'static str,
}

/// The environment the engine connects to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Development and testing environment
    #[default]
    Sandbox,
    /// Production environment
    Production,
}

impl Environment {
    /// The service endpoints for this environment
    #[must_use]
    pub const fn target(self) -> Target {
        match self {
            Self::Sandbox => Target {
                rpc: "https://rpc-sandbox.joinself.com/",
                object: "https://object-sandbox.joinself.com/",
                message: "wss://message-sandbox.joinself.com/",
            },
            Self::Production => Target {
                rpc: "https://rpc.joinself.com/",
                object: "https://object.joinself.com/",
                message: "wss://message.joinself.com/",
            },
        }
    }
}

/// Logging verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Errors only
    Error,
    /// Warnings and errors
    #[default]
    Warn,
    /// Informational messages
    Info,
    /// Debug output
    Debug,
    /// Everything
    Trace,
}

impl LogLevel {
    /// The matching `tracing` filter
    #[must_use]
    pub const fn as_filter(self) -> LevelFilter {
        match self {
            Self::Error => LevelFilter::ERROR,
            Self::Warn => LevelFilter::WARN,
            Self::Info => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }
}

/// Timing and capacity settings of the presentation exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Timeout applied when a request does not specify one
    pub default_timeout: Duration,
    /// How often expired requests are swept
    pub sweep_interval: Duration,
    /// How long settled requests are remembered to detect duplicates
    pub grace_period: Duration,
    /// Capacity of the inbound message queue
    pub inbox_capacity: usize,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(1),
            grace_period: Duration::from_secs(30),
            inbox_capacity: 64,
        }
    }
}

/// Configuration for a [`Client`](crate::Client).
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Encryption key for local storage (required)
    pub storage_key: StorageKey,

    /// Directory for local storage (required)
    pub storage_path: PathBuf,

    /// Target environment
    pub environment: Environment,

    /// Logging verbosity
    pub log_level: LogLevel,

    /// Do not wait for the engine to report ready
    pub skip_ready: bool,

    /// Do not connect an inbound delivery path
    pub skip_setup: bool,

    /// Presentation exchange settings
    pub exchange: ExchangeConfig,
}

impl ClientConfig {
    /// Defaults for development: generated key, sandbox, warnings.
    pub fn simplified(storage_path: impl Into<PathBuf>) -> Self {
        Self {
            storage_key: StorageKey::generate(),
            storage_path: storage_path.into(),
            environment: Environment::Sandbox,
            log_level: LogLevel::Warn,
            ..Self::default()
        }
    }

    /// Defaults for production: explicit key, production, errors only.
    ///
    /// The storage directory is created if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not 32 bytes or the directory cannot be
    /// created
    pub fn simplified_with_key(storage_key: &[u8], storage_path: impl Into<PathBuf>) -> Result<Self> {
        let storage_key = StorageKey::from_bytes(storage_key)?;
        let storage_path = storage_path.into();
        create_private_dir(&storage_path)?;

        Ok(Self {
            storage_key,
            storage_path,
            environment: Environment::Production,
            log_level: LogLevel::Error,
            ..Self::default()
        })
    }

    /// Check that required fields are present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the missing field
    pub fn validate(&self) -> Result<()> {
        if self.storage_key.is_empty() {
            return Err(Error::InvalidConfig("storage key is required".into()));
        }
        if self.storage_path.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("storage path is required".into()));
        }
        if self.exchange.inbox_capacity == 0 {
            return Err(Error::InvalidConfig("inbox capacity must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(unix)]
fn create_private_dir(path: &Path) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(path)?;
    Ok(())
}

#[cfg(not(unix))]
fn create_private_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)?;
    Ok(())
}
