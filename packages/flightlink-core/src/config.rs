//! Typed configuration for the directory, config server and cipher.
//!
//! Every struct has a `Default` with the production defaults and a
//! `from_env()` constructor reading `FLIGHTLINK_*` variables. The node
//! binary exposes the same knobs as command-line flags.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::crypto::KeyWrapScheme;
use crate::error::{Error, Result};

/// Identity of this service in the participant directory
pub const DEFAULT_LOCAL_PEER_ID: &str = "QR";

/// Sweep period for tracked peers (10 minutes)
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 10 * 60;

/// Age after which a lookup revalidates a record inline (30 minutes)
pub const DEFAULT_MAX_RECORD_AGE_SECS: u64 = 30 * 60;

pub const DEFAULT_CONFIG_SERVER_URL: &str = "http://localhost:8888";

pub const DEFAULT_SERVICE_NAME: &str = "airlines-b";

pub const DEFAULT_PRIVATE_KEY_PATH: &str = "private_key.pem";

/// Participant directory settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryConfig {
    /// Base URL of the participants API (without `/Participants`)
    pub base_url: String,
    /// Sent as `Authorization: Bearer <token>` when set
    pub bearer_token: Option<String>,
    /// This service's own peer id, tracked from startup
    pub local_peer_id: String,
    /// Period of the background sweep
    pub refresh_interval: Duration,
    /// Inline revalidation threshold; `None` relies on the sweep alone
    pub max_record_age: Option<Duration>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            bearer_token: None,
            local_peer_id: DEFAULT_LOCAL_PEER_ID.to_string(),
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
            max_record_age: Some(Duration::from_secs(DEFAULT_MAX_RECORD_AGE_SECS)),
        }
    }
}

impl DirectoryConfig {
    /// Load from `FLIGHTLINK_DIRECTORY_*` and `FLIGHTLINK_PEER_ID`
    ///
    /// A `FLIGHTLINK_DIRECTORY_MAX_AGE_SECS` of `0` disables inline
    /// revalidation.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env::var("FLIGHTLINK_DIRECTORY_URL").unwrap_or(defaults.base_url),
            bearer_token: env::var("FLIGHTLINK_DIRECTORY_TOKEN")
                .ok()
                .filter(|t| !t.is_empty()),
            local_peer_id: env::var("FLIGHTLINK_PEER_ID").unwrap_or(defaults.local_peer_id),
            refresh_interval: env_secs("FLIGHTLINK_DIRECTORY_REFRESH_SECS")
                .unwrap_or(defaults.refresh_interval),
            max_record_age: match env_secs("FLIGHTLINK_DIRECTORY_MAX_AGE_SECS") {
                Some(age) if age.is_zero() => None,
                Some(age) => Some(age),
                None => defaults.max_record_age,
            },
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(Error::Argument("Directory base URL must not be empty".into()));
        }
        crate::directory::validate_peer_id(&self.local_peer_id)?;
        if self.refresh_interval.is_zero() {
            return Err(Error::Argument(
                "Directory refresh interval must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Config server settings for fetching this service's own configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigServerConfig {
    pub url: String,
    /// Application name, fetched under the `default` profile
    pub service_name: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_interval: Duration,
}

impl Default for ConfigServerConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_CONFIG_SERVER_URL.to_string(),
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            client_id: None,
            client_secret: None,
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
        }
    }
}

impl ConfigServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: env::var("FLIGHTLINK_CONFIG_SERVER_URL").unwrap_or(defaults.url),
            service_name: env::var("FLIGHTLINK_SERVICE_NAME").unwrap_or(defaults.service_name),
            client_id: env::var("FLIGHTLINK_CLIENT_ID").ok(),
            client_secret: env::var("FLIGHTLINK_CLIENT_SECRET").ok(),
            refresh_interval: env_secs("FLIGHTLINK_CONFIG_REFRESH_SECS")
                .unwrap_or(defaults.refresh_interval),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::Argument("Config server URL must not be empty".into()));
        }
        if self.service_name.trim().is_empty() {
            return Err(Error::Argument("Service name must not be empty".into()));
        }
        if self.client_id.is_some() != self.client_secret.is_some() {
            return Err(Error::Argument(
                "Config server client id and secret must be set together".into(),
            ));
        }
        if self.refresh_interval.is_zero() {
            return Err(Error::Argument(
                "Config refresh interval must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Envelope cipher and local key settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherConfig {
    pub key_wrap: KeyWrapScheme,
    pub private_key_path: PathBuf,
}

impl Default for CipherConfig {
    fn default() -> Self {
        Self {
            key_wrap: KeyWrapScheme::default(),
            private_key_path: PathBuf::from(DEFAULT_PRIVATE_KEY_PATH),
        }
    }
}

impl CipherConfig {
    /// Load from `FLIGHTLINK_KEY_WRAP` and `FLIGHTLINK_PRIVATE_KEY_PATH`
    ///
    /// An unrecognized key wrap name is an error rather than a silent
    /// fallback to the default.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let key_wrap = match env::var("FLIGHTLINK_KEY_WRAP") {
            Ok(name) => name.parse()?,
            Err(_) => defaults.key_wrap,
        };
        Ok(Self {
            key_wrap,
            private_key_path: env::var("FLIGHTLINK_PRIVATE_KEY_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.private_key_path),
        })
    }
}

fn env_secs(name: &str) -> Option<Duration> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(secs) => Some(Duration::from_secs(secs)),
        Err(e) => {
            tracing::warn!(var = name, value = %raw, error = %e, "Ignoring non-numeric duration");
            None
        }
    }
}
