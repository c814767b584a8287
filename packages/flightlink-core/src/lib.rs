//! # FlightLink Core
//!
//! Secure message envelopes for airline and airport participant messaging:
//! hybrid RSA/AES encryption of cross-service payloads, tolerant key
//! loading, and a self-healing directory of peer keys and inbound queues.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       FLIGHTLINK CORE MODULES                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                         Messaging                                │  │
//! │  │  MessageEnvelopeAssembler: seal (outbound) / open (inbound)      │  │
//! │  └───────┬──────────────────────┬──────────────────────┬────────────┘  │
//! │          │                      │                      │               │
//! │  ┌───────▼───────┐   ┌──────────▼─────────┐   ┌────────▼──────────┐    │
//! │  │   Directory   │   │       Crypto       │   │    Flight Key     │    │
//! │  │               │   │                    │   │                   │    │
//! │  │ - Peer cache  │──►│ - Key loading      │   │ - Correlation id  │    │
//! │  │ - HTTP fetch  │   │ - RSA key wrap     │   │ - Normalization   │    │
//! │  │ - Sweep       │   │ - AES-256-GCM      │   │                   │    │
//! │  └───────▲───────┘   └────────────────────┘   └───────────────────┘    │
//! │          │                                                              │
//! │  ┌───────┴───────┐   ┌────────────────────┐                            │
//! │  │   Scheduler   │──►│   Remote Config    │                            │
//! │  │ - Intervals   │   │ - Own config snap  │                            │
//! │  │ - Cancellation│   │ - Merge by priority│                            │
//! │  └───────────────┘   └────────────────────┘                            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error types for the entire library
//! - [`config`] - Typed configuration with environment loading
//! - [`crypto`] - Key material loading and the envelope cipher
//! - [`directory`] - Peer directory cache and fetchers
//! - [`flight_key`] - Flight correlation keys
//! - [`messaging`] - Envelope assembly and opening
//! - [`remote_config`] - Own configuration from the config server
//! - [`scheduler`] - Periodic background tasks
//!
//! ## Lifecycle
//!
//! ```text
//! FlightLink::bootstrap(config)
//!     ├── load own private key        (missing/invalid → FatalBootstrap)
//!     ├── build directory cache       (local peer pre-tracked)
//!     └── build assembler
//! FlightLink::start()
//!     ├── directory sweep             (every refresh_interval)
//!     └── config refresh              (if a config server is configured)
//! FlightLink::shutdown().await
//! ```

#![warn(rustdoc::missing_crate_level_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod config;
pub mod crypto;
pub mod directory;
pub mod error;
pub mod flight_key;
pub mod messaging;
pub mod remote_config;
pub mod scheduler;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use config::{CipherConfig, ConfigServerConfig, DirectoryConfig};
pub use crypto::{EnvelopeCipher, KeyWrapScheme, PrivateKeyMaterial, PublicKeyMaterial};
pub use directory::{PeerDirectoryCache, PeerRecord};
pub use error::{Error, Result};
pub use flight_key::FlightCorrelationKey;
pub use messaging::{Envelope, InboundMessage, MessageEnvelopeAssembler, OutboundEnvelope, OutboundMessage};

// ============================================================================
// RUNTIME
// ============================================================================

use std::sync::Arc;

use directory::{DirectoryFetcher, HttpDirectoryFetcher};
use remote_config::{ConfigServerClient, ConfigSnapshotCache};
use scheduler::Scheduler;

/// Everything needed to bootstrap a [`FlightLink`]
#[derive(Debug, Clone, Default)]
pub struct FlightLinkConfig {
    pub directory: DirectoryConfig,
    pub cipher: CipherConfig,
    /// Own configuration source; `None` runs without one
    pub config_server: Option<ConfigServerConfig>,
}

/// The wired-up envelope service
///
/// One directory cache shared by the assembler and the background sweep.
/// No global state: construct one per process and pass it around.
pub struct FlightLink {
    directory: Arc<PeerDirectoryCache>,
    assembler: Arc<MessageEnvelopeAssembler>,
    own_config: Option<(Arc<ConfigSnapshotCache>, std::time::Duration)>,
    scheduler: Scheduler,
}

impl FlightLink {
    /// Load the local private key and build the HTTP-backed service
    ///
    /// ## Errors
    ///
    /// `FatalBootstrap` if the private key is missing or invalid;
    /// `Argument` for invalid configuration.
    pub fn bootstrap(config: FlightLinkConfig) -> Result<Self> {
        tracing::info!("Bootstrapping FlightLink Core v{}", version());

        config.directory.validate()?;
        let own_key = crypto::load_private_key_file(&config.cipher.private_key_path)?;
        let fetcher = Arc::new(HttpDirectoryFetcher::new(&config.directory));

        Self::with_parts(config, fetcher, own_key)
    }

    /// Build from an explicit fetcher and key (tests, embedding)
    pub fn with_parts(
        config: FlightLinkConfig,
        fetcher: Arc<dyn DirectoryFetcher>,
        own_key: PrivateKeyMaterial,
    ) -> Result<Self> {
        config.directory.validate()?;
        let own_fingerprint = own_key.public_key()?.fingerprint();
        let directory = Arc::new(PeerDirectoryCache::new(&config.directory, fetcher));
        let assembler = Arc::new(MessageEnvelopeAssembler::new(
            Arc::clone(&directory),
            EnvelopeCipher::new(config.cipher.key_wrap),
            own_key,
        ));

        let own_config = match config.config_server {
            Some(server) => {
                server.validate()?;
                let period = server.refresh_interval;
                let client = Arc::new(ConfigServerClient::new(server));
                Some((Arc::new(ConfigSnapshotCache::new(client)), period))
            }
            None => None,
        };

        tracing::info!(
            local_peer_id = %directory.local_peer_id(),
            key_wrap = %config.cipher.key_wrap,
            own_fingerprint = %own_fingerprint,
            config_server = own_config.is_some(),
            "FlightLink ready"
        );

        Ok(Self {
            directory,
            assembler,
            own_config,
            scheduler: Scheduler::new(),
        })
    }

    /// Start the periodic directory sweep and config refresh
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<()> {
        self.scheduler
            .spawn_every(self.directory.clone(), self.directory.refresh_interval())?;
        if let Some((ref cache, period)) = self.own_config {
            self.scheduler.spawn_every(cache.clone(), period)?;
        }
        Ok(())
    }

    /// Stop background tasks and wait for them
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down FlightLink");
        self.scheduler.shutdown().await;
    }

    pub fn directory(&self) -> &Arc<PeerDirectoryCache> {
        &self.directory
    }

    pub fn assembler(&self) -> &Arc<MessageEnvelopeAssembler> {
        &self.assembler
    }

    pub fn own_config(&self) -> Option<&Arc<ConfigSnapshotCache>> {
        self.own_config.as_ref().map(|(cache, _)| cache)
    }
}

/// Returns the version of FlightLink Core
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::test_keys::{private, RECIPIENT};
    use crate::directory::{test_participant, MockFetcher};
    use std::time::Duration;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }

    #[test]
    fn test_bootstrap_without_private_key_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = FlightLinkConfig {
            cipher: CipherConfig {
                private_key_path: dir.path().join("missing.pem"),
                ..CipherConfig::default()
            },
            ..FlightLinkConfig::default()
        };

        let err = FlightLink::bootstrap(config).err().unwrap();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_zero_sweep_interval_rejected() {
        let config = FlightLinkConfig {
            directory: DirectoryConfig {
                refresh_interval: Duration::ZERO,
                ..DirectoryConfig::default()
            },
            ..FlightLinkConfig::default()
        };
        let fetcher = Arc::new(MockFetcher::default());

        let err = FlightLink::with_parts(config, fetcher.clone(), private(&RECIPIENT))
            .err()
            .unwrap();
        assert!(matches!(err, Error::Argument(_)));
        assert_eq!(fetcher.calls(), 0);
    }

    #[test]
    fn test_zero_config_refresh_interval_rejected() {
        let config = FlightLinkConfig {
            config_server: Some(ConfigServerConfig {
                refresh_interval: Duration::ZERO,
                ..ConfigServerConfig::default()
            }),
            ..FlightLinkConfig::default()
        };

        let err = FlightLink::with_parts(config, Arc::new(MockFetcher::default()), private(&RECIPIENT))
            .err()
            .unwrap();
        assert!(matches!(err, Error::Argument(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_sweeps_local_peer() {
        let fetcher = Arc::new(MockFetcher::default());
        fetcher.set("QR", Ok(test_participant("QR", "qr-inbound", None)));

        let link =
            FlightLink::with_parts(FlightLinkConfig::default(), fetcher.clone(), private(&RECIPIENT))
                .unwrap();
        assert!(link.own_config().is_none());

        link.start().unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(fetcher.calls(), 1);
        assert_eq!(
            link.directory().cached("QR").unwrap().inbound_address.as_deref(),
            Some("qr-inbound")
        );

        link.shutdown().await;
    }
}
