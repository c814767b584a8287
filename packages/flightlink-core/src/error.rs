//! # Error Handling
//!
//! Error types for FlightLink Core.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                     │
//! │  │                                                                      │
//! │  ├── Key Material Errors                                               │
//! │  │   ├── Format                - Unparseable key or wire data          │
//! │  │   └── FatalBootstrap        - Own private key missing/invalid       │
//! │  │                                                                      │
//! │  ├── Crypto Errors                                                     │
//! │  │   ├── Encryption            - Recipient key missing/unusable        │
//! │  │   └── Decryption            - Padding/integrity mismatch            │
//! │  │                                                                      │
//! │  ├── Directory Errors                                                  │
//! │  │   ├── Directory             - Peer unresolvable, nothing cached     │
//! │  │   ├── PeerResolution        - Envelope target cannot be resolved    │
//! │  │   └── ConfigFetch           - Own configuration unavailable         │
//! │  │                                                                      │
//! │  ├── Input Errors                                                      │
//! │  │   └── Argument              - Invalid correlation key / peer id     │
//! │  │                                                                      │
//! │  └── Internal Errors                                                   │
//! │      └── Serialization         - Encoding failed                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Propagation
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Format / Decryption   →  always surface, never retried or masked      │
//! │  Directory             →  degrade to last-known-good record if cached  │
//! │  FatalBootstrap        →  abort process startup                        │
//! │  Sweep failures        →  logged per peer, sweep continues             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for FlightLink Core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for FlightLink Core
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ========================================================================
    // Key Material Errors (100-199)
    // ========================================================================

    /// Key material or wire data could not be parsed
    #[error("Format error: {0}")]
    Format(String),

    /// The process's own private key is missing or unusable
    #[error("Fatal bootstrap error: {0}")]
    FatalBootstrap(String),

    // ========================================================================
    // Crypto Errors (200-299)
    // ========================================================================

    /// Encryption could not be performed
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Decryption failed (wrong key, corruption or tampering)
    #[error("Decryption failed: {0}")]
    Decryption(String),

    // ========================================================================
    // Directory Errors (300-399)
    // ========================================================================

    /// Peer could not be fetched and no cached record exists
    #[error("Directory lookup failed for {peer_id}: {reason}")]
    Directory { peer_id: String, reason: String },

    /// Envelope target could not be resolved
    #[error("Cannot resolve peer {peer_id}: {reason}")]
    PeerResolution { peer_id: String, reason: String },

    /// Own configuration could not be fetched
    #[error("Configuration fetch failed: {0}")]
    ConfigFetch(String),

    // ========================================================================
    // Input Errors (400-499)
    // ========================================================================

    /// Invalid caller input
    #[error("Invalid argument: {0}")]
    Argument(String),

    // ========================================================================
    // Internal Errors (900-999)
    // ========================================================================

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Numeric error code, grouped by category:
    /// - 100-199: Key material
    /// - 200-299: Crypto
    /// - 300-399: Directory
    /// - 400-499: Input
    /// - 900-999: Internal
    pub fn code(&self) -> i32 {
        match self {
            Error::Format(_) => 100,
            Error::FatalBootstrap(_) => 101,

            Error::Encryption(_) => 200,
            Error::Decryption(_) => 201,

            Error::Directory { .. } => 300,
            Error::PeerResolution { .. } => 301,
            Error::ConfigFetch(_) => 302,

            Error::Argument(_) => 400,

            Error::Serialization(_) => 900,
        }
    }

    /// Check if this error is recoverable
    ///
    /// Only remote-fetch failures may clear up on their own. Cryptographic
    /// and format failures are never transient.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Directory { .. } | Error::PeerResolution { .. } | Error::ConfigFetch(_)
        )
    }

    /// Check if this error must abort process startup
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::FatalBootstrap(_))
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::Format("x".into()).code(), 100);
        assert_eq!(Error::FatalBootstrap("x".into()).code(), 101);
        assert_eq!(Error::Decryption("x".into()).code(), 201);
        assert_eq!(
            Error::Directory {
                peer_id: "QR".into(),
                reason: "x".into()
            }
            .code(),
            300
        );
        assert_eq!(Error::Argument("x".into()).code(), 400);
        assert_eq!(Error::Serialization("x".into()).code(), 900);
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(Error::ConfigFetch("down".into()).is_recoverable());
        assert!(Error::PeerResolution {
            peer_id: "C1".into(),
            reason: "down".into()
        }
        .is_recoverable());
        assert!(!Error::Decryption("tag".into()).is_recoverable());
        assert!(!Error::Format("pem".into()).is_recoverable());
    }

    #[test]
    fn test_only_bootstrap_is_fatal() {
        assert!(Error::FatalBootstrap("missing".into()).is_fatal());
        assert!(!Error::Encryption("no key".into()).is_fatal());
    }

    #[test]
    fn test_directory_message_names_peer() {
        let err = Error::Directory {
            peer_id: "C1".into(),
            reason: "empty participant list".into(),
        };
        assert!(err.to_string().contains("C1"));
        assert!(err.to_string().contains("empty participant list"));
    }
}
