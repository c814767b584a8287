//! Participant directory wire types and cached peer records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::crypto::{load_public_key, PublicKeyMaterial};
use crate::error::{Error, Result};

// ── Wire types ──────────────────────────────────────────────────────────────

/// Response body of `GET /Participants?$filter=...`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantsResponse {
    #[serde(rename = "@odata.context", default)]
    pub odata_context: Option<String>,

    /// Matching participants; absent is treated as empty
    #[serde(rename = "value", default)]
    pub participants: Vec<Participant>,
}

/// One participant entry as published by the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Participant {
    #[serde(default)]
    pub id: Option<String>,

    /// Participant name; also names its inbound queue
    #[serde(default)]
    pub name: Option<String>,

    pub iata_code: String,

    #[serde(default)]
    pub kafka_topic_status: bool,

    /// PEM or raw base64 SPKI
    #[serde(default)]
    pub public_key: Option<String>,

    #[serde(default)]
    pub public_key_status: Option<String>,

    #[serde(default)]
    pub recipient_type: Option<String>,
}

// ── Cached records ──────────────────────────────────────────────────────────

/// Outcome of the fetch that produced a [`PeerRecord`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchStatus {
    /// Participant found and its public key parsed
    Complete,
    /// Participant found without a public key
    PublicKeyMissing,
    /// Participant found but its public key could not be parsed
    PublicKeyRejected { reason: String },
}

/// A resolved peer, replaced as one value on every successful refresh
#[derive(Debug, Clone)]
pub struct PeerRecord {
    /// Peer identifier (IATA code) used for lookups
    pub id: String,
    /// Directory-assigned participant id
    pub directory_id: Option<String>,
    pub display_name: Option<String>,
    pub public_key: Option<PublicKeyMaterial>,
    /// Destination queue for envelopes addressed to this peer
    pub inbound_address: Option<String>,
    pub topic_enabled: bool,
    pub public_key_status: Option<String>,
    pub recipient_type: Option<String>,
    pub last_fetch_status: FetchStatus,
    /// Wall-clock time of the fetch, for logs and operators
    pub fetched_at: DateTime<Utc>,
    /// Monotonic time of the fetch, for age checks
    pub(crate) fetched_instant: Instant,
}

impl PeerRecord {
    /// Build a record from a directory entry, parsing its public key once
    pub fn from_participant(peer_id: &str, participant: Participant) -> Self {
        let (public_key, last_fetch_status) = match participant
            .public_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
        {
            None => (None, FetchStatus::PublicKeyMissing),
            Some(raw) => match load_public_key(raw) {
                Ok(key) => (Some(key), FetchStatus::Complete),
                Err(e) => {
                    tracing::warn!(peer_id = %peer_id, error = %e, "Rejected peer public key");
                    (
                        None,
                        FetchStatus::PublicKeyRejected {
                            reason: e.to_string(),
                        },
                    )
                }
            },
        };

        let inbound_address = participant
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        Self {
            id: peer_id.to_string(),
            directory_id: participant.id,
            display_name: participant.name,
            public_key,
            inbound_address,
            topic_enabled: participant.kafka_topic_status,
            public_key_status: participant.public_key_status,
            recipient_type: participant.recipient_type,
            last_fetch_status,
            fetched_at: Utc::now(),
            fetched_instant: Instant::now(),
        }
    }

    /// Time since this record was fetched
    pub fn age(&self) -> std::time::Duration {
        self.fetched_instant.elapsed()
    }
}

/// Last failed fetch for a peer, kept apart from its record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// Result of one sweep over the tracked peers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Peers whose records were replaced
    pub refreshed: Vec<String>,
    /// Peers whose fetch failed, with the cause
    pub failed: Vec<(String, String)>,
}

impl SweepReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Check that a peer id is safe to interpolate into the directory filter
///
/// Accepts non-blank ASCII alphanumerics plus `-` and `_`.
pub fn validate_peer_id(peer_id: &str) -> Result<()> {
    if peer_id.trim().is_empty() {
        return Err(Error::Argument("Peer id must not be blank".into()));
    }
    if !peer_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(Error::Argument(format!(
            "Peer id '{}' contains characters outside [A-Za-z0-9_-]",
            peer_id
        )));
    }
    Ok(())
}
