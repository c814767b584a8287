//! Envelope wire type and the request/response types around it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::crypto::SealedPayload;
use crate::error::{Error, Result};
use crate::flight_key::FlightCorrelationKey;

/// The transmitted unit handed to the transport
///
/// ```json
/// {
///   "metadata": { "message_type": "FlightLegNotif", "sender": "QR", ... },
///   "encryptedPayload": "base64(nonce || ciphertext || tag)",
///   "encryptedKey": "base64(wrapped AES key)",
///   "correlationKey": "QR-1234-20260115-SFO-LHR"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,

    #[serde(flatten)]
    sealed: SealedPayload,

    #[serde(alias = "uniqueFlightId")]
    pub correlation_key: String,
}

impl Envelope {
    pub fn new(
        metadata: BTreeMap<String, String>,
        sealed: SealedPayload,
        correlation_key: impl Into<String>,
    ) -> Self {
        Self {
            metadata,
            sealed,
            correlation_key: correlation_key.into(),
        }
    }

    pub fn sealed(&self) -> &SealedPayload {
        &self.sealed
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode an envelope received from the transport
    ///
    /// Missing payload or key fields are a `Format` error.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Format(format!("Invalid envelope: {}", e)))
    }
}

/// Correlation key source for an outbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Correlation {
    /// Caller-supplied key, used verbatim
    Key(String),
    /// Derived from a flight identity
    Flight(FlightCorrelationKey),
}

impl Correlation {
    /// Render the key, rejecting a blank caller-supplied one
    pub fn to_key_id(&self) -> Result<String> {
        match self {
            Correlation::Key(key) if key.trim().is_empty() => {
                Err(Error::Argument("Correlation key must not be blank".into()))
            }
            Correlation::Key(key) => Ok(key.clone()),
            Correlation::Flight(flight) => Ok(flight.to_key_id()),
        }
    }
}

impl From<FlightCorrelationKey> for Correlation {
    fn from(key: FlightCorrelationKey) -> Self {
        Correlation::Flight(key)
    }
}

impl From<String> for Correlation {
    fn from(key: String) -> Self {
        Correlation::Key(key)
    }
}

impl From<&str> for Correlation {
    fn from(key: &str) -> Self {
        Correlation::Key(key.to_string())
    }
}

/// A plaintext message addressed to a peer
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    /// Peer id (IATA code) of the recipient
    pub target: String,
    pub plaintext: Vec<u8>,
    pub metadata: BTreeMap<String, String>,
    pub correlation: Correlation,
}

impl OutboundMessage {
    pub fn new(
        target: impl Into<String>,
        plaintext: impl Into<Vec<u8>>,
        correlation: impl Into<Correlation>,
    ) -> Self {
        Self {
            target: target.into(),
            plaintext: plaintext.into(),
            metadata: BTreeMap::new(),
            correlation: correlation.into(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A sealed envelope and the queue it must be delivered to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEnvelope {
    pub envelope: Envelope,
    pub address: String,
}

/// A decrypted inbound envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub metadata: BTreeMap<String, String>,
    pub correlation_key: String,
    pub plaintext: Vec<u8>,
}

impl InboundMessage {
    /// Metadata value by key
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}
