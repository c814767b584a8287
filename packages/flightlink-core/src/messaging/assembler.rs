//! Envelope assembly: peer resolution + hybrid encryption + metadata.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use uuid::Uuid;
use zeroize::Zeroizing;

use super::envelope::{Envelope, InboundMessage, OutboundEnvelope, OutboundMessage};
use crate::crypto::{EnvelopeCipher, PrivateKeyMaterial, PublicKeyMaterial};
use crate::directory::{FetchStatus, PeerDirectoryCache};
use crate::error::{Error, Result};

/// Local service id
pub const META_SENDER: &str = "sender";
/// Target peer id
pub const META_RECIPIENT: &str = "recipient";
/// Fresh UUID v4 per envelope
pub const META_MESSAGE_ID: &str = "message_id";
/// RFC 3339 UTC seal time
pub const META_SENT_AT: &str = "sent_at";
/// SHA-256 of the recipient key the payload was wrapped under
pub const META_KEY_FINGERPRINT: &str = "key_fingerprint";
pub const META_KEY_WRAP: &str = "key_wrap";
/// Recipient key the payload was wrapped under, raw base64 SPKI
pub const META_KEY_PUBLIC: &str = "key_public";

/// Builds outbound envelopes and opens inbound ones
///
/// Holds no mutable state of its own; safe to share behind an `Arc`.
pub struct MessageEnvelopeAssembler {
    directory: Arc<PeerDirectoryCache>,
    cipher: EnvelopeCipher,
    own_key: PrivateKeyMaterial,
}

impl MessageEnvelopeAssembler {
    pub fn new(
        directory: Arc<PeerDirectoryCache>,
        cipher: EnvelopeCipher,
        own_key: PrivateKeyMaterial,
    ) -> Self {
        Self {
            directory,
            cipher,
            own_key,
        }
    }

    pub fn cipher(&self) -> EnvelopeCipher {
        self.cipher
    }

    /// Encrypt a message for its target peer
    ///
    /// ## Errors
    ///
    /// - `Argument` for a blank correlation key or invalid peer id
    /// - `PeerResolution` if the peer cannot be resolved or has no inbound address
    /// - `Encryption` if the peer has no usable public key
    ///
    /// Nothing is retried; a failure leaves no partial envelope behind.
    pub async fn seal(&self, message: OutboundMessage) -> Result<OutboundEnvelope> {
        let OutboundMessage {
            target,
            plaintext,
            mut metadata,
            correlation,
        } = message;
        let plaintext = Zeroizing::new(plaintext);

        let correlation_key = correlation.to_key_id()?;

        let record = self
            .directory
            .resolve_peer(&target)
            .await
            .map_err(|e| match e {
                Error::Argument(_) => e,
                other => Error::PeerResolution {
                    peer_id: target.clone(),
                    reason: other.to_string(),
                },
            })?;

        let address = record
            .inbound_address
            .clone()
            .ok_or_else(|| Error::PeerResolution {
                peer_id: target.clone(),
                reason: "directory entry has no inbound address".into(),
            })?;

        let recipient = match (&record.public_key, &record.last_fetch_status) {
            (Some(key), _) => key,
            (None, FetchStatus::PublicKeyRejected { reason }) => {
                return Err(Error::Encryption(format!(
                    "Public key published for {} was rejected: {}",
                    target, reason
                )))
            }
            (None, _) => {
                return Err(Error::Encryption(format!(
                    "No public key published for {}",
                    target
                )))
            }
        };

        let sealed = self.cipher.encrypt_hybrid(&plaintext, recipient)?;

        let message_id = Uuid::new_v4().to_string();
        self.stamp(&mut metadata, &target, &message_id, recipient);

        tracing::info!(
            peer_id = %target,
            address = %address,
            correlation_key = %correlation_key,
            message_id = %message_id,
            "Envelope sealed"
        );

        Ok(OutboundEnvelope {
            envelope: Envelope::new(metadata, sealed, correlation_key),
            address,
        })
    }

    /// Decrypt an inbound envelope with the local private key
    ///
    /// Any failure is a terminal `Decryption` error.
    pub fn open(&self, envelope: &Envelope) -> Result<InboundMessage> {
        let plaintext = self
            .cipher
            .open(envelope.sealed(), &self.own_key)
            .map_err(|e| {
                tracing::warn!(
                    correlation_key = %envelope.correlation_key,
                    message_id = ?envelope.metadata.get(META_MESSAGE_ID),
                    declared_key_wrap = ?envelope.metadata.get(META_KEY_WRAP),
                    key_wrap = %self.cipher.scheme(),
                    error = %e,
                    "Envelope could not be opened"
                );
                e
            })?;

        tracing::debug!(
            correlation_key = %envelope.correlation_key,
            sender = ?envelope.metadata.get(META_SENDER),
            "Envelope opened"
        );

        Ok(InboundMessage {
            metadata: envelope.metadata.clone(),
            correlation_key: envelope.correlation_key.clone(),
            plaintext,
        })
    }

    /// Decode and open an envelope received as JSON
    pub fn open_json(&self, json: &str) -> Result<InboundMessage> {
        self.open(&Envelope::from_json(json)?)
    }

    /// Reserved keys overwrite caller values
    fn stamp(
        &self,
        metadata: &mut BTreeMap<String, String>,
        target: &str,
        message_id: &str,
        recipient: &PublicKeyMaterial,
    ) {
        let reserved = [
            (META_SENDER, self.directory.local_peer_id().to_string()),
            (META_RECIPIENT, target.to_string()),
            (META_MESSAGE_ID, message_id.to_string()),
            (
                META_SENT_AT,
                Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            ),
            (META_KEY_FINGERPRINT, recipient.fingerprint()),
            (META_KEY_WRAP, self.cipher.scheme().to_string()),
            (META_KEY_PUBLIC, recipient.to_base64()),
        ];
        for (key, value) in reserved {
            metadata.insert(key.to_string(), value);
        }
    }
}
