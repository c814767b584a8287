//! # Messaging Module
//!
//! Composes peer resolution and the envelope cipher into sealed envelopes
//! ready for an external transport, and opens the envelopes it receives.
//!
//! ## Outbound / Inbound
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        ENVELOPE FLOW                                    │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  OutboundMessage { target, plaintext, metadata, correlation }          │
//! │        │                                                                │
//! │        ├── correlation key (caller string or flight key)               │
//! │        ├── PeerDirectoryCache::resolve_peer(target)                    │
//! │        │       → public key, inbound address                           │
//! │        ├── EnvelopeCipher::encrypt_hybrid(plaintext, key)              │
//! │        └── metadata + sender/recipient/message_id/sent_at/key info     │
//! │        ▼                                                                │
//! │  OutboundEnvelope { envelope, address }  ───►  transport (external)    │
//! │                                                                         │
//! │  transport ───►  Envelope                                              │
//! │        │                                                                │
//! │        └── EnvelopeCipher::decrypt_hybrid(.., own private key)         │
//! │        ▼                                                                │
//! │  InboundMessage { metadata, correlation_key, plaintext }               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Errors
//!
//! | Failure | Error |
//! |---------|-------|
//! | Blank correlation key, invalid peer id | `Argument` |
//! | Peer unresolvable or without inbound address | `PeerResolution` |
//! | Peer without a usable public key | `Encryption` |
//! | Wrong key, tampering, bad encoding on open | `Decryption` |

mod assembler;
mod envelope;

pub use assembler::{
    MessageEnvelopeAssembler, META_KEY_FINGERPRINT, META_KEY_PUBLIC, META_KEY_WRAP,
    META_MESSAGE_ID, META_RECIPIENT, META_SENDER, META_SENT_AT,
};
pub use envelope::{Correlation, Envelope, InboundMessage, OutboundEnvelope, OutboundMessage};
