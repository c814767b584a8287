//! # Cryptography Module
//!
//! Key loading and hybrid envelope encryption.
//!
//! ## Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    CRYPTOGRAPHIC ARCHITECTURE                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────┐        ┌─────────────────────────┐        │
//! │  │  keys                   │        │  encryption             │        │
//! │  │                         │        │                         │        │
//! │  │  PEM / raw base64 DER   │───────►│  EnvelopeCipher         │        │
//! │  │       ↓                 │        │  • AES-256-GCM payload  │        │
//! │  │  PublicKeyMaterial      │        │  • RSA key wrap         │        │
//! │  │  PrivateKeyMaterial     │        │    (PKCS#1 v1.5 / OAEP) │        │
//! │  └─────────────────────────┘        └─────────────────────────┘        │
//! │                                                                         │
//! │  Peer public keys are parsed once when a directory record is fetched.  │
//! │  The local private key is loaded once at startup.                      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Properties
//!
//! | Property | Mechanism |
//! |----------|-----------|
//! | Confidentiality | AES-256-GCM under a fresh key per message |
//! | Integrity | GCM tag, any modification fails decryption |
//! | Key hygiene | Symmetric keys zeroized on drop |
//! | No key reuse | Fresh key and nonce from the OS RNG per envelope |

mod encryption;
mod keys;

pub use encryption::{EnvelopeCipher, KeyWrapScheme, SealedPayload, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
pub use keys::{
    load_private_key, load_private_key_file, load_public_key, PrivateKeyMaterial,
    PublicKeyMaterial,
};

#[cfg(test)]
pub(crate) use keys::test_keys;
