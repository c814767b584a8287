//! # Envelope Cipher
//!
//! Hybrid encryption of cross-service payloads: a fresh AES-256-GCM key per
//! message, wrapped under the recipient's RSA public key.
//!
//! ## Seal / Open Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        HYBRID SEAL                                      │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Step 1: Fresh symmetric key (per message)                             │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  32 random bytes from the OS RNG                             │       │
//! │  │  (held in Zeroizing<..>, wiped on drop)                      │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! │  Step 2: Encrypt payload                                               │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  AES-256-GCM(key, random 96-bit nonce, plaintext)            │       │
//! │  │           ↓                                                  │       │
//! │  │  nonce(12) || ciphertext || tag(16)  →  base64               │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! │  Step 3: Wrap key                                                      │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  RSA(recipient public key, key wrap scheme, key)             │       │
//! │  │           ↓                                                  │       │
//! │  │  wrapped key  →  base64                                      │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! │  Output: SealedPayload { encryptedPayload, encryptedKey }              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Opening reverses the steps with the local private key. Every failure on
//! the open path (bad base64, wrong key, wrong padding, truncated or
//! tampered payload) is a single `Decryption` error. Nothing is retried and
//! no partial plaintext is ever returned.
//!
//! ## Key Wrap Schemes
//!
//! | Scheme | Wire name | Notes |
//! |--------|-----------|-------|
//! | PKCS#1 v1.5 | `pkcs1v15` | Default |
//! | OAEP (SHA-256) | `oaep-sha256` | Opt-in, both sides must agree |
//!
//! The scheme only covers the wrapped key. Payloads are always AES-256-GCM
//! framed as above, so only peers that open this framing can read an
//! envelope, whichever scheme wrapped its key.

use std::fmt;
use std::str::FromStr;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce as AesNonce,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::{Oaep, Pkcs1v15Encrypt};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use super::keys::{PrivateKeyMaterial, PublicKeyMaterial};
use crate::error::{Error, Result};

/// Size of the AES-GCM nonce in bytes (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Size of the AES-GCM authentication tag in bytes (128 bits)
pub const TAG_SIZE: usize = 16;

/// Size of the per-message symmetric key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// How the per-message symmetric key is wrapped under RSA
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyWrapScheme {
    /// RSAES-PKCS1-v1_5
    #[default]
    Pkcs1v15,
    /// RSAES-OAEP with SHA-256 and MGF1-SHA-256
    OaepSha256,
}

impl KeyWrapScheme {
    /// Stable wire/config name
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyWrapScheme::Pkcs1v15 => "pkcs1v15",
            KeyWrapScheme::OaepSha256 => "oaep-sha256",
        }
    }
}

impl fmt::Display for KeyWrapScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyWrapScheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pkcs1v15" | "pkcs1" => Ok(KeyWrapScheme::Pkcs1v15),
            "oaep-sha256" | "oaep" => Ok(KeyWrapScheme::OaepSha256),
            other => Err(Error::Argument(format!(
                "Unknown key wrap scheme '{}' (expected pkcs1v15 or oaep-sha256)",
                other
            ))),
        }
    }
}

/// Encrypted payload and wrapped key, always produced and carried together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedPayload {
    /// base64(nonce || ciphertext || tag)
    #[serde(rename = "encryptedPayload")]
    ciphertext: String,
    /// base64(RSA-wrapped AES key)
    #[serde(rename = "encryptedKey")]
    wrapped_key: String,
}

impl SealedPayload {
    /// Rebuild from the two base64 strings received off the wire
    pub fn from_parts(ciphertext: impl Into<String>, wrapped_key: impl Into<String>) -> Self {
        Self {
            ciphertext: ciphertext.into(),
            wrapped_key: wrapped_key.into(),
        }
    }

    pub fn ciphertext(&self) -> &str {
        &self.ciphertext
    }

    pub fn wrapped_key(&self) -> &str {
        &self.wrapped_key
    }
}

/// Hybrid RSA + AES-256-GCM cipher
///
/// Stateless apart from the configured wrap scheme; `Copy` and safe to use
/// from any number of tasks at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnvelopeCipher {
    scheme: KeyWrapScheme,
}

impl EnvelopeCipher {
    /// Create a cipher using the given key wrap scheme
    pub fn new(scheme: KeyWrapScheme) -> Self {
        Self { scheme }
    }

    /// The configured key wrap scheme
    pub fn scheme(&self) -> KeyWrapScheme {
        self.scheme
    }

    /// Encrypt `plaintext` for the holder of `recipient`'s private key
    ///
    /// ## Errors
    ///
    /// Returns `Encryption` if the RSA wrap fails (for example when the
    /// modulus is too small for the chosen padding).
    pub fn encrypt_hybrid(
        &self,
        plaintext: &[u8],
        recipient: &PublicKeyMaterial,
    ) -> Result<SealedPayload> {
        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        OsRng.fill_bytes(&mut key[..]);

        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);

        let cipher = Aes256Gcm::new_from_slice(&key[..])
            .map_err(|e| Error::Encryption(format!("Invalid key: {}", e)))?;
        let ciphertext = cipher
            .encrypt(AesNonce::from_slice(&nonce), plaintext)
            .map_err(|e| Error::Encryption(format!("Payload encryption failed: {}", e)))?;

        let mut framed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        framed.extend_from_slice(&nonce);
        framed.extend_from_slice(&ciphertext);

        let wrapped = self.wrap_key(&key[..], recipient)?;

        Ok(SealedPayload {
            ciphertext: STANDARD.encode(framed),
            wrapped_key: STANDARD.encode(wrapped),
        })
    }

    /// Decrypt a payload addressed to `own_key`
    ///
    /// ## Errors
    ///
    /// Returns `Decryption` on any base64, padding, length or
    /// authentication mismatch.
    pub fn decrypt_hybrid(
        &self,
        ciphertext: &str,
        wrapped_key: &str,
        own_key: &PrivateKeyMaterial,
    ) -> Result<Vec<u8>> {
        let wrapped = STANDARD
            .decode(wrapped_key.trim())
            .map_err(|e| Error::Decryption(format!("Wrapped key is not base64: {}", e)))?;
        let framed = STANDARD
            .decode(ciphertext.trim())
            .map_err(|e| Error::Decryption(format!("Payload is not base64: {}", e)))?;

        let key = self.unwrap_key(&wrapped, own_key)?;
        if key.len() != KEY_SIZE {
            return Err(Error::Decryption(format!(
                "Unwrapped key has {} bytes, expected {}",
                key.len(),
                KEY_SIZE
            )));
        }

        if framed.len() < NONCE_SIZE + TAG_SIZE {
            return Err(Error::Decryption(format!(
                "Payload too short: {} bytes",
                framed.len()
            )));
        }
        let (nonce, body) = framed.split_at(NONCE_SIZE);

        let cipher = Aes256Gcm::new_from_slice(&key[..])
            .map_err(|e| Error::Decryption(format!("Invalid key: {}", e)))?;
        cipher
            .decrypt(AesNonce::from_slice(nonce), body)
            .map_err(|_| Error::Decryption("Authentication tag mismatch".into()))
    }

    /// Decrypt a [`SealedPayload`]
    pub fn open(&self, sealed: &SealedPayload, own_key: &PrivateKeyMaterial) -> Result<Vec<u8>> {
        self.decrypt_hybrid(&sealed.ciphertext, &sealed.wrapped_key, own_key)
    }

    fn wrap_key(&self, key: &[u8], recipient: &PublicKeyMaterial) -> Result<Vec<u8>> {
        let rsa = recipient.as_rsa();
        let wrapped = match self.scheme {
            KeyWrapScheme::Pkcs1v15 => rsa.encrypt(&mut OsRng, Pkcs1v15Encrypt, key),
            KeyWrapScheme::OaepSha256 => rsa.encrypt(&mut OsRng, Oaep::new::<Sha256>(), key),
        };
        wrapped.map_err(|e| Error::Encryption(format!("Key wrap ({}) failed: {}", self.scheme, e)))
    }

    fn unwrap_key(&self, wrapped: &[u8], own_key: &PrivateKeyMaterial) -> Result<Zeroizing<Vec<u8>>> {
        let rsa = own_key.as_rsa();
        let key = match self.scheme {
            KeyWrapScheme::Pkcs1v15 => rsa.decrypt(Pkcs1v15Encrypt, wrapped),
            KeyWrapScheme::OaepSha256 => rsa.decrypt(Oaep::new::<Sha256>(), wrapped),
        };
        key.map(Zeroizing::new)
            .map_err(|_| Error::Decryption(format!("Key unwrap ({}) failed", self.scheme)))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::test_keys::{private, public, OTHER, RECIPIENT};

    fn tamper(b64: &str, index: usize) -> String {
        let mut bytes = STANDARD.decode(b64).unwrap();
        bytes[index] ^= 0x01;
        STANDARD.encode(bytes)
    }

    #[test]
    fn test_hybrid_round_trip() {
        let cipher = EnvelopeCipher::default();
        let plaintext = b"<FlightMessage>QR1234 SFO-LHR</FlightMessage>";

        let sealed = cipher.encrypt_hybrid(plaintext, &public(&RECIPIENT)).unwrap();
        let decrypted = cipher.open(&sealed, &private(&RECIPIENT)).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_empty_plaintext() {
        let cipher = EnvelopeCipher::default();
        let sealed = cipher.encrypt_hybrid(b"", &public(&RECIPIENT)).unwrap();

        // nonce + tag only
        let framed = STANDARD.decode(sealed.ciphertext()).unwrap();
        assert_eq!(framed.len(), NONCE_SIZE + TAG_SIZE);

        assert!(cipher.open(&sealed, &private(&RECIPIENT)).unwrap().is_empty());
    }

    #[test]
    fn test_same_input_produces_different_wrapped_keys() {
        let cipher = EnvelopeCipher::default();
        let a = cipher.encrypt_hybrid(b"same", &public(&RECIPIENT)).unwrap();
        let b = cipher.encrypt_hybrid(b"same", &public(&RECIPIENT)).unwrap();

        assert_ne!(a.wrapped_key(), b.wrapped_key());
        assert_ne!(a.ciphertext(), b.ciphertext());
    }

    #[test]
    fn test_mismatched_private_key_fails() {
        let cipher = EnvelopeCipher::default();
        let sealed = cipher.encrypt_hybrid(b"secret", &public(&RECIPIENT)).unwrap();

        let err = cipher.open(&sealed, &private(&OTHER)).unwrap_err();
        assert!(matches!(err, Error::Decryption(_)));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let cipher = EnvelopeCipher::default();
        let sealed = cipher.encrypt_hybrid(b"secret", &public(&RECIPIENT)).unwrap();

        let tampered = tamper(sealed.ciphertext(), NONCE_SIZE);
        let err = cipher
            .decrypt_hybrid(&tampered, sealed.wrapped_key(), &private(&RECIPIENT))
            .unwrap_err();
        assert!(matches!(err, Error::Decryption(_)));
    }

    #[test]
    fn test_tampered_wrapped_key_fails() {
        let cipher = EnvelopeCipher::default();
        let sealed = cipher.encrypt_hybrid(b"secret", &public(&RECIPIENT)).unwrap();

        let tampered = tamper(sealed.wrapped_key(), 5);
        let err = cipher
            .decrypt_hybrid(sealed.ciphertext(), &tampered, &private(&RECIPIENT))
            .unwrap_err();
        assert!(matches!(err, Error::Decryption(_)));
    }

    #[test]
    fn test_truncated_payload_fails() {
        let cipher = EnvelopeCipher::default();
        let sealed = cipher.encrypt_hybrid(b"secret", &public(&RECIPIENT)).unwrap();

        let short = STANDARD.encode([0u8; NONCE_SIZE + TAG_SIZE - 1]);
        let err = cipher
            .decrypt_hybrid(&short, sealed.wrapped_key(), &private(&RECIPIENT))
            .unwrap_err();
        assert!(matches!(err, Error::Decryption(_)));
    }

    #[test]
    fn test_invalid_base64_fails() {
        let cipher = EnvelopeCipher::default();
        let sealed = cipher.encrypt_hybrid(b"secret", &public(&RECIPIENT)).unwrap();

        let err = cipher
            .decrypt_hybrid("***", sealed.wrapped_key(), &private(&RECIPIENT))
            .unwrap_err();
        assert!(matches!(err, Error::Decryption(_)));

        let err = cipher
            .decrypt_hybrid(sealed.ciphertext(), "***", &private(&RECIPIENT))
            .unwrap_err();
        assert!(matches!(err, Error::Decryption(_)));
    }

    #[test]
    fn test_oaep_round_trip() {
        let cipher = EnvelopeCipher::new(KeyWrapScheme::OaepSha256);
        let sealed = cipher.encrypt_hybrid(b"oaep", &public(&RECIPIENT)).unwrap();

        assert_eq!(cipher.open(&sealed, &private(&RECIPIENT)).unwrap(), b"oaep");
    }

    #[test]
    fn test_scheme_mismatch_fails() {
        let oaep = EnvelopeCipher::new(KeyWrapScheme::OaepSha256);
        let pkcs1 = EnvelopeCipher::new(KeyWrapScheme::Pkcs1v15);

        let sealed = oaep.encrypt_hybrid(b"oaep", &public(&RECIPIENT)).unwrap();
        let err = pkcs1.open(&sealed, &private(&RECIPIENT)).unwrap_err();
        assert!(matches!(err, Error::Decryption(_)));
    }

    #[test]
    fn test_scheme_parse() {
        assert_eq!("pkcs1v15".parse::<KeyWrapScheme>().unwrap(), KeyWrapScheme::Pkcs1v15);
        assert_eq!(
            " OAEP-SHA256 ".parse::<KeyWrapScheme>().unwrap(),
            KeyWrapScheme::OaepSha256
        );
        assert!(matches!(
            "rsa-kem".parse::<KeyWrapScheme>().unwrap_err(),
            Error::Argument(_)
        ));
        assert_eq!(KeyWrapScheme::default().to_string(), "pkcs1v15");
    }

    #[test]
    fn test_sealed_payload_wire_names() {
        let sealed = SealedPayload::from_parts("cGF5bG9hZA==", "a2V5");
        let json = serde_json::to_value(&sealed).unwrap();

        assert_eq!(json["encryptedPayload"], "cGF5bG9hZA==");
        assert_eq!(json["encryptedKey"], "a2V5");
    }
}
