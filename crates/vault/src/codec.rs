use std::fmt;

use {
    chacha20poly1305::{
        KeyInit, Tag, XChaCha20Poly1305, XNonce,
        aead::{AeadCore, AeadInPlace, OsRng},
    },
    secrecy::{ExposeSecret, SecretString},
    tracing::warn,
    zeroize::Zeroizing,
};

use crate::{envelope::Envelope, error::CryptoError};

/// Shown in place of text whose envelope fails to open.
pub const DECRYPTION_PLACEHOLDER: &str = "[message could not be decrypted]";

const KEY_LEN: usize = 32;

/// Bound into every envelope so ciphertext from other tools never opens here.
const ENVELOPE_AAD: &[u8] = b"ustoz/v1";

/// Symmetric codec holding the process-wide key.
pub struct Codec {
    cipher: XChaCha20Poly1305,
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec").finish_non_exhaustive()
    }
}

impl Codec {
    /// Build a codec from a 64-character hex key (32 bytes).
    pub fn from_hex_key(key: &SecretString) -> Result<Self, CryptoError> {
        let raw = key.expose_secret().trim();
        if raw.is_empty() {
            return Err(CryptoError::InvalidKey {
                reason: "key is empty".into(),
            });
        }
        let bytes = Zeroizing::new(hex::decode(raw).map_err(|e| CryptoError::InvalidKey {
            reason: format!("key is not hex: {e}"),
        })?);
        Self::from_key_bytes(&bytes)
    }

    pub fn from_key_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != KEY_LEN {
            return Err(CryptoError::InvalidKey {
                reason: format!("expected {KEY_LEN} bytes, got {}", bytes.len()),
            });
        }
        let cipher =
            XChaCha20Poly1305::new_from_slice(bytes).map_err(|_| CryptoError::InvalidKey {
                reason: "rejected by cipher".into(),
            })?;
        Ok(Self { cipher })
    }

    /// Fresh random key, hex encoded, suitable for `ENCRYPTION_KEY`.
    pub fn generate_hex_key() -> String {
        let key = XChaCha20Poly1305::generate_key(&mut OsRng);
        hex::encode(key)
    }

    /// Encrypt `plaintext` under a fresh random nonce.
    pub fn seal(&self, plaintext: &str) -> Result<Envelope, CryptoError> {
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
        let mut buffer = plaintext.as_bytes().to_vec();
        let tag = self
            .cipher
            .encrypt_in_place_detached(&nonce, ENVELOPE_AAD, &mut buffer)
            .map_err(|_| CryptoError::Encryption)?;
        Ok(Envelope::assemble(&nonce, &tag, &buffer))
    }

    pub fn open(&self, envelope: &Envelope) -> Result<String, CryptoError> {
        let parts = envelope.parts()?;
        let nonce = XNonce::from_slice(&parts.nonce);
        let tag = Tag::from_slice(&parts.tag);
        let mut buffer = parts.ciphertext;
        self.cipher
            .decrypt_in_place_detached(nonce, ENVELOPE_AAD, &mut buffer, tag)
            .map_err(|_| CryptoError::Decryption {
                reason: "authentication failed",
            })?;
        String::from_utf8(buffer).map_err(|_| CryptoError::Decryption {
            reason: "plaintext is not utf-8",
        })
    }

    /// Open an envelope for display; failures degrade to [`DECRYPTION_PLACEHOLDER`].
    pub fn open_or_placeholder(&self, envelope: &Envelope) -> String {
        match self.open(envelope) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, envelope = ?envelope, "failed to open stored text");
                DECRYPTION_PLACEHOLDER.to_string()
            },
        }
    }
}
