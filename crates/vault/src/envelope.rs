use {
    serde::{Deserialize, Serialize},
    std::fmt,
};

use crate::error::CryptoError;

pub(crate) const NONCE_LEN: usize = 24;
pub(crate) const TAG_LEN: usize = 16;

/// Sealed text as stored: `hex(nonce):hex(tag):hex(ciphertext)`.
///
/// Decryption needs nothing but the envelope and the key, so envelopes can be
/// opened in any order and by any process holding the key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Envelope(String);

/// Raw parts of a parsed envelope.
pub(crate) struct EnvelopeParts {
    pub nonce: Vec<u8>,
    pub tag: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    pub(crate) fn assemble(nonce: &[u8], tag: &[u8], ciphertext: &[u8]) -> Self {
        Self(format!(
            "{}:{}:{}",
            hex::encode(nonce),
            hex::encode(tag),
            hex::encode(ciphertext)
        ))
    }

    /// Wrap an already-encoded envelope string (e.g. read back from storage).
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn parts(&self) -> Result<EnvelopeParts, CryptoError> {
        let mut split = self.0.split(':');
        let (Some(nonce), Some(tag), Some(ciphertext), None) =
            (split.next(), split.next(), split.next(), split.next())
        else {
            return Err(CryptoError::Decryption {
                reason: "malformed envelope",
            });
        };

        let decode = |part: &str| {
            hex::decode(part).map_err(|_| CryptoError::Decryption {
                reason: "envelope is not hex",
            })
        };
        let parts = EnvelopeParts {
            nonce: decode(nonce)?,
            tag: decode(tag)?,
            ciphertext: decode(ciphertext)?,
        };

        if parts.nonce.len() != NONCE_LEN {
            return Err(CryptoError::Decryption {
                reason: "bad nonce length",
            });
        }
        if parts.tag.len() != TAG_LEN {
            return Err(CryptoError::Decryption {
                reason: "bad tag length",
            });
        }
        Ok(parts)
    }
}

// Ciphertext is not secret, but keep log lines short.
impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Envelope({} bytes)", self.0.len())
    }
}
