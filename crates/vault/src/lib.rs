//! At-rest encryption for relayed text.
//!
//! Every string the relay keeps in its store is sealed into a self-describing
//! [`Envelope`] (`nonce:tag:ciphertext`, hex encoded) with XChaCha20-Poly1305.
//! The key is loaded once at startup; a missing or malformed key is fatal.

pub mod codec;
pub mod envelope;
pub mod error;

pub use {
    codec::{Codec, DECRYPTION_PLACEHOLDER},
    envelope::Envelope,
    error::CryptoError,
};
