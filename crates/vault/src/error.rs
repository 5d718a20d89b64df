#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// The configured key is missing, not hex, or not 32 bytes long.
    #[error("invalid encryption key: {reason}")]
    InvalidKey { reason: String },

    #[error("encryption failed")]
    Encryption,

    /// Tampered, truncated, or wrong-key input.
    #[error("decryption failed: {reason}")]
    Decryption { reason: &'static str },
}
