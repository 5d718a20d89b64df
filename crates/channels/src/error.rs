/// Per-recipient send failure reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The recipient blocked the bot, left, or no longer exists.
    #[error("recipient {recipient} is unreachable")]
    Blocked { recipient: i64 },

    /// The platform refused the request (bad chat id, bad file, ...).
    #[error("request to {recipient} rejected: {reason}")]
    Rejected { recipient: i64, reason: String },

    /// Network or platform failure unrelated to the request itself.
    #[error("transport failure sending to {recipient}: {reason}")]
    Transport { recipient: i64, reason: String },
}

impl DeliveryError {
    pub fn recipient(&self) -> i64 {
        match self {
            Self::Blocked { recipient }
            | Self::Rejected { recipient, .. }
            | Self::Transport { recipient, .. } => *recipient,
        }
    }
}
