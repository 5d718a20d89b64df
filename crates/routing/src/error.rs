use ustoz_common::QuestionId;

/// Typed outcome of a rejected router operation.
///
/// Everything except [`RouterError::Store`] is an expected protocol answer
/// that the caller turns into a user-facing notice.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("rate limited, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("no active question session")]
    NoActiveSession,

    #[error("responders cannot ask questions")]
    AlreadyResponder,

    #[error("sender is not a configured responder")]
    NotAResponder,

    #[error("question {0} not found")]
    QuestionNotFound(QuestionId),

    #[error("no active claim")]
    NoActiveClaim,

    #[error("content could not be sealed: {0}")]
    Crypto(#[from] ustoz_vault::CryptoError),

    #[error("store failure: {0:#}")]
    Store(#[from] anyhow::Error),
}

pub type Result<T, E = RouterError> = std::result::Result<T, E>;
