use ustoz_common::{QuestionId, RequesterId, ResponderId};

/// Record family, also the key prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Question,
    Session,
    Claim,
    RateGate,
    Requester,
    Muted,
}

impl Family {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Question => "question",
            Self::Session => "session",
            Self::Claim => "claim",
            Self::RateGate => "rategate",
            Self::Requester => "requester",
            Self::Muted => "muted",
        }
    }
}

/// Storage key: `question:{id}`, `session:{requesterId}`, `claim:{responderId}`,
/// `rategate:{requesterId}`, `requester:{requesterId}` or `muted:{requesterId}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreKey(pub String);

impl StoreKey {
    pub fn question(id: QuestionId) -> Self {
        Self(format!("{}:{id}", Family::Question.as_str()))
    }

    pub fn session(id: RequesterId) -> Self {
        Self(format!("{}:{id}", Family::Session.as_str()))
    }

    pub fn claim(id: ResponderId) -> Self {
        Self(format!("{}:{id}", Family::Claim.as_str()))
    }

    pub fn rate_gate(id: RequesterId) -> Self {
        Self(format!("{}:{id}", Family::RateGate.as_str()))
    }

    pub fn requester(id: RequesterId) -> Self {
        Self(format!("{}:{id}", Family::Requester.as_str()))
    }

    pub fn muted(id: RequesterId) -> Self {
        Self(format!("{}:{id}", Family::Muted.as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
