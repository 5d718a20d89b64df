//! Storage abstraction for relay state.
//!
//! Every method touches a single key and is atomic with respect to other
//! calls on the same key. Take/expire operations return whether they removed
//! anything so racing callers can tell who won.

use {
    async_trait::async_trait,
    ustoz_common::{QuestionId, RequesterId, RequesterProfile, ResponderId},
};

use crate::model::{Question, RateGate, RequesterSession, ResponderClaim};

/// Outcome of [`RelayStore::try_stamp_rate_gate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateStamp {
    /// The gate was open and now carries the new timestamp.
    Stamped,
    /// The gate is still closed; nothing was written.
    Blocked { last_sent_at: u64 },
}

#[async_trait]
pub trait RelayStore: Send + Sync {
    // ---- questions ----
    /// Allocate the next question id. Strictly increasing for the store's lifetime.
    async fn next_question_id(&self) -> anyhow::Result<QuestionId>;
    async fn put_question(&self, question: &Question) -> anyhow::Result<()>;
    async fn get_question(&self, id: QuestionId) -> anyhow::Result<Option<Question>>;
    /// Set `answered = true`. Returns false if the question is gone.
    async fn mark_answered(&self, id: QuestionId) -> anyhow::Result<bool>;
    /// Record the most recent claimer. Returns false if the question is gone.
    async fn note_claim(&self, id: QuestionId, responder: ResponderId) -> anyhow::Result<bool>;
    async fn remove_question(&self, id: QuestionId) -> anyhow::Result<bool>;
    /// Remove the question if it was created before `cutoff`.
    async fn expire_question(&self, id: QuestionId, cutoff: u64) -> anyhow::Result<bool>;
    async fn list_questions(&self) -> anyhow::Result<Vec<Question>>;

    // ---- requester sessions ----
    async fn put_session(&self, session: &RequesterSession) -> anyhow::Result<()>;
    async fn get_session(&self, id: RequesterId) -> anyhow::Result<Option<RequesterSession>>;
    /// Remove and return the session.
    async fn take_session(&self, id: RequesterId) -> anyhow::Result<Option<RequesterSession>>;
    async fn expire_session(&self, id: RequesterId, cutoff: u64) -> anyhow::Result<bool>;
    async fn list_sessions(&self) -> anyhow::Result<Vec<RequesterSession>>;

    // ---- responder claims ----
    async fn put_claim(&self, claim: &ResponderClaim) -> anyhow::Result<()>;
    async fn get_claim(&self, id: ResponderId) -> anyhow::Result<Option<ResponderClaim>>;
    /// Remove and return the claim; with `expected`, only if it targets that question.
    async fn take_claim(
        &self,
        id: ResponderId,
        expected: Option<QuestionId>,
    ) -> anyhow::Result<Option<ResponderClaim>>;
    async fn expire_claim(&self, id: ResponderId, cutoff: u64) -> anyhow::Result<bool>;
    async fn list_claims(&self) -> anyhow::Result<Vec<ResponderClaim>>;

    // ---- rate gates ----
    async fn get_rate_gate(&self, id: RequesterId) -> anyhow::Result<Option<RateGate>>;
    /// Stamp `now` if at least `window_ms` passed since the last stamp.
    async fn try_stamp_rate_gate(
        &self,
        id: RequesterId,
        now: u64,
        window_ms: u64,
    ) -> anyhow::Result<RateStamp>;
    async fn expire_rate_gate(&self, id: RequesterId, cutoff: u64) -> anyhow::Result<bool>;
    async fn list_rate_gates(&self) -> anyhow::Result<Vec<RateGate>>;

    // ---- requester profiles ----
    async fn put_profile(&self, profile: &RequesterProfile) -> anyhow::Result<()>;
    async fn list_profiles(&self) -> anyhow::Result<Vec<RequesterProfile>>;

    // ---- mute list ----
    /// Returns true if the requester was not muted before.
    async fn mute(&self, id: RequesterId) -> anyhow::Result<bool>;
    async fn is_muted(&self, id: RequesterId) -> anyhow::Result<bool>;
}
