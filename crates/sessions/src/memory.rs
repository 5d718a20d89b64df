use std::sync::atomic::{AtomicU64, Ordering};

use {
    async_trait::async_trait,
    dashmap::{DashMap, DashSet, mapref::entry::Entry},
    ustoz_common::{QuestionId, RequesterId, RequesterProfile, ResponderId},
};

use crate::{
    model::{Question, RateGate, RequesterSession, ResponderClaim},
    store::{RateStamp, RelayStore},
};

/// In-process store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    question_seq: AtomicU64,
    questions: DashMap<QuestionId, Question>,
    sessions: DashMap<RequesterId, RequesterSession>,
    claims: DashMap<ResponderId, ResponderClaim>,
    rate_gates: DashMap<RequesterId, RateGate>,
    profiles: DashMap<RequesterId, RequesterProfile>,
    muted: DashSet<RequesterId>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RelayStore for MemoryStore {
    async fn next_question_id(&self) -> anyhow::Result<QuestionId> {
        Ok(QuestionId(self.question_seq.fetch_add(1, Ordering::SeqCst) + 1))
    }

    async fn put_question(&self, question: &Question) -> anyhow::Result<()> {
        self.questions.insert(question.id, question.clone());
        Ok(())
    }

    async fn get_question(&self, id: QuestionId) -> anyhow::Result<Option<Question>> {
        Ok(self.questions.get(&id).map(|q| q.clone()))
    }

    async fn mark_answered(&self, id: QuestionId) -> anyhow::Result<bool> {
        Ok(self
            .questions
            .get_mut(&id)
            .map(|mut q| q.answered = true)
            .is_some())
    }

    async fn note_claim(&self, id: QuestionId, responder: ResponderId) -> anyhow::Result<bool> {
        Ok(self
            .questions
            .get_mut(&id)
            .map(|mut q| q.claimed_by = Some(responder))
            .is_some())
    }

    async fn remove_question(&self, id: QuestionId) -> anyhow::Result<bool> {
        Ok(self.questions.remove(&id).is_some())
    }

    async fn expire_question(&self, id: QuestionId, cutoff: u64) -> anyhow::Result<bool> {
        Ok(self
            .questions
            .remove_if(&id, |_, q| q.created_at < cutoff)
            .is_some())
    }

    async fn list_questions(&self) -> anyhow::Result<Vec<Question>> {
        Ok(self.questions.iter().map(|q| q.value().clone()).collect())
    }

    async fn put_session(&self, session: &RequesterSession) -> anyhow::Result<()> {
        self.sessions.insert(session.requester_id, session.clone());
        Ok(())
    }

    async fn get_session(&self, id: RequesterId) -> anyhow::Result<Option<RequesterSession>> {
        Ok(self.sessions.get(&id).map(|s| s.clone()))
    }

    async fn take_session(&self, id: RequesterId) -> anyhow::Result<Option<RequesterSession>> {
        Ok(self.sessions.remove(&id).map(|(_, s)| s))
    }

    async fn expire_session(&self, id: RequesterId, cutoff: u64) -> anyhow::Result<bool> {
        Ok(self
            .sessions
            .remove_if(&id, |_, s| s.entered_at < cutoff)
            .is_some())
    }

    async fn list_sessions(&self) -> anyhow::Result<Vec<RequesterSession>> {
        Ok(self.sessions.iter().map(|s| s.value().clone()).collect())
    }

    async fn put_claim(&self, claim: &ResponderClaim) -> anyhow::Result<()> {
        self.claims.insert(claim.responder_id, claim.clone());
        Ok(())
    }

    async fn get_claim(&self, id: ResponderId) -> anyhow::Result<Option<ResponderClaim>> {
        Ok(self.claims.get(&id).map(|c| c.clone()))
    }

    async fn take_claim(
        &self,
        id: ResponderId,
        expected: Option<QuestionId>,
    ) -> anyhow::Result<Option<ResponderClaim>> {
        Ok(self
            .claims
            .remove_if(&id, |_, c| expected.is_none_or(|q| c.question_id == q))
            .map(|(_, c)| c))
    }

    async fn expire_claim(&self, id: ResponderId, cutoff: u64) -> anyhow::Result<bool> {
        Ok(self
            .claims
            .remove_if(&id, |_, c| c.claimed_at < cutoff)
            .is_some())
    }

    async fn list_claims(&self) -> anyhow::Result<Vec<ResponderClaim>> {
        Ok(self.claims.iter().map(|c| c.value().clone()).collect())
    }

    async fn get_rate_gate(&self, id: RequesterId) -> anyhow::Result<Option<RateGate>> {
        Ok(self.rate_gates.get(&id).map(|g| *g))
    }

    async fn try_stamp_rate_gate(
        &self,
        id: RequesterId,
        now: u64,
        window_ms: u64,
    ) -> anyhow::Result<RateStamp> {
        let fresh = RateGate {
            requester_id: id,
            last_sent_at: now,
        };
        Ok(match self.rate_gates.entry(id) {
            Entry::Vacant(slot) => {
                slot.insert(fresh);
                RateStamp::Stamped
            },
            Entry::Occupied(mut slot) => {
                let last_sent_at = slot.get().last_sent_at;
                if now.saturating_sub(last_sent_at) < window_ms {
                    RateStamp::Blocked { last_sent_at }
                } else {
                    slot.insert(fresh);
                    RateStamp::Stamped
                }
            },
        })
    }

    async fn expire_rate_gate(&self, id: RequesterId, cutoff: u64) -> anyhow::Result<bool> {
        Ok(self
            .rate_gates
            .remove_if(&id, |_, g| g.last_sent_at < cutoff)
            .is_some())
    }

    async fn list_rate_gates(&self) -> anyhow::Result<Vec<RateGate>> {
        Ok(self.rate_gates.iter().map(|g| *g.value()).collect())
    }

    async fn put_profile(&self, profile: &RequesterProfile) -> anyhow::Result<()> {
        self.profiles.insert(profile.id, profile.clone());
        Ok(())
    }

    async fn list_profiles(&self) -> anyhow::Result<Vec<RequesterProfile>> {
        Ok(self.profiles.iter().map(|p| p.value().clone()).collect())
    }

    async fn mute(&self, id: RequesterId) -> anyhow::Result<bool> {
        Ok(self.muted.insert(id))
    }

    async fn is_muted(&self, id: RequesterId) -> anyhow::Result<bool> {
        Ok(self.muted.contains(&id))
    }
}
