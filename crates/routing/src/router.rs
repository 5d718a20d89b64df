//! The question/claim state machine.
//!
//! Requesters move `Idle -> AwaitingQuestion -> Idle`; the awaiting phase is a
//! [`RequesterSession`] record and idle is its absence. Responders hold at
//! most one [`ResponderClaim`] each. Claims are not exclusive across
//! responders: two responders may claim and answer the same question, and
//! both answers reach the requester.
//!
//! Every step is a short sequence of single-key store operations. The router
//! never performs transport I/O; it returns snapshots for the caller to send.

use std::{collections::HashSet, sync::Arc, time::Duration};

use {
    tokio::sync::broadcast,
    ustoz_common::{Content, QuestionId, RequesterId, RequesterProfile, ResponderId},
    ustoz_sessions::{Question, RelayStore, RequesterSession, ResponderClaim, SealedContent},
    ustoz_vault::Codec,
};

use crate::{
    clock::{self, Clock},
    error::{Result, RouterError},
    events::RelayEvent,
    observe::QuestionView,
    rate_limit::{Admission, RateLimiter},
};

const EVENT_CAPACITY: usize = 256;

/// Timing and retention knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterSettings {
    /// Minimum spacing between two questions from one requester.
    pub cooldown: Duration,
    /// How long an armed question prompt stays valid.
    pub session_ttl: Duration,
    /// How long a responder claim stays valid.
    pub claim_ttl: Duration,
    /// Questions older than this are dropped.
    pub question_ttl: Duration,
    /// Upper bound on retained questions; oldest go first.
    pub max_questions: usize,
    pub sweep_interval: Duration,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(30),
            session_ttl: Duration::from_secs(600),
            claim_ttl: Duration::from_secs(600),
            question_ttl: Duration::from_secs(86_400),
            max_questions: 1_000,
            sweep_interval: Duration::from_secs(600),
        }
    }
}

/// A question record together with its decrypted content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedQuestion {
    pub question: Question,
    pub content: Content,
}

impl OpenedQuestion {
    pub fn id(&self) -> QuestionId {
        self.question.id
    }

    pub fn requester_id(&self) -> RequesterId {
        self.question.requester_id
    }

    /// `Name (@handle)` of the asking requester.
    pub fn requester_label(&self) -> String {
        match &self.question.requester_handle {
            Some(handle) => format!("{} (@{handle})", self.question.requester_display_name),
            None => self.question.requester_display_name.clone(),
        }
    }
}

/// Result of a successful [`SessionRouter::submit_question`].
#[derive(Debug, Clone)]
pub struct SubmittedQuestion {
    pub question: OpenedQuestion,
    /// Every configured responder, in configuration order.
    pub fan_out: Vec<ResponderId>,
}

/// Result of a successful [`SessionRouter::submit_reply`].
#[derive(Debug, Clone)]
pub struct ReplyDelivery {
    pub requester_id: RequesterId,
    /// The question as it was when the responder claimed it.
    pub original: OpenedQuestion,
    pub reply: Content,
}

pub struct SessionRouter {
    pub(crate) store: Arc<dyn RelayStore>,
    codec: Arc<Codec>,
    responders: Vec<ResponderId>,
    responder_set: HashSet<ResponderId>,
    limiter: RateLimiter,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) settings: RouterSettings,
    events: broadcast::Sender<RelayEvent>,
}

impl SessionRouter {
    pub fn new(
        store: Arc<dyn RelayStore>,
        codec: Arc<Codec>,
        responders: impl IntoIterator<Item = ResponderId>,
        settings: RouterSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut responder_set = HashSet::new();
        let responders: Vec<_> = responders
            .into_iter()
            .filter(|id| responder_set.insert(*id))
            .collect();
        let limiter = RateLimiter::new(Arc::clone(&store), Arc::clone(&clock), settings.cooldown);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            codec,
            responders,
            responder_set,
            limiter,
            clock,
            settings,
            events,
        }
    }

    pub fn settings(&self) -> &RouterSettings {
        &self.settings
    }

    pub fn responders(&self) -> &[ResponderId] {
        &self.responders
    }

    pub fn is_responder(&self, id: ResponderId) -> bool {
        self.responder_set.contains(&id)
    }

    /// Live feed of committed state changes.
    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: RelayEvent) {
        // No receivers is fine: nobody is watching.
        let _ = self.events.send(event);
    }

    pub(crate) fn open(&self, question: Question) -> OpenedQuestion {
        let content = question.body.open(&self.codec);
        OpenedQuestion { question, content }
    }

    fn ensure_responder(&self, id: ResponderId) -> Result<()> {
        if self.is_responder(id) {
            Ok(())
        } else {
            Err(RouterError::NotAResponder)
        }
    }

    pub(crate) fn cutoff(&self, ttl: Duration) -> u64 {
        self.clock.now_ms().saturating_sub(clock::millis(ttl))
    }

    // ── Requester side ──────────────────────────────────────────────────────

    /// Record the latest identity of a requester.
    pub async fn touch_requester(
        &self,
        id: RequesterId,
        display_name: &str,
        handle: Option<&str>,
    ) -> Result<RequesterProfile> {
        let profile = RequesterProfile {
            id,
            display_name: display_name.to_string(),
            handle: handle.map(str::to_string),
            last_active_at: self.clock.now_ms(),
        };
        self.store.put_profile(&profile).await?;
        Ok(profile)
    }

    /// Arm the requester for their next message. Re-arming is allowed.
    pub async fn request_question_prompt(&self, id: RequesterId) -> Result<()> {
        if self.is_responder(ResponderId(id.0)) {
            return Err(RouterError::AlreadyResponder);
        }
        if let Admission::Limited { retry_after_secs } = self.limiter.check(id).await? {
            return Err(RouterError::RateLimited { retry_after_secs });
        }
        self.store
            .put_session(&RequesterSession {
                requester_id: id,
                entered_at: self.clock.now_ms(),
            })
            .await?;
        tracing::debug!(requester_id = %id, "question prompt armed");
        Ok(())
    }

    /// Disarm the prompt. Returns false if there was nothing to cancel.
    pub async fn cancel_question_prompt(&self, id: RequesterId) -> Result<bool> {
        Ok(self.store.take_session(id).await?.is_some())
    }

    /// Turn the requester's next message into a question.
    ///
    /// The session and the gate are both checked before the session is
    /// taken, so a refused submission keeps the prompt armed. Once taken,
    /// the session is never put back: losing the stamp to a racing
    /// submission leaves the requester idle, and a concurrent cancel cannot
    /// be undone.
    pub async fn submit_question(
        &self,
        requester: &RequesterProfile,
        content: Content,
    ) -> Result<SubmittedQuestion> {
        let id = requester.id;
        if self.is_responder(ResponderId(id.0)) {
            return Err(RouterError::AlreadyResponder);
        }
        if self.store.get_session(id).await?.is_none() {
            return Err(RouterError::NoActiveSession);
        }
        if let Admission::Limited { retry_after_secs } = self.limiter.check(id).await? {
            return Err(RouterError::RateLimited { retry_after_secs });
        }
        let session = self
            .store
            .take_session(id)
            .await?
            .ok_or(RouterError::NoActiveSession)?;
        if session.entered_at < self.cutoff(self.settings.session_ttl) {
            tracing::debug!(requester_id = %id, "question prompt expired");
            return Err(RouterError::NoActiveSession);
        }
        if let Admission::Limited { retry_after_secs } = self.limiter.acquire(id).await? {
            tracing::debug!(requester_id = %id, "rate gate closed while submitting");
            return Err(RouterError::RateLimited { retry_after_secs });
        }

        let now = self.clock.now_ms();
        let body = SealedContent::seal(&self.codec, &content)?;
        let question = Question {
            id: self.store.next_question_id().await?,
            requester_id: id,
            requester_display_name: requester.display_name.clone(),
            requester_handle: requester.handle.clone(),
            body,
            created_at: now,
            answered: false,
            claimed_by: None,
        };
        self.store
            .put_profile(&RequesterProfile {
                last_active_at: now,
                ..requester.clone()
            })
            .await?;
        self.store.put_question(&question).await?;
        self.enforce_history_cap().await?;

        tracing::info!(requester_id = %id, question_id = %question.id, "question created");
        let opened = OpenedQuestion { question, content };
        self.emit(RelayEvent::QuestionCreated(QuestionView::from(&opened)));
        Ok(SubmittedQuestion {
            question: opened,
            fan_out: self.responders.clone(),
        })
    }

    // ── Responder side ──────────────────────────────────────────────────────

    /// Bind the responder to a question, replacing any earlier claim it held.
    pub async fn claim(&self, responder: ResponderId, id: QuestionId) -> Result<OpenedQuestion> {
        self.ensure_responder(responder)?;
        let question = self
            .live_question(id)
            .await?
            .ok_or(RouterError::QuestionNotFound(id))?;
        self.store
            .put_claim(&ResponderClaim {
                responder_id: responder,
                question_id: id,
                snapshot: question.clone(),
                claimed_at: self.clock.now_ms(),
            })
            .await?;
        self.store.note_claim(id, responder).await?;
        tracing::info!(responder_id = %responder, question_id = %id, "question claimed");
        Ok(self.open(question))
    }

    /// Drop the claim if it targets `id`, returning the claimed snapshot.
    pub async fn cancel_claim(
        &self,
        responder: ResponderId,
        id: QuestionId,
    ) -> Result<OpenedQuestion> {
        self.ensure_responder(responder)?;
        let claim = self
            .store
            .take_claim(responder, Some(id))
            .await?
            .ok_or(RouterError::NoActiveClaim)?;
        tracing::debug!(responder_id = %responder, question_id = %id, "claim cancelled");
        Ok(self.open(claim.snapshot))
    }

    /// The question the responder is currently answering, if any.
    pub async fn current_claim(&self, responder: ResponderId) -> Result<Option<QuestionId>> {
        let cutoff = self.cutoff(self.settings.claim_ttl);
        Ok(self
            .store
            .get_claim(responder)
            .await?
            .filter(|c| c.claimed_at >= cutoff)
            .map(|c| c.question_id))
    }

    /// Consume the responder's claim and hand back what to deliver.
    pub async fn submit_reply(
        &self,
        responder: ResponderId,
        reply: Content,
    ) -> Result<ReplyDelivery> {
        self.ensure_responder(responder)?;
        let claim = self
            .store
            .take_claim(responder, None)
            .await?
            .ok_or(RouterError::NoActiveClaim)?;
        if claim.claimed_at < self.cutoff(self.settings.claim_ttl) {
            tracing::debug!(responder_id = %responder, question_id = %claim.question_id, "claim expired");
            return Err(RouterError::NoActiveClaim);
        }

        let question_id = claim.question_id;
        let requester_id = claim.snapshot.requester_id;
        if !self.store.mark_answered(question_id).await? {
            tracing::debug!(question_id = %question_id, "answered question no longer stored");
        }
        tracing::info!(
            responder_id = %responder,
            question_id = %question_id,
            requester_id = %requester_id,
            "reply accepted"
        );
        self.emit(RelayEvent::QuestionAnswered {
            question_id,
            requester_id,
        });
        Ok(ReplyDelivery {
            requester_id,
            original: self.open(claim.snapshot),
            reply,
        })
    }

    /// Mark the requester's latest question answered after an out-of-band reply.
    pub async fn mark_requester_answered(&self, id: RequesterId) -> Result<Option<QuestionId>> {
        let latest = self
            .store
            .list_questions()
            .await?
            .into_iter()
            .filter(|q| q.requester_id == id)
            .map(|q| q.id)
            .max();
        let Some(question_id) = latest else {
            return Ok(None);
        };
        if self.store.mark_answered(question_id).await? {
            self.emit(RelayEvent::QuestionAnswered {
                question_id,
                requester_id: id,
            });
            Ok(Some(question_id))
        } else {
            Ok(None)
        }
    }

    // ── Question history ────────────────────────────────────────────────────

    async fn live_question(&self, id: QuestionId) -> Result<Option<Question>> {
        let cutoff = self.cutoff(self.settings.question_ttl);
        Ok(self
            .store
            .get_question(id)
            .await?
            .filter(|q| q.created_at >= cutoff))
    }

    /// Drop the oldest questions beyond `max_questions`. Returns how many went.
    pub(crate) async fn enforce_history_cap(&self) -> Result<usize> {
        let mut ids: Vec<_> = self
            .store
            .list_questions()
            .await?
            .into_iter()
            .map(|q| q.id)
            .collect();
        if ids.len() <= self.settings.max_questions {
            return Ok(0);
        }
        ids.sort_unstable();
        let excess = ids.len() - self.settings.max_questions;
        let mut removed = 0;
        for id in ids.into_iter().take(excess) {
            if self.store.remove_question(id).await? {
                removed += 1;
            }
        }
        tracing::debug!(removed, "question history trimmed");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            ManualClock,
            testing::{Harness, TEACHER_A, TEACHER_B, student},
        },
        ustoz_sessions::{MemoryStore, RateGate, RateStamp},
    };

    async fn ask(h: &Harness, id: i64, text: &str) -> Result<SubmittedQuestion> {
        let profile = student(id);
        h.router.request_question_prompt(profile.id).await?;
        h.router
            .submit_question(&profile, Content::text(text))
            .await
    }

    #[tokio::test]
    async fn question_ids_strictly_increase() {
        let h = Harness::new();
        let mut last = None;
        for round in 0..5 {
            let submitted = ask(&h, 100 + round, "savol").await.unwrap();
            let id = submitted.question.id();
            if let Some(prev) = last {
                assert!(id > prev);
            }
            last = Some(id);
        }
    }

    #[tokio::test]
    async fn fan_out_lists_every_responder() {
        let h = Harness::new();
        let submitted = ask(&h, 1, "x").await.unwrap();
        assert_eq!(submitted.fan_out, vec![TEACHER_A, TEACHER_B]);
    }

    #[tokio::test]
    async fn duplicate_responders_are_collapsed() {
        let h = Harness::with_responders(vec![TEACHER_A, TEACHER_A, TEACHER_B]);
        assert_eq!(h.router.responders(), &[TEACHER_A, TEACHER_B]);
    }

    #[tokio::test]
    async fn second_question_inside_cooldown_is_rate_limited() {
        let h = Harness::new();
        let me = student(7);
        ask(&h, 7, "first").await.unwrap();

        h.clock.advance_secs(10);
        match h.router.request_question_prompt(me.id).await {
            Err(RouterError::RateLimited { retry_after_secs }) => assert_eq!(retry_after_secs, 20),
            other => panic!("expected RateLimited, got {other:?}"),
        }

        // A prompt armed before the gate closed survives a refused submission.
        h.store
            .put_session(&RequesterSession {
                requester_id: me.id,
                entered_at: h.clock.now_ms(),
            })
            .await
            .unwrap();
        let err = h
            .router
            .submit_question(&me, Content::text("second"))
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::RateLimited { .. }));
        assert!(h.store.get_session(me.id).await.unwrap().is_some());

        h.clock.advance_secs(20);
        h.router
            .submit_question(&me, Content::text("second"))
            .await
            .unwrap();
    }

    /// Store whose rate stamp lands after a racing cancel and a racing
    /// submission have both hit the store.
    struct CancelDuringStamp {
        inner: MemoryStore,
        cancel_found_session: std::sync::Mutex<Option<bool>>,
    }

    #[async_trait::async_trait]
    impl RelayStore for CancelDuringStamp {
        async fn next_question_id(&self) -> anyhow::Result<QuestionId> {
            self.inner.next_question_id().await
        }

        async fn put_question(&self, question: &Question) -> anyhow::Result<()> {
            self.inner.put_question(question).await
        }

        async fn get_question(&self, id: QuestionId) -> anyhow::Result<Option<Question>> {
            self.inner.get_question(id).await
        }

        async fn mark_answered(&self, id: QuestionId) -> anyhow::Result<bool> {
            self.inner.mark_answered(id).await
        }

        async fn note_claim(&self, id: QuestionId, responder: ResponderId) -> anyhow::Result<bool> {
            self.inner.note_claim(id, responder).await
        }

        async fn remove_question(&self, id: QuestionId) -> anyhow::Result<bool> {
            self.inner.remove_question(id).await
        }

        async fn expire_question(&self, id: QuestionId, cutoff: u64) -> anyhow::Result<bool> {
            self.inner.expire_question(id, cutoff).await
        }

        async fn list_questions(&self) -> anyhow::Result<Vec<Question>> {
            self.inner.list_questions().await
        }

        async fn put_session(&self, session: &RequesterSession) -> anyhow::Result<()> {
            self.inner.put_session(session).await
        }

        async fn get_session(&self, id: RequesterId) -> anyhow::Result<Option<RequesterSession>> {
            self.inner.get_session(id).await
        }

        async fn take_session(&self, id: RequesterId) -> anyhow::Result<Option<RequesterSession>> {
            self.inner.take_session(id).await
        }

        async fn expire_session(&self, id: RequesterId, cutoff: u64) -> anyhow::Result<bool> {
            self.inner.expire_session(id, cutoff).await
        }

        async fn list_sessions(&self) -> anyhow::Result<Vec<RequesterSession>> {
            self.inner.list_sessions().await
        }

        async fn put_claim(&self, claim: &ResponderClaim) -> anyhow::Result<()> {
            self.inner.put_claim(claim).await
        }

        async fn get_claim(&self, id: ResponderId) -> anyhow::Result<Option<ResponderClaim>> {
            self.inner.get_claim(id).await
        }

        async fn take_claim(
            &self,
            id: ResponderId,
            expected: Option<QuestionId>,
        ) -> anyhow::Result<Option<ResponderClaim>> {
            self.inner.take_claim(id, expected).await
        }

        async fn expire_claim(&self, id: ResponderId, cutoff: u64) -> anyhow::Result<bool> {
            self.inner.expire_claim(id, cutoff).await
        }

        async fn list_claims(&self) -> anyhow::Result<Vec<ResponderClaim>> {
            self.inner.list_claims().await
        }

        async fn get_rate_gate(&self, id: RequesterId) -> anyhow::Result<Option<RateGate>> {
            self.inner.get_rate_gate(id).await
        }

        async fn try_stamp_rate_gate(
            &self,
            id: RequesterId,
            now: u64,
            window_ms: u64,
        ) -> anyhow::Result<RateStamp> {
            let cancelled = self.inner.take_session(id).await?.is_some();
            *self.cancel_found_session.lock().unwrap() = Some(cancelled);
            self.inner.try_stamp_rate_gate(id, now, window_ms).await?;
            self.inner.try_stamp_rate_gate(id, now, window_ms).await
        }

        async fn expire_rate_gate(&self, id: RequesterId, cutoff: u64) -> anyhow::Result<bool> {
            self.inner.expire_rate_gate(id, cutoff).await
        }

        async fn list_rate_gates(&self) -> anyhow::Result<Vec<RateGate>> {
            self.inner.list_rate_gates().await
        }

        async fn put_profile(&self, profile: &RequesterProfile) -> anyhow::Result<()> {
            self.inner.put_profile(profile).await
        }

        async fn list_profiles(&self) -> anyhow::Result<Vec<RequesterProfile>> {
            self.inner.list_profiles().await
        }

        async fn mute(&self, id: RequesterId) -> anyhow::Result<bool> {
            self.inner.mute(id).await
        }

        async fn is_muted(&self, id: RequesterId) -> anyhow::Result<bool> {
            self.inner.is_muted(id).await
        }
    }

    #[tokio::test]
    async fn submission_losing_the_gate_does_not_revive_a_cancelled_prompt() {
        let store = Arc::new(CancelDuringStamp {
            inner: MemoryStore::new(),
            cancel_found_session: std::sync::Mutex::new(None),
        });
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let codec = Arc::new(Codec::from_key_bytes(&[7u8; 32]).unwrap());
        let router = SessionRouter::new(
            store.clone(),
            codec,
            vec![TEACHER_A],
            RouterSettings::default(),
            clock,
        );
        let me = student(5);
        router.request_question_prompt(me.id).await.unwrap();

        let err = router
            .submit_question(&me, Content::text("savol"))
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::RateLimited { retry_after_secs: 30 }));
        assert_eq!(*store.cancel_found_session.lock().unwrap(), Some(false));
        assert!(store.get_session(me.id).await.unwrap().is_none());
        assert!(store.list_questions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn submit_without_prompt_fails() {
        let h = Harness::new();
        let err = h
            .router
            .submit_question(&student(3), Content::text("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::NoActiveSession));
    }

    #[tokio::test]
    async fn cancelled_prompt_blocks_submission() {
        let h = Harness::new();
        let me = student(3);
        h.router.request_question_prompt(me.id).await.unwrap();
        assert!(h.router.cancel_question_prompt(me.id).await.unwrap());
        assert!(!h.router.cancel_question_prompt(me.id).await.unwrap());
        let err = h
            .router
            .submit_question(&me, Content::text("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::NoActiveSession));
    }

    #[tokio::test]
    async fn prompt_can_be_rearmed() {
        let h = Harness::new();
        let me = student(3);
        h.router.request_question_prompt(me.id).await.unwrap();
        h.router.request_question_prompt(me.id).await.unwrap();
        h.router
            .submit_question(&me, Content::text("hi"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn only_one_of_two_racing_submissions_wins() {
        let h = Harness::new();
        let me = student(3);
        h.router.request_question_prompt(me.id).await.unwrap();
        let (a, b) = tokio::join!(
            h.router.submit_question(&me, Content::text("a")),
            h.router.submit_question(&me, Content::text("b")),
        );
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
    }

    #[tokio::test]
    async fn responders_cannot_ask() {
        let h = Harness::new();
        let err = h
            .router
            .request_question_prompt(RequesterId(TEACHER_A.0))
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::AlreadyResponder));
    }

    #[tokio::test]
    async fn claim_then_reply_round_trip() {
        let h = Harness::new();
        let q = ask(&h, 42, "Integral nima?").await.unwrap().question;

        let claimed = h.router.claim(TEACHER_A, q.id()).await.unwrap();
        assert_eq!(claimed.content, Content::text("Integral nima?"));
        assert_eq!(h.router.current_claim(TEACHER_A).await.unwrap(), Some(q.id()));

        let delivery = h
            .router
            .submit_reply(TEACHER_A, Content::text("ok"))
            .await
            .unwrap();
        assert_eq!(delivery.requester_id, RequesterId(42));
        assert_eq!(delivery.original.content, Content::text("Integral nima?"));
        assert_eq!(delivery.reply, Content::text("ok"));

        let stored = h.store.get_question(q.id()).await.unwrap().unwrap();
        assert!(stored.answered);
        assert_eq!(stored.claimed_by, Some(TEACHER_A));
        assert_eq!(h.router.current_claim(TEACHER_A).await.unwrap(), None);
    }

    #[tokio::test]
    async fn stored_body_is_sealed() {
        let h = Harness::new();
        let q = ask(&h, 42, "maxfiy savol").await.unwrap().question;
        let stored = h.store.get_question(q.id()).await.unwrap().unwrap();
        match stored.body {
            SealedContent::Text { text } => assert!(!text.as_str().contains("maxfiy")),
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[tokio::test]
    async fn claim_rejects_strangers_and_unknown_questions() {
        let h = Harness::new();
        let q = ask(&h, 1, "x").await.unwrap().question;
        assert!(matches!(
            h.router.claim(ResponderId(999), q.id()).await,
            Err(RouterError::NotAResponder)
        ));
        assert!(matches!(
            h.router.claim(TEACHER_A, QuestionId(12_345)).await,
            Err(RouterError::QuestionNotFound(QuestionId(12_345)))
        ));
    }

    #[tokio::test]
    async fn reply_without_claim_fails() {
        let h = Harness::new();
        let err = h
            .router
            .submit_reply(TEACHER_A, Content::text("hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::NoActiveClaim));
    }

    #[tokio::test]
    async fn cancel_claim_must_match_question() {
        let h = Harness::new();
        let q = ask(&h, 1, "x").await.unwrap().question;
        h.router.claim(TEACHER_A, q.id()).await.unwrap();

        assert!(matches!(
            h.router.cancel_claim(TEACHER_A, QuestionId(q.id().0 + 1)).await,
            Err(RouterError::NoActiveClaim)
        ));
        let snapshot = h.router.cancel_claim(TEACHER_A, q.id()).await.unwrap();
        assert_eq!(snapshot.id(), q.id());
        assert!(matches!(
            h.router.submit_reply(TEACHER_A, Content::text("late")).await,
            Err(RouterError::NoActiveClaim)
        ));
    }

    #[tokio::test]
    async fn snapshot_survives_question_removal() {
        let h = Harness::new();
        let q = ask(&h, 5, "rasm haqida").await.unwrap().question;
        h.router.claim(TEACHER_A, q.id()).await.unwrap();
        h.store.remove_question(q.id()).await.unwrap();

        let delivery = h
            .router
            .submit_reply(TEACHER_A, Content::text("javob"))
            .await
            .unwrap();
        assert_eq!(delivery.original.content, Content::text("rasm haqida"));
        assert_eq!(delivery.requester_id, RequesterId(5));
    }

    #[tokio::test]
    async fn claims_are_not_exclusive() {
        let h = Harness::new();
        let q = ask(&h, 9, "x").await.unwrap().question;

        h.router.claim(TEACHER_A, q.id()).await.unwrap();
        h.router.claim(TEACHER_B, q.id()).await.unwrap();

        let a = h
            .router
            .submit_reply(TEACHER_A, Content::text("from A"))
            .await
            .unwrap();
        let b = h
            .router
            .submit_reply(TEACHER_B, Content::text("from B"))
            .await
            .unwrap();
        assert_eq!(a.requester_id, RequesterId(9));
        assert_eq!(b.requester_id, RequesterId(9));
        assert_eq!(a.original.id(), b.original.id());
    }

    #[tokio::test]
    async fn newer_claim_replaces_older_one() {
        let h = Harness::new();
        let first = ask(&h, 1, "first").await.unwrap().question;
        let second = ask(&h, 2, "second").await.unwrap().question;

        h.router.claim(TEACHER_A, first.id()).await.unwrap();
        h.router.claim(TEACHER_A, second.id()).await.unwrap();
        let delivery = h
            .router
            .submit_reply(TEACHER_A, Content::text("ok"))
            .await
            .unwrap();
        assert_eq!(delivery.original.id(), second.id());
        assert_eq!(delivery.requester_id, RequesterId(2));
    }

    #[tokio::test]
    async fn stale_session_and_claim_are_rejected_before_sweep() {
        let h = Harness::new();
        let me = student(4);
        let q = ask(&h, 5, "x").await.unwrap().question;
        h.router.request_question_prompt(me.id).await.unwrap();
        h.router.claim(TEACHER_A, q.id()).await.unwrap();

        h.clock.advance_secs(601);
        assert!(matches!(
            h.router.submit_question(&me, Content::text("late")).await,
            Err(RouterError::NoActiveSession)
        ));
        assert!(matches!(
            h.router.submit_reply(TEACHER_A, Content::text("late")).await,
            Err(RouterError::NoActiveClaim)
        ));
    }

    #[tokio::test]
    async fn expired_question_cannot_be_claimed() {
        let h = Harness::new();
        let q = ask(&h, 5, "x").await.unwrap().question;
        h.clock.advance_secs(86_401);
        assert!(matches!(
            h.router.claim(TEACHER_A, q.id()).await,
            Err(RouterError::QuestionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn history_is_capped() {
        let h = Harness::with_settings(RouterSettings {
            max_questions: 3,
            ..RouterSettings::default()
        });
        let mut ids = Vec::new();
        for n in 0..5 {
            ids.push(ask(&h, 10 + n, "q").await.unwrap().question.id());
        }
        let mut kept: Vec<_> = h
            .store
            .list_questions()
            .await
            .unwrap()
            .into_iter()
            .map(|q| q.id)
            .collect();
        kept.sort();
        assert_eq!(kept, ids[2..].to_vec());
    }

    #[tokio::test]
    async fn events_follow_commits() {
        let h = Harness::new();
        let mut rx = h.router.subscribe();
        let q = ask(&h, 8, "Fizika").await.unwrap().question;

        match rx.recv().await.unwrap() {
            RelayEvent::QuestionCreated(view) => {
                assert_eq!(view.question_id, q.id());
                assert_eq!(view.text, "Fizika");
                assert!(!view.answered);
            },
            other => panic!("unexpected {other:?}"),
        }

        h.router.claim(TEACHER_B, q.id()).await.unwrap();
        h.router
            .submit_reply(TEACHER_B, Content::text("javob"))
            .await
            .unwrap();
        assert_eq!(
            rx.recv().await.unwrap(),
            RelayEvent::QuestionAnswered {
                question_id: q.id(),
                requester_id: RequesterId(8),
            }
        );
    }

    #[tokio::test]
    async fn out_of_band_reply_marks_latest_question() {
        let h = Harness::new();
        ask(&h, 8, "one").await.unwrap();
        h.clock.advance_secs(30);
        let latest = ask(&h, 8, "two").await.unwrap().question;
        assert_eq!(
            h.router.mark_requester_answered(RequesterId(8)).await.unwrap(),
            Some(latest.id())
        );
        assert_eq!(
            h.router.mark_requester_answered(RequesterId(99)).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn media_question_keeps_reference() {
        let h = Harness::new();
        let me = student(6);
        h.router.request_question_prompt(me.id).await.unwrap();
        let content = Content::photo("AgACAgIAAx", Some("3-misol".into()));
        let submitted = h
            .router
            .submit_question(&me, content.clone())
            .await
            .unwrap();
        let claimed = h
            .router
            .claim(TEACHER_A, submitted.question.id())
            .await
            .unwrap();
        assert_eq!(claimed.content, content);
    }
}
