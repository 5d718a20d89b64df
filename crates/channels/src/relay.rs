//! Inbound event dispatch.
//!
//! [`Relay::handle`] turns one transport-neutral event into router calls and
//! outbound sends. State is committed by the router before anything is sent,
//! and a failed send to one recipient never stops the others.

use std::sync::Arc;

use {
    ustoz_common::{Content, QuestionId, RequesterId, RequesterProfile, ResponderId},
    ustoz_routing::{OpenedQuestion, RouterError, SessionRouter},
};

use crate::{
    action::CallbackAction,
    copy,
    error::DeliveryError,
    message::{ActionButton, Command, InboundEvent, OutboundBody, OutboundMessage, Payload, Sender},
    plugin::ChannelOutbound,
};

/// Feedback for a pressed button (a toast, or a modal alert).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackAnswer {
    pub text: String,
    pub alert: bool,
}

impl CallbackAnswer {
    pub fn toast(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            alert: false,
        }
    }

    pub fn alert(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            alert: true,
        }
    }
}

/// Failure of a dashboard-initiated reply.
#[derive(Debug, thiserror::Error)]
pub enum DashboardReplyError {
    #[error("requester {0} is muted")]
    Muted(RequesterId),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
    #[error(transparent)]
    Router(#[from] RouterError),
}

type Reaction = anyhow::Result<Option<CallbackAnswer>>;

pub struct Relay {
    router: Arc<SessionRouter>,
    outbound: Arc<dyn ChannelOutbound>,
}

impl Relay {
    pub fn new(router: Arc<SessionRouter>, outbound: Arc<dyn ChannelOutbound>) -> Self {
        Self { router, outbound }
    }

    pub fn router(&self) -> &Arc<SessionRouter> {
        &self.router
    }

    /// Handle one inbound event. The returned answer, if any, belongs to the
    /// button press that caused it.
    pub async fn handle(&self, event: InboundEvent) -> Option<CallbackAnswer> {
        let sender = event.sender.clone();
        let responder = self.router.is_responder(ResponderId(sender.id));
        tracing::debug!(
            sender_id = sender.id,
            role = if responder { "responder" } else { "requester" },
            action = %event.label(),
            "inbound event"
        );

        let outcome = if responder {
            self.handle_responder(&sender, event.payload).await
        } else {
            self.handle_requester(&sender, event.payload).await
        };

        match outcome {
            Ok(answer) => answer,
            Err(e) => {
                let detail = format!("{e:#}");
                tracing::error!(sender_id = sender.id, error = %detail, "event handling failed");
                let notice = if responder {
                    copy::RESPONDER_TRY_AGAIN
                } else {
                    copy::REQUESTER_TRY_AGAIN
                };
                self.notify(OutboundMessage::text(sender.chat_id, notice)).await;
                None
            },
        }
    }

    // ── Requester side ──────────────────────────────────────────────────────

    async fn handle_requester(&self, sender: &Sender, payload: Payload) -> Reaction {
        let id = RequesterId(sender.id);
        if self.router.is_muted(id).await? {
            tracing::debug!(requester_id = %id, "ignoring muted requester");
            return Ok(None);
        }
        let profile = self
            .router
            .touch_requester(id, &sender.display_name, sender.handle.as_deref())
            .await?;

        match payload {
            Payload::Command(Command::Start) => {
                self.notify(
                    OutboundMessage::text(sender.chat_id, copy::requester_welcome(&sender.display_name))
                        .with_action(ask_button(copy::ASK_BUTTON)),
                )
                .await;
                Ok(None)
            },
            Payload::Command(command) => self.diagnostics(sender, command).await,
            Payload::Message(content) => self.submit_question(sender, &profile, content).await,
            Payload::Action { token } => match CallbackAction::parse(&token) {
                Some(CallbackAction::AskQuestion) => self.ask_question(sender, id).await,
                Some(CallbackAction::CancelQuestion) => self.cancel_question(sender, id).await,
                Some(CallbackAction::Reply(_) | CallbackAction::CancelReply(_)) => {
                    Ok(Some(CallbackAnswer::alert(copy::NOT_A_RESPONDER_ALERT)))
                },
                None => Ok(Some(unknown_action(&token))),
            },
        }
    }

    async fn ask_question(&self, sender: &Sender, id: RequesterId) -> Reaction {
        match self.router.request_question_prompt(id).await {
            Ok(()) => {
                self.notify(
                    OutboundMessage::text(sender.chat_id, copy::ASK_PROMPT).with_action(
                        ActionButton::new(copy::CANCEL_QUESTION_BUTTON, CallbackAction::CancelQuestion),
                    ),
                )
                .await;
                Ok(None)
            },
            Err(RouterError::RateLimited { retry_after_secs }) => {
                self.notify(OutboundMessage::text(
                    sender.chat_id,
                    copy::rate_limited(retry_after_secs),
                ))
                .await;
                Ok(Some(CallbackAnswer::toast(format!(
                    "⏳ {}",
                    copy::format_wait(retry_after_secs)
                ))))
            },
            Err(RouterError::AlreadyResponder) => {
                Ok(Some(CallbackAnswer::alert(copy::RESPONDER_CANNOT_ASK_ALERT)))
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn cancel_question(&self, sender: &Sender, id: RequesterId) -> Reaction {
        // Nothing armed: acknowledge the press silently.
        if !self.router.cancel_question_prompt(id).await? {
            return Ok(None);
        }
        self.notify(
            OutboundMessage::text(sender.chat_id, copy::QUESTION_CANCELLED)
                .with_action(ask_button(copy::ASK_BUTTON)),
        )
        .await;
        Ok(Some(CallbackAnswer::toast(copy::QUESTION_CANCELLED_TOAST)))
    }

    async fn submit_question(
        &self,
        sender: &Sender,
        profile: &RequesterProfile,
        content: Content,
    ) -> Reaction {
        let submitted = match self.router.submit_question(profile, content).await {
            Ok(submitted) => submitted,
            Err(RouterError::NoActiveSession) => {
                self.notify(
                    OutboundMessage::text(sender.chat_id, copy::PRESS_ASK_FIRST)
                        .with_action(ask_button(copy::ASK_BUTTON)),
                )
                .await;
                return Ok(None);
            },
            Err(RouterError::RateLimited { retry_after_secs }) => {
                self.notify(OutboundMessage::text(
                    sender.chat_id,
                    copy::rate_limited(retry_after_secs),
                ))
                .await;
                return Ok(None);
            },
            Err(e) => return Err(e.into()),
        };

        let question = &submitted.question;
        let mut delivered = 0usize;
        for responder in &submitted.fan_out {
            let notice = question_notice(responder.0, question);
            match self.outbound.send(&notice).await {
                Ok(()) => delivered += 1,
                Err(e) => tracing::warn!(
                    responder_id = %responder,
                    question_id = %question.id(),
                    error = %e,
                    "fan-out delivery failed"
                ),
            }
        }
        tracing::info!(
            question_id = %question.id(),
            delivered,
            total = submitted.fan_out.len(),
            "question fanned out"
        );

        let cooldown = self.router.settings().cooldown.as_secs();
        let header = copy::question_sent_header(delivered, cooldown);
        self.notify(
            OutboundMessage::new(sender.chat_id, OutboundBody::framed(&header, &question.content))
                .with_action(ask_button(copy::ASK_AGAIN_BUTTON)),
        )
        .await;
        Ok(None)
    }

    // ── Responder side ──────────────────────────────────────────────────────

    async fn handle_responder(&self, sender: &Sender, payload: Payload) -> Reaction {
        let me = ResponderId(sender.id);
        match payload {
            Payload::Command(Command::Start) => {
                self.notify(OutboundMessage::text(
                    sender.chat_id,
                    copy::responder_welcome(sender.chat_id),
                ))
                .await;
                Ok(None)
            },
            Payload::Command(command) => self.diagnostics(sender, command).await,
            Payload::Message(content) => self.submit_reply(sender, me, content).await,
            Payload::Action { token } => match CallbackAction::parse(&token) {
                Some(CallbackAction::Reply(id)) => self.claim(sender, me, id).await,
                Some(CallbackAction::CancelReply(id)) => self.cancel_claim(sender, me, id).await,
                Some(CallbackAction::AskQuestion | CallbackAction::CancelQuestion) => {
                    Ok(Some(CallbackAnswer::alert(copy::RESPONDER_CANNOT_ASK_ALERT)))
                },
                None => Ok(Some(unknown_action(&token))),
            },
        }
    }

    async fn claim(&self, sender: &Sender, me: ResponderId, id: QuestionId) -> Reaction {
        match self.router.claim(me, id).await {
            Ok(question) => {
                let header = copy::reply_mode_header(id, &question.requester_label());
                self.notify(
                    OutboundMessage::new(sender.chat_id, OutboundBody::framed(&header, &question.content))
                        .with_action(ActionButton::new(
                            copy::CANCEL_REPLY_BUTTON,
                            CallbackAction::CancelReply(id),
                        )),
                )
                .await;
                Ok(Some(CallbackAnswer::toast(copy::REPLY_TOAST)))
            },
            Err(RouterError::QuestionNotFound(_)) => {
                Ok(Some(CallbackAnswer::alert(copy::QUESTION_NOT_FOUND_ALERT)))
            },
            Err(RouterError::NotAResponder) => {
                Ok(Some(CallbackAnswer::alert(copy::NOT_A_RESPONDER_ALERT)))
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn cancel_claim(&self, sender: &Sender, me: ResponderId, id: QuestionId) -> Reaction {
        match self.router.cancel_claim(me, id).await {
            Ok(question) => {
                self.notify(question_notice(sender.chat_id, &question)).await;
                Ok(Some(CallbackAnswer::toast(copy::REPLY_CANCELLED_TOAST)))
            },
            Err(RouterError::NoActiveClaim) => {
                Ok(Some(CallbackAnswer::alert(copy::NO_ACTIVE_REPLY_ALERT)))
            },
            Err(RouterError::NotAResponder) => {
                Ok(Some(CallbackAnswer::alert(copy::NOT_A_RESPONDER_ALERT)))
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn submit_reply(&self, sender: &Sender, me: ResponderId, content: Content) -> Reaction {
        let delivery = match self.router.submit_reply(me, content).await {
            Ok(delivery) => delivery,
            Err(RouterError::NoActiveClaim) => {
                self.notify(OutboundMessage::text(sender.chat_id, copy::RESPONDER_IDLE))
                    .await;
                return Ok(None);
            },
            Err(e) => return Err(e.into()),
        };

        let to = delivery.requester_id.0;
        let original = &delivery.original;
        match self.deliver_reply(to, original, &delivery.reply).await {
            Ok(()) => {
                let header = copy::reply_sent_header(&original.requester_label());
                self.notify(OutboundMessage::new(
                    sender.chat_id,
                    OutboundBody::framed(&header, &delivery.reply),
                ))
                .await;
            },
            Err(e) => {
                tracing::warn!(
                    responder_id = %me,
                    requester_id = %delivery.requester_id,
                    question_id = %original.id(),
                    error = %e,
                    "reply delivery failed"
                );
                self.notify(OutboundMessage::text(sender.chat_id, copy::reply_failed(&e)))
                    .await;
            },
        }
        Ok(None)
    }

    /// Send the answer to the requester. A media question is re-sent first so
    /// the requester sees what is being answered.
    async fn deliver_reply(
        &self,
        to: i64,
        original: &OpenedQuestion,
        reply: &Content,
    ) -> Result<(), DeliveryError> {
        let original_text = match &original.content {
            Content::Text { text } => Some(text.as_str()),
            Content::Media { .. } => {
                let echo = OutboundBody::framed(copy::ORIGINAL_QUESTION_HEADER, &original.content);
                self.outbound.send(&OutboundMessage::new(to, echo)).await?;
                None
            },
        };
        let header = copy::answer_header(original_text);
        self.outbound
            .send(
                &OutboundMessage::new(to, OutboundBody::framed(&header, reply))
                    .with_action(ask_button(copy::ASK_AGAIN_BUTTON)),
            )
            .await
    }

    // ── Shared ──────────────────────────────────────────────────────────────

    async fn diagnostics(&self, sender: &Sender, command: Command) -> Reaction {
        let text = match command {
            Command::MyId => copy::my_id(sender),
            Command::Status => {
                let responders: Vec<i64> = self.router.responders().iter().map(|r| r.0).collect();
                copy::status(
                    sender,
                    self.router.is_responder(ResponderId(sender.id)),
                    self.router.is_responder(ResponderId(sender.chat_id)),
                    &responders,
                )
            },
            Command::Start => return Ok(None),
        };
        self.notify(OutboundMessage::text(sender.chat_id, text)).await;
        Ok(None)
    }

    /// Reply from the dashboard: plain text to the requester, then mark their
    /// latest question answered.
    pub async fn reply_from_dashboard(
        &self,
        requester: RequesterId,
        text: &str,
    ) -> Result<(), DashboardReplyError> {
        if self.router.is_muted(requester).await? {
            return Err(DashboardReplyError::Muted(requester));
        }
        self.outbound
            .send(&OutboundMessage::text(requester.0, copy::dashboard_reply(text)))
            .await?;
        let answered = self.router.mark_requester_answered(requester).await?;
        tracing::info!(requester_id = %requester, question_id = ?answered, "dashboard reply sent");
        Ok(())
    }

    /// Best-effort send to the person who triggered the event.
    async fn notify(&self, message: OutboundMessage) {
        if let Err(e) = self.outbound.send(&message).await {
            tracing::warn!(recipient = e.recipient(), error = %e, "notice not delivered");
        }
    }
}

fn ask_button(label: &str) -> ActionButton {
    ActionButton::new(label, CallbackAction::AskQuestion)
}

fn unknown_action(token: &str) -> CallbackAnswer {
    tracing::warn!(token, "unknown callback token");
    CallbackAnswer::alert(copy::UNKNOWN_ACTION_ALERT)
}

/// The "new question" notification a responder sees, with its Reply button.
fn question_notice(to: i64, question: &OpenedQuestion) -> OutboundMessage {
    let header = copy::new_question_header(question.id(), &question.requester_label());
    OutboundMessage::new(to, OutboundBody::framed(&header, &question.content)).with_action(
        ActionButton::new(copy::REPLY_BUTTON, CallbackAction::Reply(question.id())),
    )
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::Mutex,
    };

    use {
        super::*,
        async_trait::async_trait,
        ustoz_routing::{ManualClock, RouterSettings},
        ustoz_sessions::MemoryStore,
        ustoz_vault::Codec,
    };

    const TEACHER_A: i64 = 500;
    const TEACHER_B: i64 = 501;
    const STUDENT: i64 = 42;

    /// Records every send; recipients listed in `failing` get that error instead.
    #[derive(Default)]
    struct RecordingOutbound {
        sent: Mutex<Vec<OutboundMessage>>,
        failing: Mutex<HashMap<i64, DeliveryError>>,
    }

    impl RecordingOutbound {
        fn fail_for(&self, error: DeliveryError) {
            self.failing
                .lock()
                .unwrap()
                .insert(error.recipient(), error);
        }

        fn take(&self) -> Vec<OutboundMessage> {
            std::mem::take(&mut *self.sent.lock().unwrap())
        }
    }

    #[async_trait]
    impl ChannelOutbound for RecordingOutbound {
        async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
            if let Some(e) = self.failing.lock().unwrap().get(&message.to) {
                return Err(e.clone());
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    struct Fixture {
        relay: Relay,
        outbound: Arc<RecordingOutbound>,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let router = Arc::new(SessionRouter::new(
            Arc::new(MemoryStore::new()),
            Arc::new(Codec::from_key_bytes(&[3u8; 32]).unwrap()),
            [ResponderId(TEACHER_A), ResponderId(TEACHER_B)],
            RouterSettings::default(),
            clock.clone(),
        ));
        let outbound = Arc::new(RecordingOutbound::default());
        Fixture {
            relay: Relay::new(router, outbound.clone()),
            outbound,
            clock,
        }
    }

    fn sender(id: i64) -> Sender {
        Sender {
            id,
            chat_id: id,
            display_name: format!("User {id}"),
            handle: (id == STUDENT).then(|| "talaba".to_string()),
        }
    }

    fn text(id: i64, body: &str) -> InboundEvent {
        InboundEvent::from_content(sender(id), Content::text(body))
    }

    fn press(id: i64, action: CallbackAction) -> InboundEvent {
        InboundEvent::action(sender(id), action.encode())
    }

    fn body_text(message: &OutboundMessage) -> &str {
        message.body.text().unwrap_or_default()
    }

    fn tokens(message: &OutboundMessage) -> Vec<&str> {
        message.actions.iter().map(|a| a.token.as_str()).collect()
    }

    async fn ask(f: &Fixture, question: &str) -> QuestionId {
        f.relay.handle(press(STUDENT, CallbackAction::AskQuestion)).await;
        f.relay.handle(text(STUDENT, question)).await;
        let sent = f.outbound.take();
        let notice = sent
            .iter()
            .find(|m| m.to == TEACHER_A)
            .expect("responder notice");
        match CallbackAction::parse(&notice.actions[0].token) {
            Some(CallbackAction::Reply(id)) => id,
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[tokio::test]
    async fn start_greets_by_role() {
        let f = fixture();
        f.relay.handle(text(STUDENT, "/start")).await;
        f.relay.handle(text(TEACHER_A, "/start")).await;
        let sent = f.outbound.take();
        assert_eq!(sent.len(), 2);
        assert_eq!(tokens(&sent[0]), vec!["ask_question"]);
        assert!(body_text(&sent[0]).contains("Assalomu alaykum"));
        assert!(sent[1].actions.is_empty());
        assert!(body_text(&sent[1]).contains(&TEACHER_A.to_string()));
    }

    #[tokio::test]
    async fn question_fans_out_and_reply_comes_back() {
        let f = fixture();

        let answer = f
            .relay
            .handle(press(STUDENT, CallbackAction::AskQuestion))
            .await;
        assert_eq!(answer, None);
        let sent = f.outbound.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(tokens(&sent[0]), vec!["cancel_question"]);

        f.relay.handle(text(STUDENT, "Kvadrat tenglama?")).await;
        let sent = f.outbound.take();
        assert_eq!(sent.len(), 3);
        let notices: Vec<_> = sent.iter().filter(|m| m.to != STUDENT).collect();
        assert_eq!(notices.len(), 2);
        for notice in &notices {
            assert!(body_text(notice).contains("Kvadrat tenglama?"));
            assert!(body_text(notice).contains("User 42 (@talaba)"));
            assert_eq!(tokens(notice), vec!["reply_1"]);
        }
        let confirmation = sent.iter().find(|m| m.to == STUDENT).unwrap();
        assert!(body_text(confirmation).contains("Qabul qilgan o'qituvchilar: 2"));
        assert_eq!(tokens(confirmation), vec!["ask_question"]);

        let answer = f
            .relay
            .handle(press(TEACHER_A, CallbackAction::Reply(QuestionId(1))))
            .await;
        assert_eq!(answer, Some(CallbackAnswer::toast(copy::REPLY_TOAST)));
        let sent = f.outbound.take();
        assert_eq!(sent[0].to, TEACHER_A);
        assert_eq!(tokens(&sent[0]), vec!["cancel_reply_1"]);

        f.relay.handle(text(TEACHER_A, "x = 2")).await;
        let sent = f.outbound.take();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].to, STUDENT);
        assert!(body_text(&sent[0]).contains("Kvadrat tenglama?"));
        assert!(body_text(&sent[0]).contains("x = 2"));
        assert_eq!(sent[1].to, TEACHER_A);
        assert!(body_text(&sent[1]).contains("Reply sent"));
    }

    #[tokio::test]
    async fn fan_out_survives_a_blocked_responder() {
        let f = fixture();
        f.outbound
            .fail_for(DeliveryError::Blocked { recipient: TEACHER_B });
        f.relay.handle(press(STUDENT, CallbackAction::AskQuestion)).await;
        f.relay.handle(text(STUDENT, "savol")).await;
        let sent = f.outbound.take();
        assert!(sent.iter().any(|m| m.to == TEACHER_A));
        let confirmation = sent.iter().find(|m| m.to == STUDENT).unwrap();
        assert!(body_text(confirmation).contains("Qabul qilgan o'qituvchilar: 1"));
    }

    #[tokio::test]
    async fn message_without_prompt_asks_to_press_button() {
        let f = fixture();
        f.relay.handle(text(STUDENT, "salom")).await;
        let sent = f.outbound.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(body_text(&sent[0]), copy::PRESS_ASK_FIRST);
        assert_eq!(tokens(&sent[0]), vec!["ask_question"]);
    }

    #[tokio::test]
    async fn second_question_is_rate_limited() {
        let f = fixture();
        ask(&f, "birinchi").await;
        f.clock.advance_secs(5);

        let answer = f
            .relay
            .handle(press(STUDENT, CallbackAction::AskQuestion))
            .await;
        assert_eq!(answer, Some(CallbackAnswer::toast("⏳ 25 soniya")));
        let sent = f.outbound.take();
        assert_eq!(body_text(&sent[0]), copy::rate_limited(25));

        f.clock.advance_secs(25);
        ask(&f, "ikkinchi").await;
    }

    #[tokio::test]
    async fn cancelled_prompt_drops_next_message() {
        let f = fixture();
        f.relay.handle(press(STUDENT, CallbackAction::AskQuestion)).await;
        let answer = f
            .relay
            .handle(press(STUDENT, CallbackAction::CancelQuestion))
            .await;
        assert_eq!(
            answer,
            Some(CallbackAnswer::toast(copy::QUESTION_CANCELLED_TOAST))
        );
        f.outbound.take();
        f.relay.handle(text(STUDENT, "salom")).await;
        let sent = f.outbound.take();
        assert_eq!(body_text(&sent[0]), copy::PRESS_ASK_FIRST);
    }

    #[tokio::test]
    async fn cancel_without_prompt_is_acknowledged_quietly() {
        let f = fixture();
        let answer = f
            .relay
            .handle(press(STUDENT, CallbackAction::CancelQuestion))
            .await;
        assert_eq!(answer, None);
        assert!(f.outbound.take().is_empty());
    }

    #[tokio::test]
    async fn blocked_requester_is_reported_to_responder() {
        let f = fixture();
        let id = ask(&f, "savol").await;
        f.relay
            .handle(press(TEACHER_A, CallbackAction::Reply(id)))
            .await;
        f.outbound.take();

        f.outbound
            .fail_for(DeliveryError::Blocked { recipient: STUDENT });
        f.relay.handle(text(TEACHER_A, "javob")).await;
        let sent = f.outbound.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, TEACHER_A);
        assert_eq!(
            body_text(&sent[0]),
            copy::reply_failed(&DeliveryError::Blocked { recipient: STUDENT })
        );
        assert_eq!(
            f.relay
                .router()
                .current_claim(ResponderId(TEACHER_A))
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn responder_without_claim_sees_idle_panel() {
        let f = fixture();
        f.relay.handle(text(TEACHER_A, "salom")).await;
        let sent = f.outbound.take();
        assert_eq!(body_text(&sent[0]), copy::RESPONDER_IDLE);
    }

    #[tokio::test]
    async fn cancel_reply_reposts_the_question() {
        let f = fixture();
        let id = ask(&f, "savol").await;
        f.relay
            .handle(press(TEACHER_A, CallbackAction::Reply(id)))
            .await;
        f.outbound.take();

        let answer = f
            .relay
            .handle(press(TEACHER_A, CallbackAction::CancelReply(id)))
            .await;
        assert_eq!(answer, Some(CallbackAnswer::toast(copy::REPLY_CANCELLED_TOAST)));
        let sent = f.outbound.take();
        assert_eq!(sent[0].to, TEACHER_A);
        assert_eq!(tokens(&sent[0]), vec![CallbackAction::Reply(id).encode()]);

        let again = f
            .relay
            .handle(press(TEACHER_A, CallbackAction::CancelReply(id)))
            .await;
        assert_eq!(again, Some(CallbackAnswer::alert(copy::NO_ACTIVE_REPLY_ALERT)));
    }

    #[tokio::test]
    async fn role_mismatched_buttons_are_refused() {
        let f = fixture();
        assert_eq!(
            f.relay
                .handle(press(STUDENT, CallbackAction::Reply(QuestionId(1))))
                .await,
            Some(CallbackAnswer::alert(copy::NOT_A_RESPONDER_ALERT))
        );
        assert_eq!(
            f.relay
                .handle(press(TEACHER_A, CallbackAction::AskQuestion))
                .await,
            Some(CallbackAnswer::alert(copy::RESPONDER_CANNOT_ASK_ALERT))
        );
        assert_eq!(
            f.relay
                .handle(press(TEACHER_A, CallbackAction::Reply(QuestionId(77))))
                .await,
            Some(CallbackAnswer::alert(copy::QUESTION_NOT_FOUND_ALERT))
        );
        assert_eq!(
            f.relay
                .handle(InboundEvent::action(sender(STUDENT), "bogus"))
                .await,
            Some(CallbackAnswer::alert(copy::UNKNOWN_ACTION_ALERT))
        );
    }

    #[tokio::test]
    async fn muted_requester_is_ignored() {
        let f = fixture();
        f.relay
            .router()
            .mute_requester(RequesterId(STUDENT))
            .await
            .unwrap();
        assert_eq!(
            f.relay
                .handle(press(STUDENT, CallbackAction::AskQuestion))
                .await,
            None
        );
        f.relay.handle(text(STUDENT, "salom")).await;
        assert!(f.outbound.take().is_empty());
    }

    #[tokio::test]
    async fn photo_question_keeps_media() {
        let f = fixture();
        f.relay.handle(press(STUDENT, CallbackAction::AskQuestion)).await;
        f.outbound.take();
        f.relay
            .handle(InboundEvent::from_content(
                sender(STUDENT),
                Content::photo("AgACphoto", Some("5-misol".into())),
            ))
            .await;
        let sent = f.outbound.take();
        let notice = sent.iter().find(|m| m.to == TEACHER_A).unwrap();
        match &notice.body {
            OutboundBody::Media { media, caption } => {
                assert_eq!(media.file_id, "AgACphoto");
                assert!(caption.as_deref().unwrap_or_default().ends_with("5-misol"));
            },
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[tokio::test]
    async fn media_question_is_echoed_before_the_answer() {
        let f = fixture();
        f.relay.handle(press(STUDENT, CallbackAction::AskQuestion)).await;
        f.relay
            .handle(InboundEvent::from_content(
                sender(STUDENT),
                Content::video("vid-1", None),
            ))
            .await;
        f.relay
            .handle(press(TEACHER_B, CallbackAction::Reply(QuestionId(1))))
            .await;
        f.outbound.take();

        f.relay.handle(text(TEACHER_B, "ko'rdim")).await;
        let sent = f.outbound.take();
        assert_eq!(sent.len(), 3);
        assert!(matches!(sent[0].body, OutboundBody::Media { .. }));
        assert_eq!(sent[0].to, STUDENT);
        assert!(body_text(&sent[1]).contains("ko'rdim"));
        assert_eq!(sent[2].to, TEACHER_B);
    }

    #[tokio::test]
    async fn dashboard_reply_sends_and_marks_answered() {
        let f = fixture();
        let id = ask(&f, "savol").await;
        f.relay
            .reply_from_dashboard(RequesterId(STUDENT), "Yaxshi savol")
            .await
            .unwrap();
        let sent = f.outbound.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(body_text(&sent[0]), "👨‍🏫 Ustoz :\n\nYaxshi savol");

        let questions = f.relay.router().list_active_questions().await.unwrap();
        assert!(questions.iter().any(|q| q.question_id == id && q.answered));

        f.relay
            .router()
            .mute_requester(RequesterId(STUDENT))
            .await
            .unwrap();
        assert!(matches!(
            f.relay
                .reply_from_dashboard(RequesterId(STUDENT), "yana")
                .await,
            Err(DashboardReplyError::Muted(_))
        ));
    }

    #[tokio::test]
    async fn diagnostics_commands_answer_anyone() {
        let f = fixture();
        f.relay.handle(text(STUDENT, "/myid")).await;
        f.relay.handle(text(TEACHER_A, "/status")).await;
        let sent = f.outbound.take();
        assert!(body_text(&sent[0]).contains("User ID: 42"));
        assert!(body_text(&sent[1]).contains("500, 501"));
    }
}
