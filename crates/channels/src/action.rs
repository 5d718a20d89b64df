use ustoz_common::QuestionId;

/// Button verbs, encoded as opaque callback tokens.
///
/// Tokens: `ask_question`, `cancel_question`, `reply_{id}`, `cancel_reply_{id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    AskQuestion,
    CancelQuestion,
    Reply(QuestionId),
    CancelReply(QuestionId),
}

impl CallbackAction {
    pub fn encode(self) -> String {
        match self {
            Self::AskQuestion => "ask_question".into(),
            Self::CancelQuestion => "cancel_question".into(),
            Self::Reply(id) => format!("reply_{id}"),
            Self::CancelReply(id) => format!("cancel_reply_{id}"),
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "ask_question" => return Some(Self::AskQuestion),
            "cancel_question" => return Some(Self::CancelQuestion),
            _ => {},
        }
        if let Some(id) = token.strip_prefix("cancel_reply_") {
            return id.parse().ok().map(|n| Self::CancelReply(QuestionId(n)));
        }
        token
            .strip_prefix("reply_")
            .and_then(|id| id.parse().ok())
            .map(|n| Self::Reply(QuestionId(n)))
    }
}
