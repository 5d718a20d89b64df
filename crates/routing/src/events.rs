use {
    serde::Serialize,
    ustoz_common::{QuestionId, RequesterId},
};

use crate::observe::QuestionView;

/// State change pushed to live observers after it has been committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum RelayEvent {
    QuestionCreated(QuestionView),
    #[serde(rename_all = "camelCase")]
    QuestionAnswered {
        question_id: QuestionId,
        requester_id: RequesterId,
    },
    #[serde(rename_all = "camelCase")]
    RequesterMuted { requester_id: RequesterId },
}

impl RelayEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::QuestionCreated(_) => "questionCreated",
            Self::QuestionAnswered { .. } => "questionAnswered",
            Self::RequesterMuted { .. } => "requesterMuted",
        }
    }
}
