use {
    serde::{Deserialize, Serialize},
    ustoz_common::{Content, MediaRef, QuestionId, RequesterId, ResponderId},
    ustoz_vault::{Codec, CryptoError, Envelope},
};

/// [`Content`] as kept at rest: text and captions are sealed, media ids are not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SealedContent {
    Text { text: Envelope },
    Media {
        media: MediaRef,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<Envelope>,
    },
}

impl SealedContent {
    pub fn seal(codec: &Codec, content: &Content) -> Result<Self, CryptoError> {
        Ok(match content {
            Content::Text { text } => Self::Text {
                text: codec.seal(text)?,
            },
            Content::Media { media, caption } => Self::Media {
                media: media.clone(),
                caption: caption.as_deref().map(|c| codec.seal(c)).transpose()?,
            },
        })
    }

    /// Open for display. Undecryptable parts become the codec placeholder.
    pub fn open(&self, codec: &Codec) -> Content {
        match self {
            Self::Text { text } => Content::Text {
                text: codec.open_or_placeholder(text),
            },
            Self::Media { media, caption } => Content::Media {
                media: media.clone(),
                caption: caption.as_ref().map(|c| codec.open_or_placeholder(c)),
            },
        }
    }
}

/// One inbound unit of content awaiting a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub requester_id: RequesterId,
    pub requester_display_name: String,
    #[serde(default)]
    pub requester_handle: Option<String>,
    pub body: SealedContent,
    pub created_at: u64,
    #[serde(default)]
    pub answered: bool,
    #[serde(default)]
    pub claimed_by: Option<ResponderId>,
}

/// A requester that pressed "ask" and has not yet sent the question.
///
/// Absence of a record is the idle phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequesterSession {
    pub requester_id: RequesterId,
    pub entered_at: u64,
}

/// A responder's binding to the question it is currently answering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponderClaim {
    pub responder_id: ResponderId,
    pub question_id: QuestionId,
    /// Copy of the question taken at claim time.
    pub snapshot: Question,
    pub claimed_at: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateGate {
    pub requester_id: RequesterId,
    pub last_sent_at: u64,
}
