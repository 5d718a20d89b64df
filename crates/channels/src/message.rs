use ustoz_common::{Content, MediaRef};

use crate::action::CallbackAction;

// ── Inbound ──────────────────────────────────────────────────────────────────

/// Who sent an inbound event, as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub id: i64,
    /// Conversation the event arrived in. Equal to `id` in private chats.
    pub chat_id: i64,
    pub display_name: String,
    pub handle: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    MyId,
    Status,
}

impl Command {
    /// Parse `/start`, `/myid`, `/status` (optionally `@botname`-qualified).
    /// Anything else is not a command and should be treated as content.
    pub fn parse(text: &str) -> Option<Self> {
        let first = text.split_whitespace().next()?;
        let name = first.strip_prefix('/')?;
        let name = name.split_once('@').map_or(name, |(n, _)| n);
        match name.to_ascii_lowercase().as_str() {
            "start" => Some(Self::Start),
            "myid" => Some(Self::MyId),
            "status" => Some(Self::Status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Command(Command),
    Message(Content),
    /// A button press carrying its opaque callback token.
    Action { token: String },
}

/// Transport-neutral inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub sender: Sender,
    pub payload: Payload,
}

impl InboundEvent {
    /// Classify plain content, recognising commands in text.
    pub fn from_content(sender: Sender, content: Content) -> Self {
        let payload = match &content {
            Content::Text { text } => match Command::parse(text) {
                Some(command) => Payload::Command(command),
                None => Payload::Message(content),
            },
            Content::Media { .. } => Payload::Message(content),
        };
        Self { sender, payload }
    }

    pub fn action(sender: Sender, token: impl Into<String>) -> Self {
        Self {
            sender,
            payload: Payload::Action {
                token: token.into(),
            },
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> String {
        match &self.payload {
            Payload::Command(c) => format!("command:{c:?}").to_lowercase(),
            Payload::Message(Content::Text { .. }) => "text".into(),
            Payload::Message(Content::Media { media, .. }) => format!("{:?}", media.kind).to_lowercase(),
            Payload::Action { token } => format!("action:{token}"),
        }
    }
}

// ── Outbound ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionButton {
    pub label: String,
    pub token: String,
}

impl ActionButton {
    pub fn new(label: impl Into<String>, action: CallbackAction) -> Self {
        Self {
            label: label.into(),
            token: action.encode(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundBody {
    Text(String),
    Media {
        media: MediaRef,
        caption: Option<String>,
    },
}

impl OutboundBody {
    /// Prefix `header` to the content: text is appended, media keeps its
    /// reference and gets the header (plus caption) as its caption.
    pub fn framed(header: &str, content: &Content) -> Self {
        match content {
            Content::Text { text } => Self::Text(format!("{header}\n{text}")),
            Content::Media { media, caption } => Self::Media {
                media: media.clone(),
                caption: Some(match caption {
                    Some(c) => format!("{header}\n{c}"),
                    None => header.to_string(),
                }),
            },
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            Self::Media { caption, .. } => caption.as_deref(),
        }
    }
}

/// One send instruction for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub to: i64,
    pub body: OutboundBody,
    /// Rendered one button per row.
    pub actions: Vec<ActionButton>,
}

impl OutboundMessage {
    pub fn text(to: i64, text: impl Into<String>) -> Self {
        Self {
            to,
            body: OutboundBody::Text(text.into()),
            actions: Vec::new(),
        }
    }

    pub fn new(to: i64, body: OutboundBody) -> Self {
        Self {
            to,
            body,
            actions: Vec::new(),
        }
    }

    pub fn with_action(mut self, button: ActionButton) -> Self {
        self.actions.push(button);
        self
    }
}
