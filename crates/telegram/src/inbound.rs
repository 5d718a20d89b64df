//! Platform update → transport-neutral [`InboundEvent`].

use teloxide::types::{CallbackQuery, Message, User};

use {
    ustoz_channels::{InboundEvent, Sender},
    ustoz_common::Content,
};

fn sender(user: &User, chat_id: i64) -> Option<Sender> {
    Some(Sender {
        id: i64::try_from(user.id.0).ok()?,
        chat_id,
        display_name: user.full_name(),
        handle: user.username.clone(),
    })
}

/// Text, or the largest photo size, or a video. Captions ride along with media.
pub fn content_of(msg: &Message) -> Option<Content> {
    if let Some(text) = msg.text() {
        return Some(Content::text(text));
    }
    let caption = msg.caption().map(str::to_owned);
    if let Some(largest) = msg.photo().and_then(<[_]>::last) {
        return Some(Content::photo(largest.file.id.to_string(), caption));
    }
    msg.video()
        .map(|video| Content::video(video.file.id.to_string(), caption))
}

/// Map a message. Unsupported kinds (stickers, voice, service messages) and
/// messages without a human sender yield `None`.
pub fn from_message(msg: &Message) -> Option<InboundEvent> {
    let sender = sender(msg.from.as_ref()?, msg.chat.id.0)?;
    let content = content_of(msg)?;
    Some(InboundEvent::from_content(sender, content))
}

/// Map a button press. Queries without callback data yield `None`.
///
/// The relay runs in private chats, so replies go to the presser's own id.
pub fn from_callback(query: &CallbackQuery) -> Option<InboundEvent> {
    let token = query.data.clone()?;
    let chat_id = i64::try_from(query.from.id.0).ok()?;
    let sender = sender(&query.from, chat_id)?;
    Some(InboundEvent::action(sender, token))
}
