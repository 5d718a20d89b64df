use {
    async_trait::async_trait,
    teloxide::{
        ApiError, RequestError,
        payloads::setters::*,
        prelude::*,
        types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile},
    },
};

use {
    ustoz_channels::{
        ActionButton, ChannelHealthSnapshot, ChannelOutbound, ChannelStatus, DeliveryError,
        OutboundBody, OutboundMessage,
    },
    ustoz_common::{MediaKind, MediaRef},
};

/// Sends relay output through the Bot API.
#[derive(Clone)]
pub struct TelegramOutbound {
    bot: Bot,
}

impl TelegramOutbound {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

/// One button per row, or no keyboard at all.
pub fn keyboard(actions: &[ActionButton]) -> Option<InlineKeyboardMarkup> {
    if actions.is_empty() {
        return None;
    }
    Some(InlineKeyboardMarkup::new(actions.iter().map(|a| {
        vec![InlineKeyboardButton::callback(
            a.label.clone(),
            a.token.clone(),
        )]
    })))
}

/// Sort a Bot API failure into the relay's delivery taxonomy.
pub fn classify(recipient: i64, error: RequestError) -> DeliveryError {
    match error {
        RequestError::Api(
            ApiError::BotBlocked
            | ApiError::BotKicked
            | ApiError::ChatNotFound
            | ApiError::UserDeactivated,
        ) => DeliveryError::Blocked { recipient },
        RequestError::Api(api) => DeliveryError::Rejected {
            recipient,
            reason: api.to_string(),
        },
        other => DeliveryError::Transport {
            recipient,
            reason: other.to_string(),
        },
    }
}

fn input_file(media: &MediaRef) -> InputFile {
    InputFile::file_id(media.file_id.clone())
}

impl TelegramOutbound {
    async fn dispatch(&self, message: &OutboundMessage) -> Result<(), RequestError> {
        let chat = ChatId(message.to);
        let markup = keyboard(&message.actions);
        match &message.body {
            OutboundBody::Text(text) => {
                let mut request = self.bot.send_message(chat, text.clone());
                if let Some(markup) = markup {
                    request = request.reply_markup(markup);
                }
                request.await?;
            },
            OutboundBody::Media { media, caption } => match media.kind {
                MediaKind::Photo => {
                    let mut request = self.bot.send_photo(chat, input_file(media));
                    if let Some(caption) = caption {
                        request = request.caption(caption.clone());
                    }
                    if let Some(markup) = markup {
                        request = request.reply_markup(markup);
                    }
                    request.await?;
                },
                MediaKind::Video => {
                    let mut request = self.bot.send_video(chat, input_file(media));
                    if let Some(caption) = caption {
                        request = request.caption(caption.clone());
                    }
                    if let Some(markup) = markup {
                        request = request.reply_markup(markup);
                    }
                    request.await?;
                },
            },
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelOutbound for TelegramOutbound {
    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        self.dispatch(message)
            .await
            .map_err(|e| classify(message.to, e))
    }
}

#[async_trait]
impl ChannelStatus for TelegramOutbound {
    async fn probe(&self) -> anyhow::Result<ChannelHealthSnapshot> {
        match self.bot.get_me().await {
            Ok(me) => Ok(ChannelHealthSnapshot {
                connected: true,
                account: me.user.username.clone(),
                details: None,
            }),
            Err(e) => Ok(ChannelHealthSnapshot {
                connected: false,
                account: None,
                details: Some(e.to_string()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        rstest::rstest,
        teloxide::types::InlineKeyboardButtonKind,
        ustoz_channels::CallbackAction,
        ustoz_common::QuestionId,
    };

    #[test]
    fn keyboard_puts_each_button_on_its_own_row() {
        let markup = keyboard(&[
            ActionButton::new("Reply", CallbackAction::Reply(QuestionId(4))),
            ActionButton::new("Cancel", CallbackAction::CancelReply(QuestionId(4))),
        ])
        .unwrap();
        assert_eq!(markup.inline_keyboard.len(), 2);
        assert_eq!(markup.inline_keyboard[0][0].text, "Reply");
        assert_eq!(
            markup.inline_keyboard[1][0].kind,
            InlineKeyboardButtonKind::CallbackData("cancel_reply_4".into())
        );
        assert!(keyboard(&[]).is_none());
    }

    #[rstest]
    #[case(ApiError::BotBlocked)]
    #[case(ApiError::ChatNotFound)]
    #[case(ApiError::UserDeactivated)]
    fn unreachable_recipients_are_blocked(#[case] api: ApiError) {
        assert_eq!(
            classify(7, RequestError::Api(api)),
            DeliveryError::Blocked { recipient: 7 }
        );
    }

    #[test]
    fn other_api_errors_are_rejections() {
        let error = classify(7, RequestError::Api(ApiError::MessageTextIsEmpty));
        assert!(matches!(error, DeliveryError::Rejected { recipient: 7, .. }));
    }
}
