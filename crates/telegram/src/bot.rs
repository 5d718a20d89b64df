use std::sync::Arc;

use {
    secrecy::{ExposeSecret, SecretString},
    teloxide::{payloads::setters::*, prelude::*, types::CallbackQuery},
    tokio_util::sync::CancellationToken,
    ustoz_channels::Relay,
};

use crate::{inbound, outbound::TelegramOutbound};

/// The long-polling bot. Cheap to clone.
#[derive(Clone)]
pub struct TelegramBot {
    bot: Bot,
}

impl TelegramBot {
    pub fn new(token: &SecretString) -> Self {
        Self {
            bot: Bot::new(token.expose_secret()),
        }
    }

    pub fn outbound(&self) -> TelegramOutbound {
        TelegramOutbound::new(self.bot.clone())
    }

    /// Poll for updates and feed them to `relay` until `cancel` fires.
    ///
    /// In-flight handlers are allowed to finish before this returns.
    pub async fn run(&self, relay: Arc<Relay>, cancel: CancellationToken) {
        let handler = dptree::entry()
            .branch(Update::filter_message().endpoint(on_message))
            .branch(Update::filter_callback_query().endpoint(on_callback));

        let mut dispatcher = Dispatcher::builder(self.bot.clone(), handler)
            .dependencies(dptree::deps![relay])
            .default_handler(|update| async move {
                tracing::trace!(update_id = ?update.id, "ignoring update");
            })
            .build();

        let shutdown = dispatcher.shutdown_token();
        tracing::info!("telegram polling started");
        let dispatch = dispatcher.dispatch();
        tokio::pin!(dispatch);

        tokio::select! {
            () = &mut dispatch => {
                tracing::warn!("telegram dispatcher stopped on its own");
                return;
            },
            () = cancel.cancelled() => {},
        }

        match shutdown.shutdown() {
            Ok(done) => {
                tokio::join!(dispatch, done);
            },
            Err(_) => tracing::debug!("dispatcher was idle at shutdown"),
        }
        tracing::info!("telegram polling stopped");
    }
}

async fn on_message(msg: Message, relay: Arc<Relay>) -> ResponseResult<()> {
    match inbound::from_message(&msg) {
        Some(event) => {
            relay.handle(event).await;
        },
        None => tracing::debug!(chat_id = msg.chat.id.0, "unsupported message skipped"),
    }
    Ok(())
}

async fn on_callback(bot: Bot, query: CallbackQuery, relay: Arc<Relay>) -> ResponseResult<()> {
    let answer = match inbound::from_callback(&query) {
        Some(event) => relay.handle(event).await,
        None => None,
    };

    // Every press must be answered or the client keeps spinning.
    let mut request = bot.answer_callback_query(query.id.clone());
    if let Some(answer) = answer {
        request = request.text(answer.text).show_alert(answer.alert);
    }
    if let Err(e) = request.await {
        tracing::warn!(error = %e, "callback answer failed");
    }
    Ok(())
}
