//! Telegram transport for the relay, built on teloxide long polling.
//!
//! [`TelegramBot`] owns the bot handle. It hands out a [`TelegramOutbound`]
//! for the relay to send through, and runs the update dispatcher that feeds
//! inbound events back into the relay.

pub mod bot;
pub mod inbound;
pub mod outbound;

pub use {bot::TelegramBot, outbound::TelegramOutbound};
