//! Relay gateway between a messaging transport and the session router.
//!
//! Transports translate their updates into [`InboundEvent`]s and implement
//! [`ChannelOutbound`] for sends; [`Relay`] does everything in between.

pub mod action;
pub mod copy;
pub mod error;
pub mod message;
pub mod plugin;
pub mod relay;

pub use {
    action::CallbackAction,
    error::DeliveryError,
    message::{ActionButton, Command, InboundEvent, OutboundBody, OutboundMessage, Payload, Sender},
    plugin::{ChannelHealthSnapshot, ChannelOutbound, ChannelStatus},
    relay::{CallbackAnswer, DashboardReplyError, Relay},
};
