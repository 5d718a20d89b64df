use {anyhow::Result, async_trait::async_trait};

use crate::{error::DeliveryError, message::OutboundMessage};

/// Send messages through a transport.
#[async_trait]
pub trait ChannelOutbound: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError>;
}

/// Probe transport health.
#[async_trait]
pub trait ChannelStatus: Send + Sync {
    async fn probe(&self) -> Result<ChannelHealthSnapshot>;
}

/// Transport health snapshot.
#[derive(Debug, Clone)]
pub struct ChannelHealthSnapshot {
    pub connected: bool,
    /// Account name as the platform knows it (e.g. the bot username).
    pub account: Option<String>,
    pub details: Option<String>,
}
