use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use {
    tokio_util::sync::CancellationToken,
    ustoz_channels::Relay,
    ustoz_routing::SessionRouter,
};

use crate::auth::ResolvedAuth;

/// Shared gateway runtime state, wrapped in Arc for use across handlers.
pub struct GatewayState {
    pub router: Arc<SessionRouter>,
    /// Used for dashboard replies, which go out through the transport.
    pub relay: Arc<Relay>,
    pub auth: ResolvedAuth,
    /// Server version string.
    pub version: String,
    /// Fired on process shutdown; live feeds close when it does.
    pub shutdown: CancellationToken,
    clients: AtomicUsize,
}

impl GatewayState {
    pub fn new(relay: Arc<Relay>, auth: ResolvedAuth, shutdown: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            router: Arc::clone(relay.router()),
            relay,
            auth,
            version: env!("CARGO_PKG_VERSION").to_string(),
            shutdown,
            clients: AtomicUsize::new(0),
        })
    }

    /// Number of connected live-feed clients.
    pub fn client_count(&self) -> usize {
        self.clients.load(Ordering::Relaxed)
    }

    pub(crate) fn client_connected(&self) -> usize {
        self.clients.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn client_disconnected(&self) {
        self.clients.fetch_sub(1, Ordering::Relaxed);
    }
}
