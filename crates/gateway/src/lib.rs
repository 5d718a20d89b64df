//! Observation surface: the dashboard's HTTP read model, write endpoints,
//! and a WebSocket feed of relay events.
//!
//! Lifecycle:
//! 1. Build [`state::GatewayState`] around the shared router and relay
//! 2. Resolve dashboard auth
//! 3. Serve HTTP + WebSocket until the shutdown token fires

pub mod api;
pub mod auth;
pub mod server;
pub mod state;
pub mod ws;

#[cfg(test)]
pub(crate) mod testing;
