//! Volatile relay state: pending questions, requester sessions, responder
//! claims, rate gates, requester profiles and the mute list.
//!
//! All access goes through the [`RelayStore`] trait. Two backends ship:
//! [`MemoryStore`] (process memory, the default) and [`SqliteStore`]
//! (one key/value table using the layout in [`key`]).

pub mod key;
pub mod memory;
pub mod model;
pub mod sqlite;
pub mod store;

pub use {
    key::StoreKey,
    memory::MemoryStore,
    model::{Question, RateGate, RequesterSession, ResponderClaim, SealedContent},
    sqlite::SqliteStore,
    store::{RateStamp, RelayStore},
};
