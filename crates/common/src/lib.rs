//! Shared identifiers and message content used across the relay crates.

pub mod types;

pub use types::{
    Content, MediaKind, MediaRef, QuestionId, RequesterId, RequesterProfile, ResponderId, now_ms,
};
