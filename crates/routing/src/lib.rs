//! Session routing: the requester prompt/submit cycle, responder claims and
//! replies, per-requester rate limiting, expiry sweeps, and the read model
//! served to observers.

pub mod clock;
pub mod error;
pub mod events;
pub mod observe;
pub mod rate_limit;
pub mod router;
pub mod sweep;

pub use {
    clock::{Clock, ManualClock, SystemClock},
    error::RouterError,
    events::RelayEvent,
    observe::{QuestionView, RequesterView},
    rate_limit::{Admission, RateLimiter},
    router::{OpenedQuestion, ReplyDelivery, RouterSettings, SessionRouter, SubmittedQuestion},
    sweep::SweepReport,
};
