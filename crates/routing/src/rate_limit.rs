//! Per-requester cooldown gate.
//!
//! A requester may submit one question per window `W`:
//! `can_submit = now - last_sent_at >= W` and
//! `time_remaining = max(0, W - (now - last_sent_at))`.

use std::{sync::Arc, time::Duration};

use {
    ustoz_common::RequesterId,
    ustoz_sessions::{RateStamp, RelayStore},
};

use crate::clock::{self, Clock};

pub struct RateLimiter {
    store: Arc<dyn RelayStore>,
    clock: Arc<dyn Clock>,
    window_ms: u64,
}

/// Gate verdict. `Limited` carries the wait, rounded up to whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Limited { retry_after_secs: u64 },
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RelayStore>, clock: Arc<dyn Clock>, window: Duration) -> Self {
        Self {
            store,
            clock,
            window_ms: clock::millis(window),
        }
    }

    /// Milliseconds until the requester may submit again (0 if allowed now).
    pub async fn time_remaining_ms(&self, id: RequesterId) -> anyhow::Result<u64> {
        let now = self.clock.now_ms();
        Ok(match self.store.get_rate_gate(id).await? {
            Some(gate) => remaining(self.window_ms, now, gate.last_sent_at),
            None => 0,
        })
    }

    pub async fn can_submit(&self, id: RequesterId) -> anyhow::Result<bool> {
        Ok(self.time_remaining_ms(id).await? == 0)
    }

    /// Check without stamping.
    pub async fn check(&self, id: RequesterId) -> anyhow::Result<Admission> {
        Ok(admission(self.time_remaining_ms(id).await?))
    }

    /// Check and, if allowed, stamp `now` in one atomic store step.
    pub async fn acquire(&self, id: RequesterId) -> anyhow::Result<Admission> {
        let now = self.clock.now_ms();
        Ok(
            match self
                .store
                .try_stamp_rate_gate(id, now, self.window_ms)
                .await?
            {
                RateStamp::Stamped => Admission::Allowed,
                RateStamp::Blocked { last_sent_at } => {
                    admission(remaining(self.window_ms, now, last_sent_at))
                },
            },
        )
    }
}

fn remaining(window_ms: u64, now: u64, last_sent_at: u64) -> u64 {
    window_ms.saturating_sub(now.saturating_sub(last_sent_at))
}

fn admission(remaining_ms: u64) -> Admission {
    if remaining_ms == 0 {
        Admission::Allowed
    } else {
        Admission::Limited {
            retry_after_secs: remaining_ms.div_ceil(1_000),
        }
    }
}
