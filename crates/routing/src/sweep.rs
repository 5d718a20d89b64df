use std::{sync::Arc, time::Duration};

use {
    tokio::{task::JoinHandle, time::MissedTickBehavior},
    tokio_util::sync::CancellationToken,
};

use crate::{clock, error::Result, router::SessionRouter};

/// What one sweep removed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub sessions: usize,
    pub claims: usize,
    pub questions: usize,
    pub rate_gates: usize,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.sessions + self.claims + self.questions + self.rate_gates
    }
}

impl SessionRouter {
    /// Evict everything past its horizon.
    ///
    /// Uses the same conditional per-key removals as foreground calls, so it
    /// can run at any time and twice in a row is harmless.
    pub async fn sweep(&self) -> Result<SweepReport> {
        let mut report = SweepReport::default();
        let now = self.clock.now_ms();
        let cutoff = |ttl: Duration| now.saturating_sub(clock::millis(ttl));

        let session_cutoff = cutoff(self.settings.session_ttl);
        for session in self.store.list_sessions().await? {
            if session.entered_at < session_cutoff
                && self
                    .store
                    .expire_session(session.requester_id, session_cutoff)
                    .await?
            {
                report.sessions += 1;
            }
        }

        let claim_cutoff = cutoff(self.settings.claim_ttl);
        for claim in self.store.list_claims().await? {
            if claim.claimed_at < claim_cutoff
                && self
                    .store
                    .expire_claim(claim.responder_id, claim_cutoff)
                    .await?
            {
                report.claims += 1;
            }
        }

        let question_cutoff = cutoff(self.settings.question_ttl);
        for question in self.store.list_questions().await? {
            if question.created_at < question_cutoff
                && self
                    .store
                    .expire_question(question.id, question_cutoff)
                    .await?
            {
                report.questions += 1;
            }
        }
        report.questions += self.enforce_history_cap().await?;

        // A gate older than the cooldown no longer limits anyone.
        let gate_cutoff = cutoff(self.settings.cooldown);
        for gate in self.store.list_rate_gates().await? {
            if gate.last_sent_at < gate_cutoff
                && self
                    .store
                    .expire_rate_gate(gate.requester_id, gate_cutoff)
                    .await?
            {
                report.rate_gates += 1;
            }
        }

        Ok(report)
    }

    /// Run [`sweep`](Self::sweep) every `sweep_interval` until `cancel` fires.
    pub fn spawn_sweeper(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let router = Arc::clone(self);
        let period = self.settings.sweep_interval.max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; nothing can be stale yet.
            interval.tick().await;
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = interval.tick() => match router.sweep().await {
                        Ok(report) if report.total() > 0 => {
                            tracing::info!(
                                sessions = report.sessions,
                                claims = report.claims,
                                questions = report.questions,
                                rate_gates = report.rate_gates,
                                "sweep evicted expired entries"
                            );
                        },
                        Ok(_) => tracing::trace!("sweep found nothing to evict"),
                        Err(e) => tracing::error!(error = %e, "sweep failed"),
                    },
                }
            }
            tracing::debug!("sweeper stopped");
        })
    }
}
