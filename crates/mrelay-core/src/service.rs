//! Front door for submissions: authorization, URL sanity, admission notices.
//!
//! Sits between whatever receives user commands (chat updates, the control
//! socket) and the scheduler. Unauthorized or malformed submissions are
//! answered here and never reach the scheduler.

use std::sync::Arc;

use url::Url;

use crate::gate::AccessGate;
use crate::job::{JobId, UserId};
use crate::scheduler::{Admission, CancelOutcome, JobScheduler};
use crate::transport::ChatTransport;

pub struct RelayService {
    gate: Arc<dyn AccessGate>,
    scheduler: Arc<JobScheduler>,
    transport: Arc<dyn ChatTransport>,
}

impl RelayService {
    pub fn new(
        gate: Arc<dyn AccessGate>,
        scheduler: Arc<JobScheduler>,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        Self {
            gate,
            scheduler,
            transport,
        }
    }

    /// Handles one submission end to end: gate check, URL check, admission.
    /// Returns `None` when the submission was rejected before admission.
    pub async fn submit(&self, user: UserId, source_url: &str) -> Option<Admission> {
        if !self.gate.is_authorized(user).await {
            tracing::info!(user, "submission rejected: not authorized");
            self.notify(user, "⛔ You are not authorized to use this service.")
                .await;
            return None;
        }

        if !is_plausible_url(source_url) {
            tracing::info!(user, url = source_url, "submission rejected: not a URL");
            self.notify(user, "❓ That doesn't look like a link. Send an http(s) URL.")
                .await;
            return None;
        }

        let admission = self.scheduler.submit(user, source_url);
        if let Admission::Queued { position, .. } = admission {
            self.notify(
                user,
                &format!("⏳ You're at your job limit; queued at position {position}."),
            )
            .await;
        }
        Some(admission)
    }

    /// Cancels one job by id. An active job's pipeline reports the
    /// cancellation itself; a queued job has no pipeline, so the confirmation
    /// is sent here. Nothing ends in silence.
    pub async fn cancel_job(&self, user: UserId, id: JobId) -> bool {
        match self.scheduler.cancel_job(id) {
            CancelOutcome::ActiveFlagged => true,
            CancelOutcome::QueuedRemoved => {
                self.notify(user, &format!("🚫 Job {id} cancelled.")).await;
                true
            }
            CancelOutcome::Unknown => {
                self.notify(user, "❓ No such job.").await;
                false
            }
        }
    }

    /// Cancels everything a user owns and reports the tally.
    pub async fn cancel_all(&self, user: UserId) -> (usize, usize) {
        let (flagged, purged) = self.scheduler.cancel_user(user);
        if flagged == 0 && purged == 0 {
            self.notify(user, "Nothing to cancel.").await;
        } else if purged > 0 {
            self.notify(
                user,
                &format!("🚫 Cancelling {flagged} active job(s); dropped {purged} queued."),
            )
            .await;
        }
        (flagged, purged)
    }

    async fn notify(&self, user: UserId, text: &str) {
        if let Err(e) = self.transport.send_status(user, text).await {
            tracing::warn!(user, "notice delivery failed: {e}");
        }
    }
}

fn is_plausible_url(raw: &str) -> bool {
    match Url::parse(raw) {
        Ok(u) => matches!(u.scheme(), "http" | "https"),
        Err(_) => false,
    }
}
