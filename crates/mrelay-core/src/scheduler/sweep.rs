//! Background sweep that reclaims slots from dead pipeline tasks.
//!
//! A runner normally releases its slot itself when it finishes. If the task
//! panics, the release never happens and the slot would leak forever. The
//! sweep finds tasks whose join handle reports finished while the job is
//! still registered as active, waits out a grace period, then releases the
//! slot and admits the owner's next queued job.

use std::sync::Arc;
use std::time::Duration;

use crate::job::JobId;

use super::{release_slot, JobScheduler};

impl JobScheduler {
    /// One sweep pass. Returns the ids whose slots were reclaimed.
    /// Public for tests; production uses [`spawn_sweeper`].
    pub fn sweep_dead_jobs(self: &Arc<Self>, grace: Duration) -> Vec<JobId> {
        let mut reclaimed = Vec::new();
        let mut admit = Vec::new();
        {
            let mut state = self.state.lock().unwrap();
            let dead: Vec<JobId> = state
                .active
                .iter()
                .filter(|(_, job)| {
                    job.admitted_at.elapsed() >= grace
                        && job.handle.as_ref().is_some_and(|h| h.is_finished())
                })
                .map(|(&id, _)| id)
                .collect();
            for id in dead {
                tracing::warn!(job_id = id, "pipeline task died without releasing its slot; reclaiming");
                if let Some(pending) = release_slot(&mut state, id) {
                    admit.push(pending);
                }
                reclaimed.push(id);
            }
        }
        for pending in admit {
            let (id, user_id) = (pending.id, pending.user_id);
            self.spawn_job(pending);
            tracing::info!(job_id = id, user_id, "queued job admitted after sweep");
        }
        reclaimed
    }
}

/// Spawns the periodic sweep task. Runs for the life of the process.
pub fn spawn_sweeper(sched: Arc<JobScheduler>, interval: Duration, grace: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let reclaimed = sched.sweep_dead_jobs(grace);
            if !reclaimed.is_empty() {
                tracing::warn!(count = reclaimed.len(), "sweep reclaimed dead job slots");
            }
        }
    });
}
