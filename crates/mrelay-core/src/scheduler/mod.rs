//! Job admission, per-user concurrency caps, and queueing.
//!
//! The scheduler owns all cross-job shared state (active set + per-user FIFO
//! queues) behind a single mutex, so two jobs finishing concurrently cannot
//! lose updates. Admitted jobs run as tokio tasks through the `JobRunner`
//! seam; the relay pipeline implements it in production.

mod sweep;

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::job::{CancelFlag, JobId, UserId};

/// Everything a pipeline run needs to execute one admitted job.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub id: JobId,
    pub user_id: UserId,
    pub source_url: String,
    pub cancel: CancelFlag,
}

/// Executes one admitted job to its terminal state. Must not leak errors;
/// the scheduler only learns "finished" (slot release is unconditional).
#[async_trait]
pub trait JobRunner: Send + Sync + 'static {
    async fn run(&self, job: JobContext);
}

/// Outcome of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A slot was free; the job is running.
    Started(JobId),
    /// The user is at their cap; queued behind `position - 1` other jobs.
    Queued { id: JobId, position: usize },
}

/// What a cancellation request found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The job was active; its flag is set and the running pipeline will
    /// report the cancellation itself.
    ActiveFlagged,
    /// The job was still queued and has been removed. No pipeline ever ran,
    /// so the caller must tell the user.
    QueuedRemoved,
    /// No active or queued job with that id.
    Unknown,
}

struct PendingJob {
    id: JobId,
    user_id: UserId,
    source_url: String,
    cancel: CancelFlag,
}

struct ActiveJob {
    user_id: UserId,
    cancel: CancelFlag,
    admitted_at: Instant,
    /// Set shortly after spawn; `None` only in the brief window before the
    /// handle is recorded (or when the task already finished).
    handle: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct UserQueue {
    active: Vec<JobId>,
    queue: VecDeque<PendingJob>,
}

#[derive(Default)]
struct SchedState {
    next_id: JobId,
    active: HashMap<JobId, ActiveJob>,
    users: HashMap<UserId, UserQueue>,
}

/// Owns the active/queued job sets and enforces the per-user cap.
pub struct JobScheduler {
    max_per_user: usize,
    runner: Arc<dyn JobRunner>,
    state: Mutex<SchedState>,
}

impl JobScheduler {
    pub fn new(max_per_user: usize, runner: Arc<dyn JobRunner>) -> Arc<Self> {
        Arc::new(Self {
            max_per_user: max_per_user.max(1),
            runner,
            state: Mutex::new(SchedState::default()),
        })
    }

    /// Admits the job if the user has a free slot, otherwise queues it.
    pub fn submit(self: &Arc<Self>, user_id: UserId, source_url: &str) -> Admission {
        let pending = {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            let id = state.next_id;
            let pending = PendingJob {
                id,
                user_id,
                source_url: source_url.to_string(),
                cancel: CancelFlag::new(),
            };
            let slots = state.users.entry(user_id).or_default();
            if slots.active.len() >= self.max_per_user {
                slots.queue.push_back(pending);
                let position = slots.queue.len();
                tracing::info!(job_id = id, user_id, position, "job queued");
                return Admission::Queued { id, position };
            }
            register_active(&mut state, &pending);
            pending
        };
        let id = pending.id;
        self.spawn_job(pending);
        tracing::info!(job_id = id, user_id, "job admitted");
        Admission::Started(id)
    }

    /// Requests cancellation of one job. Queued jobs are removed without ever
    /// starting; active jobs see their flag at the next chunk boundary.
    pub fn cancel_job(&self, id: JobId) -> CancelOutcome {
        let mut state = self.state.lock().unwrap();
        if let Some(active) = state.active.get(&id) {
            active.cancel.request();
            tracing::info!(job_id = id, "cancellation requested for active job");
            return CancelOutcome::ActiveFlagged;
        }
        for slots in state.users.values_mut() {
            if let Some(pos) = slots.queue.iter().position(|p| p.id == id) {
                slots.queue.remove(pos);
                tracing::info!(job_id = id, "queued job removed");
                return CancelOutcome::QueuedRemoved;
            }
        }
        CancelOutcome::Unknown
    }

    /// Cancels everything a user owns: flags all active jobs and purges the
    /// pending queue. Returns (active flagged, queued purged).
    pub fn cancel_user(&self, user_id: UserId) -> (usize, usize) {
        let mut state = self.state.lock().unwrap();
        let Some(slots) = state.users.get_mut(&user_id) else {
            return (0, 0);
        };
        let purged = slots.queue.len();
        slots.queue.clear();
        let ids: Vec<JobId> = slots.active.clone();
        let flagged = ids.len();
        for id in ids {
            if let Some(active) = state.active.get(&id) {
                active.cancel.request();
            }
        }
        tracing::info!(user_id, flagged, purged, "user cancellation");
        (flagged, purged)
    }

    /// Number of currently active jobs for a user.
    pub fn active_count(&self, user_id: UserId) -> usize {
        let state = self.state.lock().unwrap();
        state.users.get(&user_id).map_or(0, |s| s.active.len())
    }

    /// Number of queued (not yet started) jobs for a user.
    pub fn queued_count(&self, user_id: UserId) -> usize {
        let state = self.state.lock().unwrap();
        state.users.get(&user_id).map_or(0, |s| s.queue.len())
    }

    /// Called by the runner wrapper when a job reaches a terminal state.
    /// Frees the slot and admits the user's queue head, if any.
    fn finish_job(self: &Arc<Self>, id: JobId) {
        let next = {
            let mut state = self.state.lock().unwrap();
            release_slot(&mut state, id)
        };
        if let Some(pending) = next {
            let (id, user_id) = (pending.id, pending.user_id);
            self.spawn_job(pending);
            tracing::info!(job_id = id, user_id, "queued job admitted");
        }
    }

    /// Spawns the runner task for an already-registered job and records its
    /// handle (used by the sweep to detect runners that died).
    fn spawn_job(self: &Arc<Self>, pending: PendingJob) {
        let ctx = JobContext {
            id: pending.id,
            user_id: pending.user_id,
            source_url: pending.source_url,
            cancel: pending.cancel,
        };
        let sched = Arc::clone(self);
        let runner = Arc::clone(&self.runner);
        let id = ctx.id;
        let handle = tokio::spawn(async move {
            runner.run(ctx).await;
            sched.finish_job(id);
        });
        let mut state = self.state.lock().unwrap();
        if let Some(active) = state.active.get_mut(&id) {
            active.handle = Some(handle);
        }
    }
}

/// Registers `pending` in the active set. Caller must spawn it afterwards.
fn register_active(state: &mut SchedState, pending: &PendingJob) {
    state.active.insert(
        pending.id,
        ActiveJob {
            user_id: pending.user_id,
            cancel: pending.cancel.clone(),
            admitted_at: Instant::now(),
            handle: None,
        },
    );
    state
        .users
        .entry(pending.user_id)
        .or_default()
        .active
        .push(pending.id);
}

/// Removes `id` from the active set and returns the owner's queue head,
/// pre-registered in the freed slot, for the caller to spawn.
fn release_slot(state: &mut SchedState, id: JobId) -> Option<PendingJob> {
    let active = state.active.remove(&id)?;
    let slots = state.users.get_mut(&active.user_id)?;
    slots.active.retain(|&a| a != id);
    let pending = slots.queue.pop_front()?;
    register_active(state, &pending);
    Some(pending)
}

pub use sweep::spawn_sweeper;
