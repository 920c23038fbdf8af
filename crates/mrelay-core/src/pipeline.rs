//! The relay pipeline: resolve, download, upload (or link fallback), record.
//!
//! One `run` per admitted job. Every exit path is terminal and accounted for:
//! the user gets exactly one final status per job, the temp file is removed,
//! and a summary row is appended to the record store. Errors never escape to
//! the scheduler; the slot is released regardless of how the run ended.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::filename::derive_media_filename;
use crate::history::{JobRecord, RecordStore};
use crate::job::{unix_timestamp, JobState, UserId};
use crate::progress::{format_eta, format_size, progress_bar, ProgressSnapshot};
use crate::resolver::Resolver;
use crate::retry::run_with_retry;
use crate::scheduler::{JobContext, JobRunner};
use crate::storage::{temp_path, TempFileGuard};
use crate::transfer::file::{FileSink, FileSource};
use crate::transfer::http::{self, HttpSource};
use crate::transfer::{transfer, verify_length, TransferOptions};
use crate::transport::{ChatTransport, MessageHandle};

/// How a successful run delivered the media.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Media was streamed into the chat.
    Relayed { bytes: u64 },
    /// Media exceeded the upload ceiling; the user got the direct link.
    LinkFallback { size: u64, direct_url: String },
}

/// Facts accumulated during a run, for the history record.
#[derive(Debug, Default)]
struct RunStats {
    title: String,
    bytes: u64,
    attempts: u32,
}

/// Executes one job end to end. Holds only shared collaborators, so a single
/// instance serves every concurrent job.
pub struct RelayPipeline {
    resolver: Arc<dyn Resolver>,
    transport: Arc<dyn ChatTransport>,
    store: Arc<dyn RecordStore>,
    client: reqwest::Client,
    cfg: RelayConfig,
    download_dir: PathBuf,
}

impl RelayPipeline {
    pub fn new(
        resolver: Arc<dyn Resolver>,
        transport: Arc<dyn ChatTransport>,
        store: Arc<dyn RecordStore>,
        cfg: RelayConfig,
    ) -> Self {
        let download_dir = cfg
            .download_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            resolver,
            transport,
            store,
            client: reqwest::Client::new(),
            cfg,
            download_dir,
        }
    }

    fn transfer_options(&self, total_hint: u64) -> TransferOptions {
        TransferOptions {
            chunk_size: self.cfg.chunk_size_bytes,
            total_hint,
            progress_interval: self.cfg.progress_interval(),
            read_timeout: self.cfg.transfer_timeout(),
        }
    }

    /// Forwards rendered progress text to the chat, off the transfer path.
    /// Edits that fail are logged and dropped; progress is cosmetic. The
    /// caller drops the sender and awaits the handle before sending the final
    /// status, so a buffered edit can never land after it.
    fn spawn_progress_forwarder(
        &self,
        chat: UserId,
        handle: MessageHandle,
    ) -> (mpsc::Sender<String>, tokio::task::JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<String>(8);
        let transport = Arc::clone(&self.transport);
        let task = tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                if let Err(e) = transport.edit_status(chat, &handle, &text).await {
                    tracing::debug!(chat, "progress edit failed: {e}");
                }
            }
        });
        (tx, task)
    }

    async fn run_inner(
        &self,
        job: &JobContext,
        progress: Option<&mpsc::Sender<String>>,
        stats: &mut RunStats,
    ) -> Result<RelayOutcome, RelayError> {
        let chat = job.user_id;
        tracing::info!(job_id = job.id, state = JobState::Resolving.as_str(), url = %job.source_url, "resolving");
        let resolved = self.resolver.resolve(&job.source_url).await?;
        stats.title = resolved.title.clone();

        if job.cancel.is_requested() {
            return Err(RelayError::Cancelled);
        }

        // Fill in size and media type the resolver didn't report.
        let mut size_hint = resolved.size_hint;
        let mut content_type = None;
        if size_hint.is_none() {
            match http::probe(&self.client, &resolved.direct_url, self.cfg.transfer_timeout()).await
            {
                Ok(p) => {
                    size_hint = p.content_length;
                    content_type = p.content_type;
                }
                Err(e) => tracing::debug!(job_id = job.id, "probe failed, size unknown: {e}"),
            }
        }

        // Over-ceiling media is never downloaded; the direct link costs nothing.
        if let Some(size) = size_hint {
            if size > self.cfg.upload_ceiling_bytes {
                tracing::info!(job_id = job.id, size, ceiling = self.cfg.upload_ceiling_bytes, "over ceiling, link fallback");
                return Ok(RelayOutcome::LinkFallback {
                    size,
                    direct_url: resolved.direct_url,
                });
            }
        }

        let filename = derive_media_filename(
            &resolved.title,
            content_type.as_deref(),
            &resolved.direct_url,
        );
        let temp = temp_path(&self.download_dir.join(&filename));
        let _guard = TempFileGuard::new(temp.clone());

        // Download phase. Each attempt reopens the source and truncates the
        // temp file, so a retry never appends to a partial body.
        tracing::info!(job_id = job.id, state = JobState::Downloading.as_str(), file = %filename, "downloading");
        let total = size_hint.unwrap_or(0);
        let opts = self.transfer_options(total);
        let progress_tx = progress.cloned();
        let policy = self.cfg.retry_policy();

        let (downloaded, attempts) = run_with_retry(&policy, |attempt| {
            let progress_tx = progress_tx.clone();
            let temp = temp.clone();
            let direct_url = resolved.direct_url.clone();
            let title = resolved.title.clone();
            async move {
                if attempt > 1 {
                    tracing::info!(job_id = job.id, attempt, "download retry");
                }
                let mut source =
                    HttpSource::open(&self.client, &direct_url, opts.read_timeout).await?;
                let total = if opts.total_hint > 0 {
                    opts.total_hint
                } else {
                    source.content_length().unwrap_or(0)
                };
                let attempt_opts = TransferOptions {
                    total_hint: total,
                    ..opts
                };
                let mut sink = FileSink::create(&temp).await?;
                let n = transfer(&mut source, &mut sink, &attempt_opts, &job.cancel, |s| {
                    if let Some(tx) = &progress_tx {
                        let _ = tx.try_send(render_progress("⬇️ Downloading", &title, s));
                    }
                })
                .await?;
                verify_length(n, total)?;
                Ok(n)
            }
        })
        .await?;
        stats.bytes = downloaded;
        stats.attempts = attempts;

        // The probe can miss (HEAD unsupported); re-check the ceiling against
        // what actually landed on disk.
        if downloaded > self.cfg.upload_ceiling_bytes {
            tracing::info!(job_id = job.id, size = downloaded, "downloaded size over ceiling, link fallback");
            return Ok(RelayOutcome::LinkFallback {
                size: downloaded,
                direct_url: resolved.direct_url,
            });
        }

        if job.cancel.is_requested() {
            return Err(RelayError::Cancelled);
        }

        // Upload phase. Same engine, direction reversed: local file in, chat
        // sink out. Retries reopen both ends.
        tracing::info!(job_id = job.id, state = JobState::Uploading.as_str(), "uploading");
        let (uploaded, _) = run_with_retry(&policy, |attempt| {
            let progress_tx = progress_tx.clone();
            let temp = temp.clone();
            let filename = filename.clone();
            let title = resolved.title.clone();
            async move {
                if attempt > 1 {
                    tracing::info!(job_id = job.id, attempt, "upload retry");
                }
                let mut source = FileSource::open(&temp, opts.chunk_size).await?;
                let mut sink = self
                    .transport
                    .media_sink(chat, &filename, &title, downloaded)
                    .await?;
                let upload_opts = TransferOptions {
                    total_hint: downloaded,
                    ..opts
                };
                let n = transfer(
                    &mut source,
                    sink.as_mut(),
                    &upload_opts,
                    &job.cancel,
                    |s| {
                        if let Some(tx) = &progress_tx {
                            let _ = tx.try_send(render_progress("⬆️ Uploading", &title, s));
                        }
                    },
                )
                .await?;
                verify_length(n, downloaded)?;
                Ok(n)
            }
        })
        .await?;

        Ok(RelayOutcome::Relayed { bytes: uploaded })
    }

    /// Delivers the single final status for the run, then appends the record.
    async fn finalize(
        &self,
        job: &JobContext,
        status: Option<MessageHandle>,
        outcome: &Result<RelayOutcome, RelayError>,
        stats: RunStats,
        created_at: i64,
    ) {
        let chat = job.user_id;
        // A cancel request can land while the transfer is blocked on the
        // network; the attempt then dies with a transport error, but the user
        // asked for a cancellation and that is what they get told.
        let cancelled =
            matches!(outcome, Err(e) if e.is_cancelled()) || job.cancel.is_requested();
        let state = match outcome {
            Ok(_) => JobState::Completed,
            Err(_) if cancelled => JobState::Cancelled,
            Err(_) => JobState::Failed,
        };

        match outcome {
            Ok(RelayOutcome::Relayed { .. }) => {
                // The media message itself is the result; the progress message
                // is stale noise now.
                if let Some(handle) = &status {
                    if let Err(e) = self.transport.delete_status(chat, handle).await {
                        tracing::debug!(chat, "status delete failed: {e}");
                    }
                }
            }
            Ok(RelayOutcome::LinkFallback { size, direct_url }) => {
                let text = format!(
                    "⚠️ File is too large to upload ({}). Direct link:\n{direct_url}",
                    format_size(*size)
                );
                self.deliver_final(chat, &status, &text).await;
            }
            Err(_) if cancelled => {
                self.deliver_final(chat, &status, "🚫 Cancelled.").await;
            }
            Err(e) => {
                tracing::warn!(job_id = job.id, "job failed: {e}");
                self.deliver_final(chat, &status, &format!("❌ {}", user_message(e)))
                    .await;
            }
        }

        let record = JobRecord {
            job_id: job.id as i64,
            user_id: job.user_id,
            source_url: job.source_url.clone(),
            title: stats.title,
            state: state.as_str().to_string(),
            bytes_transferred: stats.bytes as i64,
            attempts: stats.attempts.max(1) as i64,
            created_at,
            finished_at: unix_timestamp(),
        };
        if let Err(e) = self.store.append_record(&record).await {
            tracing::warn!(job_id = job.id, "record append failed: {e}");
        }
        tracing::info!(job_id = job.id, state = state.as_str(), bytes = record.bytes_transferred, "job finished");
    }

    /// Edit the progress message into the final text, or send a fresh message
    /// when there is none to edit.
    async fn deliver_final(&self, chat: UserId, status: &Option<MessageHandle>, text: &str) {
        let delivered = match status {
            Some(handle) => self.transport.edit_status(chat, handle, text).await,
            None => self.transport.send_status(chat, text).await.map(|_| ()),
        };
        if let Err(e) = delivered {
            tracing::warn!(chat, "final status delivery failed: {e}");
        }
    }
}

#[async_trait::async_trait]
impl JobRunner for RelayPipeline {
    async fn run(&self, job: JobContext) {
        let created_at = unix_timestamp();
        let status = match self
            .transport
            .send_status(job.user_id, "🔍 Resolving link…")
            .await
        {
            Ok(handle) => Some(handle),
            Err(e) => {
                // Without a status message the job still runs; the user just
                // sees no progress until the media (or final status) arrives.
                tracing::warn!(job_id = job.id, "initial status send failed: {e}");
                None
            }
        };

        let (progress_tx, forwarder) = match &status {
            Some(handle) => {
                let (tx, task) = self.spawn_progress_forwarder(job.user_id, handle.clone());
                (Some(tx), Some(task))
            }
            None => (None, None),
        };

        let mut stats = RunStats::default();
        let outcome = self
            .run_inner(&job, progress_tx.as_ref(), &mut stats)
            .await;

        // Close the progress channel and let the forwarder drain before the
        // final status goes out.
        drop(progress_tx);
        if let Some(task) = forwarder {
            let _ = task.await;
        }

        self.finalize(&job, status, &outcome, stats, created_at).await;
    }
}

/// One user-facing line per failure class.
fn user_message(e: &RelayError) -> String {
    match e {
        RelayError::Resolution(_) => "Couldn't resolve that link. Check it and try again.".into(),
        RelayError::Transport(_) | RelayError::Timeout => {
            "Network trouble while transferring. Try again later.".into()
        }
        RelayError::RetryExhausted { attempts, .. } => format!(
            "Transfer kept failing ({attempts} attempts). Try again later."
        ),
        RelayError::Sink(_) => "Ran out of local storage while downloading.".into(),
        RelayError::SizeExceeded { size, limit } => format!(
            "File is too large to upload ({} > {}).",
            format_size(*size),
            format_size(*limit)
        ),
        RelayError::Cancelled => "Cancelled.".into(),
    }
}

/// Bar, percent, counters, rate, ETA. Shared by both phases.
fn render_progress(phase: &str, title: &str, s: &ProgressSnapshot) -> String {
    let counters = if s.total > 0 {
        format!("{} / {}", format_size(s.transferred), format_size(s.total))
    } else {
        format_size(s.transferred)
    };
    format!(
        "{phase} {title}\n{} {:.1}%\n{counters} • {}/s • ETA {}",
        progress_bar(s.percent),
        s.percent,
        format_size(s.bytes_per_sec as u64),
        format_eta(s.eta_secs),
    )
}
