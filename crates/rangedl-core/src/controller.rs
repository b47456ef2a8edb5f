//! Job Controller (spec section 4.9): orchestrates probe, planning,
//! dispatch, finalize, and the pause/resume state machine.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::cancel::CancellationToken;
use crate::config::EngineConfig;
use crate::engine;
use crate::error::EngineError;
use crate::events::Event;
use crate::job::JobDescriptor;
use crate::probe;
use crate::progress::{ProgressAggregator, ProgressCounters};
use crate::retry::RetryPolicy;
use crate::segmenter::{plan_segments, reconcile};
use crate::state::{self, ResumeRecord};
use crate::storage::{StorageWriter, StorageWriterBuilder};

/// A running or finished job. `pause()` is the only externally triggered
/// transition besides the implicit one on drop; everything else happens
/// inside `start`.
pub struct JobHandle {
    cancel: CancellationToken,
}

impl JobHandle {
    /// Requests cancellation. Fire-and-forget: the caller must not assume
    /// workers have finished when this returns (section 5). The Controller
    /// emits exactly one `Paused` event once they have.
    pub fn pause(&self) {
        self.cancel.set();
    }
}

pub struct JobController {
    config: EngineConfig,
}

impl JobController {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Runs the 10-step `start` state machine (section 4.9) to completion,
    /// emitting events on `events_tx` as it goes. Returns a [`JobHandle`]
    /// immediately so the caller can `pause()` while `run` is still awaited,
    /// plus the future driving the job itself.
    pub fn start(
        &self,
        mut job: JobDescriptor,
        events_tx: mpsc::UnboundedSender<Event>,
    ) -> (JobHandle, impl std::future::Future<Output = Result<(), EngineError>> + 'static) {
        let cancel = CancellationToken::new();
        let handle = JobHandle {
            cancel: cancel.clone(),
        };
        let retry_policy = RetryPolicy {
            max_attempts: self.config.max_attempts,
            base_delay: std::time::Duration::from_millis(self.config.backoff_base_ms),
            max_delay: std::time::Duration::from_millis(self.config.backoff_cap_ms),
        };
        let idle_timeout = std::time::Duration::from_secs(self.config.segment_idle_timeout_secs);
        let probe_deadline = std::time::Duration::from_secs(self.config.probe_timeout_secs);
        let progress_interval = std::time::Duration::from_millis(self.config.progress_interval_ms);
        let snapshot_interval = std::time::Duration::from_millis(self.config.snapshot_interval_ms);

        let fut = async move {
            run_job(
                &mut job,
                cancel,
                retry_policy,
                idle_timeout,
                probe_deadline,
                progress_interval,
                snapshot_interval,
                events_tx,
            )
            .await
        };
        (handle, fut)
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_job(
    job: &mut JobDescriptor,
    cancel: CancellationToken,
    retry_policy: RetryPolicy,
    idle_timeout: std::time::Duration,
    probe_deadline: std::time::Duration,
    progress_interval: std::time::Duration,
    snapshot_interval: std::time::Duration,
    events_tx: mpsc::UnboundedSender<Event>,
) -> Result<(), EngineError> {
    // Step 2: probe unless total_bytes is already known (resume path).
    if job.total_bytes == 0 {
        let probed = tokio::task::spawn_blocking({
            let url = job.url.clone();
            move || probe::probe(&url, probe_deadline)
        })
        .await
        .map_err(|e| EngineError::TransientNetworkFailure(e.to_string()))??;
        job.total_bytes = probed.total_bytes;
        job.refine_file_name(probed.content_disposition.as_deref());
    }

    // Step 3: start event.
    let _ = events_tx.send(Event::Start {
        job_id: job.job_id.clone(),
        total_bytes: job.total_bytes,
        file_name: job.file_name.clone(),
    });

    let paths = job.derived_paths();

    // Step 4: ensure directories exist.
    std::fs::create_dir_all(&job.output_dir).map_err(|e| EngineError::io(&job.output_dir, e))?;
    std::fs::create_dir_all(job.effective_state_dir())
        .map_err(|e| EngineError::io(job.effective_state_dir(), e))?;

    let downloaded = if job.downloaded_bytes_per_chunk.len() == job.connections as usize {
        job.downloaded_bytes_per_chunk.clone()
    } else {
        vec![0u64; job.connections as usize]
    };

    // Step 5: persist the resume record before any network traffic.
    let record = ResumeRecord::from_job(job, downloaded.clone());
    state::save(&paths.state_path, &record)?;

    // Step 6: open (or create) the temp file.
    let storage = open_storage(&paths.temp_path, job.total_bytes)?;

    // Step 7: plan and dispatch.
    let segments = plan_segments(job.total_bytes, job.connections);
    let tasks = reconcile(&segments, &downloaded);
    let counters = ProgressCounters::new(job.connections as usize, &downloaded);
    let aggregator = Arc::new(ProgressAggregator::new(progress_interval, snapshot_interval));

    let (tick_tx, mut tick_rx) = mpsc::unbounded_channel();

    let progress_task = {
        let events_tx = events_tx.clone();
        let job_id = job.job_id.clone();
        let total = job.total_bytes;
        let state_path = paths.state_path.clone();
        let job_for_snapshot = job.clone();
        let counters = counters.clone();
        tokio::spawn(async move {
            while let Some(tick) = tick_rx.recv().await {
                if tick.emit {
                    let _ = events_tx.send(Event::Progress {
                        job_id: job_id.clone(),
                        downloaded: tick.total_downloaded,
                        total,
                        speed_bps: tick.speed_bps,
                    });
                }
                if tick.snapshot {
                    let snapshot = counters.snapshot();
                    let record = ResumeRecord::from_job(&job_for_snapshot, snapshot);
                    let _ = state::save(&state_path, &record);
                }
            }
        })
    };

    let download_result = tokio::task::spawn_blocking({
        let url = job.url.clone();
        let storage = storage.clone();
        let cancel = cancel.clone();
        let counters = counters.clone();
        let aggregator = Arc::clone(&aggregator);
        move || {
            engine::download_segments(
                &url,
                storage,
                tasks,
                cancel,
                retry_policy,
                idle_timeout,
                counters,
                aggregator,
                tick_tx,
            )
        }
    })
    .await
    .map_err(|e| EngineError::TransientNetworkFailure(e.to_string()))?;

    // `tick_tx` was moved into the blocking closure above and is dropped
    // when `download_segments` returns, so this drains any in-flight ticks
    // before we write the authoritative final state below.
    let _ = progress_task.await;

    match download_result {
        Ok(()) if cancel.is_set() => {
            storage.sync().ok();
            let snapshot = counters.snapshot();
            let record = ResumeRecord::from_job(job, snapshot);
            state::save(&paths.state_path, &record)?;
            let _ = events_tx.send(Event::Paused {
                job_id: job.job_id.clone(),
            });
            Ok(())
        }
        Ok(()) => {
            storage.sync().map_err(|e| EngineError::io(&paths.temp_path, std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
            if paths.final_path.exists() {
                std::fs::remove_file(&paths.final_path).map_err(|e| EngineError::io(&paths.final_path, e))?;
            }
            storage
                .finalize(&paths.final_path)
                .map_err(|e| EngineError::io(&paths.final_path, std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
            state::delete(&paths.state_path)?;
            let _ = events_tx.send(Event::Complete {
                job_id: job.job_id.clone(),
                final_path: paths.final_path.clone(),
            });
            Ok(())
        }
        Err(e) => {
            let snapshot = counters.snapshot();
            let record = ResumeRecord::from_job(job, snapshot);
            let _ = state::save(&paths.state_path, &record);
            let _ = events_tx.send(Event::Error {
                job_id: job.job_id.clone(),
                message: e.to_string(),
            });
            Err(e)
        }
    }
}

fn open_storage(temp_path: &Path, total_bytes: u64) -> Result<StorageWriter, EngineError> {
    if temp_path.exists() {
        StorageWriter::open_existing(temp_path)
            .map_err(|e| EngineError::io(temp_path, std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))
    } else {
        let mut builder = StorageWriterBuilder::create(temp_path)
            .map_err(|e| EngineError::io(temp_path, std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
        builder
            .preallocate(total_bytes)
            .map_err(|e| EngineError::io(temp_path, std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
        Ok(builder.build())
    }
}
