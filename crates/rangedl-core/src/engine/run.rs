//! The curl-multi event loop driving all segments for one `start` call.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use curl::easy::Easy2;
use curl::multi::{Easy2Handle, Multi};
use tokio::sync::mpsc::UnboundedSender;

use super::handler::SegmentHandler;
use crate::cancel::CancellationToken;
use crate::error::EngineError;
use crate::progress::{ProgressAggregator, ProgressCounters};
use crate::retry::{classify, RetryDecision, RetryPolicy, SegmentError};
use crate::segmenter::PlannedSegment;
use crate::storage::StorageWriter;

/// Emitted by the event loop whenever the Aggregator's throttle admits an
/// emission or a snapshot. Consumed by the Job Controller's progress task.
#[derive(Debug, Clone, Copy)]
pub struct ProgressTick {
    pub emit: bool,
    pub snapshot: bool,
    pub total_downloaded: u64,
    pub speed_bps: f64,
}

struct Active {
    segment: PlannedSegment,
    attempt: u32,
}

struct PendingRetry {
    not_before: Instant,
    segment: PlannedSegment,
    attempt: u32,
}

/// Drives all `tasks` to completion, failure, or cancellation on a single
/// libcurl multi handle. Blocking; callers run this via `spawn_blocking`.
#[allow(clippy::too_many_arguments)]
pub fn download_segments(
    url: &str,
    storage: StorageWriter,
    tasks: Vec<PlannedSegment>,
    cancel: CancellationToken,
    retry_policy: RetryPolicy,
    idle_timeout: Duration,
    counters: ProgressCounters,
    aggregator: std::sync::Arc<ProgressAggregator>,
    tick_tx: UnboundedSender<ProgressTick>,
) -> Result<(), EngineError> {
    if tasks.is_empty() {
        return Ok(());
    }

    let multi = Multi::new();
    let mut handles: HashMap<usize, Easy2Handle<SegmentHandler>> = HashMap::new();
    let mut active: HashMap<usize, Active> = HashMap::new();
    let mut pending: Vec<PendingRetry> = Vec::new();
    let mut next_token = 0usize;
    let mut first_error: Option<SegmentError> = None;

    for task in tasks {
        let token = next_token;
        next_token += 1;
        spawn_attempt(
            &multi,
            &mut handles,
            &mut active,
            token,
            task,
            1,
            url,
            &storage,
            &counters,
            idle_timeout,
        )?;
    }

    loop {
        if cancel.is_set() {
            for (_, handle) in handles.drain() {
                let _ = multi.remove2(handle);
            }
            return Ok(());
        }

        if handles.is_empty() && pending.is_empty() {
            break;
        }

        if !handles.is_empty() {
            multi
                .perform()
                .map_err(|e| EngineError::TransientNetworkFailure(format!("multi perform failed: {e}")))?;
        }

        let mut finished_tokens: Vec<(usize, Result<(), curl::Error>)> = Vec::new();
        multi.messages(|message| {
            if let Ok(token) = message.token() {
                if let Some(handle) = handles.get(&token) {
                    if let Some(result) = message.result_for2(handle) {
                        finished_tokens.push((token, result));
                    }
                }
            }
        });

        for (token, result) in finished_tokens {
            let handle = match handles.remove(&token) {
                Some(h) => h,
                None => continue,
            };
            let active_entry = match active.remove(&token) {
                Some(a) => a,
                None => continue,
            };
            let owned = multi
                .remove2(handle)
                .map_err(|e| EngineError::TransientNetworkFailure(format!("failed to remove transfer: {e}")))?;

            let outcome = classify_completion(&owned, result);
            match outcome {
                Ok(()) => {
                    let total = counters.total();
                    let probe = aggregator.probe(total);
                    let _ = tick_tx.send(ProgressTick {
                        emit: probe.emit,
                        snapshot: probe.snapshot,
                        total_downloaded: total,
                        speed_bps: aggregator.speed_bps(),
                    });
                }
                Err(e) => {
                    let kind = classify(&e);
                    match retry_policy.decide(active_entry.attempt, kind) {
                        RetryDecision::NoRetry => {
                            if first_error.is_none() {
                                first_error = Some(e);
                            }
                        }
                        RetryDecision::RetryAfter(delay) => {
                            let resumed = resume_from_progress(&active_entry.segment, &counters);
                            pending.push(PendingRetry {
                                not_before: Instant::now() + delay,
                                segment: resumed,
                                attempt: active_entry.attempt + 1,
                            });
                        }
                    }
                }
            }
        }

        if first_error.is_some() && handles.is_empty() {
            break;
        }

        let now = Instant::now();
        let mut still_pending = Vec::new();
        for retry in pending {
            if cancel.is_set() {
                return Ok(());
            }
            if retry.not_before <= now {
                let token = next_token;
                next_token += 1;
                spawn_attempt(
                    &multi,
                    &mut handles,
                    &mut active,
                    token,
                    retry.segment,
                    retry.attempt,
                    url,
                    &storage,
                    &counters,
                    idle_timeout,
                )?;
            } else {
                still_pending.push(retry);
            }
        }
        pending = still_pending;

        if !handles.is_empty() {
            multi
                .wait(&mut [], Duration::from_millis(100))
                .map_err(|e| EngineError::TransientNetworkFailure(format!("multi wait failed: {e}")))?;
        } else if !pending.is_empty() {
            std::thread::sleep(Duration::from_millis(50));
        }
    }

    if let Some(e) = first_error {
        return Err(EngineError::TransientNetworkFailure(e.to_string()));
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn spawn_attempt(
    multi: &Multi,
    handles: &mut HashMap<usize, Easy2Handle<SegmentHandler>>,
    active: &mut HashMap<usize, Active>,
    token: usize,
    task: PlannedSegment,
    attempt: u32,
    url: &str,
    storage: &StorageWriter,
    counters: &ProgressCounters,
    idle_timeout: Duration,
) -> Result<(), EngineError> {
    let handler = SegmentHandler::new(
        storage.clone(),
        task.index,
        task.segment,
        task.resume_start,
        counters.clone(),
    );
    let mut easy = Easy2::new(handler);
    easy.url(url)
        .map_err(|e| EngineError::TransientNetworkFailure(e.to_string()))?;
    easy.follow_location(true)
        .map_err(|e| EngineError::TransientNetworkFailure(e.to_string()))?;
    easy.max_redirections(5)
        .map_err(|e| EngineError::TransientNetworkFailure(e.to_string()))?;
    easy.connect_timeout(Duration::from_secs(30))
        .map_err(|e| EngineError::TransientNetworkFailure(e.to_string()))?;
    easy.low_speed_limit(1024)
        .map_err(|e| EngineError::TransientNetworkFailure(e.to_string()))?;
    easy.low_speed_time(idle_timeout)
        .map_err(|e| EngineError::TransientNetworkFailure(e.to_string()))?;
    easy.range(&format!("{}-{}", task.resume_start, task.segment.end()))
        .map_err(|e| EngineError::TransientNetworkFailure(e.to_string()))?;

    let mut handle = multi
        .add2(easy)
        .map_err(|e| EngineError::TransientNetworkFailure(format!("failed to register transfer: {e}")))?;
    handle
        .set_token(token)
        .map_err(|e| EngineError::TransientNetworkFailure(e.to_string()))?;

    handles.insert(token, handle);
    active.insert(token, Active { segment: task, attempt });
    Ok(())
}

fn classify_completion(
    easy: &Easy2<SegmentHandler>,
    result: Result<(), curl::Error>,
) -> Result<(), SegmentError> {
    if let Err(curl_err) = result {
        return Err(SegmentError::Curl(curl_err));
    }
    if let Some(handler_err) = easy.get_ref().take_error() {
        return Err(handler_err);
    }
    match easy.response_code() {
        Ok(206) => easy.get_ref().check_content_range(),
        Ok(code) => Err(SegmentError::Http(code)),
        Err(e) => Err(SegmentError::Curl(e)),
    }
}

/// Recomputes a segment's resume point from cumulative progress recorded in
/// the shared counter before re-dispatching it as a retry (section 4.6: a
/// retry never re-downloads bytes already written).
fn resume_from_progress(original: &PlannedSegment, counters: &ProgressCounters) -> PlannedSegment {
    PlannedSegment {
        index: original.index,
        segment: original.segment,
        resume_start: original.segment.start + counters.get(original.index),
    }
}
