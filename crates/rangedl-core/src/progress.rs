//! Progress Aggregator (spec section 4.7).
//!
//! Per-segment byte counters are plain atomics with a single writer each; the
//! Aggregator reduces them into throttled `progress` events and periodic
//! snapshot triggers. Probe calls that lose the CAS race on the last-emission
//! timestamp are simply dropped — the next buffer on any worker retries.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Fallback intervals if a caller builds an aggregator without going through
/// [`EngineConfig`] (e.g. the unit tests below).
const EMIT_INTERVAL: Duration = Duration::from_millis(1000);
const SNAPSHOT_INTERVAL: Duration = Duration::from_millis(5000);

/// Per-segment byte counters. Index `i` is written only by segment `i`'s
/// worker; read by the Aggregator and the State Persistor.
#[derive(Clone)]
pub struct ProgressCounters {
    counters: Arc<Vec<AtomicU64>>,
}

impl ProgressCounters {
    pub fn new(segment_count: usize, initial: &[u64]) -> Self {
        let counters = (0..segment_count)
            .map(|i| AtomicU64::new(initial.get(i).copied().unwrap_or(0)))
            .collect();
        Self {
            counters: Arc::new(counters),
        }
    }

    pub fn add(&self, index: usize, delta: u64) {
        self.counters[index].fetch_add(delta, Ordering::SeqCst);
    }

    pub fn get(&self, index: usize) -> u64 {
        self.counters[index].load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> Vec<u64> {
        self.counters.iter().map(|c| c.load(Ordering::SeqCst)).collect()
    }

    pub fn total(&self) -> u64 {
        self.counters.iter().map(|c| c.load(Ordering::SeqCst)).sum()
    }
}

/// Outcome of probing the Aggregator after a buffer is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResult {
    pub emit: bool,
    pub snapshot: bool,
}

/// Throttled reducer driving `progress` emission and state snapshots.
///
/// Uses CAS on two `Instant`-free millisecond timestamps (relative to a
/// fixed start) so concurrent probes from multiple workers never block each
/// other; a lost race just means the next buffer's probe will win instead.
pub struct ProgressAggregator {
    start: Instant,
    emit_interval_ms: u64,
    snapshot_interval_ms: u64,
    last_emit_ms: AtomicU64,
    last_snapshot_ms: AtomicU64,
    last_speed_sample_ms: AtomicU64,
    last_speed_bytes: AtomicU64,
    speed_bps: std::sync::atomic::AtomicU64,
}

impl ProgressAggregator {
    /// Builds an aggregator throttled at `emit_interval`/`snapshot_interval`,
    /// normally sourced from `EngineConfig::progress_interval_ms`/
    /// `snapshot_interval_ms` (section 10).
    pub fn new(emit_interval: Duration, snapshot_interval: Duration) -> Self {
        Self {
            start: Instant::now(),
            emit_interval_ms: emit_interval.as_millis() as u64,
            snapshot_interval_ms: snapshot_interval.as_millis() as u64,
            last_emit_ms: AtomicU64::new(0),
            last_snapshot_ms: AtomicU64::new(0),
            last_speed_sample_ms: AtomicU64::new(0),
            last_speed_bytes: AtomicU64::new(0),
            speed_bps: std::sync::atomic::AtomicU64::new(0),
        }
    }

    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Called after every buffer a worker writes. Returns whether this call
    /// won the race to emit a progress event and/or trigger a snapshot.
    pub fn probe(&self, total_downloaded: u64) -> ProbeResult {
        let now = self.now_ms();

        let emit = self.try_advance(&self.last_emit_ms, now, self.emit_interval_ms);
        if emit {
            self.update_speed(now, total_downloaded);
        }
        let snapshot = self.try_advance(&self.last_snapshot_ms, now, self.snapshot_interval_ms);

        ProbeResult { emit, snapshot }
    }

    /// Forces the next probe to emit and snapshot regardless of timers — used
    /// by the Controller on `pause` to request an immediate snapshot.
    pub fn force_snapshot(&self) {
        self.last_snapshot_ms.store(0, Ordering::SeqCst);
    }

    fn try_advance(&self, slot: &AtomicU64, now: u64, interval_ms: u64) -> bool {
        let last = slot.load(Ordering::SeqCst);
        if now.saturating_sub(last) < interval_ms {
            return false;
        }
        slot.compare_exchange(last, now, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn update_speed(&self, now: u64, total_downloaded: u64) {
        let last_ms = self.last_speed_sample_ms.swap(now, Ordering::SeqCst);
        let last_bytes = self.last_speed_bytes.swap(total_downloaded, Ordering::SeqCst);
        let elapsed_secs = (now.saturating_sub(last_ms) as f64) / 1000.0;
        if elapsed_secs > 0.0 && total_downloaded >= last_bytes {
            let bps = (total_downloaded - last_bytes) as f64 / elapsed_secs;
            self.speed_bps.store(bps as u64, Ordering::SeqCst);
        }
    }

    pub fn speed_bps(&self) -> f64 {
        self.speed_bps.load(Ordering::SeqCst) as f64
    }
}

impl Default for ProgressAggregator {
    fn default() -> Self {
        Self::new(EMIT_INTERVAL, SNAPSHOT_INTERVAL)
    }
}
