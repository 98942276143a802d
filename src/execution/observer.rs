use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::ConversionSeverity;
use crate::types::Bucket;

/// Events emitted by the [`super::ConversionEngine`] during a run.
#[derive(Debug, Clone)]
pub enum ConversionEvent {
    RunStarted { input: PathBuf, threads: usize },
    HeaderWritten { path: PathBuf, columns: usize },
    LinesCounted { lines: usize },
    BucketsPlanned { buckets: Vec<Bucket> },
    SegmentStarted { worker: usize, bucket: Bucket },
    SegmentFinished { worker: usize, rows: usize },
    SegmentFailed {
        worker: usize,
        severity: ConversionSeverity,
        message: String,
    },
    RunFailed {
        severity: ConversionSeverity,
        message: String,
    },
    RunFinished {
        elapsed: Duration,
        metrics: ConversionMetricsSnapshot,
    },
}

/// Observer hook for conversion events.
pub trait ConversionObserver: Send + Sync {
    fn on_event(&self, event: &ConversionEvent);
}

/// Forwards conversion events to `tracing`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl ConversionObserver for TracingObserver {
    fn on_event(&self, event: &ConversionEvent) {
        match event {
            ConversionEvent::RunStarted { input, threads } => {
                info!(input = %input.display(), threads, "conversion started");
            }
            ConversionEvent::HeaderWritten { path, columns } => {
                debug!(path = %path.display(), columns, "header written");
            }
            ConversionEvent::LinesCounted { lines } => info!(lines, "body lines counted"),
            ConversionEvent::BucketsPlanned { buckets } => {
                debug!(count = buckets.len(), ?buckets, "buckets planned");
            }
            ConversionEvent::SegmentStarted { worker, bucket } => {
                debug!(worker, min = bucket.min, max = bucket.max, "segment started");
            }
            ConversionEvent::SegmentFinished { worker, rows } => {
                debug!(worker, rows, "segment finished");
            }
            ConversionEvent::SegmentFailed {
                worker,
                severity,
                message,
            } => warn!(worker, ?severity, %message, "segment failed"),
            ConversionEvent::RunFailed { severity, message } => {
                error!(?severity, %message, "conversion failed");
            }
            ConversionEvent::RunFinished { elapsed, metrics } => {
                info!(?elapsed, %metrics, "conversion finished");
            }
        }
    }
}

/// Real-time counters for a conversion run.
///
/// The engine updates these while workers run; callers can snapshot them at any time.
#[derive(Debug)]
pub struct ConversionMetrics {
    run_id: AtomicU64,
    elapsed_ns: AtomicU64,

    body_lines: AtomicUsize,
    rows_written: AtomicU64,
    segments_started: AtomicU64,
    segments_finished: AtomicU64,
    segments_failed: AtomicU64,

    active_segments: AtomicUsize,
    max_active_segments: AtomicUsize,
}

impl ConversionMetrics {
    pub fn new() -> Self {
        Self {
            run_id: AtomicU64::new(0),
            elapsed_ns: AtomicU64::new(0),
            body_lines: AtomicUsize::new(0),
            rows_written: AtomicU64::new(0),
            segments_started: AtomicU64::new(0),
            segments_finished: AtomicU64::new(0),
            segments_failed: AtomicU64::new(0),
            active_segments: AtomicUsize::new(0),
            max_active_segments: AtomicUsize::new(0),
        }
    }

    pub fn begin_run(&self) {
        let _ = self.run_id.fetch_add(1, Ordering::SeqCst);
        self.elapsed_ns.store(0, Ordering::SeqCst);
        self.body_lines.store(0, Ordering::SeqCst);
        self.rows_written.store(0, Ordering::SeqCst);
        self.segments_started.store(0, Ordering::SeqCst);
        self.segments_finished.store(0, Ordering::SeqCst);
        self.segments_failed.store(0, Ordering::SeqCst);
        self.active_segments.store(0, Ordering::SeqCst);
        self.max_active_segments.store(0, Ordering::SeqCst);
    }

    pub fn end_run(&self, elapsed: Duration) {
        self.elapsed_ns
            .store(elapsed.as_nanos().min(u64::MAX as u128) as u64, Ordering::SeqCst);
    }

    pub fn on_lines_counted(&self, lines: usize) {
        self.body_lines.store(lines, Ordering::SeqCst);
    }

    pub fn on_segment_start(&self) {
        let _ = self.segments_started.fetch_add(1, Ordering::SeqCst);
        let now = self.active_segments.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active_segments.fetch_max(now, Ordering::SeqCst);
    }

    pub fn on_segment_end(&self, rows: usize) {
        let _ = self.segments_finished.fetch_add(1, Ordering::SeqCst);
        let _ = self.rows_written.fetch_add(rows as u64, Ordering::SeqCst);
        let _ = self.active_segments.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn on_segment_failed(&self) {
        let _ = self.segments_failed.fetch_add(1, Ordering::SeqCst);
        let _ = self.active_segments.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> ConversionMetricsSnapshot {
        let elapsed_ns = self.elapsed_ns.load(Ordering::SeqCst);
        let elapsed = if elapsed_ns > 0 {
            Some(Duration::from_nanos(elapsed_ns))
        } else {
            None
        };

        ConversionMetricsSnapshot {
            run_id: self.run_id.load(Ordering::SeqCst),
            elapsed,
            body_lines: self.body_lines.load(Ordering::SeqCst),
            rows_written: self.rows_written.load(Ordering::SeqCst),
            segments_started: self.segments_started.load(Ordering::SeqCst),
            segments_finished: self.segments_finished.load(Ordering::SeqCst),
            segments_failed: self.segments_failed.load(Ordering::SeqCst),
            max_active_segments: self.max_active_segments.load(Ordering::SeqCst),
        }
    }
}

impl Default for ConversionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable snapshot of [`ConversionMetrics`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionMetricsSnapshot {
    pub run_id: u64,
    pub elapsed: Option<Duration>,
    pub body_lines: usize,
    pub rows_written: u64,
    pub segments_started: u64,
    pub segments_finished: u64,
    pub segments_failed: u64,
    pub max_active_segments: usize,
}

impl fmt::Display for ConversionMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run_id={}, body_lines={}, rows_written={}, segments={}/{} (failed {}), max_active_segments={}, elapsed={:?}",
            self.run_id,
            self.body_lines,
            self.rows_written,
            self.segments_finished,
            self.segments_started,
            self.segments_failed,
            self.max_active_segments,
            self.elapsed
        )
    }
}
