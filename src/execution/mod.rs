//! Conversion engine: runs the header, count, partition and segment stages.
//!
//! This module sits "above" [`crate::ingestion`] and [`crate::processing`] and provides:
//!
//! - Partitioned execution: one segment worker per bucket on a dedicated rayon pool
//! - Whole-output execution: header and every row into one file, on the caller's thread
//! - Failure aggregation and optional fail-fast cancellation
//! - Real-time metrics + observer hooks for monitoring

mod cancel;
mod observer;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;
use tracing::debug;

use crate::config::ConvertOptions;
use crate::error::{ConvertError, ConvertResult, SegmentFailure};
use crate::ingestion::header::{field_names, read_header, resolve_header, write_header, ResolvedHeader};
use crate::ingestion::line_count::count_body_lines;
use crate::processing::partition::create_buckets;
use crate::processing::segment::{
    segment_path, transform_segment, transform_segment_into, SegmentJob, SegmentReport, HEADER_FILE_NAME,
};
use crate::types::{Bucket, ColumnIndex};

pub use cancel::CancellationToken;
pub use observer::{
    ConversionEvent, ConversionMetrics, ConversionMetricsSnapshot, ConversionObserver, TracingObserver,
};

/// Result of a successful conversion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionSummary {
    /// Input file.
    pub input: PathBuf,
    /// Header as written (designated columns renamed), lossily decoded for display.
    pub header: Vec<String>,
    /// Positions of the designated columns.
    pub columns: ColumnIndex,
    /// Where the header was written: `headers.tsv` in partitioned mode, the output file otherwise.
    pub header_path: PathBuf,
    /// Terminated body lines found in the input.
    pub body_lines: usize,
    /// One report per segment, ordered by worker id.
    pub segments: Vec<SegmentReport>,
    pub metrics: ConversionMetricsSnapshot,
}

impl ConversionSummary {
    /// Total rows written across all segments.
    pub fn rows_written(&self) -> usize {
        self.segments.iter().map(|s| s.rows).sum()
    }
}

/// Runs conversions described by a [`ConvertOptions`].
pub struct ConversionEngine {
    pool: ThreadPool,
    opts: ConvertOptions,
    observer: Option<Arc<dyn ConversionObserver>>,
    metrics: Arc<ConversionMetrics>,
}

impl ConversionEngine {
    /// Create an engine with a rayon pool of `opts.threads` threads.
    ///
    /// # Errors
    ///
    /// [`ConvertError::InvalidOptions`] if `opts` fails validation, [`ConvertError::ThreadPool`]
    /// if the pool cannot be built.
    pub fn new(opts: ConvertOptions) -> ConvertResult<Self> {
        opts.validate()?;
        let pool = ThreadPoolBuilder::new()
            .num_threads(opts.threads)
            .thread_name(|i| format!("kgx-segment-{i}"))
            .build()?;

        Ok(Self {
            pool,
            opts,
            observer: None,
            metrics: Arc::new(ConversionMetrics::new()),
        })
    }

    /// Attach an observer for conversion events (metrics/logging).
    pub fn with_observer(mut self, observer: Arc<dyn ConversionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Get a handle to real-time conversion metrics.
    pub fn metrics(&self) -> Arc<ConversionMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.opts
    }

    /// Convert using the mode selected by the options.
    ///
    /// Partitioned when a segment directory is configured or `threads > 1`, whole-output
    /// otherwise.
    pub fn convert(&self) -> ConvertResult<ConversionSummary> {
        if self.opts.partitioned() {
            self.convert_partitioned(self.opts.segments_dir_or_default())
        } else {
            self.convert_to_file(&self.opts.output)
        }
    }

    /// Write `headers.tsv` and one `<worker>.tsv` segment per bucket into `dir`.
    ///
    /// Blocks until every worker has finished. Segments are not concatenated. Segment files
    /// left in `dir` by an earlier run with more buckets (`<n>.tsv` with `n` at or past the new
    /// bucket count) are removed before the workers start.
    ///
    /// # Errors
    ///
    /// Setup failures (input, header, line count) are returned before any worker starts. Worker
    /// failures are collected and returned together as [`ConvertError::SegmentsFailed`].
    pub fn convert_partitioned(&self, dir: impl AsRef<Path>) -> ConvertResult<ConversionSummary> {
        let dir = dir.as_ref();
        self.run(|| self.convert_partitioned_impl(dir))
    }

    /// Write the header and every converted row, in input order, to `output`.
    pub fn convert_to_file(&self, output: impl AsRef<Path>) -> ConvertResult<ConversionSummary> {
        let output = output.as_ref();
        self.run(|| self.convert_to_file_impl(output))
    }

    fn run<F>(&self, body: F) -> ConvertResult<ConversionSummary>
    where
        F: FnOnce() -> ConvertResult<ConversionSummary>,
    {
        let start = Instant::now();
        self.metrics.begin_run();
        self.emit(ConversionEvent::RunStarted {
            input: self.opts.input.clone(),
            threads: self.opts.threads,
        });

        let out = body();

        self.metrics.end_run(start.elapsed());
        if let Err(e) = &out {
            self.emit(ConversionEvent::RunFailed {
                severity: e.severity(),
                message: e.to_string(),
            });
        }
        self.emit(ConversionEvent::RunFinished {
            elapsed: start.elapsed(),
            metrics: self.metrics.snapshot(),
        });
        out.map(|mut summary| {
            summary.metrics = self.metrics.snapshot();
            summary
        })
    }

    fn convert_partitioned_impl(&self, dir: &Path) -> ConvertResult<ConversionSummary> {
        let resolved = self.resolve_header()?;

        fs::create_dir_all(dir).map_err(|e| ConvertError::io(dir, e))?;
        let header_path = dir.join(HEADER_FILE_NAME);
        self.write_header_file(&header_path, &resolved)?;

        let body_lines = self.count_lines()?;
        let buckets = create_buckets(body_lines, self.opts.threads);
        self.emit(ConversionEvent::BucketsPlanned {
            buckets: buckets.clone(),
        });
        remove_stale_segments(dir, buckets.len())?;

        let cancel = CancellationToken::new();
        let jobs = self.jobs(&buckets, resolved.columns, &cancel);
        let total = jobs.len();

        let outcomes: Vec<(usize, ConvertResult<SegmentReport>)> = self.pool.install(|| {
            jobs.into_par_iter()
                .map(|job| {
                    let out = self.run_segment(&job, |job| transform_segment(job, segment_path(dir, job.worker)));
                    if out.is_err() && self.opts.fail_fast {
                        cancel.cancel();
                    }
                    (job.worker, out)
                })
                .collect()
        });

        let mut segments = Vec::with_capacity(total);
        let mut failures = Vec::new();
        for (worker, outcome) in outcomes {
            match outcome {
                Ok(report) => segments.push(report),
                Err(error) => failures.push(SegmentFailure { worker, error }),
            }
        }
        if !failures.is_empty() {
            return Err(ConvertError::SegmentsFailed {
                failed: failures.len(),
                total,
                failures,
            });
        }

        Ok(ConversionSummary {
            input: self.opts.input.clone(),
            header: field_names(&resolved.header),
            columns: resolved.columns,
            header_path,
            body_lines,
            segments,
            metrics: self.metrics.snapshot(),
        })
    }

    fn convert_to_file_impl(&self, output: &Path) -> ConvertResult<ConversionSummary> {
        let resolved = self.resolve_header()?;
        let body_lines = self.count_lines()?;

        if let Some(parent) = output.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| ConvertError::io(parent, e))?;
        }
        let file = File::create(output).map_err(|e| ConvertError::io(output, e))?;
        let mut sink = BufWriter::new(file);
        write_header(&mut sink, &resolved.header, self.opts.delimiter)
            .map_err(|e| ConvertError::sink(output, e))?;
        self.emit(ConversionEvent::HeaderWritten {
            path: output.to_path_buf(),
            columns: resolved.header.len(),
        });

        let buckets = create_buckets(body_lines, 1);
        let cancel = CancellationToken::new();
        let mut segments = Vec::with_capacity(buckets.len());
        for job in self.jobs(&buckets, resolved.columns, &cancel) {
            let mut report = self.run_segment(&job, |job| transform_segment_into(job, &mut sink, output))?;
            report.path = Some(output.to_path_buf());
            segments.push(report);
        }
        sink.flush().map_err(|e| ConvertError::io(output, e))?;

        Ok(ConversionSummary {
            input: self.opts.input.clone(),
            header: field_names(&resolved.header),
            columns: resolved.columns,
            header_path: output.to_path_buf(),
            body_lines,
            segments,
            metrics: self.metrics.snapshot(),
        })
    }

    fn resolve_header(&self) -> ConvertResult<ResolvedHeader> {
        let header = read_header(&self.opts.input, self.opts.delimiter)?;
        resolve_header(header, &self.opts.columns)
    }

    fn write_header_file(&self, path: &Path, resolved: &ResolvedHeader) -> ConvertResult<()> {
        let file = File::create(path).map_err(|e| ConvertError::io(path, e))?;
        write_header(BufWriter::new(file), &resolved.header, self.opts.delimiter)
            .map_err(|e| ConvertError::sink(path, e))?;
        self.emit(ConversionEvent::HeaderWritten {
            path: path.to_path_buf(),
            columns: resolved.header.len(),
        });
        Ok(())
    }

    fn count_lines(&self) -> ConvertResult<usize> {
        let lines = count_body_lines(&self.opts.input)?;
        self.metrics.on_lines_counted(lines);
        self.emit(ConversionEvent::LinesCounted { lines });
        Ok(lines)
    }

    fn jobs(&self, buckets: &[Bucket], columns: ColumnIndex, cancel: &CancellationToken) -> Vec<SegmentJob> {
        let input: Arc<Path> = Arc::from(self.opts.input.as_path());
        let collection: Arc<str> = Arc::from(self.opts.collection.as_str());
        buckets
            .iter()
            .enumerate()
            .map(|(worker, &bucket)| SegmentJob {
                worker,
                bucket,
                input: Arc::clone(&input),
                columns,
                collection: Arc::clone(&collection),
                delimiter: self.opts.delimiter,
                cancel: cancel.clone(),
            })
            .collect()
    }

    fn run_segment<F>(&self, job: &SegmentJob, transform: F) -> ConvertResult<SegmentReport>
    where
        F: FnOnce(&SegmentJob) -> ConvertResult<SegmentReport>,
    {
        self.metrics.on_segment_start();
        self.emit(ConversionEvent::SegmentStarted {
            worker: job.worker,
            bucket: job.bucket,
        });

        match transform(job) {
            Ok(report) => {
                self.metrics.on_segment_end(report.rows);
                self.emit(ConversionEvent::SegmentFinished {
                    worker: job.worker,
                    rows: report.rows,
                });
                Ok(report)
            }
            Err(e) => {
                self.metrics.on_segment_failed();
                self.emit(ConversionEvent::SegmentFailed {
                    worker: job.worker,
                    severity: e.severity(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn emit(&self, event: ConversionEvent) {
        if let Some(obs) = &self.observer {
            obs.on_event(&event);
        }
    }
}

/// Delete `<n>.tsv` segment files in `dir` with `n >= keep`. Other files are left alone.
fn remove_stale_segments(dir: &Path, keep: usize) -> ConvertResult<()> {
    let entries = fs::read_dir(dir).map_err(|e| ConvertError::io(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| ConvertError::io(dir, e))?.path();
        let stale = path.extension().is_some_and(|ext| ext == "tsv")
            && path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<usize>().ok())
                .is_some_and(|worker| worker >= keep);
        if stale && path.is_file() {
            fs::remove_file(&path).map_err(|e| ConvertError::io(&path, e))?;
            debug!(path = %path.display(), "removed stale segment");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    use super::{ConversionEngine, ConversionEvent, ConversionObserver};
    use crate::config::ConvertOptions;
    use crate::error::ConvertError;

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<String>>,
    }

    impl ConversionObserver for RecordingObserver {
        fn on_event(&self, event: &ConversionEvent) {
            let name = match event {
                ConversionEvent::RunStarted { .. } => "run_started",
                ConversionEvent::HeaderWritten { .. } => "header_written",
                ConversionEvent::LinesCounted { .. } => "lines_counted",
                ConversionEvent::BucketsPlanned { .. } => "buckets_planned",
                ConversionEvent::SegmentStarted { .. } => "segment_started",
                ConversionEvent::SegmentFinished { .. } => "segment_finished",
                ConversionEvent::SegmentFailed { .. } => "segment_failed",
                ConversionEvent::RunFailed { .. } => "run_failed",
                ConversionEvent::RunFinished { .. } => "run_finished",
            };
            self.events.lock().unwrap().push(name.to_string());
        }
    }

    fn write_edges(dir: &Path, body_lines: usize) -> std::path::PathBuf {
        let path = dir.join("edges.tsv");
        let mut text = String::from("subject\tpredicate\tobject\n");
        for i in 0..body_lines {
            text.push_str(&format!("s{i}\tp\to{i}\n"));
        }
        std::fs::write(&path, text).unwrap();
        path
    }

    fn engine(input: &Path, threads: usize) -> ConversionEngine {
        ConversionEngine::new(ConvertOptions {
            input: input.to_path_buf(),
            threads,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn partitioned_run_reports_every_segment() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_edges(dir.path(), 10);
        let out_dir = dir.path().join("segments");

        let summary = engine(&input, 3).convert_partitioned(&out_dir).unwrap();

        assert_eq!(summary.body_lines, 10);
        assert_eq!(summary.rows_written(), 10);
        let workers: Vec<_> = summary.segments.iter().map(|s| (s.worker, s.bucket.min, s.bucket.max)).collect();
        assert_eq!(workers, vec![(0, 0, 3), (1, 4, 7), (2, 8, 9)]);
        assert_eq!(summary.metrics.segments_finished, 3);
        assert_eq!(summary.metrics.rows_written, 10);
        assert!(out_dir.join("headers.tsv").exists());
    }

    #[test]
    fn empty_body_launches_no_workers() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_edges(dir.path(), 0);
        let obs = Arc::new(RecordingObserver::default());

        let summary = engine(&input, 4)
            .with_observer(obs.clone())
            .convert_partitioned(dir.path().join("out"))
            .unwrap();

        assert!(summary.segments.is_empty());
        let events = obs.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec!["run_started", "header_written", "lines_counted", "buckets_planned", "run_finished"]
        );
    }

    #[test]
    fn missing_column_fails_before_any_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("edges.tsv");
        std::fs::write(&input, "subject\tpredicate\ttarget\na\tb\tc\n").unwrap();
        let out_dir = dir.path().join("out");
        let obs = Arc::new(RecordingObserver::default());

        let err = engine(&input, 2)
            .with_observer(obs.clone())
            .convert_partitioned(&out_dir)
            .unwrap_err();

        assert!(matches!(err, ConvertError::ColumnNotFound { ref column, .. } if column == "object"));
        assert!(!out_dir.exists());
        let events = obs.events.lock().unwrap().clone();
        assert_eq!(events, vec!["run_started", "run_failed", "run_finished"]);
    }

    #[test]
    fn worker_failures_are_aggregated() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("edges.tsv");
        // Line 2 is too short for the object column.
        std::fs::write(
            &input,
            "subject\tpredicate\tobject\na\tp\tb\nc\tp\td\nbroken\ne\tp\tf\n",
        )
        .unwrap();

        let eng = engine(&input, 4);
        let err = eng.convert_partitioned(dir.path().join("out")).unwrap_err();
        match err {
            ConvertError::SegmentsFailed { failed, total, failures } => {
                // Four lines over four threads plan two buckets: [0,1] and [2,3].
                assert_eq!((failed, total), (1, 2));
                assert_eq!(failures[0].worker, 1);
                assert!(matches!(failures[0].error, ConvertError::FieldOutOfRange { line: 2, .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        let snap = eng.metrics().snapshot();
        assert_eq!((snap.segments_finished, snap.segments_failed), (1, 1));
    }

    #[test]
    fn stale_segments_from_a_wider_run_are_removed() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_edges(dir.path(), 10);
        let out_dir = dir.path().join("segments");

        // Ten lines over eight threads plan five buckets, over two threads two.
        engine(&input, 8).convert_partitioned(&out_dir).unwrap();
        assert!(out_dir.join("4.tsv").exists());
        std::fs::write(out_dir.join("notes.tsv"), "keep me\n").unwrap();

        let summary = engine(&input, 2).convert_partitioned(&out_dir).unwrap();

        assert_eq!(summary.segments.len(), 2);
        for worker in 2..5 {
            assert!(!out_dir.join(format!("{worker}.tsv")).exists(), "{worker}.tsv");
        }
        assert!(out_dir.join("1.tsv").exists());
        assert!(out_dir.join("headers.tsv").exists());
        assert!(out_dir.join("notes.tsv").exists());
    }

    #[test]
    fn zero_threads_is_rejected() {
        let err = ConversionEngine::new(ConvertOptions {
            threads: 0,
            ..Default::default()
        })
        .err()
        .unwrap();
        assert!(matches!(err, ConvertError::InvalidOptions { .. }));
    }
}
