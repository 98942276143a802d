use std::fs;
use std::sync::{Arc, Mutex};

use kgx_edges::config::ConvertOptions;
use kgx_edges::execution::{ConversionEngine, ConversionEvent, ConversionObserver};
use kgx_edges::{ConversionSeverity, ConvertError};

#[derive(Default)]
struct RecordingObserver {
    started: Mutex<Vec<usize>>,
    finished: Mutex<Vec<(usize, usize)>>,
    failed: Mutex<Vec<(usize, ConversionSeverity)>>,
    run_failures: Mutex<Vec<ConversionSeverity>>,
}

impl ConversionObserver for RecordingObserver {
    fn on_event(&self, event: &ConversionEvent) {
        match event {
            ConversionEvent::SegmentStarted { worker, .. } => self.started.lock().unwrap().push(*worker),
            ConversionEvent::SegmentFinished { worker, rows } => {
                self.finished.lock().unwrap().push((*worker, *rows))
            }
            ConversionEvent::SegmentFailed { worker, severity, .. } => {
                self.failed.lock().unwrap().push((*worker, *severity))
            }
            ConversionEvent::RunFailed { severity, .. } => self.run_failures.lock().unwrap().push(*severity),
            _ => {}
        }
    }
}

fn write_input(path: &std::path::Path, body_lines: usize, broken_line: Option<usize>) {
    let mut text = String::from("subject\tpredicate\tobject\n");
    for i in 0..body_lines {
        if Some(i) == broken_line {
            text.push_str("broken\n");
        } else {
            text.push_str(&format!("s{i}\tp\to{i}\n"));
        }
    }
    fs::write(path, text).unwrap();
}

#[test]
fn observer_sees_every_segment() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("edges.tsv");
    write_input(&input, 40, None);

    let obs = Arc::new(RecordingObserver::default());
    let engine = ConversionEngine::new(ConvertOptions {
        input: input.clone(),
        threads: 4,
        ..Default::default()
    })
    .unwrap()
    .with_observer(obs.clone());

    let summary = engine.convert_partitioned(dir.path().join("out")).unwrap();

    let mut started = obs.started.lock().unwrap().clone();
    started.sort_unstable();
    assert_eq!(started, vec![0, 1, 2, 3]);

    let mut finished = obs.finished.lock().unwrap().clone();
    finished.sort_unstable();
    assert_eq!(finished, vec![(0, 11), (1, 11), (2, 11), (3, 7)]);
    assert!(obs.failed.lock().unwrap().is_empty());

    let snap = engine.metrics().snapshot();
    assert_eq!(snap, summary.metrics);
    assert_eq!(snap.rows_written, 40);
    assert!(snap.max_active_segments >= 1 && snap.max_active_segments <= 4);
    assert!(snap.elapsed.is_some());
}

#[test]
fn failed_segment_is_reported_after_all_workers_finish() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("edges.tsv");
    write_input(&input, 40, Some(25));

    let obs = Arc::new(RecordingObserver::default());
    let engine = ConversionEngine::new(ConvertOptions {
        input: input.clone(),
        threads: 4,
        ..Default::default()
    })
    .unwrap()
    .with_observer(obs.clone());

    let err = engine.convert_partitioned(dir.path().join("out")).unwrap_err();

    // Without fail-fast the other three workers still complete.
    assert_eq!(obs.finished.lock().unwrap().len(), 3);
    assert_eq!(*obs.failed.lock().unwrap(), vec![(2, ConversionSeverity::Error)]);
    assert_eq!(*obs.run_failures.lock().unwrap(), vec![ConversionSeverity::Error]);
    match err {
        ConvertError::SegmentsFailed { failed, total, .. } => assert_eq!((failed, total), (1, 4)),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn fail_fast_reports_root_cause() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("edges.tsv");
    write_input(&input, 2_000, Some(0));

    let engine = ConversionEngine::new(ConvertOptions {
        input: input.clone(),
        threads: 4,
        fail_fast: true,
        ..Default::default()
    })
    .unwrap();

    let err = engine.convert_partitioned(dir.path().join("out")).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("worker 0: line 0"), "{msg}");
    match err {
        ConvertError::SegmentsFailed { failures, .. } => {
            assert!(failures.iter().any(|f| f.worker == 0
                && matches!(f.error, ConvertError::FieldOutOfRange { line: 0, .. })));
            assert!(failures
                .iter()
                .filter(|f| f.worker != 0)
                .all(|f| matches!(f.error, ConvertError::Cancelled { .. })));
        }
        other => panic!("unexpected error: {other}"),
    }
}
