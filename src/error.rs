use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Convenience result type for conversion operations.
pub type ConvertResult<T> = Result<T, ConvertError>;

/// Severity classification used for observer callbacks and exit reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConversionSeverity {
    /// Informational event.
    Info,
    /// Warning-level event (non-fatal).
    Warning,
    /// The input or configuration is not usable as given.
    Error,
    /// I/O or other infrastructure failure.
    Critical,
}

/// A single failed segment, reported after every worker has finished.
#[derive(Debug)]
pub struct SegmentFailure {
    /// Worker (and output segment) id.
    pub worker: usize,
    /// Why the worker stopped.
    pub error: ConvertError,
}

/// Error type returned by every conversion stage.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Opening, reading or writing a file failed.
    #[error("io error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Header parsing or record writing failed.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// The input has no header row.
    #[error("input '{}' is empty (no header row)", .path.display())]
    EmptyInput { path: PathBuf },

    /// A designated column is absent from the header.
    #[error("column '{column}' not found in header {header:?}")]
    ColumnNotFound { column: String, header: Vec<String> },

    /// A record is too short for a resolved column index.
    #[error("line {line}: field index {index} out of range for a record with {fields} fields")]
    FieldOutOfRange {
        line: usize,
        index: usize,
        fields: usize,
    },

    /// The input ended before a worker reached the end of its bucket.
    #[error("worker {worker}: input ended after {read} of {expected} lines")]
    UnexpectedEof {
        worker: usize,
        expected: usize,
        read: usize,
    },

    /// A worker stopped because another worker failed first.
    #[error("worker {worker} cancelled")]
    Cancelled { worker: usize },

    /// One or more segment workers failed.
    #[error("{failed} of {total} segments failed; first: {}", first_failure(.failures))]
    SegmentsFailed {
        failed: usize,
        total: usize,
        failures: Vec<SegmentFailure>,
    },

    /// Options failed validation.
    #[error("invalid options: {message}")]
    InvalidOptions { message: String },

    /// The worker pool could not be built.
    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// A JSON config file could not be parsed, or a summary could not be serialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConvertError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Attribute a record writer failure to the destination it was writing to.
    pub fn sink(path: &Path, err: csv::Error) -> Self {
        match err.into_kind() {
            csv::ErrorKind::Io(source) => Self::io(path, source),
            kind => Self::io(path, io::Error::other(format!("{kind:?}"))),
        }
    }

    /// Severity used for observer callbacks.
    pub fn severity(&self) -> ConversionSeverity {
        match self {
            Self::Io { .. } | Self::ThreadPool(_) => ConversionSeverity::Critical,
            Self::Cancelled { .. } => ConversionSeverity::Warning,
            Self::SegmentsFailed { failures, .. } => failures
                .iter()
                .map(|f| f.error.severity())
                .max()
                .unwrap_or(ConversionSeverity::Error),
            _ => ConversionSeverity::Error,
        }
    }
}

fn first_failure(failures: &[SegmentFailure]) -> String {
    // Prefer a root cause over cancellations.
    failures
        .iter()
        .find(|f| !matches!(f.error, ConvertError::Cancelled { .. }))
        .or_else(|| failures.first())
        .map(|f| format!("worker {}: {}", f.worker, f.error))
        .unwrap_or_else(|| "none".to_string())
}
