//! Core data model types for edge conversion.
//!
//! A converted file is a header [`Record`] followed by body records. The two designated columns
//! are located once ([`ColumnIndex`]) and the body is split into inclusive line ranges
//! ([`Bucket`]) that are handed to independent workers.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// One field of a line, kept as raw bytes. Lines are not required to be UTF-8.
pub type Field = Vec<u8>;

/// One row of delimited field values.
pub type Record = Vec<Field>;

/// Default name of the column that becomes the edge source.
pub const SUBJECT_COLUMN: &str = "subject";
/// Default name of the column that becomes the edge target.
pub const OBJECT_COLUMN: &str = "object";
/// Header name written in place of the subject column.
pub const FROM_COLUMN: &str = "_from";
/// Header name written in place of the object column.
pub const TO_COLUMN: &str = "_to";

/// Names of the designated columns and the names they are renamed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    /// Header name of the edge source column.
    pub subject: String,
    /// Header name of the edge target column.
    pub object: String,
    /// Replacement header name for `subject`.
    pub from: String,
    /// Replacement header name for `object`.
    pub to: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            subject: SUBJECT_COLUMN.to_string(),
            object: OBJECT_COLUMN.to_string(),
            from: FROM_COLUMN.to_string(),
            to: TO_COLUMN.to_string(),
        }
    }
}

/// Resolved positions of the designated columns.
///
/// Created once from the header and shared read-only by every worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColumnIndex {
    /// Position of the column renamed to `_from`.
    pub subject: usize,
    /// Position of the column renamed to `_to`.
    pub object: usize,
}

/// A contiguous, inclusive range of body line indices (header excluded).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Bucket {
    /// First body line, inclusive.
    pub min: usize,
    /// Last body line, inclusive.
    pub max: usize,
}

impl Bucket {
    /// Create a bucket covering `min..=max`.
    ///
    /// # Panics
    ///
    /// Panics if `max < min`.
    pub fn new(min: usize, max: usize) -> Self {
        assert!(min <= max, "bucket max {max} is before min {min}");
        Self { min, max }
    }

    /// Number of body lines in the bucket, always at least one.
    pub fn line_count(&self) -> usize {
        self.max - self.min + 1
    }

    /// Body line indices covered by the bucket.
    pub fn lines(&self) -> RangeInclusive<usize> {
        self.min..=self.max
    }
}
