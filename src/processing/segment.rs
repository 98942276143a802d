//! Per-bucket segment transformation.
//!
//! A segment worker owns everything it touches: it opens its own handle to the input, skips to
//! the start of its bucket, and writes transformed rows to an output nobody else writes to.
//! Workers therefore need no locking; the only shared state is read-only job data and the
//! cancellation flag.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::error::{ConvertError, ConvertResult};
use crate::execution::CancellationToken;
use crate::ingestion::line_count::LINE_BREAK;
use crate::types::{Bucket, ColumnIndex};

use super::rewrite::{record_writer, rewrite_record, split_fields, trim_line_terminator};

/// File name of the header-only output in partitioned mode.
pub const HEADER_FILE_NAME: &str = "headers.tsv";

/// Everything one worker needs to transform one bucket.
#[derive(Debug, Clone)]
pub struct SegmentJob {
    /// Worker id; also names the output segment.
    pub worker: usize,
    /// Body lines to transform.
    pub bucket: Bucket,
    /// Input file, reopened by every worker.
    pub input: Arc<Path>,
    /// Designated column positions.
    pub columns: ColumnIndex,
    /// Collection prefix for rewritten values.
    pub collection: Arc<str>,
    /// Field delimiter.
    pub delimiter: u8,
    /// Checked between rows.
    pub cancel: CancellationToken,
}

/// Outcome of a finished segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentReport {
    pub worker: usize,
    pub bucket: Bucket,
    /// Rows written.
    pub rows: usize,
    /// Segment file, if the segment was written to disk.
    pub path: Option<PathBuf>,
}

/// Path of the segment file for `worker` inside `dir`, e.g. `dir/3.tsv`.
pub fn segment_path(dir: impl AsRef<Path>, worker: usize) -> PathBuf {
    dir.as_ref().join(format!("{worker}.tsv"))
}

/// Transform `job.bucket` into a new segment file at `output`.
pub fn transform_segment(job: &SegmentJob, output: impl AsRef<Path>) -> ConvertResult<SegmentReport> {
    let output = output.as_ref();
    let file = File::create(output).map_err(|e| ConvertError::io(output, e))?;
    let mut report = transform_segment_into(job, BufWriter::new(file), output)?;
    report.path = Some(output.to_path_buf());
    Ok(report)
}

/// Transform `job.bucket` into `sink`.
///
/// Skips the header and the `job.bucket.min` body lines before the bucket, then rewrites lines
/// `min..=max` in order. `sink` is flushed before returning. `destination` names the sink in
/// error reports.
///
/// # Errors
///
/// - [`ConvertError::Io`] on the input path if the input cannot be opened or read
/// - [`ConvertError::Io`] on `destination` if `sink` cannot be written
/// - [`ConvertError::UnexpectedEof`] if the input ends before `job.bucket.max`
/// - [`ConvertError::FieldOutOfRange`] for a row too short for the designated columns
/// - [`ConvertError::Cancelled`] if `job.cancel` was raised
pub fn transform_segment_into<W: Write>(
    job: &SegmentJob,
    sink: W,
    destination: &Path,
) -> ConvertResult<SegmentReport> {
    let input: &Path = &job.input;
    let file = File::open(input).map_err(|e| ConvertError::io(input, e))?;
    let mut reader = BufReader::new(file);

    let expected = job.bucket.line_count();
    let mut skip = Vec::new();
    for _ in 0..=job.bucket.min {
        skip.clear();
        let n = reader
            .read_until(LINE_BREAK, &mut skip)
            .map_err(|e| ConvertError::io(input, e))?;
        if n == 0 {
            return Err(ConvertError::UnexpectedEof {
                worker: job.worker,
                expected,
                read: 0,
            });
        }
    }

    let mut writer = record_writer(sink, job.delimiter);
    let mut line = Vec::new();
    let mut rows = 0usize;
    for line_idx in job.bucket.lines() {
        if job.cancel.is_cancelled() {
            return Err(ConvertError::Cancelled { worker: job.worker });
        }
        line.clear();
        let n = reader
            .read_until(LINE_BREAK, &mut line)
            .map_err(|e| ConvertError::io(input, e))?;
        if n == 0 {
            return Err(ConvertError::UnexpectedEof {
                worker: job.worker,
                expected,
                read: rows,
            });
        }
        trim_line_terminator(&mut line);

        let mut record = split_fields(&line, job.delimiter);
        rewrite_record(&mut record, job.columns, &job.collection, line_idx)?;
        writer
            .write_record(&record)
            .map_err(|e| ConvertError::sink(destination, e))?;
        rows += 1;
    }
    writer.flush().map_err(|e| ConvertError::io(destination, e))?;

    Ok(SegmentReport {
        worker: job.worker,
        bucket: job.bucket,
        rows,
        path: None,
    })
}
