//! Header reading and designated column resolution.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::error::{ConvertError, ConvertResult};
use crate::ingestion::line_count::LINE_BREAK;
use crate::processing::rewrite::{record_writer, split_fields, trim_line_terminator};
use crate::types::{ColumnIndex, ColumnNames, Field, Record};

/// A header with designated columns located and renamed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedHeader {
    /// Header as it should be written to output.
    pub header: Record,
    /// Positions of the designated columns.
    pub columns: ColumnIndex,
}

/// Position of the first field equal to `name`.
pub fn find_column(header: &[Field], name: &str) -> Option<usize> {
    header.iter().position(|h| h.as_slice() == name.as_bytes())
}

/// Position of the first field equal to `name`, or `header.len()` if there is none.
///
/// The returned sentinel is one past the last field. Rewriting at that position through
/// [`crate::processing::rewrite::rewrite_field`] reports
/// [`ConvertError::FieldOutOfRange`].
pub fn position_or_len(header: &[Field], name: &str) -> usize {
    find_column(header, name).unwrap_or(header.len())
}

/// Locate both designated columns.
///
/// # Errors
///
/// Returns [`ConvertError::ColumnNotFound`] naming the first missing column.
pub fn resolve_columns(header: &[Field], subject: &str, object: &str) -> ConvertResult<ColumnIndex> {
    let lookup = |name: &str| {
        find_column(header, name).ok_or_else(|| ConvertError::ColumnNotFound {
            column: name.to_string(),
            header: field_names(header),
        })
    };
    Ok(ColumnIndex {
        subject: lookup(subject)?,
        object: lookup(object)?,
    })
}

/// Rename the designated columns in place. Other columns keep their names and order.
pub fn rename_header(header: &mut Record, columns: ColumnIndex, from: &str, to: &str) {
    if let Some(h) = header.get_mut(columns.subject) {
        *h = from.as_bytes().to_vec();
    }
    if let Some(h) = header.get_mut(columns.object) {
        *h = to.as_bytes().to_vec();
    }
}

/// Header fields as text for reports; invalid UTF-8 is replaced with U+FFFD.
pub fn field_names(header: &[Field]) -> Vec<String> {
    header
        .iter()
        .map(|f| String::from_utf8_lossy(f).into_owned())
        .collect()
}

/// Resolve and rename an already-split header.
pub fn resolve_header(mut header: Record, names: &ColumnNames) -> ConvertResult<ResolvedHeader> {
    let columns = resolve_columns(&header, &names.subject, &names.object)?;
    rename_header(&mut header, columns, &names.from, &names.to);
    Ok(ResolvedHeader { header, columns })
}

/// Read and split the first line of the file at `path`.
///
/// # Errors
///
/// [`ConvertError::Io`] if the file cannot be opened or read, [`ConvertError::EmptyInput`] if it
/// has no bytes at all.
pub fn read_header(path: impl AsRef<Path>, delimiter: u8) -> ConvertResult<Record> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| ConvertError::io(path, e))?;
    let mut reader = BufReader::new(file);
    let mut line = Vec::new();
    let n = reader
        .read_until(LINE_BREAK, &mut line)
        .map_err(|e| ConvertError::io(path, e))?;
    if n == 0 {
        return Err(ConvertError::EmptyInput {
            path: path.to_path_buf(),
        });
    }
    trim_line_terminator(&mut line);
    Ok(split_fields(&line, delimiter))
}

/// Write `header` as one delimited line to `sink`.
///
/// Errors are left to the caller to attribute, see [`ConvertError::sink`].
pub fn write_header<W: Write>(sink: W, header: &[Field], delimiter: u8) -> csv::Result<()> {
    let mut writer = record_writer(sink, delimiter);
    writer.write_record(header)?;
    writer.flush()?;
    Ok(())
}
