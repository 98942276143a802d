//! Field-level rewriting of records.
//!
//! Lines are handled as raw bytes: only the delimiter and the line terminator are interpreted,
//! so values in any encoding pass through unchanged.

use std::io::Write;

use csv::{QuoteStyle, Terminator, WriterBuilder};

use crate::error::{ConvertError, ConvertResult};
use crate::types::{ColumnIndex, Field, Record};

/// Split one line into fields. Delimiters are never quoted or escaped.
pub fn split_fields(line: &[u8], delimiter: u8) -> Record {
    line.split(|&b| b == delimiter).map(<[u8]>::to_vec).collect()
}

/// Strip one trailing `\n` and then one trailing `\r`, if present.
pub fn trim_line_terminator(line: &mut Vec<u8>) {
    if line.last() == Some(&b'\n') {
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
    }
}

/// Qualify `value` with `collection`, e.g. `nodes/a`.
pub fn prefix_value(collection: &str, value: &[u8]) -> Field {
    let mut out = Vec::with_capacity(collection.len() + 1 + value.len());
    out.extend_from_slice(collection.as_bytes());
    out.push(b'/');
    out.extend_from_slice(value);
    out
}

/// Prefix the field at `index` in place.
///
/// `line` is only used for error reporting (0-based body line index).
///
/// # Errors
///
/// Returns [`ConvertError::FieldOutOfRange`] if the record has no field at `index`.
pub fn rewrite_field(
    record: &mut Record,
    index: usize,
    collection: &str,
    line: usize,
) -> ConvertResult<()> {
    let fields = record.len();
    let field = record
        .get_mut(index)
        .ok_or(ConvertError::FieldOutOfRange {
            line,
            index,
            fields,
        })?;
    let qualified = prefix_value(collection, field);
    *field = qualified;
    Ok(())
}

/// Prefix both designated fields of a body record.
///
/// Not idempotent: rewriting twice yields `collection/collection/value`.
pub fn rewrite_record(
    record: &mut Record,
    columns: ColumnIndex,
    collection: &str,
    line: usize,
) -> ConvertResult<()> {
    rewrite_field(record, columns.subject, collection, line)?;
    rewrite_field(record, columns.object, collection, line)
}

/// Build a record writer for delimited output: no quoting, `\n` terminated, ragged rows allowed.
pub fn record_writer<W: Write>(sink: W, delimiter: u8) -> csv::Writer<W> {
    WriterBuilder::new()
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Never)
        .terminator(Terminator::Any(b'\n'))
        .flexible(true)
        .has_headers(false)
        .from_writer(sink)
}
