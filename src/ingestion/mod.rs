//! Reading the input: header resolution and streaming line counts.
//!
//! - [`header`]: read the first row, locate the designated columns, rename them
//! - [`line_count`]: count terminated body lines without holding them in memory

pub mod header;
pub mod line_count;

pub use header::{
    field_names, find_column, position_or_len, read_header, rename_header, resolve_columns, resolve_header,
    write_header, ResolvedHeader,
};
pub use line_count::{count_body_lines, count_lines};
