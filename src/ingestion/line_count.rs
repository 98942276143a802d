//! Streaming line counting.

use std::fs::File;
use std::io::{self, BufRead, BufReader, ErrorKind, Read};
use std::path::Path;

use memchr::memchr_iter;

use crate::error::{ConvertError, ConvertResult};

/// Size of the fixed read buffer used by [`count_lines`].
pub const COUNT_BUFFER_SIZE: usize = 64 * 1024;

/// Line terminator byte.
pub const LINE_BREAK: u8 = b'\n';

/// Count `\n` bytes in `reader` without keeping any line contents.
///
/// Reads through a fixed [`COUNT_BUFFER_SIZE`] buffer, so memory use does not depend on input
/// size. A trailing line without a terminator is **not** counted: `"a\nb"` has one line.
///
/// # Errors
///
/// Returns the underlying error for any failed read other than [`ErrorKind::Interrupted`].
pub fn count_lines<R: Read>(mut reader: R) -> io::Result<usize> {
    let mut buf = vec![0u8; COUNT_BUFFER_SIZE];
    let mut count = 0usize;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => return Ok(count),
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        count += memchr_iter(LINE_BREAK, &buf[..n]).count();
    }
}

/// Count body lines of the file at `path`, i.e. terminated lines after the header line.
///
/// An empty file has zero body lines. The trailing-line policy of [`count_lines`] applies.
pub fn count_body_lines(path: impl AsRef<Path>) -> ConvertResult<usize> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| ConvertError::io(path, e))?;
    let mut reader = BufReader::new(file);

    let mut header = Vec::new();
    let skipped = reader
        .read_until(LINE_BREAK, &mut header)
        .map_err(|e| ConvertError::io(path, e))?;
    if skipped == 0 || header.last() != Some(&LINE_BREAK) {
        return Ok(0);
    }

    count_lines(reader).map_err(|e| ConvertError::io(path, e))
}
