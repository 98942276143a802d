//! Splitting body lines into per-worker buckets.

use crate::types::Bucket;

/// Split body lines `0..line_count` into contiguous inclusive buckets.
///
/// Each bucket spans `line_count / threads + 1` lines, the last one is clamped to
/// `line_count - 1`. The result is sorted, non-overlapping and gap-free. It may hold fewer
/// buckets than `threads` (`9` lines over `4` threads gives three buckets of three), and when
/// `threads > line_count` every line becomes its own bucket.
///
/// `threads == 0` is treated as `1`.
///
/// ```rust
/// use kgx_edges::processing::create_buckets;
/// use kgx_edges::types::Bucket;
///
/// assert_eq!(
///     create_buckets(10, 3),
///     vec![Bucket::new(0, 3), Bucket::new(4, 7), Bucket::new(8, 9)]
/// );
/// assert!(create_buckets(0, 8).is_empty());
/// ```
pub fn create_buckets(line_count: usize, threads: usize) -> Vec<Bucket> {
    if line_count == 0 {
        return Vec::new();
    }
    let bucket_size = line_count / threads.max(1);
    let stride = bucket_size + 1;
    let mut out = Vec::with_capacity(line_count.div_ceil(stride));
    let mut min = 0usize;
    while min < line_count {
        let max = (min + bucket_size).min(line_count - 1);
        out.push(Bucket::new(min, max));
        min += stride;
    }
    out
}
