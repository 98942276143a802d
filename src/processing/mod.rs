//! Line transformations.
//!
//! The processing layer turns body lines into converted rows. It never holds more than one line
//! per worker in memory.
//!
//! Currently implemented:
//!
//! - [`create_buckets()`]: split body lines into contiguous inclusive ranges
//! - [`rewrite_record()`]: prefix the designated fields of one record
//! - [`transform_segment()`]: convert one bucket into its own output
//!
//! ## Example: plan buckets and rewrite a row
//!
//! ```rust
//! use kgx_edges::processing::{create_buckets, rewrite_record};
//! use kgx_edges::types::{Bucket, ColumnIndex};
//!
//! let buckets = create_buckets(10, 3);
//! assert_eq!(buckets[2], Bucket::new(8, 9));
//!
//! let mut row = vec![b"a".to_vec(), b"knows".to_vec(), b"b".to_vec()];
//! rewrite_record(&mut row, ColumnIndex { subject: 0, object: 2 }, "nodes", 0).unwrap();
//! assert_eq!(row, [b"nodes/a".to_vec(), b"knows".to_vec(), b"nodes/b".to_vec()]);
//! ```

pub mod partition;
pub mod rewrite;
pub mod segment;

pub use partition::create_buckets;
pub use rewrite::{prefix_value, rewrite_field, rewrite_record};
pub use segment::{segment_path, transform_segment, transform_segment_into, SegmentJob, SegmentReport};
