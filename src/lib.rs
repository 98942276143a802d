//! `kgx-edges` converts a tab-separated edge list (KGX-style `subject / predicate / object`
//! records) into a graph-database edge import file.
//!
//! The designated `subject` and `object` header columns are renamed to `_from` and `_to` at their
//! original positions, and every body value in those columns becomes `<collection>/<value>`.
//!
//! The primary entrypoint is [`execution::ConversionEngine`], configured with a
//! [`config::ConvertOptions`].
//!
//! ## Output modes
//!
//! - **Whole output** ([`execution::ConversionEngine::convert_to_file`]): header and every row in
//!   input order in one file.
//! - **Partitioned** ([`execution::ConversionEngine::convert_partitioned`]): the body is split into
//!   contiguous line ranges ([`types::Bucket`]); each range is converted by its own worker, which
//!   re-opens the input and writes `<worker>.tsv`. The renamed header goes to `headers.tsv`.
//!   Concatenating `headers.tsv`, `0.tsv`, `1.tsv`, ... reproduces the whole-output file; that
//!   step is left to the caller.
//!
//! ## Quick example
//!
//! ```no_run
//! use kgx_edges::config::ConvertOptions;
//! use kgx_edges::execution::ConversionEngine;
//!
//! # fn main() -> Result<(), kgx_edges::ConvertError> {
//! let engine = ConversionEngine::new(ConvertOptions {
//!     input: "edges.tsv".into(),
//!     collection: "nodes".to_string(),
//!     threads: 8,
//!     segments_dir: Some("out".into()),
//!     ..Default::default()
//! })?;
//! let summary = engine.convert()?;
//! println!("rows={} segments={}", summary.rows_written(), summary.segments.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Line policy
//!
//! Only terminated body lines are converted. A final line without a trailing `\n` is not counted
//! and not written, in either mode. Lines are treated as bytes: only the delimiter and `\n` are
//! interpreted, so non-UTF-8 values are copied through unchanged.
//!
//! ## Modules
//!
//! - [`ingestion`]: header resolution and streaming line counts
//! - [`processing`]: bucket planning, row rewriting, segment workers
//! - [`execution`]: the engine, cancellation, metrics and observer hooks
//! - [`config`]: conversion options
//! - [`types`]: records, column positions, buckets
//! - [`error`]: error types used across the crate

pub mod config;
pub mod error;
pub mod execution;
pub mod ingestion;
pub mod processing;
pub mod types;

pub use error::{ConversionSeverity, ConvertError, ConvertResult};
