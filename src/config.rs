//! Conversion options.
//!
//! [`ConvertOptions`] is built once (from defaults, a JSON file, and/or CLI flags), validated,
//! and then passed by reference into the engine. Nothing reads configuration from globals.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, ConvertResult};
use crate::types::ColumnNames;

/// Default input path.
pub const DEFAULT_INPUT: &str = "file.tsv";
/// Default collection prefix.
pub const DEFAULT_COLLECTION: &str = "nodes";
/// Default whole-output destination.
pub const DEFAULT_OUTPUT: &str = "output.tsv";

/// Options controlling a conversion run.
///
/// Use [`Default`] for the common case. Missing fields in a JSON config take their defaults.
///
/// ```rust
/// use kgx_edges::config::ConvertOptions;
///
/// let opts = ConvertOptions {
///     threads: 4,
///     collection: "genes".to_string(),
///     ..Default::default()
/// };
/// assert!(opts.validate().is_ok());
/// assert!(opts.partitioned());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    /// Input TSV file.
    pub input: PathBuf,
    /// Prefix applied to rewritten values.
    pub collection: String,
    /// Number of segment workers (and rayon threads).
    pub threads: usize,
    /// Destination of whole-output mode.
    pub output: PathBuf,
    /// Directory for `headers.tsv` and segment files. Forces partitioned mode when set.
    pub segments_dir: Option<PathBuf>,
    /// Designated column names and their replacements.
    pub columns: ColumnNames,
    /// Field delimiter, a single ASCII byte.
    pub delimiter: u8,
    /// Cancel remaining workers after the first failure.
    pub fail_fast: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_INPUT),
            collection: DEFAULT_COLLECTION.to_string(),
            threads: 1,
            output: PathBuf::from(DEFAULT_OUTPUT),
            segments_dir: None,
            columns: ColumnNames::default(),
            delimiter: b'\t',
            fail_fast: false,
        }
    }
}

impl ConvertOptions {
    /// Load options from a JSON file.
    pub fn from_json_path(path: impl AsRef<Path>) -> ConvertResult<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| ConvertError::io(path, e))?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Whether this run writes partitioned segments instead of one output file.
    pub fn partitioned(&self) -> bool {
        self.segments_dir.is_some() || self.threads > 1
    }

    /// Directory used for partitioned output; the current directory unless configured.
    pub fn segments_dir_or_default(&self) -> PathBuf {
        self.segments_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Check option invariants.
    pub fn validate(&self) -> ConvertResult<()> {
        let invalid = |message: &str| {
            Err(ConvertError::InvalidOptions {
                message: message.to_string(),
            })
        };

        if self.threads == 0 {
            return invalid("threads must be > 0");
        }
        if self.collection.is_empty() {
            return invalid("collection must not be empty");
        }
        if self.columns.subject == self.columns.object {
            return invalid("subject and object columns must differ");
        }
        if !self.delimiter.is_ascii() || matches!(self.delimiter, b'\n' | b'\r') {
            return invalid("delimiter must be a single ASCII byte other than a line break");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::ConvertOptions;
    use crate::error::ConvertError;

    #[test]
    fn defaults_match_cli_defaults() {
        let opts = ConvertOptions::default();
        assert_eq!(opts.input, PathBuf::from("file.tsv"));
        assert_eq!(opts.collection, "nodes");
        assert_eq!(opts.threads, 1);
        assert_eq!(opts.output, PathBuf::from("output.tsv"));
        assert!(!opts.partitioned());
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("convert.json");
        std::fs::write(
            &path,
            r#"{"collection": "genes", "threads": 3, "columns": {"object": "target"}}"#,
        )
        .unwrap();

        let opts = ConvertOptions::from_json_path(&path).unwrap();
        assert_eq!(opts.collection, "genes");
        assert_eq!(opts.threads, 3);
        assert_eq!(opts.columns.object, "target");
        assert_eq!(opts.columns.subject, "subject");
        assert_eq!(opts.columns.to, "_to");
        assert_eq!(opts.delimiter, b'\t');
        assert!(opts.partitioned());
    }

    #[test]
    fn malformed_json_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ threads: ").unwrap();
        let err = ConvertOptions::from_json_path(&path).unwrap_err();
        assert!(matches!(err, ConvertError::Json(_)));
    }

    #[test]
    fn validate_rejects_bad_options() {
        let cases = [
            ConvertOptions {
                threads: 0,
                ..Default::default()
            },
            ConvertOptions {
                collection: String::new(),
                ..Default::default()
            },
            ConvertOptions {
                delimiter: b'\n',
                ..Default::default()
            },
            ConvertOptions {
                delimiter: 0xE9,
                ..Default::default()
            },
        ];
        for opts in cases {
            let err = opts.validate().unwrap_err();
            assert!(err.to_string().starts_with("invalid options"), "{opts:?}");
        }

        let mut same = ConvertOptions::default();
        same.columns.object = same.columns.subject.clone();
        assert!(same.validate().is_err());
    }
}
