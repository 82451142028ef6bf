use thiserror::Error;

use crate::constants::Split;

/// Row-level parsing errors for trajectory source files.
///
/// Variants
/// -----------------
/// * `MissingField` – The row has fewer than the six expected columns; payload is the column name.
/// * `InvalidFrame` – The frame column is not a finite number; payload carries the offending text.
/// * `InvalidCoordinate` – The `x` or `y` column is not a finite float; payload carries the offending text.
#[derive(Error, Debug, PartialEq)]
pub enum ParseRecordError {
    #[error("missing column `{0}`")]
    MissingField(&'static str),
    #[error("invalid frame id: {0}")]
    InvalidFrame(String),
    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(String),
}

#[derive(Error, Debug)]
pub enum TrajwinError {
    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV reader error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Invalid YAML configuration: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Malformed row {line} in {path}: {source}")]
    ParseRecord {
        path: String,
        line: u64,
        #[source]
        source: ParseRecordError,
    },

    #[error("File name is not a numeric sequence id: {0}")]
    InvalidSequenceFile(String),

    #[error("Invalid dataset parameter: {0}")]
    InvalidParameter(String),

    #[error("No usable sequence found in split `{split}`")]
    EmptyDataset { split: Split },

    #[error("Cannot collate an empty batch")]
    EmptyBatch,

    #[error("Sequence index {index} out of range (dataset holds {len} sequences)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Class balance needs a curved trajectory but the dataset has none")]
    NoCurvedTrajectories,

    #[error("Array shape error: {0}")]
    ShapeError(#[from] ndarray::ShapeError),

    #[error("Context rendering failed: {0}")]
    ContextError(String),
}

impl PartialEq for TrajwinError {
    fn eq(&self, other: &Self) -> bool {
        use TrajwinError::*;
        match (self, other) {
            // Wrapped library errors are not comparable: same variant is enough
            (IoError(_), IoError(_)) => true,
            (CsvError(_), CsvError(_)) => true,
            (YamlError(_), YamlError(_)) => true,
            (ShapeError(a), ShapeError(b)) => a.kind() == b.kind(),

            (
                ParseRecord {
                    path: p1,
                    line: l1,
                    source: s1,
                },
                ParseRecord {
                    path: p2,
                    line: l2,
                    source: s2,
                },
            ) => p1 == p2 && l1 == l2 && s1 == s2,
            (InvalidSequenceFile(a), InvalidSequenceFile(b)) => a == b,
            (InvalidParameter(a), InvalidParameter(b)) => a == b,
            (EmptyDataset { split: a }, EmptyDataset { split: b }) => a == b,
            (
                IndexOutOfRange { index: i1, len: l1 },
                IndexOutOfRange { index: i2, len: l2 },
            ) => i1 == i2 && l1 == l2,
            (ContextError(a), ContextError(b)) => a == b,

            (EmptyBatch, EmptyBatch) => true,
            (NoCurvedTrajectories, NoCurvedTrajectories) => true,

            _ => false,
        }
    }
}
