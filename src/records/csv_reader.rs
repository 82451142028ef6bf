//! # CSV source reader
//!
//! Decodes one source file into a [`SourceFile`]. The file is a delimited table with a
//! header row and six columns, in this order:
//!
//! | column | content | decoding |
//! |---|---|---|
//! | 0 | frame / timestamp | finite float |
//! | 1 | track identifier | dense per-file index, first-occurrence order |
//! | 2 | object class | `"AV"` → Ego, `"AGENT"` → Agent, else Other |
//! | 3, 4 | `x`, `y` | finite float |
//! | 5 | city | `"PIT"` → Pittsburgh, else Miami |
//!
//! Column names are not interpreted; only the column order matters.
//!
//! ## Error Handling
//! -----------------
//! Any row that cannot be decoded aborts the read with [`TrajwinError::ParseRecord`],
//! carrying the file label, the 1-based line number and a [`ParseRecordError`].
use std::{collections::HashMap, fs::File, io::Read};

use ahash::RandomState;
use camino::Utf8Path;
use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::debug;

use crate::{
    constants::{City, FrameId, ObjectClass, ObjectIndex},
    dataset::file_list::sequence_id_from_path,
    records::{RawRecord, SourceFile},
    trajwin_errors::{ParseRecordError, TrajwinError},
};

const COLUMNS: [&str; 6] = ["frame", "track_id", "object_type", "x", "y", "city"];

/// Per-file mapping from track identifier to dense [`ObjectIndex`].
#[derive(Debug, Default)]
struct ObjectEnumerator {
    index: HashMap<String, ObjectIndex, RandomState>,
    labels: Vec<String>,
}

impl ObjectEnumerator {
    fn index_of(&mut self, label: &str) -> ObjectIndex {
        if let Some(&idx) = self.index.get(label) {
            return idx;
        }
        let idx = self.labels.len() as ObjectIndex;
        self.index.insert(label.to_owned(), idx);
        self.labels.push(label.to_owned());
        idx
    }
}

fn field<'r>(row: &'r StringRecord, col: usize) -> Result<&'r str, ParseRecordError> {
    row.get(col)
        .ok_or(ParseRecordError::MissingField(COLUMNS[col]))
}

fn parse_frame(text: &str) -> Result<FrameId, ParseRecordError> {
    text.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ParseRecordError::InvalidFrame(text.to_owned()))
}

fn parse_coordinate(text: &str) -> Result<f64, ParseRecordError> {
    text.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ParseRecordError::InvalidCoordinate(text.to_owned()))
}

fn decode_row(
    row: &StringRecord,
    objects: &mut ObjectEnumerator,
) -> Result<RawRecord, ParseRecordError> {
    let frame = parse_frame(field(row, 0)?)?;
    let track = field(row, 1)?;
    let class = ObjectClass::from_label(field(row, 2)?);
    let x = parse_coordinate(field(row, 3)?)?;
    let y = parse_coordinate(field(row, 4)?)?;
    let city = City::from_label(field(row, 5)?);

    Ok(RawRecord::new(
        frame,
        objects.index_of(track),
        class,
        [x, y],
        city,
    ))
}

/// Decode every row of a CSV stream.
///
/// Arguments
/// -----------------
/// * `reader`: any byte source holding the table, header row included.
/// * `label`: name used in error messages (usually the file path).
///
/// Return
/// ----------
/// * The decoded rows, in stream order, and the original track identifiers indexed by
///   their dense [`ObjectIndex`].
///
/// See also
/// ------------
/// * [`read_source_file`] – Same decoding applied to a file on disk.
pub fn read_records<R: Read>(
    reader: R,
    label: &str,
) -> Result<(Vec<RawRecord>, Vec<String>), TrajwinError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut objects = ObjectEnumerator::default();
    let mut records = Vec::new();

    for row in rdr.records() {
        let row = row?;
        let record = decode_row(&row, &mut objects).map_err(|source| {
            TrajwinError::ParseRecord {
                path: label.to_owned(),
                line: row.position().map(|p| p.line()).unwrap_or_default(),
                source,
            }
        })?;
        records.push(record);
    }

    Ok((records, objects.labels))
}

/// Read and decode a source file from disk.
///
/// The sequence id is the numeric stem of the file name (`1234.csv` → `1234`).
pub fn read_source_file(path: &Utf8Path) -> Result<SourceFile, TrajwinError> {
    let sequence_id = sequence_id_from_path(path)?;
    let file = File::open(path)?;
    let (records, object_labels) = read_records(file, path.as_str())?;

    debug!(
        file = %path,
        rows = records.len(),
        objects = object_labels.len(),
        "source file decoded"
    );

    Ok(SourceFile {
        sequence_id,
        records,
        object_labels,
    })
}
