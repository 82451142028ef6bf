//! Enumeration of the source files of a split and selection of the subset to load.
use camino::{Utf8Path, Utf8PathBuf};
use rand::{seq::index::sample, Rng};

use crate::{constants::SequenceId, params::DatasetParams, trajwin_errors::TrajwinError};

/// A source file and the sequence id derived from its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceFile {
    pub sequence_id: SequenceId,
    pub path: Utf8PathBuf,
}

/// Numeric stem of a source file name (`/data/train/data/1234.csv` → `1234`).
pub fn sequence_id_from_path(path: &Utf8Path) -> Result<SequenceId, TrajwinError> {
    path.file_stem()
        .and_then(|stem| stem.parse::<SequenceId>().ok())
        .ok_or_else(|| TrajwinError::InvalidSequenceFile(path.to_string()))
}

/// List the `*.csv` files of a folder, sorted by sequence id.
///
/// Return
/// ----------
/// * Every CSV file of `folder`, or [`TrajwinError::InvalidSequenceFile`] as soon as one of
///   them does not have a numeric stem.
pub fn list_sequence_files(folder: &Utf8Path) -> Result<Vec<SequenceFile>, TrajwinError> {
    let mut files = Vec::new();
    for entry in folder.read_dir_utf8()? {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type()?.is_file() || path.extension() != Some("csv") {
            continue;
        }
        files.push(SequenceFile {
            sequence_id: sequence_id_from_path(path)?,
            path: path.to_owned(),
        });
    }
    files.sort_by_key(|f| f.sequence_id);
    Ok(files)
}

/// Choose the files to load.
///
/// With `n` files and `k = floor(n * split_percentage)`:
/// * `shuffle = true`: `k` files drawn at random without replacement, in draw order.
/// * otherwise: the sorted slice `[floor(n * start_from_percentage), min(start + k, n))`.
pub fn select_subset(
    files: &[SequenceFile],
    params: &DatasetParams,
    rng: &mut impl Rng,
) -> Vec<SequenceFile> {
    let n = files.len();
    let count = ((n as f64) * params.split_percentage).floor() as usize;
    let count = count.min(n);

    if params.shuffle {
        sample(rng, n, count)
            .into_iter()
            .map(|i| files[i].clone())
            .collect()
    } else {
        let start = ((n as f64) * params.start_from_percentage).floor() as usize;
        let start = start.min(n);
        let end = (start + count).min(n);
        files[start..end].to_vec()
    }
}
