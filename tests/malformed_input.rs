use camino::Utf8Path;
use trajwin::{
    constants::Split,
    dataset::SequenceDataset,
    params::DatasetParams,
    records::csv_reader::read_source_file,
    trajwin_errors::{ParseRecordError, TrajwinError},
};

#[test]
fn test_malformed_row_is_reported() {
    let path = Utf8Path::new("tests/data/malformed/train/data/5.csv");
    let err = read_source_file(path).unwrap_err();
    assert_eq!(
        err,
        TrajwinError::ParseRecord {
            path: path.to_string(),
            line: 4,
            source: ParseRecordError::InvalidCoordinate("not-a-number".into()),
        }
    );
}

#[test]
fn test_malformed_file_fails_dataset_build() {
    let params = DatasetParams::builder()
        .root_folder("tests/data/malformed")
        .obs_len(2)
        .pred_len(2)
        .split_percentage(1.0)
        .build()
        .unwrap();
    assert!(matches!(
        SequenceDataset::new(params),
        Err(TrajwinError::ParseRecord { line: 4, .. })
    ));
}

#[test]
fn test_missing_split_folder() {
    let params = DatasetParams::builder()
        .root_folder("tests/data/does-not-exist")
        .split(Split::Val)
        .build()
        .unwrap();
    assert!(matches!(
        SequenceDataset::new(params),
        Err(TrajwinError::IoError(_))
    ));
}

#[test]
fn test_split_without_usable_windows() {
    let params = DatasetParams::builder()
        .root_folder("tests/data/argo")
        .split(Split::Val)
        .obs_len(20)
        .pred_len(30)
        .split_percentage(1.0)
        .build()
        .unwrap();
    assert_eq!(
        SequenceDataset::new(params).unwrap_err(),
        TrajwinError::EmptyDataset { split: Split::Val }
    );
}

#[test]
fn test_non_numeric_file_name() {
    assert_eq!(
        read_source_file(Utf8Path::new("tests/data/scene.csv")).unwrap_err(),
        TrajwinError::InvalidSequenceFile("tests/data/scene.csv".into())
    );
}
