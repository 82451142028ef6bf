use approx::assert_abs_diff_eq;
use trajwin::{
    constants::{ObjectClass, Split},
    dataset::SequenceDataset,
    windows::sequence_builder::CoveragePolicy,
};

mod common;
use common::{assert_rel_matches_abs, fixture_params, OBS_LEN, PRED_LEN};

fn train() -> SequenceDataset {
    SequenceDataset::new(fixture_params(Split::Train).build().unwrap()).unwrap()
}

#[test]
fn test_train_split_windows() {
    let dataset = train();

    assert_eq!(dataset.file_ids(), &[10, 11, 12, 13]);
    // 10.csv: one window; 11.csv: lone object with a gap, nothing kept;
    // 12.csv: one window; 13.csv: 40 objects chunked into 32 + 8
    assert_eq!(dataset.len(), 4);
    assert_eq!(
        dataset.seq_start_end(),
        &[(0, 1), (1, 3), (3, 35), (35, 43)]
    );
    assert_eq!(dataset.total_objects(), 43);

    let ids: Vec<_> = (0..dataset.len())
        .map(|i| dataset.get(i).unwrap().sequence_id)
        .collect();
    assert_eq!(ids, vec![10, 12, 13, 13]);
}

#[test]
fn test_seq_start_end_partitions_objects() {
    let dataset = train();
    let ranges = dataset.seq_start_end();

    assert_eq!(ranges.first().unwrap().0, 0);
    assert_eq!(ranges.last().unwrap().1, dataset.total_objects());
    for pair in ranges.windows(2) {
        assert_eq!(pair[0].1, pair[1].0);
    }
    for &(start, end) in ranges {
        let n = end - start;
        assert!(n >= 1 && n <= 32);
    }
}

#[test]
fn test_single_straight_object() {
    let dataset = train();
    let item = dataset.get(0).unwrap();

    assert_eq!(item.num_objects(), 1);
    assert_eq!(item.origin, [2000.0, 1200.0]);
    assert_eq!(item.obs_traj.shape(), &[1, 2, OBS_LEN]);
    assert_eq!(item.pred_traj_gt.shape(), &[1, 2, PRED_LEN]);

    // origin-centred at the first observed step
    assert_abs_diff_eq!(item.obs_traj[[0, 0, 0]], 0.0, epsilon = 1e-9);
    assert_abs_diff_eq!(item.obs_traj[[0, 1, 0]], 0.0, epsilon = 1e-9);
    assert_abs_diff_eq!(item.pred_traj_gt[[0, 0, PRED_LEN - 1]], 22.5, epsilon = 1e-9);

    assert!(item.loss_mask.iter().all(|&m| m == 1.0));
    assert_eq!(item.non_linear[0], 0.0);
    assert_eq!(item.object_class, &[ObjectClass::Agent]);

    // identity rows: frame, object, sequence
    assert_abs_diff_eq!(item.id_frame[[0, 0, 1]], 315968386.1, epsilon = 1e-6);
    assert_eq!(item.id_frame[[0, 1, 1]], 0.0);
    assert_eq!(item.id_frame[[0, 2, 1]], 10.0);
}

#[test]
fn test_turning_agent_is_curved() {
    let dataset = train();
    let item = dataset.get(1).unwrap();

    // AV (id 0) and AGENT (id 1); the late OTHERS object fails strict coverage
    assert_eq!(item.object_id, &[0, 1]);
    assert_eq!(item.object_class, &[ObjectClass::Ego, ObjectClass::Agent]);
    assert_eq!(item.origin, [50.0, 40.0]);
    assert_eq!(item.non_linear.to_vec(), vec![0.0, 1.0]);
}

#[test]
fn test_forty_objects_are_chunked() {
    let dataset = train();
    let first = dataset.get(2).unwrap();
    let second = dataset.get(3).unwrap();

    assert_eq!(first.num_objects(), 32);
    assert_eq!(second.num_objects(), 8);
    assert_eq!(first.origin, second.origin);
    assert_eq!(second.object_id.first(), Some(&32));
    assert_eq!(second.object_id.last(), Some(&39));
    assert!(second.non_linear.iter().all(|&f| f == 0.0));
}

#[test]
fn test_relative_positions_and_norm() {
    let dataset = train();
    assert_rel_matches_abs(dataset.trajectories(), dataset.relative(), 1e-9);
    assert!(dataset.relative_is_consistent(1e-9));

    let norm = dataset.norm();
    let abs_min = dataset.trajectories().iter().cloned().fold(f64::INFINITY, f64::min);
    let rel_max = dataset
        .relative()
        .iter()
        .cloned()
        .fold(f64::NEG_INFINITY, f64::max);
    assert_eq!(norm.abs_min, abs_min);
    assert_eq!(norm.rel_max, rel_max);
    assert!(norm.abs_min <= norm.abs_max && norm.rel_min <= norm.rel_max);
}

#[test]
fn test_sorted_subset_of_files() {
    let params = fixture_params(Split::Train)
        .split_percentage(0.5)
        .start_from_percentage(0.5)
        .build()
        .unwrap();
    let dataset = SequenceDataset::new(params).unwrap();
    assert_eq!(dataset.file_ids(), &[12, 13]);
    assert_eq!(dataset.len(), 3);
}

#[test]
fn test_pad_edges_keeps_late_object() {
    let params = fixture_params(Split::Train)
        .coverage(CoveragePolicy::PadEdges)
        .build()
        .unwrap();
    let dataset = SequenceDataset::new(params).unwrap();

    let item = dataset.get(1).unwrap();
    assert_eq!(item.object_id, &[0, 1, 2]);

    let mask = item.loss_mask.row(2);
    assert_eq!(mask.iter().take(3).sum::<f64>(), 0.0);
    assert_eq!(mask.iter().skip(3).sum::<f64>(), 13.0);
    // padded front repeats the first real position
    assert_eq!(item.obs_traj[[2, 1, 0]], item.obs_traj[[2, 1, 3]]);
}

#[test]
fn test_min_objects_drops_small_windows() {
    let params = fixture_params(Split::Train).min_objects(2).build().unwrap();
    let dataset = SequenceDataset::new(params).unwrap();
    // 10.csv holds a single object
    let ids: Vec<_> = (0..dataset.len())
        .map(|i| dataset.get(i).unwrap().sequence_id)
        .collect();
    assert_eq!(ids, vec![12, 13, 13]);
}

#[test]
fn test_val_split() {
    let dataset = SequenceDataset::new(fixture_params(Split::Val).build().unwrap()).unwrap();
    assert_eq!(dataset.file_ids(), &[20]);
    let item = dataset.get(0).unwrap();
    assert_eq!(item.num_objects(), 2);
    assert_eq!(item.obs_traj[[1, 1, 4]], 3.0);
    assert_eq!(item.non_linear.to_vec(), vec![0.0, 0.0]);
}

#[test]
fn test_test_split_is_not_classified() {
    let dataset = SequenceDataset::new(fixture_params(Split::Test).build().unwrap()).unwrap();
    let item = dataset.get(0).unwrap();
    // the second object only exists in the observed half
    assert_eq!(item.num_objects(), 1);
    assert_eq!(item.non_linear[0], -1.0);

    let params = fixture_params(Split::Test)
        .coverage(CoveragePolicy::PadEdges)
        .build()
        .unwrap();
    let dataset = SequenceDataset::new(params).unwrap();
    let item = dataset.get(0).unwrap();
    assert_eq!(item.num_objects(), 2);
    assert!(item.non_linear.iter().all(|&f| f == -1.0));
    assert_eq!(item.loss_mask.row(1).sum(), OBS_LEN as f64);
}

#[test]
fn test_sliding_windows_over_files() {
    let params = fixture_params(Split::Val)
        .obs_len(4)
        .pred_len(4)
        .window_stride(Some(4))
        .build()
        .unwrap();
    let dataset = SequenceDataset::new(params).unwrap();
    // 16 frames, windows of 8 at offsets 0, 4, 8
    assert_eq!(dataset.len(), 3);
    assert_eq!(dataset.get(2).unwrap().origin, [9.0, 1.0]);
}
