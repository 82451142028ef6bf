#![allow(dead_code)]

use approx::assert_abs_diff_eq;
use ndarray::ArrayView3;
use trajwin::{
    constants::Split,
    params::{DatasetParams, DatasetParamsBuilder},
};

pub const ARGO_ROOT: &str = "tests/data/argo";
pub const OBS_LEN: usize = 6;
pub const PRED_LEN: usize = 10;

/// Parameters reading every file of `split` from the test fixtures.
pub fn fixture_params(split: Split) -> DatasetParamsBuilder {
    DatasetParams::builder()
        .root_folder(ARGO_ROOT)
        .split(split)
        .obs_len(OBS_LEN)
        .pred_len(PRED_LEN)
        .min_objects(1)
        .split_percentage(1.0)
}

/// Check that `rel[.., .., t] = abs[.., .., t] - abs[.., .., t - 1]` and `rel[.., .., 0] = 0`.
pub fn assert_rel_matches_abs(abs: ArrayView3<f64>, rel: ArrayView3<f64>, epsilon: f64) {
    assert_eq!(abs.shape(), rel.shape());
    let (n, c, t) = abs.dim();
    for i in 0..n {
        for k in 0..c {
            assert_abs_diff_eq!(rel[[i, k, 0]], 0.0, epsilon = epsilon);
            for s in 1..t {
                assert_abs_diff_eq!(
                    rel[[i, k, s]],
                    abs[[i, k, s]] - abs[[i, k, s - 1]],
                    epsilon = epsilon
                );
            }
        }
    }
}
