//! # Trajectory non-linearity classification
//!
//! Labels a trajectory as **straight** or **curved** with a robust line fit.
//!
//! ## Overview
//! -----------------
//! 1. **RANSAC line search** ([`ransac_line`]): for up to `max_trials` rounds, two distinct
//!    points are drawn at random and define a candidate line. Points whose orthogonal distance
//!    to that line is at most `residual_threshold` are inliers. The candidate with the most
//!    inliers wins; ties go to the smaller sum of inlier residuals.
//! 2. **Refit**: the winning inlier set is refitted by total least squares (principal axis of
//!    the inlier covariance), and the inlier mask is recomputed against the refitted line.
//! 3. **Decision** ([`classify`]): the trajectory is curved when the longest run of
//!    *consecutive* outliers reaches `min_consecutive_outliers`.
//!
//! A stationary trajectory (all points equal, or a single point) lies on every line through its
//! position and is reported as straight. When the points are spread but every random sample was
//! degenerate, no line is found and the trajectory is reported as curved.
//!
//! ## Determinism
//! -----------------
//! All randomness comes from the caller's RNG. With a seeded generator (see
//! [`window_rng`]) the classification of a given window is reproducible.
use nalgebra::{Matrix2, SymmetricEigen, Vector2};
use ndarray::ArrayView2;
use rand::{rngs::StdRng, seq::index::sample, Rng, SeedableRng};
use serde::Deserialize;
use tracing::debug;

use crate::constants::{
    FrameId, SequenceId, DEFAULT_MAX_TRIALS, DEFAULT_MIN_CONSECUTIVE_OUTLIERS,
    DEFAULT_RESIDUAL_THRESHOLD, EPS, LINEAR_FLAG, NON_LINEAR_FLAG,
};

/// Settings of the RANSAC classifier.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct NonLinearParams {
    /// Maximum orthogonal distance of an inlier to the fitted line.
    pub residual_threshold: f64,
    /// Number of random two-point samples.
    pub max_trials: usize,
    /// Consecutive outliers needed to label the trajectory as curved.
    pub min_consecutive_outliers: usize,
}

impl Default for NonLinearParams {
    fn default() -> Self {
        NonLinearParams {
            residual_threshold: DEFAULT_RESIDUAL_THRESHOLD,
            max_trials: DEFAULT_MAX_TRIALS,
            min_consecutive_outliers: DEFAULT_MIN_CONSECUTIVE_OUTLIERS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrajectoryShape {
    Straight,
    Curved,
}

impl TrajectoryShape {
    /// Value stored in the `non_linear` tensor.
    pub fn flag(self) -> f64 {
        match self {
            TrajectoryShape::Straight => LINEAR_FLAG,
            TrajectoryShape::Curved => NON_LINEAR_FLAG,
        }
    }

    #[inline]
    pub fn is_curved(self) -> bool {
        self == TrajectoryShape::Curved
    }
}

/// Line `point + t * direction` with its inlier mask over the fitted points.
#[derive(Debug, Clone, PartialEq)]
pub struct LineFit {
    pub point: Vector2<f64>,
    /// Unit direction vector.
    pub direction: Vector2<f64>,
    pub inliers: Vec<bool>,
}

impl LineFit {
    pub fn num_inliers(&self) -> usize {
        self.inliers.iter().filter(|&&b| b).count()
    }
}

#[inline]
fn residual(p: &Vector2<f64>, point: &Vector2<f64>, normal: &Vector2<f64>) -> f64 {
    (p - point).dot(normal).abs()
}

/// Inlier mask and inlier residual sum of a line given by a point and a unit normal.
fn score(
    points: &[Vector2<f64>],
    point: &Vector2<f64>,
    normal: &Vector2<f64>,
    threshold: f64,
) -> (Vec<bool>, usize, f64) {
    let mut mask = Vec::with_capacity(points.len());
    let mut count = 0;
    let mut sum = 0.0;
    for p in points {
        let r = residual(p, point, normal);
        let inlier = r <= threshold;
        if inlier {
            count += 1;
            sum += r;
        }
        mask.push(inlier);
    }
    (mask, count, sum)
}

/// Total least squares line through a set of points.
///
/// Returns the centroid and the unit principal direction, or `None` when the points are
/// all identical.
fn total_least_squares(points: &[Vector2<f64>]) -> Option<(Vector2<f64>, Vector2<f64>)> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let centroid = points.iter().fold(Vector2::zeros(), |acc, p| acc + p) / n;

    let cov = points.iter().fold(Matrix2::zeros(), |acc, p| {
        let d = p - centroid;
        acc + d * d.transpose()
    }) / n;

    if cov.trace() < EPS {
        return None;
    }

    let eigen = SymmetricEigen::new(cov);
    let major = eigen.eigenvalues.imax();
    let direction = eigen.eigenvectors.column(major).into_owned();
    let norm = direction.norm();
    if norm < EPS {
        return None;
    }
    Some((centroid, direction / norm))
}

/// Fit a line to `points` with RANSAC.
///
/// Arguments
/// -----------------
/// * `points`: trajectory positions in time order.
/// * `params`: RANSAC settings.
/// * `rng`: random source for the two-point samples.
///
/// Return
/// ----------
/// * `Some(LineFit)` with the refitted line and its inlier mask, or `None` when fewer than two
///   distinct points are available.
pub fn ransac_line(
    points: &[Vector2<f64>],
    params: &NonLinearParams,
    rng: &mut impl Rng,
) -> Option<LineFit> {
    let n = points.len();
    if n < 2 {
        return None;
    }

    // (inlier count, residual sum, point, normal)
    let mut best: Option<(usize, f64, Vector2<f64>, Vector2<f64>)> = None;

    for _ in 0..params.max_trials {
        let picked = sample(rng, n, 2);
        let (p, q) = (points[picked.index(0)], points[picked.index(1)]);
        let d = q - p;
        let len = d.norm();
        if len < EPS {
            continue;
        }
        let normal = Vector2::new(-d.y, d.x) / len;
        let (_, count, sum) = score(points, &p, &normal, params.residual_threshold);

        let better = match &best {
            None => true,
            Some((best_count, best_sum, _, _)) => {
                count > *best_count || (count == *best_count && sum < *best_sum)
            }
        };
        if better {
            best = Some((count, sum, p, normal));
        }
        if count == n {
            break;
        }
    }

    let (_, _, point, normal) = best?;
    let (mask, _, _) = score(points, &point, &normal, params.residual_threshold);

    let inlier_points: Vec<Vector2<f64>> = points
        .iter()
        .zip(&mask)
        .filter_map(|(p, &keep)| keep.then_some(*p))
        .collect();

    match total_least_squares(&inlier_points) {
        Some((centroid, direction)) => {
            let refit_normal = Vector2::new(-direction.y, direction.x);
            let (inliers, _, _) =
                score(points, &centroid, &refit_normal, params.residual_threshold);
            Some(LineFit {
                point: centroid,
                direction,
                inliers,
            })
        }
        None => Some(LineFit {
            point,
            direction: Vector2::new(normal.y, -normal.x),
            inliers: mask,
        }),
    }
}

/// Length of the longest run of `false` entries.
pub fn longest_outlier_run(inliers: &[bool]) -> usize {
    inliers
        .iter()
        .fold((0, 0), |(best, run), &inlier| {
            let run = if inlier { 0 } else { run + 1 };
            (best.max(run), run)
        })
        .0
}

/// Whether a non-empty point set collapses to a single position.
fn is_stationary(points: &[Vector2<f64>]) -> bool {
    match points.first() {
        Some(first) => points.iter().all(|p| (p - first).norm() < EPS),
        None => false,
    }
}

/// Classify a trajectory given as a list of positions.
pub fn classify(
    points: &[Vector2<f64>],
    params: &NonLinearParams,
    rng: &mut impl Rng,
) -> TrajectoryShape {
    let Some(fit) = ransac_line(points, params, rng) else {
        if is_stationary(points) {
            return TrajectoryShape::Straight;
        }
        debug!(points = points.len(), "no line fit, trajectory treated as curved");
        return TrajectoryShape::Curved;
    };
    if longest_outlier_run(&fit.inliers) < params.min_consecutive_outliers {
        TrajectoryShape::Straight
    } else {
        TrajectoryShape::Curved
    }
}

/// Classify a `[2, T]` trajectory array (row 0 is `x`, row 1 is `y`).
pub fn classify_array(
    trajectory: ArrayView2<'_, f64>,
    params: &NonLinearParams,
    rng: &mut impl Rng,
) -> TrajectoryShape {
    let points: Vec<Vector2<f64>> = trajectory
        .columns()
        .into_iter()
        .map(|c| Vector2::new(c[0], c[1]))
        .collect();
    classify(&points, params, rng)
}

/// Seeded generator for the classification of one window.
///
/// The stream depends only on the global seed, the sequence id and the first frame of the
/// window, so the result of a window does not depend on which other files are loaded.
pub fn window_rng(seed: u64, sequence_id: SequenceId, first_frame: FrameId) -> StdRng {
    let mixed = seed
        ^ (sequence_id as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ first_frame.to_bits().rotate_left(17);
    StdRng::seed_from_u64(mixed)
}
