//! # Per-object sequence builder
//!
//! Turns one [`Window`] into zero or more [`Sequence`]s: one [`ObjectTrajectory`] per object
//! that passes the coverage check, chunked to the per-window object cap.
//!
//! ## Overview
//! -----------------
//! For a window of `seq_len` frames:
//!
//! 1. **Reference object**: the `AGENT` with the smallest id. Its `obs_origin`-th record in the
//!    window gives the coordinate origin. A window without an agent (or whose agent has too few
//!    records) produces nothing.
//! 2. **Coverage**, per object in ascending id order:
//!    * [`CoveragePolicy::Strict`]: the object must have exactly one record on every frame of
//!      the window, otherwise it is discarded.
//!    * [`CoveragePolicy::PadEdges`]: the object needs one real record in the observed half
//!      (and, outside the `test` split, one in the predicted half). Missing steps before the
//!      first / after the last record repeat the edge position, interior gaps are linearly
//!      interpolated. The loss mask is `1` on real records only.
//! 3. **Tensors**: origin-centred absolute positions `[2, seq_len]`, step displacements
//!    (first column zero), loss mask, `[frame, object, sequence]` identity rows.
//! 4. **Non-linearity flag**: RANSAC classification ([`non_linear`](super::non_linear)),
//!    or [`UNCLASSIFIED_FLAG`] in the `test` split.
//! 5. **Distance filter** (optional): non-reference objects farther than `distance_threshold`
//!    from the origin at the origin step are dropped.
//! 6. **Chunking**: survivors are split into groups of at most `num_agents_per_obs`; every
//!    group holding at least `min_objects` objects becomes a [`Sequence`].
//!
//! When class balancing is enabled, the reference object's trajectory is also classified and
//! stored as the window-level [`TrajectoryShape`], shared by every chunk of the window.
use itertools::Itertools;
use ndarray::{s, Array1, Array2, ArrayView2};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    constants::{
        City, ObjectClass, ObjectIndex, Position, SequenceId, Split, UNCLASSIFIED_FLAG,
    },
    params::DatasetParams,
    records::RawRecord,
    windows::{
        non_linear::{classify, classify_array, window_rng, TrajectoryShape},
        Window,
    },
};

/// How objects that do not cover the whole window are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoveragePolicy {
    /// Keep only objects present on every frame of the window.
    #[default]
    Strict,
    /// Keep partially observed objects and pad their missing steps.
    PadEdges,
}

/// One object over one window.
///
/// All arrays have `seq_len` columns.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectTrajectory {
    pub object: ObjectIndex,
    pub class: ObjectClass,
    /// `[2, seq_len]` positions relative to the window origin.
    pub abs: Array2<f64>,
    /// `[2, seq_len]` step displacements, first column zero.
    pub rel: Array2<f64>,
    /// `[seq_len]`, `1.0` on real records, `0.0` on padded steps.
    pub loss_mask: Array1<f64>,
    /// `[3, seq_len]` rows: frame id, object id, sequence id.
    pub id_frame: Array2<f64>,
    /// `0.0` straight, `1.0` curved, `-1.0` not classified.
    pub non_linear: f64,
}

/// The objects of one window chunk, sharing an origin.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    pub sequence_id: SequenceId,
    pub city: City,
    /// Absolute position subtracted from every trajectory of the window.
    pub origin: Position,
    pub objects: Vec<ObjectTrajectory>,
    /// Shape of the reference object, set only when class balancing is enabled.
    pub shape: Option<TrajectoryShape>,
}

impl Sequence {
    #[inline]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Step displacements of a `[2, T]` trajectory; the first column is zero.
pub fn relative_displacements(abs: ArrayView2<'_, f64>) -> Array2<f64> {
    let mut rel = Array2::zeros(abs.raw_dim());
    if abs.ncols() > 1 {
        let diff = &abs.slice(s![.., 1..]) - &abs.slice(s![.., ..-1]);
        rel.slice_mut(s![.., 1..]).assign(&diff);
    }
    rel
}

/// Fill the empty slots of a partially observed track.
///
/// Leading empty slots take the first known position, trailing ones the last known
/// position, interior ones are interpolated linearly between their known neighbours.
/// Returns `None` when no slot is filled.
pub fn fill_gaps(slots: &[Option<Position>]) -> Option<Vec<Position>> {
    let known: Vec<(usize, Position)> = slots
        .iter()
        .enumerate()
        .filter_map(|(t, p)| p.map(|p| (t, p)))
        .collect();
    let (&(first, first_pos), &(last, last_pos)) = (known.first()?, known.last()?);

    let mut filled = Vec::with_capacity(slots.len());
    let mut next = 0;
    for t in 0..slots.len() {
        if t <= first {
            filled.push(first_pos);
            continue;
        }
        if t >= last {
            filled.push(last_pos);
            continue;
        }
        while known[next + 1].0 <= t {
            next += 1;
        }
        let (a, pa) = known[next];
        let (b, pb) = known[next + 1];
        let w = (t - a) as f64 / (b - a) as f64;
        filled.push([pa[0] + w * (pb[0] - pa[0]), pa[1] + w * (pb[1] - pa[1])]);
    }
    Some(filled)
}

/// Builds the [`Sequence`]s of a window according to a [`DatasetParams`].
#[derive(Debug, Clone, Copy)]
pub struct SequenceBuilder<'p> {
    params: &'p DatasetParams,
}

impl<'p> SequenceBuilder<'p> {
    pub fn new(params: &'p DatasetParams) -> Self {
        SequenceBuilder { params }
    }

    /// Build the sequences of one window.
    ///
    /// Arguments
    /// -----------------
    /// * `window`: the frames and records to process.
    /// * `sequence_id`: id of the source the window comes from.
    ///
    /// Return
    /// ----------
    /// * The kept chunks of the window, in object-id order. Empty when the window is short,
    ///   has no usable reference object, or no chunk reaches `min_objects`.
    pub fn build(&self, window: &Window<'_>, sequence_id: SequenceId) -> Vec<Sequence> {
        let params = self.params;
        let Some(first_frame) = window.first_frame() else {
            return Vec::new();
        };
        if !window.is_complete() {
            debug!(
                sequence_id,
                start = window.start,
                frames = window.frames.len(),
                "window shorter than seq_len, skipped"
            );
            return Vec::new();
        }

        let tracks = window.tracks();
        let city = window
            .records
            .first()
            .map(|r| r.city)
            .unwrap_or(City::Miami);

        let Some((reference, origin)) = self.reference_origin(&tracks) else {
            warn!(
                sequence_id,
                start = window.start,
                "no reference agent with enough records in window, skipped"
            );
            return Vec::new();
        };

        let mut rng = window_rng(params.seed, sequence_id, first_frame);
        let mut survivors = Vec::with_capacity(tracks.len());
        for (object, track) in &tracks {
            let Some(mut trajectory) =
                self.build_object(window, *object, track, origin, sequence_id)
            else {
                debug!(sequence_id, object, records = track.len(), "coverage check failed");
                continue;
            };
            if *object != reference && self.is_too_far(&trajectory) {
                debug!(sequence_id, object, "beyond distance threshold");
                continue;
            }
            trajectory.non_linear = if params.split == Split::Test {
                UNCLASSIFIED_FLAG
            } else {
                classify_array(trajectory.abs.view(), &params.non_linear, &mut rng).flag()
            };
            survivors.push(trajectory);
        }

        let shape = params.class_balance_enabled().then(|| {
            let points: Vec<_> = tracks
                .iter()
                .find(|(object, _)| *object == reference)
                .map(|(_, track)| {
                    track
                        .iter()
                        .map(|r| {
                            nalgebra::Vector2::new(
                                r.position[0] - origin[0],
                                r.position[1] - origin[1],
                            )
                        })
                        .collect()
                })
                .unwrap_or_default();
            classify(&points, &params.non_linear, &mut rng)
        });

        debug!(
            sequence_id,
            start = window.start,
            objects = tracks.len(),
            kept = survivors.len(),
            "window processed"
        );

        let cap = params.num_agents_per_obs;
        let chunks = survivors.into_iter().chunks(cap);
        let mut sequences = Vec::new();
        for chunk in &chunks {
            let objects: Vec<ObjectTrajectory> = chunk.collect();
            if objects.len() < params.min_objects {
                continue;
            }
            sequences.push(Sequence {
                sequence_id,
                city,
                origin,
                objects,
                shape,
            });
        }
        sequences
    }

    /// Id of the reference agent and the origin it defines.
    fn reference_origin(
        &self,
        tracks: &[(ObjectIndex, Vec<&RawRecord>)],
    ) -> Option<(ObjectIndex, Position)> {
        let (object, track) = tracks
            .iter()
            .find(|(_, track)| track.iter().any(|r| r.class == ObjectClass::Agent))?;
        let record = track.get(self.params.obs_origin - 1)?;
        Some((*object, record.position))
    }

    fn is_too_far(&self, trajectory: &ObjectTrajectory) -> bool {
        let Some(threshold) = self.params.distance_threshold else {
            return false;
        };
        let step = self.params.obs_origin - 1;
        let x = trajectory.abs[[0, step]];
        let y = trajectory.abs[[1, step]];
        x.hypot(y) > threshold
    }

    /// Coverage check and tensor construction for one object.
    fn build_object(
        &self,
        window: &Window<'_>,
        object: ObjectIndex,
        track: &[&RawRecord],
        origin: Position,
        sequence_id: SequenceId,
    ) -> Option<ObjectTrajectory> {
        let params = self.params;
        let seq_len = params.seq_len();
        let first = track.first()?;

        let mut slots: Vec<Option<Position>> = vec![None; seq_len];
        for record in track {
            let slot = window.slot_of(record.frame)?;
            if slots[slot].is_none() {
                slots[slot] = Some(record.position);
            }
        }

        let positions: Vec<Position> = match params.coverage {
            CoveragePolicy::Strict => {
                let front = window.slot_of(first.frame)?;
                let end = window.slot_of(track.last()?.frame)? + 1;
                if end - front != seq_len || track.len() != seq_len {
                    return None;
                }
                slots.iter().copied().collect::<Option<Vec<_>>>()?
            }
            CoveragePolicy::PadEdges => {
                let observed = slots[..params.obs_len].iter().any(Option::is_some);
                let predicted = slots[params.obs_len..].iter().any(Option::is_some);
                if !observed || (params.split != Split::Test && !predicted) {
                    return None;
                }
                fill_gaps(&slots)?
            }
        };

        let abs = Array2::from_shape_fn((2, seq_len), |(axis, t)| {
            positions[t][axis] - origin[axis]
        });
        let rel = relative_displacements(abs.view());
        let loss_mask = Array1::from_shape_fn(seq_len, |t| {
            if slots[t].is_some() {
                1.0
            } else {
                0.0
            }
        });
        let id_frame = Array2::from_shape_fn((3, seq_len), |(row, t)| match row {
            0 => window.frames[t],
            1 => object as f64,
            _ => sequence_id as f64,
        });

        Some(ObjectTrajectory {
            object,
            class: first.class,
            abs,
            rel,
            loss_mask,
            id_frame,
            non_linear: UNCLASSIFIED_FLAG,
        })
    }
}
