//! # Sequence dataset
//!
//! [`SequenceDataset`] loads every selected source file of a split, runs window extraction and
//! the sequence builder on it, and packs the kept windows into dense arrays.
//!
//! ## Overview
//! -----------------
//! * **File selection** ([`file_list`]): the split folder is listed, sorted by sequence id and
//!   reduced to the configured subset.
//! * **Windowing**: each file yields one window (or sliding windows with a stride), turned into
//!   chunks by the [`SequenceBuilder`].
//! * **Packing**: all objects of all kept windows are stacked along a leading object axis;
//!   `seq_start_end` records the `[start, end)` object range of each window.
//! * **Normalization bounds**: minimum and maximum of the absolute and relative coordinates
//!   across the whole dataset, computed once.
//! * **Class balance** ([`class_balance`]): window shapes are tracked so that the straight
//!   share of each batch can be capped.
//!
//! ## Array layout
//! -----------------
//! | array | shape |
//! |---|---|
//! | absolute positions | `[N, 2, seq_len]` |
//! | relative positions | `[N, 2, seq_len]` |
//! | loss mask | `[N, seq_len]` |
//! | non-linearity flag | `[N]` |
//! | identity rows | `[N, 3, seq_len]` |
//!
//! with `N` the total object count. A window `i` owns the objects
//! `seq_start_end[i].0 .. seq_start_end[i].1`.
//!
//! ## Example
//! -----------------
//! ```rust,no_run
//! use trajwin::{dataset::SequenceDataset, params::DatasetParams};
//!
//! let params = DatasetParams::builder()
//!     .root_folder("data/argoverse")
//!     .split_percentage(1.0)
//!     .build()
//!     .unwrap();
//! let dataset = SequenceDataset::new(params).unwrap();
//! let first = dataset.get(0).unwrap();
//! println!("{} objects in window of {}", first.num_objects(), first.sequence_id);
//! ```
use std::time::Instant;

use ndarray::{s, Array1, Array2, Array3, ArrayView1, ArrayView2, ArrayView3, Zip};
use rand::{rngs::StdRng, SeedableRng};
use tracing::{debug, info};

use crate::{
    constants::{City, ObjectClass, ObjectIndex, Position, SequenceId},
    params::DatasetParams,
    records::{csv_reader::read_source_file, FrameIndex, RawRecord},
    trajwin_errors::TrajwinError,
    windows::{
        non_linear::TrajectoryShape,
        sequence_builder::{Sequence, SequenceBuilder},
        window_starts, Window,
    },
};

pub mod class_balance;
pub mod file_list;
#[cfg(feature = "progress")]
pub mod progress_bar;

#[cfg(feature = "progress")]
use progress_bar::FileProgress;

/// Dataset-wide coordinate bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormBounds {
    pub abs_min: f64,
    pub abs_max: f64,
    pub rel_min: f64,
    pub rel_max: f64,
}

impl NormBounds {
    fn of(abs: &Array3<f64>, rel: &Array3<f64>) -> Self {
        let bounds = |a: &Array3<f64>| {
            a.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
        };
        let (abs_min, abs_max) = bounds(abs);
        let (rel_min, rel_max) = bounds(rel);
        NormBounds {
            abs_min,
            abs_max,
            rel_min,
            rel_max,
        }
    }
}

/// Borrowed view of one window of a [`SequenceDataset`].
///
/// Position arrays are `[n, 2, T]` with `n` the window's object count.
#[derive(Debug, Clone)]
pub struct SequenceItem<'a> {
    pub obs_traj: ArrayView3<'a, f64>,
    pub pred_traj_gt: ArrayView3<'a, f64>,
    pub obs_traj_rel: ArrayView3<'a, f64>,
    pub pred_traj_gt_rel: ArrayView3<'a, f64>,
    pub non_linear: ArrayView1<'a, f64>,
    pub loss_mask: ArrayView2<'a, f64>,
    pub id_frame: ArrayView3<'a, f64>,
    pub object_class: &'a [ObjectClass],
    pub object_id: &'a [ObjectIndex],
    pub city: City,
    pub origin: Position,
    pub sequence_id: SequenceId,
    pub norm: NormBounds,
}

impl SequenceItem<'_> {
    #[inline]
    pub fn num_objects(&self) -> usize {
        self.object_id.len()
    }
}

/// Windows of a split packed into dense arrays.
#[derive(Debug, Clone)]
pub struct SequenceDataset {
    params: DatasetParams,
    file_ids: Vec<SequenceId>,

    trajectories: Array3<f64>,
    relative: Array3<f64>,
    loss_mask: Array2<f64>,
    non_linear: Array1<f64>,
    id_frame: Array3<f64>,
    object_class: Vec<ObjectClass>,
    object_id: Vec<ObjectIndex>,

    seq_start_end: Vec<(usize, usize)>,
    city: Vec<City>,
    origin: Vec<Position>,
    sequence_id: Vec<SequenceId>,
    shapes: Vec<Option<TrajectoryShape>>,

    straight_trajectories: Vec<SequenceId>,
    curved_trajectories: Vec<SequenceId>,
    curved_windows: Vec<usize>,

    norm: NormBounds,
}

/// Run window extraction and the sequence builder over the records of one source.
pub fn sequences_of_source(
    params: &DatasetParams,
    sequence_id: SequenceId,
    records: Vec<RawRecord>,
) -> Vec<Sequence> {
    let index = FrameIndex::from_records(records);
    let builder = SequenceBuilder::new(params);
    let seq_len = params.seq_len();
    debug!(
        sequence_id,
        city = index.city().map(City::name).unwrap_or("-"),
        frames = index.len(),
        "frame index built"
    );

    window_starts(index.len(), seq_len, params.window_stride)
        .into_iter()
        .flat_map(|start| builder.build(&Window::extract(&index, start, seq_len), sequence_id))
        .collect()
}

impl SequenceDataset {
    /// Build the dataset from the files of `params.split_folder()`.
    ///
    /// Return
    /// ----------
    /// * The packed dataset, or
    ///   - an I/O or [`TrajwinError::InvalidSequenceFile`] error while listing the folder,
    ///   - [`TrajwinError::ParseRecord`] for a malformed source file,
    ///   - [`TrajwinError::EmptyDataset`] when no window survives.
    pub fn new(params: DatasetParams) -> Result<Self, TrajwinError> {
        params.validate()?;
        let started = Instant::now();
        let folder = params.split_folder();
        let files = file_list::list_sequence_files(&folder)?;
        let mut rng = StdRng::seed_from_u64(params.seed);
        let selected = file_list::select_subset(&files, &params, &mut rng);

        info!(
            split = %params.split,
            folder = %folder,
            available = files.len(),
            selected = selected.len(),
            "building sequence dataset"
        );

        #[cfg(feature = "progress")]
        let progress = FileProgress::new(selected.len());

        let mut file_ids = Vec::with_capacity(selected.len());
        let mut sequences = Vec::new();
        for file in &selected {
            let source = read_source_file(&file.path)?;
            let built = sequences_of_source(&params, source.sequence_id, source.records);
            debug!(
                sequence_id = source.sequence_id,
                windows = built.len(),
                "source file windowed"
            );

            #[cfg(feature = "progress")]
            progress.file_done(source.sequence_id, built.len());

            file_ids.push(source.sequence_id);
            sequences.extend(built);
        }

        #[cfg(feature = "progress")]
        progress.finish();

        let dataset = Self::from_sequences(params, file_ids, sequences)?;
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "sequence dataset built from files"
        );
        Ok(dataset)
    }

    /// Build the dataset from in-memory sources, each given as a sequence id and its records.
    pub fn from_sources(
        params: DatasetParams,
        sources: impl IntoIterator<Item = (SequenceId, Vec<RawRecord>)>,
    ) -> Result<Self, TrajwinError> {
        params.validate()?;
        let mut file_ids = Vec::new();
        let mut sequences = Vec::new();
        for (sequence_id, records) in sources {
            file_ids.push(sequence_id);
            sequences.extend(sequences_of_source(&params, sequence_id, records));
        }
        Self::from_sequences(params, file_ids, sequences)
    }

    /// Pack already built sequences.
    ///
    /// Empty sequences are ignored; [`TrajwinError::EmptyDataset`] is returned when nothing is
    /// left.
    pub fn from_sequences(
        params: DatasetParams,
        file_ids: Vec<SequenceId>,
        sequences: Vec<Sequence>,
    ) -> Result<Self, TrajwinError> {
        let sequences: Vec<Sequence> = sequences.into_iter().filter(|s| !s.is_empty()).collect();
        if sequences.is_empty() {
            return Err(TrajwinError::EmptyDataset {
                split: params.split,
            });
        }

        let seq_len = params.seq_len();
        let total: usize = sequences.iter().map(Sequence::len).sum();

        let mut trajectories = Array3::zeros((total, 2, seq_len));
        let mut relative = Array3::zeros((total, 2, seq_len));
        let mut loss_mask = Array2::zeros((total, seq_len));
        let mut non_linear = Array1::zeros(total);
        let mut id_frame = Array3::zeros((total, 3, seq_len));
        let mut object_class = Vec::with_capacity(total);
        let mut object_id = Vec::with_capacity(total);

        let mut seq_start_end = Vec::with_capacity(sequences.len());
        let mut city = Vec::with_capacity(sequences.len());
        let mut origin = Vec::with_capacity(sequences.len());
        let mut sequence_id = Vec::with_capacity(sequences.len());
        let mut shapes = Vec::with_capacity(sequences.len());
        let mut straight_trajectories = Vec::new();
        let mut curved_trajectories = Vec::new();
        let mut curved_windows = Vec::new();

        let mut row = 0;
        for (window, seq) in sequences.iter().enumerate() {
            let start = row;
            for obj in &seq.objects {
                trajectories.slice_mut(s![row, .., ..]).assign(&obj.abs);
                relative.slice_mut(s![row, .., ..]).assign(&obj.rel);
                loss_mask.row_mut(row).assign(&obj.loss_mask);
                non_linear[row] = obj.non_linear;
                id_frame.slice_mut(s![row, .., ..]).assign(&obj.id_frame);
                object_class.push(obj.class);
                object_id.push(obj.object);
                row += 1;
            }
            seq_start_end.push((start, row));
            city.push(seq.city);
            origin.push(seq.origin);
            sequence_id.push(seq.sequence_id);
            shapes.push(seq.shape);

            match seq.shape {
                Some(TrajectoryShape::Curved) => {
                    curved_trajectories.push(seq.sequence_id);
                    curved_windows.push(window);
                }
                Some(TrajectoryShape::Straight) => straight_trajectories.push(seq.sequence_id),
                None => {}
            }
        }

        let norm = NormBounds::of(&trajectories, &relative);

        info!(
            split = %params.split,
            files = file_ids.len(),
            windows = seq_start_end.len(),
            objects = total,
            straight = straight_trajectories.len(),
            curved = curved_windows.len(),
            "sequence dataset ready"
        );

        Ok(SequenceDataset {
            params,
            file_ids,
            trajectories,
            relative,
            loss_mask,
            non_linear,
            id_frame,
            object_class,
            object_id,
            seq_start_end,
            city,
            origin,
            sequence_id,
            shapes,
            straight_trajectories,
            curved_trajectories,
            curved_windows,
            norm,
        })
    }

    /// Number of windows.
    #[inline]
    pub fn len(&self) -> usize {
        self.seq_start_end.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.seq_start_end.is_empty()
    }

    pub fn params(&self) -> &DatasetParams {
        &self.params
    }

    /// Sequence ids of the loaded files, in load order.
    pub fn file_ids(&self) -> &[SequenceId] {
        &self.file_ids
    }

    pub fn seq_start_end(&self) -> &[(usize, usize)] {
        &self.seq_start_end
    }

    pub fn norm(&self) -> NormBounds {
        self.norm
    }

    /// Total number of objects over all windows.
    pub fn total_objects(&self) -> usize {
        self.object_id.len()
    }

    /// Sequence ids of the windows whose reference object is straight (class balance only).
    pub fn straight_trajectories(&self) -> &[SequenceId] {
        &self.straight_trajectories
    }

    /// Sequence ids of the windows whose reference object is curved (class balance only).
    pub fn curved_trajectories(&self) -> &[SequenceId] {
        &self.curved_trajectories
    }

    /// Indices of the windows whose reference object is curved.
    pub fn curved_windows(&self) -> &[usize] {
        &self.curved_windows
    }

    /// Reference shape of a window, when class balancing was enabled at build time.
    pub fn window_shape(&self, index: usize) -> Option<TrajectoryShape> {
        self.shapes.get(index).copied().flatten()
    }

    /// Full `[N, 2, seq_len]` absolute position array.
    pub fn trajectories(&self) -> ArrayView3<'_, f64> {
        self.trajectories.view()
    }

    /// Full `[N, 2, seq_len]` relative position array.
    pub fn relative(&self) -> ArrayView3<'_, f64> {
        self.relative.view()
    }

    /// Retrieve window `index`.
    ///
    /// Return
    /// ----------
    /// * A [`SequenceItem`] borrowing the dataset arrays, split at `obs_len` along time.
    /// * [`TrajwinError::IndexOutOfRange`] when `index >= len()`.
    pub fn get(&self, index: usize) -> Result<SequenceItem<'_>, TrajwinError> {
        let &(start, end) = self
            .seq_start_end
            .get(index)
            .ok_or(TrajwinError::IndexOutOfRange {
                index,
                len: self.len(),
            })?;
        let obs = self.params.obs_len;

        Ok(SequenceItem {
            obs_traj: self.trajectories.slice(s![start..end, .., ..obs]),
            pred_traj_gt: self.trajectories.slice(s![start..end, .., obs..]),
            obs_traj_rel: self.relative.slice(s![start..end, .., ..obs]),
            pred_traj_gt_rel: self.relative.slice(s![start..end, .., obs..]),
            non_linear: self.non_linear.slice(s![start..end]),
            loss_mask: self.loss_mask.slice(s![start..end, ..]),
            id_frame: self.id_frame.slice(s![start..end, .., ..]),
            object_class: &self.object_class[start..end],
            object_id: &self.object_id[start..end],
            city: self.city[index],
            origin: self.origin[index],
            sequence_id: self.sequence_id[index],
            norm: self.norm,
        })
    }

    /// Check that every window's relative positions are the step differences of its
    /// absolute positions, within `tol`.
    pub fn relative_is_consistent(&self, tol: f64) -> bool {
        let seq_len = self.params.seq_len();
        if seq_len < 2 {
            return true;
        }
        let diff = &self.trajectories.slice(s![.., .., 1..])
            - &self.trajectories.slice(s![.., .., ..-1]);
        let first_is_zero = self
            .relative
            .slice(s![.., .., 0])
            .iter()
            .all(|v| v.abs() <= tol);
        let mut steps_match = true;
        Zip::from(&diff)
            .and(&self.relative.slice(s![.., .., 1..]))
            .for_each(|&d, &r| steps_match &= (d - r).abs() <= tol);
        first_is_zero && steps_match
    }
}

#[cfg(test)]
mod dataset_test {
    use super::*;
    use crate::{
        constants::{ObjectClass, Split},
        dataset::class_balance::ClassBalanceSampler,
    };
    use approx::assert_abs_diff_eq;

    /// Straight agent along x plus `extra` straight neighbours.
    fn straight_source(num_frames: usize, extra: u32) -> Vec<RawRecord> {
        (0..num_frames)
            .flat_map(|f| {
                (0..=extra).map(move |o| {
                    let class = if o == 0 {
                        ObjectClass::Agent
                    } else {
                        ObjectClass::Other
                    };
                    RawRecord::new(
                        f as f64,
                        o,
                        class,
                        [100.0 + f as f64, 50.0 + 3.0 * o as f64],
                        City::Miami,
                    )
                })
            })
            .collect()
    }

    /// Agent turning by a right angle halfway through the window.
    fn curved_source(num_frames: usize) -> Vec<RawRecord> {
        let half = num_frames / 2;
        (0..num_frames)
            .map(|f| {
                let position = if f < half {
                    [f as f64 * 3.0, 0.0]
                } else {
                    [half as f64 * 3.0, (f - half + 1) as f64 * 3.0]
                };
                RawRecord::new(f as f64, 0, ObjectClass::Agent, position, City::Pittsburgh)
            })
            .collect()
    }

    fn params() -> DatasetParams {
        DatasetParams::builder()
            .obs_len(8)
            .pred_len(12)
            .min_objects(1)
            .build()
            .unwrap()
    }

    #[test]
    fn test_packing_and_seq_start_end() {
        let dataset = SequenceDataset::from_sources(
            params(),
            vec![(3, straight_source(20, 2)), (5, straight_source(20, 0))],
        )
        .unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.file_ids(), &[3, 5]);
        assert_eq!(dataset.seq_start_end(), &[(0, 3), (3, 4)]);
        assert_eq!(dataset.total_objects(), 4);
        assert_eq!(dataset.trajectories().shape(), &[4, 2, 20]);

        let item = dataset.get(0).unwrap();
        assert_eq!(item.num_objects(), 3);
        assert_eq!(item.sequence_id, 3);
        assert_eq!(item.origin, [100.0, 50.0]);
        assert_eq!(item.obs_traj.shape(), &[3, 2, 8]);
        assert_eq!(item.pred_traj_gt.shape(), &[3, 2, 12]);
        assert_eq!(item.object_class[0], ObjectClass::Agent);
        assert_eq!(item.obs_traj[[2, 1, 0]], 6.0);
        assert_eq!(item.pred_traj_gt[[0, 0, 0]], 8.0);

        assert!(dataset.relative_is_consistent(1e-12));
    }

    #[test]
    fn test_norm_bounds() {
        let dataset =
            SequenceDataset::from_sources(params(), vec![(1, straight_source(20, 1))]).unwrap();
        let norm = dataset.norm();
        assert_abs_diff_eq!(norm.abs_min, 0.0);
        assert_abs_diff_eq!(norm.abs_max, 19.0);
        assert_abs_diff_eq!(norm.rel_min, 0.0);
        assert_abs_diff_eq!(norm.rel_max, 1.0);
        assert_eq!(dataset.get(0).unwrap().norm, norm);
    }

    #[test]
    fn test_index_out_of_range() {
        let dataset =
            SequenceDataset::from_sources(params(), vec![(1, straight_source(20, 0))]).unwrap();
        assert_eq!(
            dataset.get(1).unwrap_err(),
            TrajwinError::IndexOutOfRange { index: 1, len: 1 }
        );
    }

    #[test]
    fn test_empty_dataset() {
        let err = SequenceDataset::from_sources(params(), vec![(1, straight_source(10, 0))])
            .unwrap_err();
        assert_eq!(
            err,
            TrajwinError::EmptyDataset {
                split: Split::Train
            }
        );
    }

    #[test]
    fn test_sliding_windows() {
        let params = DatasetParams::builder()
            .obs_len(8)
            .pred_len(12)
            .min_objects(1)
            .window_stride(Some(5))
            .build()
            .unwrap();
        let dataset =
            SequenceDataset::from_sources(params, vec![(9, straight_source(32, 0))]).unwrap();
        // offsets 0, 5, 10
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.get(1).unwrap().origin, [105.0, 50.0]);
        assert_eq!(dataset.get(2).unwrap().id_frame[[0, 0, 0]], 10.0);
    }

    #[test]
    fn test_class_balance_bookkeeping_and_substitution() {
        let params = DatasetParams::builder()
            .obs_len(8)
            .pred_len(12)
            .min_objects(1)
            .class_balance(0.5)
            .batch_size(4)
            .build()
            .unwrap();
        let dataset = SequenceDataset::from_sources(
            params,
            vec![
                (1, straight_source(20, 0)),
                (2, straight_source(20, 0)),
                (3, straight_source(20, 0)),
                (4, curved_source(20)),
            ],
        )
        .unwrap();

        assert_eq!(dataset.straight_trajectories(), &[1, 2, 3]);
        assert_eq!(dataset.curved_trajectories(), &[4]);
        assert_eq!(dataset.curved_windows(), &[3]);

        let mut sampler = ClassBalanceSampler::new(&dataset).unwrap();
        assert_eq!(sampler.quota(), 2);
        let served: Vec<usize> = (0..4)
            .map(|i| sampler.resolve(&dataset, i).unwrap())
            .collect();
        assert_eq!(served, vec![0, 1, 3, 3]);
        assert_eq!(sampler.chunk_counts(), (2, 2));

        // next chunk: counters restart
        assert_eq!(sampler.resolve(&dataset, 2).unwrap(), 2);
        assert_eq!(sampler.chunk_counts(), (1, 0));
    }

    #[test]
    fn test_class_balance_quota_holds_over_shuffled_epochs() {
        use rand::seq::SliceRandom;

        let params = DatasetParams::builder()
            .obs_len(8)
            .pred_len(12)
            .min_objects(1)
            .class_balance(0.5)
            .batch_size(4)
            .build()
            .unwrap();
        let sources = (1..=6)
            .map(|id| (id, straight_source(20, 0)))
            .chain((7..=9).map(|id| (id, curved_source(20))));
        let dataset = SequenceDataset::from_sources(params, sources).unwrap();
        assert_eq!(dataset.curved_windows(), &[6, 7, 8]);

        let mut sampler = ClassBalanceSampler::new(&dataset).unwrap();
        let quota = sampler.quota();
        let batch_size = dataset.params().batch_size;
        let mut served_straight = 0;
        let mut served = 0;
        for epoch in 0..5u64 {
            let mut order: Vec<usize> = (0..dataset.len()).collect();
            order.shuffle(&mut StdRng::seed_from_u64(epoch));
            for index in order {
                let pick = sampler.resolve(&dataset, index).unwrap();
                assert!(sampler.chunk_counts().0 <= quota);

                if served % batch_size == 0 {
                    served_straight = 0;
                }
                if dataset.window_shape(pick) == Some(TrajectoryShape::Straight) {
                    served_straight += 1;
                }
                assert!(served_straight <= quota, "epoch {epoch}, retrieval {served}");
                served += 1;
            }
        }
        assert_eq!(served, 5 * dataset.len());
    }

    #[test]
    fn test_class_balance_without_curved_windows() {
        let params = DatasetParams::builder()
            .obs_len(8)
            .pred_len(12)
            .min_objects(1)
            .class_balance(0.0)
            .batch_size(2)
            .build()
            .unwrap();
        let dataset =
            SequenceDataset::from_sources(params, vec![(1, straight_source(20, 0))]).unwrap();
        let mut sampler = ClassBalanceSampler::new(&dataset).unwrap();
        assert_eq!(
            sampler.resolve(&dataset, 0),
            Err(TrajwinError::NoCurvedTrajectories)
        );
    }

    #[test]
    fn test_sampler_disabled() {
        let dataset =
            SequenceDataset::from_sources(params(), vec![(1, straight_source(20, 0))]).unwrap();
        assert!(ClassBalanceSampler::new(&dataset).is_none());
        assert_eq!(dataset.window_shape(0), None);
    }
}
