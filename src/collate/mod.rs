//! # Batch collation
//!
//! Merges several [`SequenceItem`]s into one time-major [`Batch`].
//!
//! ## Overview
//! -----------------
//! Per-object arrays are concatenated along the object axis, then reordered so that time comes
//! first: `[n, 2, T]` windows become `[T, N, 2]` batch tensors, with `N` the total object count.
//! Per-window values (origin, city, sequence id, context) are stacked along a new leading batch
//! axis. `seq_start_end` is rebuilt from the cumulative object counts of the merged windows so
//! that each window's objects can be recovered from the flat object axis.
//!
//! | field | shape |
//! |---|---|
//! | `obs_traj`, `obs_traj_rel` | `[obs_len, N, 2]` |
//! | `pred_traj_gt`, `pred_traj_gt_rel` | `[pred_len, N, 2]` |
//! | `non_linear` | `[N]` |
//! | `loss_mask` | `[N, seq_len]` |
//! | `seq_start_end` | `[B, 2]` |
//! | `context` | `[B, ..]` (renderer-defined) |
//! | `object_class`, `object_id` | `[N]` |
//! | `origin` | `[B, 2]` |
//! | `city`, `sequence_id` | `[B]` |
//! | `id_frame` | `[seq_len, N, 3]` |
use ndarray::{concatenate, stack, Array1, Array2, Array3, ArrayD, ArrayView3, Axis};

use crate::{dataset::NormBounds, dataset::SequenceItem, trajwin_errors::TrajwinError};

pub mod context;

use context::ContextRenderer;

/// A collated mini-batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub obs_traj: Array3<f64>,
    pub pred_traj_gt: Array3<f64>,
    pub obs_traj_rel: Array3<f64>,
    pub pred_traj_gt_rel: Array3<f64>,
    pub non_linear: Array1<f64>,
    pub loss_mask: Array2<f64>,
    pub seq_start_end: Array2<usize>,
    pub context: ArrayD<f64>,
    pub object_class: Array1<i64>,
    pub object_id: Array1<i64>,
    pub origin: Array2<f64>,
    pub city: Array1<i64>,
    pub sequence_id: Array1<i64>,
    pub norm: NormBounds,
    pub id_frame: Array3<f64>,
}

impl Batch {
    /// Number of windows in the batch.
    pub fn num_windows(&self) -> usize {
        self.seq_start_end.nrows()
    }

    /// Total number of objects in the batch.
    pub fn num_objects(&self) -> usize {
        self.non_linear.len()
    }
}

/// Concatenate `[n, C, T]` views along objects and reorder to `[T, N, C]`.
fn time_major<'a>(
    parts: impl Iterator<Item = ArrayView3<'a, f64>>,
) -> Result<Array3<f64>, TrajwinError> {
    let parts: Vec<ArrayView3<'a, f64>> = parts.collect();
    let merged = concatenate(Axis(0), &parts)?;
    Ok(merged
        .permuted_axes([2, 0, 1])
        .as_standard_layout()
        .into_owned())
}

/// Collate windows into a [`Batch`].
///
/// Arguments
/// -----------------
/// * `items`: the windows to merge, in batch order.
/// * `renderer`: producer of the per-window context payload.
///
/// Return
/// ----------
/// * The collated batch, or [`TrajwinError::EmptyBatch`] for an empty slice. A renderer that
///   returns arrays of different shapes yields [`TrajwinError::ShapeError`].
pub fn collate(
    items: &[SequenceItem<'_>],
    renderer: &dyn ContextRenderer,
) -> Result<Batch, TrajwinError> {
    let first = items.first().ok_or(TrajwinError::EmptyBatch)?;

    let mut seq_start_end = Array2::zeros((items.len(), 2));
    let mut offset = 0;
    for (b, item) in items.iter().enumerate() {
        seq_start_end[[b, 0]] = offset;
        offset += item.num_objects();
        seq_start_end[[b, 1]] = offset;
    }

    let non_linear_parts: Vec<_> = items.iter().map(|i| i.non_linear).collect();
    let loss_mask_parts: Vec<_> = items.iter().map(|i| i.loss_mask).collect();

    let contexts = items
        .iter()
        .map(|i| renderer.render(i))
        .collect::<Result<Vec<ArrayD<f64>>, _>>()?;
    let context_views: Vec<_> = contexts.iter().map(|c| c.view()).collect();

    let origin = Array2::from_shape_fn((items.len(), 2), |(b, axis)| items[b].origin[axis]);

    Ok(Batch {
        obs_traj: time_major(items.iter().map(|i| i.obs_traj))?,
        pred_traj_gt: time_major(items.iter().map(|i| i.pred_traj_gt))?,
        obs_traj_rel: time_major(items.iter().map(|i| i.obs_traj_rel))?,
        pred_traj_gt_rel: time_major(items.iter().map(|i| i.pred_traj_gt_rel))?,
        non_linear: concatenate(Axis(0), &non_linear_parts)?,
        loss_mask: concatenate(Axis(0), &loss_mask_parts)?,
        seq_start_end,
        context: stack(Axis(0), &context_views)?,
        object_class: items
            .iter()
            .flat_map(|i| i.object_class.iter().map(|c| c.code()))
            .collect(),
        object_id: items
            .iter()
            .flat_map(|i| i.object_id.iter().map(|&o| o as i64))
            .collect(),
        origin,
        city: items.iter().map(|i| i.city.code()).collect(),
        sequence_id: items.iter().map(|i| i.sequence_id).collect(),
        norm: first.norm,
        id_frame: time_major(items.iter().map(|i| i.id_frame))?,
    })
}
