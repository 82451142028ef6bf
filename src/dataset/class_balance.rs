//! # Class-balance sampler
//!
//! Caps the number of straight trajectories served per batch-sized chunk of retrievals.
//!
//! ## Overview
//! -----------------
//! Retrievals are counted in consecutive chunks of `batch_size`. Within a chunk at most
//! `floor(class_balance * batch_size)` straight windows are served; once that quota is used,
//! every further straight request is replaced by a window drawn uniformly at random among the
//! curved ones. Counters restart at every chunk boundary.
//!
//! The window shape used here is the shape of the window's reference object, computed by the
//! sequence builder when class balancing is enabled.
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::debug;

use crate::{dataset::SequenceDataset, trajwin_errors::TrajwinError};

/// Stateful index substitution applied on top of [`SequenceDataset::get`].
#[derive(Debug, Clone)]
pub struct ClassBalanceSampler {
    batch_size: usize,
    quota: usize,
    served: usize,
    straight_in_chunk: usize,
    curved_in_chunk: usize,
    rng: StdRng,
}

impl ClassBalanceSampler {
    /// Sampler configured from the dataset parameters, or `None` when class balancing is off.
    pub fn new(dataset: &SequenceDataset) -> Option<Self> {
        let params = dataset.params();
        params.class_balance_enabled().then(|| ClassBalanceSampler {
            batch_size: params.batch_size,
            quota: params.straight_quota(),
            served: 0,
            straight_in_chunk: 0,
            curved_in_chunk: 0,
            rng: StdRng::seed_from_u64(params.seed),
        })
    }

    /// Maximum number of straight windows per chunk.
    pub fn quota(&self) -> usize {
        self.quota
    }

    /// Straight and curved windows served so far in the current chunk.
    pub fn chunk_counts(&self) -> (usize, usize) {
        (self.straight_in_chunk, self.curved_in_chunk)
    }

    /// Resolve a requested window index into the index actually served.
    ///
    /// Arguments
    /// -----------------
    /// * `dataset`: the dataset the index refers to.
    /// * `index`: requested window index.
    ///
    /// Return
    /// ----------
    /// * `index` itself, or a random curved window index when the straight quota of the current
    ///   chunk is exhausted.
    /// * [`TrajwinError::IndexOutOfRange`] for an invalid index,
    ///   [`TrajwinError::NoCurvedTrajectories`] when a substitution is needed but the dataset
    ///   has no curved window.
    pub fn resolve(
        &mut self,
        dataset: &SequenceDataset,
        index: usize,
    ) -> Result<usize, TrajwinError> {
        if index >= dataset.len() {
            return Err(TrajwinError::IndexOutOfRange {
                index,
                len: dataset.len(),
            });
        }
        if self.served % self.batch_size == 0 {
            self.straight_in_chunk = 0;
            self.curved_in_chunk = 0;
        }

        let is_curved = dataset
            .window_shape(index)
            .is_some_and(|shape| shape.is_curved());

        let resolved = if is_curved {
            self.curved_in_chunk += 1;
            index
        } else if self.straight_in_chunk >= self.quota {
            let curved = dataset.curved_windows();
            if curved.is_empty() {
                return Err(TrajwinError::NoCurvedTrajectories);
            }
            let pick = curved[self.rng.random_range(0..curved.len())];
            debug!(requested = index, served = pick, "straight quota reached, substituted");
            self.curved_in_chunk += 1;
            pick
        } else {
            self.straight_in_chunk += 1;
            index
        };

        assert!(self.straight_in_chunk <= self.quota);
        self.served += 1;
        Ok(resolved)
    }
}
