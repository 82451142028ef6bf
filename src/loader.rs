//! # Mini-batch loader
//!
//! [`DataLoader`] walks a [`SequenceDataset`] in sequential or seeded-shuffled order, applies the
//! [`ClassBalanceSampler`] when class balancing is enabled, and collates `batch_size` windows at a
//! time. The last batch may be smaller.
//!
//! ```rust,no_run
//! use camino::Utf8Path;
//! use trajwin::{dataset::SequenceDataset, loader::DataLoader, params::DatasetParams};
//!
//! let params = DatasetParams::from_yaml_file(Utf8Path::new("config/train.yaml")).unwrap();
//! let dataset = SequenceDataset::new(params).unwrap();
//! for batch in DataLoader::new(&dataset).shuffle(true) {
//!     let batch = batch.unwrap();
//!     println!("{:?}", batch.obs_traj.shape());
//! }
//! ```
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::{
    collate::{collate, context::ContextRenderer, Batch},
    dataset::{class_balance::ClassBalanceSampler, SequenceDataset},
    trajwin_errors::TrajwinError,
};

pub struct DataLoader<'a> {
    dataset: &'a SequenceDataset,
    batch_size: usize,
    order: Vec<usize>,
    cursor: usize,
    sampler: Option<ClassBalanceSampler>,
    renderer: Box<dyn ContextRenderer + Send + Sync>,
}

impl<'a> DataLoader<'a> {
    /// Sequential loader using the dataset's batch size and context renderer.
    pub fn new(dataset: &'a SequenceDataset) -> Self {
        let params = dataset.params();
        DataLoader {
            dataset,
            batch_size: params.batch_size,
            order: (0..dataset.len()).collect(),
            cursor: 0,
            sampler: ClassBalanceSampler::new(dataset),
            renderer: params.context.renderer(),
        }
    }

    /// Visit the windows in a random order seeded by the dataset seed.
    pub fn shuffle(self, shuffle: bool) -> Self {
        self.shuffle_epoch(shuffle, 0)
    }

    /// Same as [`DataLoader::shuffle`], with a per-epoch seed offset.
    pub fn shuffle_epoch(mut self, shuffle: bool, epoch: u64) -> Self {
        self.order = (0..self.dataset.len()).collect();
        if shuffle {
            let seed = self.dataset.params().seed.wrapping_add(epoch);
            self.order.shuffle(&mut StdRng::seed_from_u64(seed));
        }
        self.cursor = 0;
        self
    }

    pub fn with_renderer(mut self, renderer: Box<dyn ContextRenderer + Send + Sync>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn num_batches(&self) -> usize {
        self.order.len().div_ceil(self.batch_size)
    }

    /// Window indices that will be requested, in order (before class-balance substitution).
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    fn next_batch(&mut self) -> Result<Batch, TrajwinError> {
        let end = (self.cursor + self.batch_size).min(self.order.len());
        let requested = &self.order[self.cursor..end];
        self.cursor = end;

        let mut items = Vec::with_capacity(requested.len());
        for &index in requested {
            let served = match self.sampler.as_mut() {
                Some(sampler) => sampler.resolve(self.dataset, index)?,
                None => index,
            };
            items.push(self.dataset.get(served)?);
        }
        collate(&items, self.renderer.as_ref())
    }
}

impl Iterator for DataLoader<'_> {
    type Item = Result<Batch, TrajwinError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.order.len() {
            return None;
        }
        Some(self.next_batch())
    }
}
