//! # Dataset configuration
//!
//! [`DatasetParams`] enumerates every option recognized by the dataset builder, with its
//! default. It can be produced in two ways:
//!
//! * programmatically, through the fluent [`DatasetParamsBuilder`] (`DatasetParams::builder()`),
//! * from a YAML document ([`DatasetParams::from_yaml_str`], [`DatasetParams::from_yaml_file`]).
//!
//! Both paths end in the same validation step. Unknown YAML keys are rejected.
//!
//! ## Example
//! -----------------
//! ```rust,no_run
//! use trajwin::params::DatasetParams;
//! use trajwin::constants::Split;
//!
//! let params = DatasetParams::builder()
//!     .root_folder("data/argoverse")
//!     .split(Split::Val)
//!     .obs_len(20)
//!     .pred_len(30)
//!     .split_percentage(0.5)
//!     .build()
//!     .unwrap();
//! assert_eq!(params.seq_len(), 50);
//! ```
use std::cmp::Ordering::{Equal, Greater, Less};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

use crate::{
    collate::context::ContextKind,
    constants::{
        Split, DEFAULT_MIN_OBJECTS, DEFAULT_NUM_AGENTS_PER_OBS, DEFAULT_OBS_LEN, DEFAULT_PRED_LEN,
    },
    trajwin_errors::TrajwinError,
    windows::{non_linear::NonLinearParams, sequence_builder::CoveragePolicy},
};

/// Full configuration of a [`SequenceDataset`](crate::dataset::SequenceDataset) build.
///
/// Fields
/// -----------------
/// * `root_folder` – dataset root; source files live in `<root_folder>/<split>/data/*.csv`.
/// * `split` – which split to read. `Test` disables non-linearity classification.
/// * `obs_len` / `pred_len` – observation and prediction horizons (`seq_len = obs_len + pred_len`).
/// * `window_stride` – `None` extracts one window per file at frame offset 0, `Some(s)`
///   slides a window every `s` frames.
/// * `distance_threshold` – optional filter: objects farther than this from the origin at the
///   origin step are dropped (the reference object is never dropped).
/// * `num_agents_per_obs` – per-window object cap; larger windows are chunked.
/// * `min_objects` – surviving objects required for a chunk to be kept.
/// * `split_percentage` – fraction of the split's files to read.
/// * `start_from_percentage` – offset of the first file (fraction), ignored when shuffling.
/// * `shuffle` – pick a random subset of files instead of a sorted slice.
/// * `seed` – seed of every random draw (file subset, RANSAC, class-balance substitution).
/// * `batch_size` – chunk size used by class balancing and the loader.
/// * `class_balance` – maximum fraction of straight trajectories per batch; negative disables.
/// * `obs_origin` – 1-indexed observed step of the reference object used as coordinate origin.
/// * `coverage` – how partially covered objects are treated.
/// * `non_linear` – RANSAC classifier settings.
/// * `context` – which context renderer the loader hands to the collator.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DatasetParams {
    pub root_folder: Utf8PathBuf,
    pub split: Split,
    pub obs_len: usize,
    pub pred_len: usize,
    pub window_stride: Option<usize>,
    pub distance_threshold: Option<f64>,
    pub num_agents_per_obs: usize,
    pub min_objects: usize,
    pub split_percentage: f64,
    pub start_from_percentage: f64,
    pub shuffle: bool,
    pub seed: u64,
    pub batch_size: usize,
    pub class_balance: f64,
    pub obs_origin: usize,
    pub coverage: CoveragePolicy,
    pub non_linear: NonLinearParams,
    pub context: ContextKind,
}

impl Default for DatasetParams {
    fn default() -> Self {
        DatasetParams {
            root_folder: Utf8PathBuf::from("."),
            split: Split::Train,
            obs_len: DEFAULT_OBS_LEN,
            pred_len: DEFAULT_PRED_LEN,
            window_stride: None,
            distance_threshold: None,
            num_agents_per_obs: DEFAULT_NUM_AGENTS_PER_OBS,
            min_objects: DEFAULT_MIN_OBJECTS,
            split_percentage: 0.1,
            start_from_percentage: 0.0,
            shuffle: false,
            seed: 42,
            batch_size: 16,
            class_balance: -1.0,
            obs_origin: 1,
            coverage: CoveragePolicy::Strict,
            non_linear: NonLinearParams::default(),
            context: ContextKind::Placeholder,
        }
    }
}

impl DatasetParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> DatasetParamsBuilder {
        DatasetParamsBuilder::new()
    }

    /// Parse and validate a YAML configuration document.
    ///
    /// Missing keys take their default value, unknown keys are an error.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, TrajwinError> {
        let params: DatasetParams = serde_yaml::from_str(yaml)?;
        params.validate()?;
        Ok(params)
    }

    pub fn from_yaml_file(path: &Utf8Path) -> Result<Self, TrajwinError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    #[inline]
    pub fn seq_len(&self) -> usize {
        self.obs_len + self.pred_len
    }

    #[inline]
    pub fn class_balance_enabled(&self) -> bool {
        self.class_balance >= 0.0
    }

    /// Maximum number of straight trajectories per batch-sized chunk.
    #[inline]
    pub fn straight_quota(&self) -> usize {
        (self.class_balance * self.batch_size as f64).floor() as usize
    }

    /// Folder holding the source files of the configured split.
    pub fn split_folder(&self) -> Utf8PathBuf {
        self.root_folder.join(self.split.as_str()).join("data")
    }

    /// Check every cross-field constraint.
    ///
    /// Validation rules
    /// -----------------
    /// * `obs_len ≥ 1`, `pred_len ≥ 1`.
    /// * `1 ≤ obs_origin ≤ obs_len`.
    /// * `window_stride`, when set, is `≥ 1`.
    /// * `num_agents_per_obs ≥ 1`, `min_objects ≥ 1`, `batch_size ≥ 1`.
    /// * `split_percentage ∈ (0, 1]`, `start_from_percentage ∈ [0, 1)`.
    /// * `class_balance < 0` (disabled) or `class_balance ∈ [0, 1]`.
    /// * `distance_threshold`, when set, is `> 0`.
    /// * classifier: `residual_threshold > 0`, `max_trials ≥ 1`, `min_consecutive_outliers ≥ 1`.
    pub fn validate(&self) -> Result<(), TrajwinError> {
        let invalid = |msg: &str| Err(TrajwinError::InvalidParameter(msg.into()));

        if self.obs_len == 0 || self.pred_len == 0 {
            return invalid("obs_len and pred_len must be >= 1");
        }
        if self.obs_origin == 0 || self.obs_origin > self.obs_len {
            return invalid("obs_origin must be within 1..=obs_len");
        }
        if self.window_stride == Some(0) {
            return invalid("window_stride must be >= 1");
        }
        if self.num_agents_per_obs == 0 {
            return invalid("num_agents_per_obs must be >= 1");
        }
        if self.min_objects == 0 {
            return invalid("min_objects must be >= 1");
        }
        if self.batch_size == 0 {
            return invalid("batch_size must be >= 1");
        }
        if !gt0(self.split_percentage) || !le(self.split_percentage, 1.0) {
            return invalid("split_percentage must be in (0, 1]");
        }
        if !ge0(self.start_from_percentage) || !lt(self.start_from_percentage, 1.0) {
            return invalid("start_from_percentage must be in [0, 1)");
        }
        if self.class_balance.is_nan() || self.class_balance > 1.0 {
            return invalid("class_balance must be negative (disabled) or in [0, 1]");
        }
        if let Some(d) = self.distance_threshold {
            if !gt0(d) {
                return invalid("distance_threshold must be > 0");
            }
        }
        if !gt0(self.non_linear.residual_threshold) {
            return invalid("non_linear.residual_threshold must be > 0");
        }
        if self.non_linear.max_trials == 0 {
            return invalid("non_linear.max_trials must be >= 1");
        }
        if self.non_linear.min_consecutive_outliers == 0 {
            return invalid("non_linear.min_consecutive_outliers must be >= 1");
        }
        Ok(())
    }
}

// ---- Numeric helpers for PartialOrd (NaN is invalid) ----

#[inline]
fn gt0(x: f64) -> bool {
    x.partial_cmp(&0.0) == Some(Greater)
}

#[inline]
fn ge0(x: f64) -> bool {
    matches!(x.partial_cmp(&0.0), Some(Greater) | Some(Equal))
}

#[inline]
fn le(a: f64, b: f64) -> bool {
    matches!(a.partial_cmp(&b), Some(Less) | Some(Equal))
}

#[inline]
fn lt(a: f64, b: f64) -> bool {
    a.partial_cmp(&b) == Some(Less)
}

/// Builder for [`DatasetParams`], with validation.
#[derive(Debug, Clone, Default)]
pub struct DatasetParamsBuilder {
    params: DatasetParams,
}

impl DatasetParamsBuilder {
    pub fn new() -> Self {
        Self {
            params: DatasetParams::default(),
        }
    }

    pub fn root_folder(mut self, v: impl Into<Utf8PathBuf>) -> Self {
        self.params.root_folder = v.into();
        self
    }
    pub fn split(mut self, v: Split) -> Self {
        self.params.split = v;
        self
    }
    pub fn obs_len(mut self, v: usize) -> Self {
        self.params.obs_len = v;
        self
    }
    pub fn pred_len(mut self, v: usize) -> Self {
        self.params.pred_len = v;
        self
    }
    pub fn window_stride(mut self, v: Option<usize>) -> Self {
        self.params.window_stride = v;
        self
    }
    pub fn distance_threshold(mut self, v: Option<f64>) -> Self {
        self.params.distance_threshold = v;
        self
    }
    pub fn num_agents_per_obs(mut self, v: usize) -> Self {
        self.params.num_agents_per_obs = v;
        self
    }
    pub fn min_objects(mut self, v: usize) -> Self {
        self.params.min_objects = v;
        self
    }
    pub fn split_percentage(mut self, v: f64) -> Self {
        self.params.split_percentage = v;
        self
    }
    pub fn start_from_percentage(mut self, v: f64) -> Self {
        self.params.start_from_percentage = v;
        self
    }
    pub fn shuffle(mut self, v: bool) -> Self {
        self.params.shuffle = v;
        self
    }
    pub fn seed(mut self, v: u64) -> Self {
        self.params.seed = v;
        self
    }
    pub fn batch_size(mut self, v: usize) -> Self {
        self.params.batch_size = v;
        self
    }
    pub fn class_balance(mut self, v: f64) -> Self {
        self.params.class_balance = v;
        self
    }
    pub fn obs_origin(mut self, v: usize) -> Self {
        self.params.obs_origin = v;
        self
    }
    pub fn coverage(mut self, v: CoveragePolicy) -> Self {
        self.params.coverage = v;
        self
    }
    pub fn non_linear(mut self, v: NonLinearParams) -> Self {
        self.params.non_linear = v;
        self
    }
    pub fn context(mut self, v: ContextKind) -> Self {
        self.params.context = v;
        self
    }

    /// Validate and return the configured [`DatasetParams`].
    ///
    /// See [`DatasetParams::validate`] for the rules applied.
    pub fn build(self) -> Result<DatasetParams, TrajwinError> {
        self.params.validate()?;
        Ok(self.params)
    }
}
