//! Per-window context payloads attached to a batch.
//!
//! The collator does not know how map context is produced. It asks a [`ContextRenderer`] for one
//! array per window and stacks the results along a new leading axis, so every renderer must
//! return arrays of the same shape for a given configuration.
use ndarray::{Array2, ArrayD, IxDyn};
use serde::Deserialize;

use crate::{constants::ObjectClass, dataset::SequenceItem, trajwin_errors::TrajwinError};

/// Produces the context array of one window.
pub trait ContextRenderer {
    fn render(&self, item: &SequenceItem<'_>) -> Result<ArrayD<f64>, TrajwinError>;
}

/// Renderer selection in [`DatasetParams`](crate::params::DatasetParams).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextKind {
    #[default]
    Placeholder,
    AgentTrack,
}

impl ContextKind {
    pub fn renderer(self) -> Box<dyn ContextRenderer + Send + Sync> {
        match self {
            ContextKind::Placeholder => Box::new(PlaceholderContext),
            ContextKind::AgentTrack => Box::new(AgentTrackContext),
        }
    }
}

/// A `[1, 1, 1]` zero array for every window.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderContext;

impl ContextRenderer for PlaceholderContext {
    fn render(&self, _item: &SequenceItem<'_>) -> Result<ArrayD<f64>, TrajwinError> {
        Ok(ArrayD::zeros(IxDyn(&[1, 1, 1])))
    }
}

/// Observed track of the window's agent in absolute map coordinates, as `[obs_len, 2]`.
///
/// Windows without an agent get a zero array of the same shape.
#[derive(Debug, Clone, Copy, Default)]
pub struct AgentTrackContext;

impl ContextRenderer for AgentTrackContext {
    fn render(&self, item: &SequenceItem<'_>) -> Result<ArrayD<f64>, TrajwinError> {
        let obs_len = item.obs_traj.shape()[2];
        let Some(agent) = item
            .object_class
            .iter()
            .position(|&c| c == ObjectClass::Agent)
        else {
            return Ok(Array2::<f64>::zeros((obs_len, 2)).into_dyn());
        };

        let track = Array2::from_shape_fn((obs_len, 2), |(t, axis)| {
            item.obs_traj[[agent, axis, t]] + item.origin[axis]
        });
        Ok(track.into_dyn())
    }
}
