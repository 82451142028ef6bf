//! # Constants and type definitions for trajwin
//!
//! This module centralizes the **default dataset parameters**, the **sentinel values**
//! and the **common type definitions** shared by the windowing, dataset and collation
//! stages.
//!
//! ## Overview
//!
//! - Default horizons, caps and classifier settings
//! - Enumerations decoded from the source files (object class, city, split)
//! - Core type aliases used across the crate
//!
//! These definitions are used by all main modules: [`records`](crate::records),
//! [`windows`](crate::windows), [`dataset`](crate::dataset) and [`collate`](crate::collate).
use std::fmt;

use serde::Deserialize;

// -------------------------------------------------------------------------------------------------
// Defaults
// -------------------------------------------------------------------------------------------------

/// Default number of observed frames per window.
pub const DEFAULT_OBS_LEN: usize = 20;

/// Default number of predicted frames per window.
pub const DEFAULT_PRED_LEN: usize = 30;

/// Default per-window object cap; larger windows are chunked.
pub const DEFAULT_NUM_AGENTS_PER_OBS: usize = 32;

/// Default minimum number of surviving objects for a window to be kept.
pub const DEFAULT_MIN_OBJECTS: usize = 2;

/// Default RANSAC inlier distance (map units).
pub const DEFAULT_RESIDUAL_THRESHOLD: f64 = 2.0;

/// Default number of RANSAC sampling trials.
pub const DEFAULT_MAX_TRIALS: usize = 100;

/// Consecutive outliers needed to label a trajectory as curved.
pub const DEFAULT_MIN_CONSECUTIVE_OUTLIERS: usize = 8;

/// Flag stored for trajectories that were not classified (`test` split).
pub const UNCLASSIFIED_FLAG: f64 = -1.0;

/// Flag of a curved (non-linear) trajectory.
pub const NON_LINEAR_FLAG: f64 = 1.0;

/// Flag of a straight (linear) trajectory.
pub const LINEAR_FLAG: f64 = 0.0;

/// Numerical epsilon used for degenerate geometry checks
pub const EPS: f64 = 1e-9;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Frame identifier as read from the source file (a timestamp; only ordering and equality matter)
pub type FrameId = f64;

/// Dense per-file object index (first-occurrence order)
pub type ObjectIndex = u32;

/// Sequence identifier, derived from the numeric file stem (`12345.csv` → `12345`)
pub type SequenceId = i64;

/// Planar position `(x, y)` in map units
pub type Position = [f64; 2];

// -------------------------------------------------------------------------------------------------
// Enumerations
// -------------------------------------------------------------------------------------------------

/// Class of a tracked object.
///
/// The numeric codes match the tensor contract handed to the model:
/// `Ego = 0`, `Agent = 1`, `Other = 2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectClass {
    Ego,
    Agent,
    Other,
}

impl ObjectClass {
    /// Decode the class column of a source row (`"AV"`, `"AGENT"`, anything else).
    pub fn from_label(label: &str) -> Self {
        match label {
            "AV" => ObjectClass::Ego,
            "AGENT" => ObjectClass::Agent,
            _ => ObjectClass::Other,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            ObjectClass::Ego => 0,
            ObjectClass::Agent => 1,
            ObjectClass::Other => 2,
        }
    }
}

/// City the sequence was recorded in. `"PIT"` decodes to [`City::Pittsburgh`],
/// any other label to [`City::Miami`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum City {
    Pittsburgh,
    Miami,
}

impl City {
    pub fn from_label(label: &str) -> Self {
        if label == "PIT" {
            City::Pittsburgh
        } else {
            City::Miami
        }
    }

    pub fn code(self) -> i64 {
        match self {
            City::Pittsburgh => 0,
            City::Miami => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            City::Pittsburgh => "PIT",
            City::Miami => "MIA",
        }
    }
}

/// Dataset split. Only `Test` changes behaviour: trajectories are not classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    #[default]
    Train,
    Val,
    Test,
}

impl Split {
    pub fn as_str(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod constants_test {
    use super::*;

    #[test]
    fn test_object_class_labels() {
        assert_eq!(ObjectClass::from_label("AV"), ObjectClass::Ego);
        assert_eq!(ObjectClass::from_label("AGENT"), ObjectClass::Agent);
        assert_eq!(ObjectClass::from_label("OTHERS"), ObjectClass::Other);
        assert_eq!(ObjectClass::from_label("agent"), ObjectClass::Other);
        assert_eq!(ObjectClass::Agent.code(), 1);
    }

    #[test]
    fn test_city_labels() {
        assert_eq!(City::from_label("PIT"), City::Pittsburgh);
        assert_eq!(City::from_label("MIA"), City::Miami);
        assert_eq!(City::from_label("anything"), City::Miami);
        assert_eq!(City::Miami.code(), 1);
        assert_eq!(City::Pittsburgh.name(), "PIT");
        assert_eq!(City::from_label(City::Miami.name()), City::Miami);
    }
}
