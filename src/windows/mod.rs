//! # Window extraction
//!
//! A **window** is a run of `seq_len = obs_len + pred_len` consecutive distinct frames of one
//! source file. This module slices windows out of a [`FrameIndex`] and lists the objects that
//! appear in them. The per-object processing lives in [`sequence_builder`], the trajectory
//! classifier in [`non_linear`].
//!
//! ## Window placement
//! -----------------
//! * Without a stride, a single window is taken at frame offset `0`.
//! * With a stride `s`, windows start at offsets `0, s, 2s, …` as long as the whole window fits
//!   in the file.
//!
//! A window starting too close to the end of the file is *short*: it holds fewer than
//! `seq_len` frames. Short windows are still returned by [`Window::extract`]; no object can
//! satisfy strict coverage in them.
use itertools::Itertools;

use crate::{
    constants::{FrameId, ObjectIndex},
    records::{FrameIndex, RawRecord},
};

pub mod non_linear;
pub mod sequence_builder;

/// A slice of consecutive frames of one source.
#[derive(Debug, Clone)]
pub struct Window<'a> {
    /// Index of the first frame in the source's distinct frame list.
    pub start: usize,
    /// Requested window length; `frames.len()` may be smaller for a short window.
    pub seq_len: usize,
    /// Distinct frame ids covered by the window, ascending.
    pub frames: &'a [FrameId],
    /// Every record whose frame lies in `frames`.
    pub records: &'a [RawRecord],
    /// Sorted unique ids of the objects present in the window.
    pub objects: Vec<ObjectIndex>,
}

impl<'a> Window<'a> {
    /// Slice the window `frames[start .. start + seq_len]` out of a frame index.
    pub fn extract(index: &'a FrameIndex, start: usize, seq_len: usize) -> Self {
        let frames = index.frames();
        let begin = start.min(frames.len());
        let end = start.saturating_add(seq_len).min(frames.len());
        let records = index.span(start, seq_len);
        let objects = records
            .iter()
            .map(|r| r.object)
            .sorted_unstable()
            .dedup()
            .collect();

        Window {
            start,
            seq_len,
            frames: &frames[begin..end],
            records,
            objects,
        }
    }

    /// Whether the window holds all `seq_len` frames.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.frames.len() == self.seq_len
    }

    /// Slot (0-based step inside the window) of a frame id.
    pub fn slot_of(&self, frame: FrameId) -> Option<usize> {
        self.frames
            .binary_search_by(|f| f.total_cmp(&frame))
            .ok()
    }

    /// Records of every object in the window, grouped by object in ascending id order.
    /// Inside a group, records keep their frame order.
    pub fn tracks(&self) -> Vec<(ObjectIndex, Vec<&'a RawRecord>)> {
        let mut by_object: Vec<&'a RawRecord> = self.records.iter().collect();
        by_object.sort_by_key(|r| r.object);
        by_object
            .into_iter()
            .chunk_by(|r| r.object)
            .into_iter()
            .map(|(object, group)| (object, group.collect()))
            .collect()
    }

    pub fn first_frame(&self) -> Option<FrameId> {
        self.frames.first().copied()
    }
}

/// Start offsets of the windows of a source with `num_frames` distinct frames.
///
/// Arguments
/// -----------------
/// * `num_frames`: number of distinct frames in the source.
/// * `seq_len`: window length.
/// * `stride`: `None` for a single window at offset `0`, `Some(s)` for sliding windows.
pub fn window_starts(num_frames: usize, seq_len: usize, stride: Option<usize>) -> Vec<usize> {
    match stride {
        None => vec![0],
        Some(step) => {
            let step = step.max(1);
            (0..)
                .step_by(step)
                .take_while(|offset| offset + seq_len <= num_frames)
                .collect()
        }
    }
}
