//! # Source records and frame index
//!
//! A source file is a flat table of observations, one row per `(frame, object)` pair.
//! This module holds the decoded row type ([`RawRecord`]) and the [`FrameIndex`] used by the
//! window extractor to address the table frame by frame.
//!
//! ## Overview
//! -----------------
//! * [`csv_reader`] decodes a CSV source file into a [`SourceFile`].
//! * [`FrameIndex::from_records`] sorts the records by frame (stable, so rows sharing a frame
//!   keep their file order) and records the contiguous block of each distinct frame.
//!
//! Because records are stored sorted by frame, the records of any run of consecutive frames
//! form a single contiguous slice, see [`FrameIndex::span`].
use std::ops::Range;

use crate::constants::{City, FrameId, ObjectClass, ObjectIndex, Position, SequenceId};

pub mod csv_reader;

/// One decoded row of a source file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawRecord {
    pub frame: FrameId,
    pub object: ObjectIndex,
    pub class: ObjectClass,
    pub position: Position,
    pub city: City,
}

impl RawRecord {
    pub fn new(
        frame: FrameId,
        object: ObjectIndex,
        class: ObjectClass,
        position: Position,
        city: City,
    ) -> Self {
        RawRecord {
            frame,
            object,
            class,
            position,
            city,
        }
    }
}

/// A fully decoded source file.
///
/// Fields
/// -----------------
/// * `sequence_id` – numeric identifier taken from the file stem.
/// * `records` – rows in file order.
/// * `object_labels` – original track identifiers, indexed by [`ObjectIndex`].
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub sequence_id: SequenceId,
    pub records: Vec<RawRecord>,
    pub object_labels: Vec<String>,
}

/// Records of one source grouped by distinct frame, in ascending frame order.
#[derive(Debug, Clone, Default)]
pub struct FrameIndex {
    frames: Vec<FrameId>,
    records: Vec<RawRecord>,
    blocks: Vec<Range<usize>>,
}

impl FrameIndex {
    /// Build the index of a set of records.
    ///
    /// Arguments
    /// -----------------
    /// * `records`: rows of one source, in any order.
    ///
    /// Return
    /// ----------
    /// * A [`FrameIndex`] whose distinct frames are sorted ascending. Rows that share a frame keep
    ///   their relative input order.
    pub fn from_records(mut records: Vec<RawRecord>) -> Self {
        records.sort_by(|a, b| a.frame.total_cmp(&b.frame));

        let mut frames = Vec::new();
        let mut blocks: Vec<Range<usize>> = Vec::new();
        for (i, record) in records.iter().enumerate() {
            if frames.last() == Some(&record.frame) {
                if let Some(block) = blocks.last_mut() {
                    block.end = i + 1;
                }
            } else {
                frames.push(record.frame);
                blocks.push(i..i + 1);
            }
        }

        FrameIndex {
            frames,
            records,
            blocks,
        }
    }

    /// Number of distinct frames.
    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[FrameId] {
        &self.frames
    }

    /// Records observed at the `i`-th distinct frame.
    pub fn records_at(&self, i: usize) -> &[RawRecord] {
        self.blocks
            .get(i)
            .map(|block| &self.records[block.clone()])
            .unwrap_or(&[])
    }

    /// Records of the distinct frames `start..start + len`, as one contiguous slice.
    ///
    /// The range is clamped to the available frames.
    pub fn span(&self, start: usize, len: usize) -> &[RawRecord] {
        let end = start.saturating_add(len).min(self.frames.len());
        if start >= end {
            return &[];
        }
        &self.records[self.blocks[start].start..self.blocks[end - 1].end]
    }

    /// City of the source, read from its first record.
    pub fn city(&self) -> Option<City> {
        self.records.first().map(|r| r.city)
    }
}
