//! Frame groups: contiguous runs of visually equivalent frames.

use std::ops::Range;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when constructing groups.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GroupError {
    #[error("empty frame range [{start}, {end})")]
    EmptyRange { start: usize, end: usize },

    #[error("representative {representative} outside [{start}, {end})")]
    RepresentativeOutOfRange {
        start: usize,
        end: usize,
        representative: usize,
    },
}

/// A half-open frame range `[start, end)` plus its representative frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct FrameGroup {
    /// Position of this group in the ordered partition
    pub index: usize,
    /// First frame index (inclusive)
    pub start: usize,
    /// One past the last frame index
    pub end: usize,
    /// Frame sent to the enhancement service
    pub representative: usize,
}

impl FrameGroup {
    /// Create a group whose representative is the temporal midpoint.
    pub fn new(index: usize, start: usize, end: usize) -> Result<Self, GroupError> {
        if end <= start {
            return Err(GroupError::EmptyRange { start, end });
        }
        Ok(Self {
            index,
            start,
            end,
            representative: midpoint(start, end),
        })
    }

    /// Replace the representative, keeping it inside the range.
    pub fn with_representative(mut self, representative: usize) -> Result<Self, GroupError> {
        if !self.contains(representative) {
            return Err(GroupError::RepresentativeOutOfRange {
                start: self.start,
                end: self.end,
                representative,
            });
        }
        self.representative = representative;
        Ok(self)
    }

    /// Number of frames in the group (never zero).
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Always false; groups are non-empty by construction.
    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    pub fn contains(&self, frame_index: usize) -> bool {
        (self.start..self.end).contains(&frame_index)
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Temporal midpoint of `[start, end)`, rounded down.
pub fn midpoint(start: usize, end: usize) -> usize {
    start + (end - start) / 2
}

/// Check that `groups` partitions `[0, frame_count)` exactly and in order.
pub fn is_exact_partition(groups: &[FrameGroup], frame_count: usize) -> bool {
    let mut expected_start = 0;
    for (i, group) in groups.iter().enumerate() {
        if group.index != i
            || group.start != expected_start
            || group.is_empty()
            || !group.contains(group.representative)
        {
            return false;
        }
        expected_start = group.end;
    }
    expected_start == frame_count
}
