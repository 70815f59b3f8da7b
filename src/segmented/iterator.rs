//! Segment Iterator
//!
//! Lazy, forward-only walk over the segments of a file.

use std::iter::FusedIterator;

use crate::error::{Result, StrataError};
use crate::io::FileDataInput;

use super::SegmentedFile;

/// Iterator over segments from a starting position to the end of the file
///
/// Each step asks the file for the segment at the next position and advances
/// by that cursor's `bytes_remaining`, so the yielded ranges partition
/// `[start, length)` exactly. The caller owns every yielded cursor and must
/// close (or drop) it. An error ends the iteration.
pub struct SegmentIterator<'a> {
    file: &'a dyn SegmentedFile,
    /// Position of the next segment to hand out
    next_position: u64,
}

impl<'a> SegmentIterator<'a> {
    pub fn new(file: &'a dyn SegmentedFile, position: u64) -> Self {
        Self {
            file,
            next_position: position,
        }
    }

    /// Position the next call to `next()` will start from
    pub fn next_position(&self) -> u64 {
        self.next_position
    }
}

impl<'a> Iterator for SegmentIterator<'a> {
    type Item = Result<Box<dyn FileDataInput + 'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let length = self.file.length();
        let position = self.next_position;
        if position >= length {
            return None;
        }

        match self.file.get_segment(position) {
            Ok(segment) => {
                let remaining = segment.bytes_remaining();
                if remaining == 0 {
                    self.next_position = length;
                    return Some(Err(StrataError::StalledSegment { position }));
                }
                self.next_position = position + remaining;
                Some(Ok(segment))
            }
            Err(e) => {
                self.next_position = length;
                Some(Err(e))
            }
        }
    }
}

impl FusedIterator for SegmentIterator<'_> {}
