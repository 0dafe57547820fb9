// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Pull-based text input.
//!
//! The parser never sees the whole document at once; it asks an [`Input`]
//! for the bytes starting at a given offset and buffers what it gets back.
//! This keeps the runtime independent of how the host stores text (ropes,
//! gap buffers, mmapped files).

use crate::length::{Length, Point};

/// A random-access source of document bytes.
pub trait Input {
    /// Returns the bytes starting at `byte_offset`. An empty slice means
    /// end of input. Implementations may return any non-empty prefix of
    /// the remaining text; the caller will ask again for the rest.
    fn read(&mut self, byte_offset: u32) -> &[u8];
}

impl Input for &str {
    fn read(&mut self, byte_offset: u32) -> &[u8] {
        let bytes = self.as_bytes();
        let offset = (byte_offset as usize).min(bytes.len());
        &bytes[offset..]
    }
}

impl Input for String {
    fn read(&mut self, byte_offset: u32) -> &[u8] {
        let bytes = self.as_bytes();
        let offset = (byte_offset as usize).min(bytes.len());
        &bytes[offset..]
    }
}

/// A single text replacement, described in both byte and row/column
/// coordinates.
///
/// Apply edits to a previously returned tree with
/// [`Tree::edit`](crate::Tree::edit) before handing the tree back for an
/// incremental reparse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEdit {
    /// Start of the replaced range.
    pub start_byte: u32,
    /// End of the replaced range in the old text.
    pub old_end_byte: u32,
    /// End of the replacement in the new text.
    pub new_end_byte: u32,
    /// Row/column of `start_byte`.
    pub start_point: Point,
    /// Row/column of `old_end_byte`.
    pub old_end_point: Point,
    /// Row/column of `new_end_byte`.
    pub new_end_point: Point,
}

impl InputEdit {
    /// An edit confined to a single row, described by byte offsets alone.
    #[must_use]
    pub fn single_row(row: u32, start: u32, old_end: u32, new_end: u32, row_start: u32) -> Self {
        Self {
            start_byte: start,
            old_end_byte: old_end,
            new_end_byte: new_end,
            start_point: Point::new(row, start - row_start),
            old_end_point: Point::new(row, old_end - row_start),
            new_end_point: Point::new(row, new_end - row_start),
        }
    }

    pub(crate) fn start(&self) -> Length {
        Length::new(self.start_byte, self.start_point)
    }

    pub(crate) fn old_end(&self) -> Length {
        Length::new(self.old_end_byte, self.old_end_point)
    }

    pub(crate) fn new_end(&self) -> Length {
        Length::new(self.new_end_byte, self.new_end_point)
    }
}
