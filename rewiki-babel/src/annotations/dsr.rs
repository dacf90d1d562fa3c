//! DOM source ranges
//!
//! A `dsr` hint maps an element back to the bytes of the source it was built
//! from: `[start, end, open_width, close_width]`, where the open and close
//! widths cover the element's own markup (`[[`, `'''`, `== `, ...).

use crate::codec::CodecValue;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomSourceRange {
    pub start: usize,
    pub end: usize,
    pub open_width: usize,
    pub close_width: usize,
}

impl DomSourceRange {
    /// Key under which the range is stored in the structural namespace.
    pub const KEY: &'static str = "dsr";

    pub fn new(start: usize, end: usize, open_width: usize, close_width: usize) -> Self {
        Self {
            start,
            end,
            open_width,
            close_width,
        }
    }

    /// Range without opening or closing markup.
    pub fn plain(start: usize, end: usize) -> Self {
        Self::new(start, end, 0, 0)
    }

    pub fn outer(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn inner(&self) -> Range<usize> {
        self.start + self.open_width..self.end - self.close_width
    }

    pub fn open(&self) -> Range<usize> {
        self.start..self.start + self.open_width
    }

    pub fn close(&self) -> Range<usize> {
        self.end - self.close_width..self.end
    }

    pub fn to_value(&self) -> CodecValue {
        CodecValue::List(
            [self.start, self.end, self.open_width, self.close_width]
                .into_iter()
                .map(|n| CodecValue::Int(n as i64))
                .collect(),
        )
    }

    /// Read a range back, rejecting anything that does not fit together.
    pub fn from_value(value: &CodecValue) -> Option<Self> {
        let items = value.as_list()?;
        if items.len() != 4 {
            return None;
        }
        let mut parts = [0usize; 4];
        for (slot, item) in parts.iter_mut().zip(items) {
            *slot = usize::try_from(item.as_i64()?).ok()?;
        }
        let [start, end, open_width, close_width] = parts;
        if start > end || open_width + close_width > end - start {
            return None;
        }
        Some(Self::new(start, end, open_width, close_width))
    }
}
