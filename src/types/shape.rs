//! Payload shape

use serde::{Deserialize, Serialize};
use std::fmt;

/// Dimensions of a frame payload.
///
/// `cols == 0` marks a one-dimensional payload of length `rows`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Shape {
    pub rows: u32,
    pub cols: u32,
}

impl Shape {
    pub const fn new(rows: u32, cols: u32) -> Self {
        Self { rows, cols }
    }

    /// One-dimensional shape of `len` values.
    pub const fn flat(len: u32) -> Self {
        Self { rows: len, cols: 0 }
    }

    pub const fn is_flat(&self) -> bool {
        self.cols == 0
    }

    /// Number of values, `rows * max(cols, 1)`, or `None` when it does not
    /// fit in `usize`.
    pub const fn checked_len(&self) -> Option<usize> {
        let cols = if self.cols == 0 { 1 } else { self.cols };
        (self.rows as usize).checked_mul(cols as usize)
    }

    /// Payload size in bytes as f32 values, or `None` when it does not fit
    /// in `usize`.
    pub const fn checked_byte_len(&self) -> Option<usize> {
        match self.checked_len() {
            Some(len) => len.checked_mul(4),
            None => None,
        }
    }

    /// Number of values, `rows * max(cols, 1)`. Saturates at `usize::MAX`.
    pub const fn len(&self) -> usize {
        match self.checked_len() {
            Some(len) => len,
            None => usize::MAX,
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Payload size in bytes as f32 values. Saturates at `usize::MAX`.
    pub const fn byte_len(&self) -> usize {
        match self.checked_byte_len() {
            Some(len) => len,
            None => usize::MAX,
        }
    }

    /// `[rows]` for flat shapes, `[rows, cols]` otherwise.
    pub fn dims(&self) -> Vec<u32> {
        if self.is_flat() { vec![self.rows] } else { vec![self.rows, self.cols] }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_flat() { write!(f, "[{}]", self.rows) } else { write!(f, "[{}, {}]", self.rows, self.cols) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn flat_shape_uses_rows_only() {
        let shape = Shape::flat(16);
        assert_eq!(shape.len(), 16);
        assert_eq!(shape.dims(), vec![16]);
        assert_eq!(shape.to_string(), "[16]");
    }

    #[test]
    fn two_dimensional_shape() {
        let shape = Shape::new(4, 3);
        assert_eq!(shape.len(), 12);
        assert_eq!(shape.byte_len(), 48);
        assert_eq!(shape.dims(), vec![4, 3]);
    }

    #[test]
    fn oversized_shapes_do_not_overflow() {
        let huge = Shape::new(u32::MAX, u32::MAX);
        assert_eq!(huge.checked_byte_len(), None);
        assert_eq!(huge.byte_len(), usize::MAX);
        assert_eq!(Shape::new(1 << 31, 1 << 31).checked_byte_len(), None);
        assert_eq!(Shape::flat(u32::MAX).checked_byte_len(), Some(u32::MAX as usize * 4));
    }

    proptest! {
        #[test]
        fn len_is_rows_times_cols_or_rows(rows in 0u32..4096, cols in 0u32..4096) {
            let shape = Shape::new(rows, cols);
            let expected = rows as usize * cols.max(1) as usize;
            prop_assert_eq!(shape.len(), expected);
            prop_assert_eq!(shape.byte_len(), expected * 4);
        }
    }
}
