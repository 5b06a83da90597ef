//! Shape utilities for 2-D matrices.

use std::fmt;

/// Matrix dimensions as `(rows, cols)`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shape {
    pub rows: usize,
    pub cols: usize,
}

impl Shape {
    /// Create a new shape.
    pub const fn new(rows: usize, cols: usize) -> Self {
        Shape { rows, cols }
    }

    /// The 1x1 shape.
    pub const fn scalar() -> Self {
        Shape { rows: 1, cols: 1 }
    }

    /// Total number of elements.
    pub fn numel(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_scalar(&self) -> bool {
        self.rows == 1 && self.cols == 1
    }

    /// Shape with rows and columns swapped.
    pub fn transposed(&self) -> Shape {
        Shape::new(self.cols, self.rows)
    }

    /// Row-major flat offset of `(i, j)`.
    pub fn offset(&self, i: usize, j: usize) -> usize {
        debug_assert!(i < self.rows && j < self.cols);
        i * self.cols + j
    }

    /// Check if two shapes are broadcast-compatible.
    /// Returns the broadcast result shape if compatible.
    pub fn broadcast_with(&self, other: &Shape) -> Option<Shape> {
        let rows = broadcast_dim(self.rows, other.rows)?;
        let cols = broadcast_dim(self.cols, other.cols)?;
        Some(Shape::new(rows, cols))
    }

    /// Whether `self` can be expanded to `target` without changing `target`.
    pub fn broadcasts_to(&self, target: &Shape) -> bool {
        self.broadcast_with(target) == Some(*target)
    }

    /// Axes (0 = rows, 1 = cols) that were expanded when going from `self`
    /// to `broadcast_shape`.
    pub fn reduction_axes_from(&self, broadcast_shape: &Shape) -> Vec<usize> {
        let mut axes = Vec::new();
        if self.rows == 1 && broadcast_shape.rows > 1 {
            axes.push(0);
        }
        if self.cols == 1 && broadcast_shape.cols > 1 {
            axes.push(1);
        }
        axes
    }
}

fn broadcast_dim(d1: usize, d2: usize) -> Option<usize> {
    if d1 == d2 {
        Some(d1)
    } else if d1 == 1 {
        Some(d2)
    } else if d2 == 1 {
        Some(d1)
    } else {
        None
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shape({}, {})", self.rows, self.cols)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}x{})", self.rows, self.cols)
    }
}

impl From<(usize, usize)> for Shape {
    fn from((rows, cols): (usize, usize)) -> Self {
        Shape::new(rows, cols)
    }
}
