//! Dense row-major matrix storage.

use crate::shape::Shape;

/// A dense 2-D matrix of `f64` values stored row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    data: Vec<f64>,
    shape: Shape,
}

impl Matrix {
    /// Create a new matrix from row-major data.
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Self {
        let shape = Shape::new(rows, cols);
        assert_eq!(
            data.len(),
            shape.numel(),
            "Data length {} doesn't match shape {:?} (numel={})",
            data.len(),
            shape,
            shape.numel()
        );
        Matrix { data, shape }
    }

    /// Create a matrix with the given shape from row-major data.
    pub fn from_shape(shape: Shape, data: Vec<f64>) -> Self {
        Self::new(shape.rows, shape.cols, data)
    }

    /// Create a matrix of zeros.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::full(rows, cols, 0.0)
    }

    /// Create a matrix of ones.
    pub fn ones(rows: usize, cols: usize) -> Self {
        Self::full(rows, cols, 1.0)
    }

    /// Create a matrix filled with a constant value.
    pub fn full(rows: usize, cols: usize, value: f64) -> Self {
        Self::new(rows, cols, vec![value; rows * cols])
    }

    /// Create a 1x1 matrix.
    pub fn scalar(value: f64) -> Self {
        Self::new(1, 1, vec![value])
    }

    /// Create a column vector (n x 1).
    pub fn column(data: Vec<f64>) -> Self {
        let n = data.len();
        Self::new(n, 1, data)
    }

    /// Create a matrix from a slice of equally sized rows.
    pub fn from_rows(rows: &[&[f64]]) -> Self {
        let cols = rows.first().map_or(0, |r| r.len());
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            assert_eq!(row.len(), cols, "Ragged rows: expected {} columns, got {}", cols, row.len());
            data.extend_from_slice(row);
        }
        Self::new(rows.len(), cols, data)
    }

    /// A matrix of zeros with the same shape as `self`.
    pub fn zeros_like(&self) -> Self {
        Self::zeros(self.shape.rows, self.shape.cols)
    }

    // === Accessors ===

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn rows(&self) -> usize {
        self.shape.rows
    }

    pub fn cols(&self) -> usize {
        self.shape.cols
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Element at `(i, j)`. Panics when out of bounds.
    pub fn at(&self, i: usize, j: usize) -> f64 {
        assert!(
            i < self.shape.rows && j < self.shape.cols,
            "Index ({}, {}) out of bounds for {}",
            i,
            j,
            self.shape
        );
        self.data[self.shape.offset(i, j)]
    }

    /// Set element at `(i, j)`. Panics when out of bounds.
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        assert!(
            i < self.shape.rows && j < self.shape.cols,
            "Index ({}, {}) out of bounds for {}",
            i,
            j,
            self.shape
        );
        let offset = self.shape.offset(i, j);
        self.data[offset] = value;
    }

    /// Row-major data.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_slice_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> + '_ {
        self.data.iter()
    }

    /// Value of a 1x1 matrix.
    pub fn item(&self) -> f64 {
        assert!(self.shape.is_scalar(), "Expected 1x1 matrix, got {}", self.shape);
        self.data[0]
    }

    /// Sum of all elements.
    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Largest absolute element-wise difference. Shapes must match.
    pub fn max_abs_diff(&self, other: &Matrix) -> f64 {
        assert_eq!(self.shape, other.shape);
        self.data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    }

    // === Element-wise ===

    /// Apply `f` to every element.
    pub fn map<F>(&self, f: F) -> Matrix
    where
        F: Fn(f64) -> f64,
    {
        Matrix {
            data: self.data.iter().map(|&v| f(v)).collect(),
            shape: self.shape,
        }
    }

    /// Combine two same-shaped matrices element by element.
    pub fn zip_map<F>(&self, other: &Matrix, f: F) -> Matrix
    where
        F: Fn(f64, f64) -> f64,
    {
        assert_eq!(
            self.shape, other.shape,
            "Shape mismatch in element-wise op: {} vs {}",
            self.shape, other.shape
        );
        Matrix {
            data: self
                .data
                .iter()
                .zip(other.data.iter())
                .map(|(&a, &b)| f(a, b))
                .collect(),
            shape: self.shape,
        }
    }

    /// Combine `self` with `other` broadcast to `self`'s shape.
    pub fn broadcast_zip_map<F>(&self, other: &Matrix, f: F) -> Matrix
    where
        F: Fn(f64, f64) -> f64,
    {
        if self.shape == other.shape {
            return self.zip_map(other, f);
        }
        let expanded = other.broadcast_to(self.shape);
        self.zip_map(&expanded, f)
    }

    /// Multiply every element by `factor`.
    pub fn scale(&self, factor: f64) -> Matrix {
        self.map(|v| v * factor)
    }

    /// In-place accumulation: `self += other`.
    pub fn accumulate(&mut self, other: &Matrix) {
        assert_eq!(self.shape, other.shape);
        for (d, s) in self.data.iter_mut().zip(other.data.iter()) {
            *d += s;
        }
    }

    // === Shape operations ===

    /// Expand rows/columns of size 1 to `shape`.
    pub fn broadcast_to(&self, shape: Shape) -> Matrix {
        if self.shape == shape {
            return self.clone();
        }
        assert!(
            self.shape.broadcasts_to(&shape),
            "Cannot broadcast {} to {}",
            self.shape,
            shape
        );

        let mut data = Vec::with_capacity(shape.numel());
        for i in 0..shape.rows {
            let src_i = if self.shape.rows == 1 { 0 } else { i };
            for j in 0..shape.cols {
                let src_j = if self.shape.cols == 1 { 0 } else { j };
                data.push(self.data[self.shape.offset(src_i, src_j)]);
            }
        }
        Matrix { data, shape }
    }

    /// Sum along broadcast axes to reduce back to `shape`.
    /// Inverse of [`Matrix::broadcast_to`] for gradients.
    pub fn sum_to(&self, shape: Shape) -> Matrix {
        if self.shape == shape {
            return self.clone();
        }
        assert!(
            shape.broadcasts_to(&self.shape),
            "Cannot reduce {} to {}",
            self.shape,
            shape
        );

        let axes = shape.reduction_axes_from(&self.shape);
        let (sum_rows, sum_cols) = (axes.contains(&0), axes.contains(&1));

        let mut out = Matrix::zeros(shape.rows, shape.cols);
        for i in 0..self.shape.rows {
            let dst_i = if sum_rows { 0 } else { i };
            for j in 0..self.shape.cols {
                let dst_j = if sum_cols { 0 } else { j };
                let dst = shape.offset(dst_i, dst_j);
                out.data[dst] += self.data[self.shape.offset(i, j)];
            }
        }
        out
    }

    pub fn transpose(&self) -> Matrix {
        let shape = self.shape.transposed();
        let mut data = vec![0.0; shape.numel()];
        for i in 0..self.shape.rows {
            for j in 0..self.shape.cols {
                data[shape.offset(j, i)] = self.data[self.shape.offset(i, j)];
            }
        }
        Matrix { data, shape }
    }

    /// Matrix product: (M, K) @ (K, N) -> (M, N)
    pub fn matmul(&self, other: &Matrix) -> Matrix {
        let (m, k) = (self.shape.rows, self.shape.cols);
        let (k2, n) = (other.shape.rows, other.shape.cols);
        assert_eq!(k, k2, "Matrix dimensions don't match for matmul");

        let mut data = vec![0.0; m * n];
        for i in 0..m {
            for l in 0..k {
                let a = self.data[i * k + l];
                for j in 0..n {
                    data[i * n + j] += a * other.data[l * n + j];
                }
            }
        }
        Matrix::new(m, n, data)
    }
}
