//! 2-D max pooling over non-overlapping windows.
//!
//! The forward pass records, for every pooled cell, the input coordinate that
//! produced the maximum. Backward routes each output gradient to exactly that
//! coordinate. Windows do not overlap, so no coordinate receives two values.

use ad_matrix::{Matrix, Shape};

use crate::error::{Error, Result};

pub(crate) const NAME: &str = "MaxPool";

/// Argmax coordinates, one per pooled cell in row-major order.
pub type Argmax = Vec<(usize, usize)>;

pub(crate) fn check(x: Shape, rows: usize, cols: usize) -> Result<()> {
    if rows == 0 || cols == 0 {
        return Err(Error::invalid(
            NAME,
            format!("pooling window {}x{} must be non-empty", rows, cols),
        ));
    }
    if x.rows % rows != 0 || x.cols % cols != 0 {
        return Err(Error::shape(
            NAME,
            format!("dimensions divisible by {}x{}", rows, cols),
            x,
        ));
    }
    Ok(())
}

pub(crate) fn forward(x: &Matrix, rows: usize, cols: usize) -> Result<(Matrix, Argmax)> {
    check(x.shape(), rows, cols)?;

    let out_rows = x.rows() / rows;
    let out_cols = x.cols() / cols;
    let mut y = Matrix::zeros(out_rows, out_cols);
    let mut argmax = Vec::with_capacity(out_rows * out_cols);

    for r in 0..out_rows {
        for c in 0..out_cols {
            let (top, left) = (r * rows, c * cols);
            // Strictly greater: ties keep the first coordinate in scan order.
            let mut best = (top, left);
            let mut max = x.at(top, left);
            for i in top..top + rows {
                for j in left..left + cols {
                    let v = x.at(i, j);
                    if v > max {
                        max = v;
                        best = (i, j);
                    }
                }
            }
            y.set(r, c, max);
            argmax.push(best);
        }
    }

    Ok((y, argmax))
}

pub(crate) fn backward(x: Shape, argmax: &[(usize, usize)], gy: &Matrix) -> Matrix {
    let mut gx = Matrix::zeros(x.rows, x.cols);
    for (&(i, j), &g) in argmax.iter().zip(gy.iter()) {
        gx.set(i, j, g);
    }
    gx
}
