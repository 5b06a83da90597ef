//! Sub-matrix view: copies the rectangle `[sx, sx+lx) x [sy, sy+ly)`.

use ad_matrix::{Matrix, Shape};

use crate::error::{Error, Result};

pub(crate) const NAME: &str = "View";

/// Origin and extent of a view rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub sx: usize,
    pub sy: usize,
    pub lx: usize,
    pub ly: usize,
}

impl Window {
    /// An empty extent is allowed and yields an empty matrix, as long as its
    /// origin is still inside `x`.
    pub(crate) fn check(&self, x: Shape) -> Result<()> {
        let fits = |start: usize, len: usize, bound: usize| {
            start.checked_add(len).is_some_and(|end| end <= bound)
        };
        if !fits(self.sx, self.lx, x.rows) || !fits(self.sy, self.ly, x.cols) {
            return Err(Error::shape(
                NAME,
                format!(
                    "bounds containing [{}, {}) x [{}, {})",
                    self.sx,
                    self.sx.saturating_add(self.lx),
                    self.sy,
                    self.sy.saturating_add(self.ly)
                ),
                x,
            ));
        }
        Ok(())
    }
}

pub(crate) fn forward(x: &Matrix, w: Window) -> Result<Matrix> {
    w.check(x.shape())?;
    let mut y = Matrix::zeros(w.lx, w.ly);
    for i in 0..w.lx {
        for j in 0..w.ly {
            y.set(i, j, x.at(i + w.sx, j + w.sy));
        }
    }
    Ok(y)
}

/// Zero everywhere except the viewed rectangle, which is set to `gy`.
pub(crate) fn backward(x: Shape, w: Window, gy: &Matrix) -> Matrix {
    let mut gx = Matrix::zeros(x.rows, x.cols);
    for i in 0..w.lx {
        for j in 0..w.ly {
            gx.set(i + w.sx, j + w.sy, gy.at(i, j));
        }
    }
    gx
}
