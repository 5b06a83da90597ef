//! Broadcasting element-wise arithmetic: Add, Sub, Prod.
//!
//! The result takes the shape of the left operand. The right operand may be
//! the same shape, a 1x1 scalar, a row vector or a column vector; its gradient
//! is summed back down to its own shape.

use ad_matrix::Matrix;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Prod,
}

impl BinaryOp {
    pub fn name(&self) -> &'static str {
        match self {
            BinaryOp::Add => "Add",
            BinaryOp::Sub => "Sub",
            BinaryOp::Prod => "Prod",
        }
    }

    fn apply(&self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Prod => a * b,
        }
    }
}

pub(crate) fn forward(op: BinaryOp, a: &Matrix, b: &Matrix) -> Result<Matrix> {
    if !b.shape().broadcasts_to(&a.shape()) {
        return Err(Error::shape(
            op.name(),
            format!("{} or a broadcastable vector", a.shape()),
            b.shape(),
        ));
    }
    Ok(a.broadcast_zip_map(b, |x, y| op.apply(x, y)))
}

pub(crate) fn backward(
    op: BinaryOp,
    a: &Matrix,
    b: &Matrix,
    gy: &Matrix,
    needs: [bool; 2],
) -> [Option<Matrix>; 2] {
    match op {
        BinaryOp::Add => [
            needs[0].then(|| gy.clone()),
            needs[1].then(|| gy.sum_to(b.shape())),
        ],
        BinaryOp::Sub => [
            needs[0].then(|| gy.clone()),
            needs[1].then(|| gy.sum_to(b.shape()).map(|g| -g)),
        ],
        BinaryOp::Prod => [
            needs[0].then(|| gy.broadcast_zip_map(b, |g, y| g * y)),
            needs[1].then(|| gy.zip_map(a, |g, x| g * x).sum_to(b.shape())),
        ],
    }
}
