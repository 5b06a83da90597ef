//! Matrix product and transpose.

use ad_matrix::Matrix;

use crate::error::{Error, Result};

pub(crate) const MATMUL: &str = "MatMul";
pub(crate) const TRANSPOSE: &str = "Transpose";

pub(crate) fn matmul(a: &Matrix, b: &Matrix) -> Result<Matrix> {
    if a.cols() != b.rows() {
        return Err(Error::shape(
            MATMUL,
            format!("{} rows in right operand", a.cols()),
            b.shape(),
        ));
    }
    Ok(a.matmul(b))
}

/// ga = gy·bᵀ, gb = aᵀ·gy
pub(crate) fn matmul_backward(
    a: &Matrix,
    b: &Matrix,
    gy: &Matrix,
    needs: [bool; 2],
) -> [Option<Matrix>; 2] {
    [
        needs[0].then(|| gy.matmul(&b.transpose())),
        needs[1].then(|| a.transpose().matmul(gy)),
    ]
}
