//! Element-wise division.

use ad_matrix::Matrix;

use crate::error::{Error, Result};

pub(crate) const NAME: &str = "Div";

/// y = a / b, element by element. Both operands must have the same shape.
///
/// Division by zero is not guarded: the result is ±inf or NaN.
pub(crate) fn forward(a: &Matrix, b: &Matrix) -> Result<Matrix> {
    if a.shape() != b.shape() {
        return Err(Error::shape(NAME, a.shape(), b.shape()));
    }
    Ok(a.zip_map(b, |x, y| x / y))
}

/// d(a/b)/da = 1/b, d(a/b)/db = -a/b^2
pub(crate) fn backward(
    a: &Matrix,
    b: &Matrix,
    gy: &Matrix,
    needs: [bool; 2],
) -> [Option<Matrix>; 2] {
    let grad_a = needs[0].then(|| gy.zip_map(b, |g, y| g / y));
    let grad_b = needs[1].then(|| {
        let ga = gy.zip_map(a, |g, x| g * x);
        ga.zip_map(b, |gx, y| -gx / (y * y))
    });
    [grad_a, grad_b]
}
