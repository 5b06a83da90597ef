//! Full reductions to a 1x1 matrix.

use ad_matrix::{Matrix, Shape};

pub(crate) const SUM: &str = "ReduceSum";
pub(crate) const MEAN: &str = "ReduceMean";

pub(crate) fn sum(x: &Matrix) -> Matrix {
    Matrix::scalar(x.sum())
}

pub(crate) fn mean(x: &Matrix) -> Matrix {
    Matrix::scalar(x.sum() / x.numel() as f64)
}

pub(crate) fn sum_backward(x: Shape, gy: &Matrix) -> Matrix {
    Matrix::full(x.rows, x.cols, gy.item())
}

pub(crate) fn mean_backward(x: Shape, gy: &Matrix) -> Matrix {
    Matrix::full(x.rows, x.cols, gy.item() / x.numel() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reductions() {
        let x = Matrix::from_rows(&[&[1.0, 2.0], &[3.0, 6.0]]);
        assert_eq!(sum(&x).item(), 12.0);
        assert_eq!(mean(&x).item(), 3.0);

        let g = Matrix::scalar(2.0);
        assert_eq!(sum_backward(x.shape(), &g), Matrix::full(2, 2, 2.0));
        assert_eq!(mean_backward(x.shape(), &g), Matrix::full(2, 2, 0.5));
    }
}
