//! Element-wise unary functions.

use ad_matrix::Matrix;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    Neg,
    Exp,
    Log,
    Sqrt,
    Tanh,
    Sigmoid,
    Relu,
    /// Multiplication by a constant factor.
    Scale(f64),
}

impl UnaryOp {
    pub fn name(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "Neg",
            UnaryOp::Exp => "Exp",
            UnaryOp::Log => "Log",
            UnaryOp::Sqrt => "Sqrt",
            UnaryOp::Tanh => "Tanh",
            UnaryOp::Sigmoid => "Sigmoid",
            UnaryOp::Relu => "Relu",
            UnaryOp::Scale(_) => "Scale",
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

pub(crate) fn forward(op: UnaryOp, x: &Matrix) -> Matrix {
    match op {
        UnaryOp::Neg => x.map(|v| -v),
        UnaryOp::Exp => x.map(f64::exp),
        UnaryOp::Log => x.map(f64::ln),
        UnaryOp::Sqrt => x.map(f64::sqrt),
        UnaryOp::Tanh => x.map(f64::tanh),
        UnaryOp::Sigmoid => x.map(sigmoid),
        UnaryOp::Relu => x.map(|v| v.max(0.0)),
        UnaryOp::Scale(c) => x.scale(c),
    }
}

/// Local gradient times `gy`. Functions whose derivative is cheapest in terms
/// of the output (exp, sqrt, tanh, sigmoid) read `y` instead of recomputing.
pub(crate) fn backward(op: UnaryOp, x: &Matrix, y: &Matrix, gy: &Matrix) -> Matrix {
    match op {
        UnaryOp::Neg => gy.map(|g| -g),
        UnaryOp::Exp => gy.zip_map(y, |g, e| g * e),
        UnaryOp::Log => gy.zip_map(x, |g, v| g / v),
        UnaryOp::Sqrt => gy.zip_map(y, |g, s| g / (2.0 * s)),
        UnaryOp::Tanh => gy.zip_map(y, |g, t| g * (1.0 - t * t)),
        UnaryOp::Sigmoid => gy.zip_map(y, |g, s| g * s * (1.0 - s)),
        UnaryOp::Relu => gy.zip_map(x, |g, v| if v > 0.0 { g } else { 0.0 }),
        UnaryOp::Scale(c) => gy.scale(c),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn check_against_fd(op: UnaryOp, points: &[f64]) {
        let eps = 1e-6;
        let x = Matrix::column(points.to_vec());
        let y = forward(op, &x);
        let gx = backward(op, &x, &y, &Matrix::ones(x.rows(), 1));
        for (i, &p) in points.iter().enumerate() {
            let plus = forward(op, &Matrix::scalar(p + eps)).item();
            let minus = forward(op, &Matrix::scalar(p - eps)).item();
            let fd = (plus - minus) / (2.0 * eps);
            assert_abs_diff_eq!(gx.at(i, 0), fd, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_unary_gradients() {
        let smooth = [-1.3, -0.2, 0.4, 2.0];
        let positive = [0.3, 1.0, 2.5];
        check_against_fd(UnaryOp::Neg, &smooth);
        check_against_fd(UnaryOp::Exp, &smooth);
        check_against_fd(UnaryOp::Tanh, &smooth);
        check_against_fd(UnaryOp::Sigmoid, &smooth);
        check_against_fd(UnaryOp::Scale(-2.5), &smooth);
        check_against_fd(UnaryOp::Relu, &smooth);
        check_against_fd(UnaryOp::Log, &positive);
        check_against_fd(UnaryOp::Sqrt, &positive);
    }

    #[test]
    fn test_relu_forward() {
        let x = Matrix::column(vec![-1.0, 0.0, 2.0]);
        assert_eq!(forward(UnaryOp::Relu, &x).as_slice(), &[0.0, 0.0, 2.0]);
    }

    #[test]
    fn test_sqrt_at_zero_is_infinite() {
        let x = Matrix::scalar(0.0);
        let y = forward(UnaryOp::Sqrt, &x);
        let g = backward(UnaryOp::Sqrt, &x, &y, &Matrix::scalar(1.0));
        assert_eq!(g.item(), f64::INFINITY);
    }
}
