//! The closed set of differentiable operations.
//!
//! A [`Function`] names its inputs by [`NodeId`] and carries any auxiliary
//! state its backward pass needs (MaxPool's argmax). The graph hands it the
//! input values, so the variant itself never touches the arena.

use ad_matrix::Matrix;

use crate::error::{Error, Result};
use crate::node::NodeId;
use crate::ops::{self, Argmax, BinaryOp, UnaryOp, Window};

#[derive(Debug, Clone, PartialEq)]
pub enum Function {
    /// Broadcasting Add, Sub or Prod; `rhs` is expanded to `lhs`'s shape.
    Binary {
        op: BinaryOp,
        lhs: NodeId,
        rhs: NodeId,
    },
    /// Element-wise `lhs / rhs`, identical shapes.
    Div { lhs: NodeId, rhs: NodeId },
    Unary { op: UnaryOp, x: NodeId },
    MatMul { lhs: NodeId, rhs: NodeId },
    Transpose { x: NodeId },
    ReduceSum { x: NodeId },
    ReduceMean { x: NodeId },
    /// Non-overlapping `rows x cols` max pooling.
    MaxPool {
        x: NodeId,
        rows: usize,
        cols: usize,
        /// Recorded by the most recent forward; `None` until then.
        argmax: Option<Argmax>,
    },
    View { x: NodeId, window: Window },
}

impl Function {
    pub fn name(&self) -> &'static str {
        match self {
            Function::Binary { op, .. } => op.name(),
            Function::Div { .. } => ops::div::NAME,
            Function::Unary { op, .. } => op.name(),
            Function::MatMul { .. } => ops::linalg::MATMUL,
            Function::Transpose { .. } => ops::linalg::TRANSPOSE,
            Function::ReduceSum { .. } => ops::reduce::SUM,
            Function::ReduceMean { .. } => ops::reduce::MEAN,
            Function::MaxPool { .. } => ops::maxpool::NAME,
            Function::View { .. } => ops::view::NAME,
        }
    }

    /// Input node ids, in the order `forward` and `backward` expect values.
    pub fn inputs(&self) -> Vec<NodeId> {
        match *self {
            Function::Binary { lhs, rhs, .. }
            | Function::Div { lhs, rhs }
            | Function::MatMul { lhs, rhs } => vec![lhs, rhs],
            Function::Unary { x, .. }
            | Function::Transpose { x }
            | Function::ReduceSum { x }
            | Function::ReduceMean { x }
            | Function::MaxPool { x, .. }
            | Function::View { x, .. } => vec![x],
        }
    }

    /// MaxPool's recorded argmax coordinates, if this is a forwarded MaxPool.
    pub fn argmax(&self) -> Option<&[(usize, usize)]> {
        match self {
            Function::MaxPool { argmax, .. } => argmax.as_deref(),
            _ => None,
        }
    }

    /// Drop auxiliary state left by a previous forward.
    pub(crate) fn reset(&mut self) {
        if let Function::MaxPool { argmax, .. } = self {
            *argmax = None;
        }
    }

    /// Compute the output from input values, refreshing auxiliary state.
    pub(crate) fn forward(&mut self, inputs: &[&Matrix]) -> Result<Matrix> {
        match self {
            Function::Binary { op, .. } => ops::binary::forward(*op, inputs[0], inputs[1]),
            Function::Div { .. } => ops::div::forward(inputs[0], inputs[1]),
            Function::Unary { op, .. } => Ok(ops::unary::forward(*op, inputs[0])),
            Function::MatMul { .. } => ops::linalg::matmul(inputs[0], inputs[1]),
            Function::Transpose { .. } => Ok(inputs[0].transpose()),
            Function::ReduceSum { .. } => Ok(ops::reduce::sum(inputs[0])),
            Function::ReduceMean { .. } => Ok(ops::reduce::mean(inputs[0])),
            Function::MaxPool {
                rows, cols, argmax, ..
            } => {
                let (y, positions) = ops::maxpool::forward(inputs[0], *rows, *cols)?;
                *argmax = Some(positions);
                Ok(y)
            }
            Function::View { window, .. } => ops::view::forward(inputs[0], *window),
        }
    }

    /// Gradients with respect to each input, `None` where `needs` is false.
    ///
    /// `output` is the cached forward result and `gy` must have its shape.
    pub(crate) fn backward(
        &self,
        inputs: &[&Matrix],
        output: &Matrix,
        gy: &Matrix,
        needs: &[bool],
    ) -> Result<Vec<Option<Matrix>>> {
        let grads: Vec<Option<Matrix>> = match self {
            Function::Binary { op, .. } => {
                ops::binary::backward(*op, inputs[0], inputs[1], gy, [needs[0], needs[1]]).into()
            }
            Function::Div { .. } => {
                ops::div::backward(inputs[0], inputs[1], gy, [needs[0], needs[1]]).into()
            }
            Function::Unary { op, .. } => {
                vec![needs[0].then(|| ops::unary::backward(*op, inputs[0], output, gy))]
            }
            Function::MatMul { .. } => {
                ops::linalg::matmul_backward(inputs[0], inputs[1], gy, [needs[0], needs[1]])
                    .into()
            }
            Function::Transpose { .. } => vec![needs[0].then(|| gy.transpose())],
            Function::ReduceSum { .. } => {
                vec![needs[0].then(|| ops::reduce::sum_backward(inputs[0].shape(), gy))]
            }
            Function::ReduceMean { .. } => {
                vec![needs[0].then(|| ops::reduce::mean_backward(inputs[0].shape(), gy))]
            }
            Function::MaxPool { argmax, .. } => {
                let argmax = argmax.as_deref().ok_or(Error::Sequencing {
                    op: ops::maxpool::NAME,
                })?;
                vec![needs[0].then(|| ops::maxpool::backward(inputs[0].shape(), argmax, gy))]
            }
            Function::View { window, .. } => {
                vec![needs[0].then(|| ops::view::backward(inputs[0].shape(), *window, gy))]
            }
        };
        Ok(grads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inputs_order() {
        let f = Function::Div {
            lhs: NodeId(3),
            rhs: NodeId(1),
        };
        assert_eq!(f.inputs(), vec![NodeId(3), NodeId(1)]);
        assert_eq!(f.name(), "Div");

        let f = Function::Unary {
            op: UnaryOp::Scale(2.0),
            x: NodeId(0),
        };
        assert_eq!(f.inputs(), vec![NodeId(0)]);
        assert_eq!(f.name(), "Scale");
    }

    #[test]
    fn test_maxpool_backward_before_forward() {
        let f = Function::MaxPool {
            x: NodeId(0),
            rows: 1,
            cols: 1,
            argmax: None,
        };
        let x = Matrix::scalar(1.0);
        let err = f.backward(&[&x], &x, &x, &[true]).unwrap_err();
        assert_eq!(err, Error::Sequencing { op: "MaxPool" });
    }

    #[test]
    fn test_maxpool_forward_records_and_reset_clears() {
        let mut f = Function::MaxPool {
            x: NodeId(0),
            rows: 1,
            cols: 2,
            argmax: None,
        };
        let x = Matrix::from_rows(&[&[1.0, 3.0], &[4.0, 2.0]]);
        let y = f.forward(&[&x]).unwrap();
        assert_eq!(y.as_slice(), &[3.0, 4.0]);
        assert_eq!(f.argmax(), Some(&[(0, 1), (1, 0)][..]));

        f.reset();
        assert!(f.argmax().is_none());
    }
}
