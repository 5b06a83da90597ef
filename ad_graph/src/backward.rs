//! Reverse-mode gradient propagation.
//!
//! A backward pass:
//! 1. Checks every seed and every function it will traverse (cached output,
//!    matching seed shape) before touching any gradient
//! 2. Collects the gradient-tracking nodes reachable from the seeds, which in
//!    arena order is already topological
//! 3. Walks them in reverse, handing each function the sum of every
//!    contribution it received and accumulating its input gradients
//! 4. Adds the pass's gradients into the graph's [`GradStore`]

use std::collections::HashSet;

use ad_matrix::Matrix;
use tracing::{debug, debug_span, warn};

use crate::error::{Error, Result};
use crate::grad::GradStore;
use crate::graph::Graph;
use crate::node::NodeId;

impl Graph {
    /// Backpropagate from `output`, seeding it with ones.
    ///
    /// For a 1x1 output this computes d(output)/d(variable) for every
    /// gradient-tracking variable it depends on.
    pub fn backward(&mut self, output: NodeId) -> Result<()> {
        let node = self.node(output)?;
        let value = node.value.as_ref().ok_or(Error::Sequencing {
            op: node.op_name(),
        })?;
        let seed = Matrix::ones(value.rows(), value.cols());
        self.backward_many(&[(output, seed)])
    }

    /// Backpropagate from `output` with an explicit seed gradient.
    pub fn backward_with(&mut self, output: NodeId, seed: Matrix) -> Result<()> {
        self.backward_many(&[(output, seed)])
    }

    /// Backpropagate from several outputs in a single pass.
    ///
    /// Seeds on the same node add up. Gradients from this pass are added to
    /// whatever the graph already holds.
    pub fn backward_many(&mut self, seeds: &[(NodeId, Matrix)]) -> Result<()> {
        let _span = debug_span!("backward", seeds = seeds.len()).entered();

        for (id, seed) in seeds {
            let node = self.node(*id)?;
            let value = node.value.as_ref().ok_or(Error::Sequencing {
                op: node.op_name(),
            })?;
            if value.shape() != seed.shape() {
                return Err(Error::shape(node.op_name(), value.shape(), seed.shape()));
            }
            if !node.requires_grad {
                warn!(node = %id, op = node.op_name(), "seed targets an operand that does not require gradients");
            }
        }

        let order = self.reachable(seeds.iter().map(|(id, _)| *id));
        for &id in &order {
            let node = &self.nodes[id.0];
            if node.value.is_none() {
                return Err(Error::Sequencing {
                    op: node.op_name(),
                });
            }
        }

        let mut pass = GradStore::with_slots(self.nodes.len());
        for (id, seed) in seeds {
            if self.nodes[id.0].requires_grad {
                pass.accumulate(*id, seed)?;
            }
        }

        // Every consumer of a node has a larger id, so by the time the reverse
        // walk reaches a node its gradient is complete.
        for &id in order.iter().rev() {
            let Some(gy) = pass.get(id).cloned() else {
                continue;
            };
            for (input, grad) in self.input_grads(id, &gy)? {
                pass.accumulate(input, &grad)?;
            }
        }

        // Check every slot first so a mismatch leaves the store untouched.
        for (id, grad) in pass.iter() {
            if let Some(existing) = self.grads.get(id) {
                if existing.shape() != grad.shape() {
                    return Err(Error::shape("accumulate", existing.shape(), grad.shape()));
                }
            }
        }
        for (id, grad) in pass.iter() {
            self.grads.accumulate(id, grad)?;
        }
        debug!(nodes = order.len(), "backward complete");
        Ok(())
    }

    /// Run one function's backward with output gradient `gy` and propagate
    /// the result to its direct inputs only.
    pub fn backward_function(&mut self, id: NodeId, gy: &Matrix) -> Result<()> {
        let node = self.node(id)?;
        let Some(function) = node.as_function() else {
            return Err(Error::invalid(
                "backward_function",
                format!("node {} is a variable", id),
            ));
        };
        let value = node.value.as_ref().ok_or(Error::Sequencing {
            op: function.name(),
        })?;
        if value.shape() != gy.shape() {
            return Err(Error::shape(function.name(), value.shape(), gy.shape()));
        }

        for (input, grad) in self.input_grads(id, gy)? {
            self.propagate_grad(input, &grad)?;
        }
        Ok(())
    }

    /// Gradients a function sends to each of its gradient-tracking inputs.
    ///
    /// An input used twice appears twice.
    fn input_grads(&self, id: NodeId, gy: &Matrix) -> Result<Vec<(NodeId, Matrix)>> {
        let node = &self.nodes[id.0];
        let Some(function) = node.as_function() else {
            return Ok(Vec::new());
        };
        let output = node.value.as_ref().ok_or(Error::Sequencing {
            op: function.name(),
        })?;

        let inputs = function.inputs();
        let values = inputs
            .iter()
            .map(|input| {
                let n = &self.nodes[input.0];
                n.value.as_ref().ok_or(Error::Sequencing { op: n.op_name() })
            })
            .collect::<Result<Vec<_>>>()?;
        let needs: Vec<bool> = inputs
            .iter()
            .map(|input| self.nodes[input.0].requires_grad)
            .collect();

        let grads = function.backward(&values, output, gy, &needs)?;
        debug!(node = %id, op = function.name(), "backward");

        Ok(inputs
            .into_iter()
            .zip(grads)
            .filter_map(|(input, grad)| grad.map(|g| (input, g)))
            .collect())
    }

    /// Gradient-tracking nodes reachable from `roots` through their inputs,
    /// in ascending (topological) order.
    fn reachable(&self, roots: impl IntoIterator<Item = NodeId>) -> Vec<NodeId> {
        let mut visited = HashSet::new();
        let mut stack: Vec<NodeId> = roots.into_iter().collect();
        let mut order = Vec::new();

        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.0];
            // A node that does not track gradients has no tracking ancestors.
            if !node.requires_grad || !visited.insert(id) {
                continue;
            }
            order.push(id);
            if let Some(function) = node.as_function() {
                stack.extend(function.inputs());
            }
        }

        order.sort_unstable();
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn assert_close(actual: &Matrix, expected: &[f64]) {
        assert_eq!(actual.numel(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert_abs_diff_eq!(*a, *e, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_div_through_graph() {
        let mut g = Graph::new();
        let x1 = g.variable(Matrix::column(vec![0.1, 0.2, 0.3, 0.0]), true);
        let x2 = g.variable(Matrix::column(vec![0.4, 0.3, 0.5, 0.7]), true);
        let y = g.div(x1, x2).unwrap();

        assert_close(g.forward_node(y).unwrap(), &[0.25, 0.6666667, 0.6, 0.0]);

        g.backward_with(y, Matrix::column(vec![-1.0, 0.5, 0.8, 0.0]))
            .unwrap();
        assert_close(g.grad(x1).unwrap(), &[-2.5, 1.6666667, 1.6, 0.0]);
        assert_close(g.grad(x2).unwrap(), &[0.625, -1.1111111, -0.96, 0.0]);
    }

    #[test]
    fn test_backward_before_forward() {
        let mut g = Graph::new();
        let x = g.variable(Matrix::zeros(2, 2), true);
        let y = g.max_pool(x, 2, 2).unwrap();

        let err = g.backward(y).unwrap_err();
        assert_eq!(err, Error::Sequencing { op: "MaxPool" });
        assert!(g.grads().is_empty());
    }

    #[test]
    fn test_seed_shape_mismatch() {
        let mut g = Graph::new();
        let x = g.variable(Matrix::zeros(2, 2), true);
        let y = g.neg(x).unwrap();
        g.forward_node(y).unwrap();

        let err = g.backward_with(y, Matrix::zeros(2, 1)).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { op: "Neg", .. }));
        assert!(g.grad(x).is_none());
    }

    #[test]
    fn test_constant_never_gets_gradient() {
        let mut g = Graph::new();
        let c = g.constant(Matrix::column(vec![2.0, 4.0]));
        let x = g.variable(Matrix::column(vec![1.0, 1.0]), true);
        let y = g.div(x, c).unwrap();
        g.forward_node(y).unwrap();

        g.backward(y).unwrap();
        g.backward(y).unwrap();
        assert!(g.grad(c).is_none());
        assert_close(g.grad(x).unwrap(), &[1.0, 0.5]);
    }

    #[test]
    fn test_repeated_passes_add_without_double_counting() {
        let mut g = Graph::new();
        let x = g.variable(Matrix::scalar(3.0), true);
        let h = g.scale(x, 2.0).unwrap();
        let y = g.scale(h, 5.0).unwrap();
        g.forward_node(y).unwrap();

        g.backward(y).unwrap();
        assert_eq!(g.grad(x).unwrap().item(), 10.0);
        g.backward(y).unwrap();
        assert_eq!(g.grad(x).unwrap().item(), 20.0);
        assert_eq!(g.grad(h).unwrap().item(), 10.0);

        g.zero_grad();
        g.backward(y).unwrap();
        assert_eq!(g.grad(x).unwrap().item(), 10.0);
    }

    #[test]
    fn test_existing_gradient_buffer_is_added_to() {
        let mut g = Graph::new();
        let x = g
            .variable_with_grad(Matrix::scalar(2.0), Matrix::scalar(0.5))
            .unwrap();
        let y = g.prod(x, x).unwrap();
        g.forward_node(y).unwrap();

        g.backward(y).unwrap();
        assert_eq!(g.grad(x).unwrap().item(), 4.5);
    }

    #[test]
    fn test_backward_function_reaches_direct_inputs_only() {
        let mut g = Graph::new();
        let x = g.variable(Matrix::scalar(2.0), true);
        let h = g.exp(x).unwrap();
        let y = g.scale(h, 3.0).unwrap();
        g.forward_node(y).unwrap();

        g.backward_function(y, &Matrix::scalar(1.0)).unwrap();
        assert_eq!(g.grad(h).unwrap().item(), 3.0);
        assert!(g.grad(x).is_none());
    }

    #[test]
    fn test_merge_mismatch_writes_nothing() {
        let mut g = Graph::new();
        let a = g.variable(Matrix::zeros(2, 2), true);
        let b = g.variable(Matrix::zeros(2, 2), true);
        let y = g.add(a, b).unwrap();
        g.forward_node(y).unwrap();

        // A stored gradient that disagrees with its operand's shape.
        let mut stored = GradStore::with_slots(g.len());
        stored.accumulate(b, &Matrix::ones(3, 3)).unwrap();
        g.grads = stored;

        let err = g.backward(y).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { op: "accumulate", .. }));
        assert!(g.grad(a).is_none());
        assert!(g.grad(y).is_none());
        assert_eq!(g.grad(b).unwrap().shape(), ad_matrix::Shape::new(3, 3));
    }

    #[test]
    fn test_backward_function_rejects_variable() {
        let mut g = Graph::new();
        let x = g.variable(Matrix::scalar(2.0), true);
        let err = g.backward_function(x, &Matrix::scalar(1.0)).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }
}
