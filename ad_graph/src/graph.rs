//! Graph construction and forward evaluation.

use std::collections::HashSet;

use ad_matrix::{Matrix, Shape};
use tracing::{debug, debug_span};

use crate::config::{GraphConfig, Mode};
use crate::error::{Error, Result};
use crate::function::Function;
use crate::grad::GradStore;
use crate::node::{Node, NodeId, NodeKind};
use crate::ops::{BinaryOp, UnaryOp, Window};

/// An arena-backed computation graph.
///
/// Variables and functions are appended with the builder methods and addressed
/// by the returned [`NodeId`]. Function outputs are computed lazily by
/// [`Graph::forward_node`] (or immediately, in eager mode) and cached until an
/// upstream variable changes. Gradients live in the graph's [`GradStore`].
///
/// ```
/// use ad_graph::Graph;
/// use ad_matrix::Matrix;
///
/// let mut g = Graph::new();
/// let a = g.variable(Matrix::column(vec![1.0, 4.0]), true);
/// let b = g.variable(Matrix::column(vec![2.0, 8.0]), true);
/// let y = g.div(a, b).unwrap();
///
/// assert_eq!(g.forward_node(y).unwrap().as_slice(), &[0.5, 0.5]);
/// g.backward(y).unwrap();
/// assert_eq!(g.grad(a).unwrap().as_slice(), &[0.5, 0.125]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub(crate) nodes: Vec<Node>,
    pub(crate) grads: GradStore,
    config: GraphConfig,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: GraphConfig) -> Self {
        Graph {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn mode(&self) -> Mode {
        self.config.mode
    }

    /// Switch between training and inference. Layers read this; the engine
    /// itself behaves the same in both modes.
    pub fn set_mode(&mut self, mode: Mode) {
        debug!(?mode, "graph mode changed");
        self.config.mode = mode;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // === Leaves ===

    pub fn variable(&mut self, value: Matrix, requires_grad: bool) -> NodeId {
        self.push_variable(None, value, requires_grad, None)
    }

    /// A variable that can later be found with [`Graph::variable_named`].
    pub fn named_variable(
        &mut self,
        name: impl Into<String>,
        value: Matrix,
        requires_grad: bool,
    ) -> NodeId {
        self.push_variable(Some(name.into()), value, requires_grad, None)
    }

    /// A gradient-tracking variable with a pre-existing gradient buffer.
    ///
    /// The buffer is kept and added to by later backward passes until
    /// [`Graph::zero_grad`] or [`Graph::set_value`] resets it.
    pub fn variable_with_grad(&mut self, value: Matrix, grad: Matrix) -> Result<NodeId> {
        if value.shape() != grad.shape() {
            return Err(Error::shape("variable_with_grad", value.shape(), grad.shape()));
        }
        Ok(self.push_variable(None, value, true, Some(grad)))
    }

    /// A variable that never requires gradients.
    pub fn constant(&mut self, value: Matrix) -> NodeId {
        self.push_variable(None, value, false, None)
    }

    fn push_variable(
        &mut self,
        name: Option<String>,
        value: Matrix,
        requires_grad: bool,
        grad: Option<Matrix>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::variable(name, value, requires_grad));
        self.grads.push_slot(grad);
        id
    }

    // === Operations ===

    /// `a + b`, with `b` broadcast to `a`'s shape.
    pub fn add(&mut self, a: NodeId, b: NodeId) -> Result<NodeId> {
        self.binary(BinaryOp::Add, a, b)
    }

    /// `a - b`, with `b` broadcast to `a`'s shape.
    pub fn sub(&mut self, a: NodeId, b: NodeId) -> Result<NodeId> {
        self.binary(BinaryOp::Sub, a, b)
    }

    /// Element-wise `a * b`, with `b` broadcast to `a`'s shape.
    pub fn prod(&mut self, a: NodeId, b: NodeId) -> Result<NodeId> {
        self.binary(BinaryOp::Prod, a, b)
    }

    /// Element-wise `a / b`. Shapes must be identical.
    pub fn div(&mut self, a: NodeId, b: NodeId) -> Result<NodeId> {
        self.push_function(Function::Div { lhs: a, rhs: b })
    }

    pub fn scale(&mut self, x: NodeId, factor: f64) -> Result<NodeId> {
        self.unary(UnaryOp::Scale(factor), x)
    }

    pub fn neg(&mut self, x: NodeId) -> Result<NodeId> {
        self.unary(UnaryOp::Neg, x)
    }

    pub fn exp(&mut self, x: NodeId) -> Result<NodeId> {
        self.unary(UnaryOp::Exp, x)
    }

    pub fn log(&mut self, x: NodeId) -> Result<NodeId> {
        self.unary(UnaryOp::Log, x)
    }

    pub fn sqrt(&mut self, x: NodeId) -> Result<NodeId> {
        self.unary(UnaryOp::Sqrt, x)
    }

    pub fn tanh(&mut self, x: NodeId) -> Result<NodeId> {
        self.unary(UnaryOp::Tanh, x)
    }

    pub fn sigmoid(&mut self, x: NodeId) -> Result<NodeId> {
        self.unary(UnaryOp::Sigmoid, x)
    }

    pub fn relu(&mut self, x: NodeId) -> Result<NodeId> {
        self.unary(UnaryOp::Relu, x)
    }

    /// Matrix product `(m, k) @ (k, n)`.
    pub fn matmul(&mut self, a: NodeId, b: NodeId) -> Result<NodeId> {
        self.push_function(Function::MatMul { lhs: a, rhs: b })
    }

    pub fn transpose(&mut self, x: NodeId) -> Result<NodeId> {
        self.push_function(Function::Transpose { x })
    }

    /// Sum of all elements, as a 1x1 matrix.
    pub fn reduce_sum(&mut self, x: NodeId) -> Result<NodeId> {
        self.push_function(Function::ReduceSum { x })
    }

    /// Mean of all elements, as a 1x1 matrix.
    pub fn reduce_mean(&mut self, x: NodeId) -> Result<NodeId> {
        self.push_function(Function::ReduceMean { x })
    }

    /// Max pooling over non-overlapping `rows x cols` windows.
    ///
    /// `x`'s dimensions must be multiples of the window's.
    pub fn max_pool(&mut self, x: NodeId, rows: usize, cols: usize) -> Result<NodeId> {
        self.push_function(Function::MaxPool {
            x,
            rows,
            cols,
            argmax: None,
        })
    }

    /// The `lx x ly` sub-matrix of `x` whose top-left corner is `(sx, sy)`.
    pub fn view(
        &mut self,
        x: NodeId,
        sx: usize,
        sy: usize,
        lx: usize,
        ly: usize,
    ) -> Result<NodeId> {
        let window = Window { sx, sy, lx, ly };
        self.push_function(Function::View { x, window })
    }

    fn binary(&mut self, op: BinaryOp, lhs: NodeId, rhs: NodeId) -> Result<NodeId> {
        self.push_function(Function::Binary { op, lhs, rhs })
    }

    fn unary(&mut self, op: UnaryOp, x: NodeId) -> Result<NodeId> {
        self.push_function(Function::Unary { op, x })
    }

    fn push_function(&mut self, function: Function) -> Result<NodeId> {
        let mut requires_grad = false;
        for input in function.inputs() {
            requires_grad |= self.node(input)?.requires_grad;
        }

        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::function(function, requires_grad));
        self.grads.push_slot(None);

        if self.config.eager {
            if let Err(err) = self.forward_node(id).map(|_| ()) {
                self.nodes.pop();
                self.grads.pop_slot();
                return Err(err);
            }
        }
        Ok(id)
    }

    // === Operand queries ===

    pub(crate) fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id.0).ok_or(Error::UnknownNode(id))
    }

    /// Cached value: always present for variables, present for functions
    /// once forwarded.
    pub fn value(&self, id: NodeId) -> Option<&Matrix> {
        self.nodes.get(id.0).and_then(|n| n.value.as_ref())
    }

    /// Accumulated gradient, absent until a contribution arrives.
    pub fn grad(&self, id: NodeId) -> Option<&Matrix> {
        self.grads.get(id)
    }

    pub fn grads(&self) -> &GradStore {
        &self.grads
    }

    pub fn requires_grad(&self, id: NodeId) -> Result<bool> {
        Ok(self.node(id)?.requires_grad)
    }

    /// Shape of the cached value.
    pub fn shape(&self, id: NodeId) -> Option<Shape> {
        self.value(id).map(Matrix::shape)
    }

    /// The operation behind a function node, `None` for variables.
    pub fn function(&self, id: NodeId) -> Option<&Function> {
        self.nodes.get(id.0).and_then(Node::as_function)
    }

    /// First variable created with `name`.
    pub fn variable_named(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| matches!(&n.kind, NodeKind::Variable(v) if v.name.as_deref() == Some(name)))
            .map(NodeId)
    }

    /// Add `grad` into the gradient of `id`. A no-op for operands that do
    /// not require gradients.
    ///
    /// The operand must have a value, and `grad` must match its shape.
    pub fn propagate_grad(&mut self, id: NodeId, grad: &Matrix) -> Result<()> {
        let node = self.node(id)?;
        if !node.requires_grad {
            return Ok(());
        }
        let value = node.value.as_ref().ok_or(Error::Sequencing {
            op: node.op_name(),
        })?;
        if value.shape() != grad.shape() {
            return Err(Error::shape("propagate_grad", value.shape(), grad.shape()));
        }
        self.grads.accumulate(id, grad)
    }

    // === Forward ===

    /// Evaluate the uncached dependencies of `id` in topological order and
    /// return its output.
    pub fn forward_node(&mut self, id: NodeId) -> Result<&Matrix> {
        let node = self.node(id)?;
        let op = node.op_name();

        let pending = self.pending(id);
        let _span = debug_span!("forward", output = %id, pending = pending.len()).entered();
        for node in pending {
            self.evaluate(node)?;
        }
        self.nodes[id.0].value.as_ref().ok_or(Error::Sequencing { op })
    }

    /// Evaluate every uncached function in the graph.
    pub fn forward(&mut self) -> Result<()> {
        let _span = debug_span!("forward_all", nodes = self.nodes.len()).entered();
        for i in 0..self.nodes.len() {
            if self.nodes[i].value.is_none() {
                self.evaluate(NodeId(i))?;
            }
        }
        Ok(())
    }

    /// Uncached function nodes `root` depends on, ascending.
    ///
    /// A cached node's inputs are always cached too, so the walk stops there.
    fn pending(&self, root: NodeId) -> Vec<NodeId> {
        let mut visited = HashSet::new();
        let mut stack = vec![root];
        let mut order = Vec::new();

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let node = &self.nodes[id.0];
            if node.value.is_some() {
                continue;
            }
            if let Some(function) = node.as_function() {
                order.push(id);
                stack.extend(function.inputs());
            }
        }

        order.sort_unstable();
        order
    }

    fn evaluate(&mut self, id: NodeId) -> Result<()> {
        let (before, rest) = self.nodes.split_at_mut(id.0);
        let node = &mut rest[0];
        let NodeKind::Function(function) = &mut node.kind else {
            return Ok(());
        };

        let inputs = function
            .inputs()
            .iter()
            .map(|input| {
                let n = &before[input.0];
                n.value.as_ref().ok_or(Error::Sequencing { op: n.op_name() })
            })
            .collect::<Result<Vec<_>>>()?;

        let output = function.forward(&inputs)?;
        debug!(node = %id, op = function.name(), shape = %output.shape(), "forward");
        node.value = Some(output);
        Ok(())
    }

    // === Lifecycle ===

    /// Replace a variable's value.
    ///
    /// Every function downstream of `id` loses its cached output and auxiliary
    /// state, and all gradients are reset. In eager mode the graph is
    /// re-forwarded immediately.
    pub fn set_value(&mut self, id: NodeId, value: Matrix) -> Result<()> {
        let node = self.nodes.get_mut(id.0).ok_or(Error::UnknownNode(id))?;
        if !node.is_variable() {
            return Err(Error::NotAVariable(id));
        }
        node.value = Some(value);

        // Dependents always have larger ids, so one ascending sweep finds them.
        let mut dirty = vec![false; self.nodes.len()];
        dirty[id.0] = true;
        let mut invalidated = 0;
        for i in id.0 + 1..self.nodes.len() {
            let depends = self.nodes[i]
                .as_function()
                .is_some_and(|f| f.inputs().iter().any(|input| dirty[input.0]));
            if depends {
                dirty[i] = true;
                self.nodes[i].invalidate();
                invalidated += 1;
            }
        }
        debug!(node = %id, invalidated, "variable updated");

        self.grads.clear();
        if self.config.eager {
            self.forward()?;
        }
        Ok(())
    }

    /// Reset every gradient to absent.
    pub fn zero_grad(&mut self) {
        self.grads.clear();
    }

    /// Remove every node. Ids handed out earlier become unknown.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.grads.truncate(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_grad_propagates() {
        let mut g = Graph::new();
        let c = g.constant(Matrix::scalar(2.0));
        let v = g.variable(Matrix::scalar(3.0), true);

        let cc = g.scale(c, 2.0).unwrap();
        let cv = g.prod(c, v).unwrap();

        assert!(!g.requires_grad(cc).unwrap());
        assert!(g.requires_grad(cv).unwrap());
    }

    #[test]
    fn test_lazy_forward_is_memoized() {
        let mut g = Graph::new();
        let x = g.variable(Matrix::column(vec![1.0, 2.0]), false);
        let y = g.exp(x).unwrap();
        let z = g.reduce_sum(y).unwrap();

        assert!(g.value(y).is_none());
        let total = g.forward_node(z).unwrap().item();
        assert!((total - (1.0_f64.exp() + 2.0_f64.exp())).abs() < 1e-12);
        assert!(g.value(y).is_some());
        assert_eq!(g.shape(z), Some(Shape::scalar()));
    }

    #[test]
    fn test_cached_output_is_reused() {
        let mut g = Graph::new();
        let x = g.variable(Matrix::from_rows(&[&[1.0, 5.0], &[2.0, 3.0]]), true);
        let p = g.max_pool(x, 2, 2).unwrap();
        let first: *const Matrix = g.forward_node(p).unwrap();

        // Bypass set_value: nothing is invalidated, so nothing is recomputed.
        g.nodes[x.0].value = Some(Matrix::from_rows(&[&[9.0, 0.0], &[0.0, 0.0]]));
        let second: *const Matrix = g.forward_node(p).unwrap();

        assert!(std::ptr::eq(first, second));
        assert_eq!(g.value(p).unwrap().item(), 5.0);
        assert_eq!(g.function(p).unwrap().argmax(), Some(&[(0, 1)][..]));
    }

    #[test]
    fn test_forward_node_only_evaluates_dependencies() {
        let mut g = Graph::new();
        let x = g.variable(Matrix::scalar(1.0), false);
        let a = g.neg(x).unwrap();
        let b = g.exp(x).unwrap();

        g.forward_node(a).unwrap();
        assert!(g.value(a).is_some());
        assert!(g.value(b).is_none());

        g.forward().unwrap();
        assert!(g.value(b).is_some());
    }

    #[test]
    fn test_unknown_input() {
        let mut other = Graph::new();
        other.variable(Matrix::scalar(1.0), true);
        let foreign = other.variable(Matrix::scalar(1.0), true);

        let mut g = Graph::new();
        let x = g.variable(Matrix::scalar(1.0), true);
        assert_eq!(g.add(x, foreign).unwrap_err(), Error::UnknownNode(foreign));
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn test_lazy_shape_error_surfaces_at_forward() {
        let mut g = Graph::new();
        let a = g.variable(Matrix::zeros(2, 2), true);
        let b = g.variable(Matrix::zeros(3, 2), true);
        let y = g.div(a, b).unwrap();

        let err = g.forward_node(y).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { op: "Div", .. }));
        assert!(g.value(y).is_none());
    }

    #[test]
    fn test_eager_shape_error_surfaces_at_construction() {
        let mut g = Graph::with_config(GraphConfig::default().with_eager(true));
        let x = g.variable(Matrix::zeros(4, 3), true);

        let err = g.max_pool(x, 2, 2).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { op: "MaxPool", .. }));
        assert_eq!(g.len(), 1);

        let y = g.max_pool(x, 2, 3).unwrap();
        assert_eq!(g.shape(y), Some(Shape::new(2, 1)));
    }

    #[test]
    fn test_view_builder() {
        let mut g = Graph::new();
        let x = g.variable(Matrix::zeros(3, 3), true);
        let v = g.view(x, 1, 0, 2, 3).unwrap();
        assert_eq!(
            g.function(v),
            Some(&Function::View {
                x,
                window: Window {
                    sx: 1,
                    sy: 0,
                    lx: 2,
                    ly: 3
                }
            })
        );
        assert!(g.function(x).is_none());
    }

    #[test]
    fn test_set_value_invalidates_downstream() {
        let mut g = Graph::new();
        let x = g.variable(Matrix::from_rows(&[&[1.0, 5.0], &[2.0, 3.0]]), true);
        let c = g.constant(Matrix::scalar(1.0));
        let p = g.max_pool(x, 2, 2).unwrap();
        let unrelated = g.exp(c).unwrap();

        g.forward().unwrap();
        assert_eq!(g.function(p).unwrap().argmax(), Some(&[(0, 1)][..]));

        g.set_value(x, Matrix::from_rows(&[&[9.0, 5.0], &[2.0, 3.0]]))
            .unwrap();
        assert!(g.value(p).is_none());
        assert!(g.function(p).unwrap().argmax().is_none());
        assert!(g.value(unrelated).is_some());

        assert_eq!(g.forward_node(p).unwrap().item(), 9.0);
        assert_eq!(g.function(p).unwrap().argmax(), Some(&[(0, 0)][..]));
    }

    #[test]
    fn test_set_value_rejects_functions() {
        let mut g = Graph::new();
        let x = g.variable(Matrix::scalar(1.0), true);
        let y = g.neg(x).unwrap();
        assert_eq!(
            g.set_value(y, Matrix::scalar(0.0)).unwrap_err(),
            Error::NotAVariable(y)
        );
    }

    #[test]
    fn test_variable_named() {
        let mut g = Graph::new();
        g.variable(Matrix::scalar(0.0), true);
        let w = g.named_variable("w", Matrix::scalar(1.0), true);
        assert_eq!(g.variable_named("w"), Some(w));
        assert_eq!(g.variable_named("missing"), None);
    }

    #[test]
    fn test_mode_is_reported() {
        let mut g = Graph::new();
        assert!(g.mode().is_training());
        g.set_mode(Mode::Inference);
        assert_eq!(g.mode(), Mode::Inference);
    }

    #[test]
    fn test_clear() {
        let mut g = Graph::new();
        let x = g.variable(Matrix::scalar(1.0), true);
        g.clear();
        assert!(g.is_empty());
        assert!(g.value(x).is_none());
        assert!(g.grads().is_empty());
    }
}
