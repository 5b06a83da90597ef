//! # ad_graph - Reverse-mode Automatic Differentiation over Matrices
//!
//! This crate builds computation graphs over [`Matrix`](ad_matrix::Matrix)
//! values and computes gradients by reverse accumulation. It is the numerical
//! substrate that layers such as attention or normalization are composed from.
//!
//! ## Quick Start
//!
//! ```
//! use ad_graph::Graph;
//! use ad_matrix::Matrix;
//!
//! let mut g = Graph::new();
//! let x = g.variable(
//!     Matrix::from_rows(&[&[1.0, 3.0, 0.0, 2.0], &[2.0, -1.0, 5.0, 1.0]]),
//!     true,
//! );
//!
//! // Pool 2x2 windows, then keep the left pooled cell.
//! let pooled = g.max_pool(x, 2, 2).unwrap();
//! let left = g.view(pooled, 0, 0, 1, 1).unwrap();
//!
//! assert_eq!(g.forward_node(left).unwrap().item(), 3.0);
//!
//! g.backward(left).unwrap();
//! let grad = g.grad(x).unwrap();
//! assert_eq!(grad.as_slice(), &[0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
//! ```
//!
//! ## Supported Operations
//!
//! | Category | Operations |
//! |----------|------------|
//! | Arithmetic | [`Graph::add`], [`Graph::sub`], [`Graph::prod`] (broadcasting), [`Graph::div`], [`Graph::scale`], [`Graph::neg`] |
//! | Transcendental | [`Graph::exp`], [`Graph::log`], [`Graph::sqrt`], [`Graph::tanh`], [`Graph::sigmoid`], [`Graph::relu`] |
//! | Linear algebra | [`Graph::matmul`], [`Graph::transpose`] |
//! | Reductions | [`Graph::reduce_sum`], [`Graph::reduce_mean`] |
//! | Structural | [`Graph::max_pool`], [`Graph::view`] |
//!
//! ## Architecture
//!
//! - **[`Graph`]**: arena of nodes addressed by [`NodeId`]. Nodes only point to
//!   earlier ids, so arena order is a topological order.
//! - **[`Function`]**: closed enum of operations, each carrying its own
//!   auxiliary forward state.
//! - **[`GradStore`]**: the graph-owned gradient accumulator. Contributions from
//!   every consumer of an operand are summed.
//! - **[`finite_diff_grad`]**: numerical gradients for validating the engine.
//!
//! Contract violations (bad shapes, backward before forward, foreign ids) are
//! reported as [`Error`]. Numeric edge cases such as division by zero follow
//! IEEE-754 and are not errors.

mod backward;
pub mod config;
pub mod error;
pub mod finite_diff;
pub mod function;
pub mod grad;
pub mod graph;
pub mod node;
pub mod ops;

pub use config::{GraphConfig, Mode};
pub use error::{Error, Result};
pub use finite_diff::{finite_diff_grad, max_grad_error};
pub use function::Function;
pub use grad::GradStore;
pub use graph::Graph;
pub use node::NodeId;
pub use ops::{Argmax, BinaryOp, UnaryOp, Window};

/// Common imports for building and differentiating graphs.
pub mod prelude {
    pub use crate::{Error, Graph, GraphConfig, Mode, NodeId, Result};
    pub use ad_matrix::{Matrix, Shape};
}
