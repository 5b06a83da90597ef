//! Forward and backward kernels for every graph operation.
//!
//! Each submodule exposes plain functions over [`Matrix`](ad_matrix::Matrix)
//! values; [`Function`](crate::Function) dispatches to them. Backward kernels
//! take a `needs` mask and skip the gradient of any input that does not
//! require one.

pub mod binary;
pub mod div;
pub mod linalg;
pub mod maxpool;
pub mod reduce;
pub mod unary;
pub mod view;

pub use binary::BinaryOp;
pub use maxpool::Argmax;
pub use unary::UnaryOp;
pub use view::Window;
