//! # ad_matrix - Dense 2-D Matrices for Autodiff
//!
//! The numeric container underneath the `ad_graph` engine: a row-major `f64`
//! matrix addressed by zero-based `(row, column)` coordinates.
//!
//! ## Overview
//!
//! - [`Shape`] - `(rows, cols)` dimensions with 2-D broadcasting rules
//! - [`Matrix`] - storage plus the element-wise, broadcast, reduction and
//!   linear-algebra kernels that gradient formulas are written in
//!
//! Shape violations here are programming errors and panic. Callers that take
//! shapes from users validate them first.
//!
//! ## Example
//!
//! ```
//! use ad_matrix::{Matrix, Shape};
//!
//! let a = Matrix::from_rows(&[&[1.0, 2.0], &[3.0, 4.0]]);
//! let bias = Matrix::new(1, 2, vec![10.0, 20.0]);
//!
//! let y = a.broadcast_zip_map(&bias, |x, b| x + b);
//! assert_eq!(y.as_slice(), &[11.0, 22.0, 13.0, 24.0]);
//!
//! // Gradients flowing back into `bias` are summed over the broadcast rows.
//! let g = Matrix::ones(2, 2).sum_to(Shape::new(1, 2));
//! assert_eq!(g.as_slice(), &[2.0, 2.0]);
//! ```

pub mod matrix;
pub mod shape;

pub use matrix::Matrix;
pub use shape::Shape;
