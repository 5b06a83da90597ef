//! Error types for graph construction and evaluation.

use ad_matrix::Shape;
use thiserror::Error;

use crate::node::NodeId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Operand shapes violate an operation's structural contract.
    #[error("{op}: shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch {
        op: &'static str,
        expected: String,
        got: Shape,
    },

    /// A scalar parameter of an operation is unusable (e.g. a zero-sized window).
    #[error("{op}: invalid argument: {reason}")]
    InvalidArgument { op: &'static str, reason: String },

    /// Backward requested on a function that has no cached forward state.
    #[error("{op}: backward called before forward")]
    Sequencing { op: &'static str },

    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("node {0} is not a variable")]
    NotAVariable(NodeId),
}

impl Error {
    pub(crate) fn shape(op: &'static str, expected: impl ToString, got: Shape) -> Self {
        Error::ShapeMismatch {
            op,
            expected: expected.to_string(),
            got,
        }
    }

    pub(crate) fn invalid(op: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidArgument {
            op,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
