//! Arena node types.
//!
//! A graph is a `Vec` of nodes. A node is addressed by its index, wrapped in
//! [`NodeId`], and only ever references nodes with smaller ids, so arena order
//! is a topological order of the DAG.

use std::fmt;

use ad_matrix::Matrix;

use crate::function::Function;

/// Handle to an operand (variable or function output) in a [`Graph`](crate::Graph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A leaf operand holding a caller-supplied value.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Variable(Variable),
    Function(Function),
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub kind: NodeKind,
    /// Always present for variables; for functions, the cached forward output.
    pub value: Option<Matrix>,
    pub requires_grad: bool,
}

impl Node {
    pub fn variable(name: Option<String>, value: Matrix, requires_grad: bool) -> Self {
        Node {
            kind: NodeKind::Variable(Variable { name }),
            value: Some(value),
            requires_grad,
        }
    }

    pub fn function(function: Function, requires_grad: bool) -> Self {
        Node {
            kind: NodeKind::Function(function),
            value: None,
            requires_grad,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match &self.kind {
            NodeKind::Function(f) => Some(f),
            NodeKind::Variable(_) => None,
        }
    }

    pub fn is_variable(&self) -> bool {
        matches!(self.kind, NodeKind::Variable(_))
    }

    /// Forget the cached output and any auxiliary state.
    pub fn invalidate(&mut self) {
        if let NodeKind::Function(f) = &mut self.kind {
            self.value = None;
            f.reset();
        }
    }

    pub fn op_name(&self) -> &'static str {
        match &self.kind {
            NodeKind::Function(f) => f.name(),
            NodeKind::Variable(_) => "Variable",
        }
    }
}
