//! Graph configuration.

use serde::{Deserialize, Serialize};

/// Processing mode shared by the layers built on a graph.
///
/// The engine stores and reports the mode but never changes its own behavior
/// based on it; layers such as dropout consult it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Training,
    Inference,
}

impl Mode {
    pub fn is_training(&self) -> bool {
        matches!(self, Mode::Training)
    }
}

/// Options for a [`Graph`](crate::Graph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub mode: Mode,
    /// Forward every function as soon as it is added, surfacing shape errors
    /// at construction time.
    pub eager: bool,
}

impl GraphConfig {
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_eager(mut self, eager: bool) -> Self {
        self.eager = eager;
        self
    }
}
