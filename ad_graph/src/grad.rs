//! Gradient accumulator owned by the graph.

use ad_matrix::Matrix;
use tracing::trace;

use crate::error::{Error, Result};
use crate::node::NodeId;

/// Accumulated gradients, one optional slot per node.
///
/// [`GradStore::accumulate`] is the only way a gradient is written during a
/// backward pass. When an operand feeds several functions, each contribution
/// is added to the slot, so the final value is the sum over all incoming edges.
#[derive(Debug, Clone, Default)]
pub struct GradStore {
    slots: Vec<Option<Matrix>>,
}

impl GradStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store with `len` empty slots.
    pub(crate) fn with_slots(len: usize) -> Self {
        GradStore {
            slots: vec![None; len],
        }
    }

    /// Gradient of a node, if any contribution has arrived.
    pub fn get(&self, id: NodeId) -> Option<&Matrix> {
        self.slots.get(id.0).and_then(|g| g.as_ref())
    }

    /// Number of nodes currently holding a gradient.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|g| g.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add `grad` into the slot for `id`, creating it on first use.
    pub(crate) fn accumulate(&mut self, id: NodeId, grad: &Matrix) -> Result<()> {
        let slot = self.slots.get_mut(id.0).ok_or(Error::UnknownNode(id))?;
        match slot {
            Some(existing) => {
                if existing.shape() != grad.shape() {
                    return Err(Error::shape("accumulate", existing.shape(), grad.shape()));
                }
                existing.accumulate(grad);
            }
            None => *slot = Some(grad.clone()),
        }
        trace!(node = %id, shape = %grad.shape(), "accumulated gradient");
        Ok(())
    }

    /// Reserve a slot for a newly created node.
    pub(crate) fn push_slot(&mut self, initial: Option<Matrix>) {
        self.slots.push(initial);
    }

    pub(crate) fn pop_slot(&mut self) {
        self.slots.pop();
    }

    /// Slots holding a gradient, in ascending id order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (NodeId, &Matrix)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, g)| g.as_ref().map(|g| (NodeId(i), g)))
    }

    /// Reset every gradient to absent.
    pub(crate) fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.slots.truncate(len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulate_sums_contributions() {
        let mut store = GradStore::new();
        store.push_slot(None);
        let id = NodeId(0);

        assert!(store.get(id).is_none());
        store.accumulate(id, &Matrix::column(vec![1.0, 2.0])).unwrap();
        store.accumulate(id, &Matrix::column(vec![0.5, -2.0])).unwrap();

        assert_eq!(store.get(id).unwrap().as_slice(), &[1.5, 0.0]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_accumulate_shape_mismatch() {
        let mut store = GradStore::new();
        store.push_slot(Some(Matrix::zeros(2, 1)));

        let err = store.accumulate(NodeId(0), &Matrix::zeros(1, 2)).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { op: "accumulate", .. }));
    }

    #[test]
    fn test_unknown_slot() {
        let mut store = GradStore::new();
        let err = store.accumulate(NodeId(3), &Matrix::scalar(1.0)).unwrap_err();
        assert_eq!(err, Error::UnknownNode(NodeId(3)));
    }

    #[test]
    fn test_clear() {
        let mut store = GradStore::new();
        store.push_slot(Some(Matrix::scalar(1.0)));
        store.push_slot(None);
        assert_eq!(store.len(), 1);

        store.clear();
        assert!(store.is_empty());
        assert!(store.get(NodeId(0)).is_none());
    }
}
