use std::collections::BTreeMap;
use std::rc::Rc;

use crate::error::DelegateError;
use crate::target::TargetNode;

/// Index-keyed registry mapping a source tensor index to whatever produces it in the
/// translated target graph (ยง4.2).
///
/// Lives only for the duration of one [`crate::graph_builder`] invocation. Handles are
/// `Rc`, not `Arc`: the delegate core runs on a single host thread (ยง5), so there is never
/// a concurrent writer to race against.
#[derive(Default)]
pub struct NodeManager {
    producers: BTreeMap<usize, Rc<dyn TargetNode>>,
}

impl NodeManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the producer of `index`. Fails if `index` already has a producer -- unlike
    /// the original's `std::map::emplace`, which silently keeps the first registration and
    /// drops the second (see DESIGN.md, Open Question decision 3).
    pub fn set(&mut self, index: usize, node: Rc<dyn TargetNode>) -> Result<(), DelegateError> {
        if self.producers.contains_key(&index) {
            return Err(DelegateError::DuplicateProducer(index));
        }
        log::trace!("node_manager: registered producer for tensor {index}");
        self.producers.insert(index, node);
        Ok(())
    }

    /// Whether `index` already has a registered producer.
    pub fn contains(&self, index: usize) -> bool {
        self.producers.contains_key(&index)
    }

    /// Fetch the producer of `index`.
    pub fn get(&self, index: usize) -> Result<Rc<dyn TargetNode>, DelegateError> {
        self.producers
            .get(&index)
            .cloned()
            .ok_or(DelegateError::MissingProducer(index))
    }

    pub fn len(&self) -> usize {
        self.producers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.producers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::native::NativeNode;

    fn dummy_node() -> Rc<dyn TargetNode> {
        NativeNode::constant_f32(vec![1], vec![1.0])
    }

    #[test]
    fn set_then_get_round_trips() {
        let mut nm = NodeManager::new();
        nm.set(3, dummy_node()).unwrap();
        assert!(nm.get(3).is_ok());
    }

    #[test]
    fn get_missing_producer_errors() {
        let nm = NodeManager::new();
        match nm.get(5) {
            Err(DelegateError::MissingProducer(5)) => {}
            other => panic!("expected MissingProducer(5), got {other:?}"),
        }
    }

    #[test]
    fn double_set_is_a_duplicate_producer_error() {
        let mut nm = NodeManager::new();
        nm.set(1, dummy_node()).unwrap();
        match nm.set(1, dummy_node()) {
            Err(DelegateError::DuplicateProducer(1)) => {}
            other => panic!("expected DuplicateProducer(1), got {other:?}"),
        }
    }
}
