//! The interface the core programs against instead of a concrete host runtime.
//!
//! A real embedding links this crate against an opaque C host; tests and the reference
//! pipeline use [`mock`], a plain in-memory stand-in.

use crate::types::SourceType;

/// How a tensor's storage is provided by the host.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AllocationClass {
    /// Read-only, memory-mapped at model-load time: a constant.
    MmapRo,
    /// Read-only, persistent for the model's lifetime but not mmapped: also a constant.
    PersistentRo,
    /// Ordinary dynamically-allocated tensor (a runtime input or intermediate).
    Dynamic,
    /// Allocated from the host's tensor arena.
    Arena,
}

impl AllocationClass {
    pub fn is_constant(self) -> bool {
        matches!(self, AllocationClass::MmapRo | AllocationClass::PersistentRo)
    }
}

/// A reference to one tensor the host runtime owns.
pub trait HostTensor {
    fn index(&self) -> usize;
    fn element_type(&self) -> SourceType;
    fn shape(&self) -> &[usize];
    fn allocation(&self) -> AllocationClass;
    /// Raw bytes: present for constants at any time, and for runtime (compute) inputs once
    /// the host has filled them in ahead of an `Eval` call.
    fn data(&self) -> Option<Vec<u8>>;
    /// Copy `bytes` into the host's storage for this tensor -- how `Eval` hands a computed
    /// output back. A no-op for constants.
    fn set_data(&self, bytes: Vec<u8>);
    fn name(&self) -> &str;
}

/// The op-kind and attribute blob for one subgraph node, plus its tensor wiring.
pub trait HostNode {
    fn id(&self) -> usize;
    fn op_kind(&self) -> &str;
    fn inputs(&self) -> &[usize];
    fn outputs(&self) -> &[usize];
    fn attributes(&self) -> &crate::ops::OpAttributes;
}

/// The subgraph a host hands the delegate at `Init` time (ยง3 `DelegateSubgraph`).
pub struct DelegateSubgraph {
    pub node_ids: Vec<usize>,
    pub input_tensors: Vec<usize>,
    pub output_tensors: Vec<usize>,
}

/// Everything the Graph Builder needs to pull from the host at translation time.
pub trait HostContext {
    fn node(&self, id: usize) -> Option<&dyn HostNode>;
    fn tensor(&self, index: usize) -> Option<&dyn HostTensor>;
    /// Operation nodes only -- constants and parameters are never listed here; they are
    /// materialized on first reference (SPEC_FULL.md ยง4.4, Open Question decision 1).
    fn subgraph_nodes(&self, subgraph: &DelegateSubgraph) -> Vec<usize> {
        subgraph.node_ids.clone()
    }
}

pub mod mock {
    use super::*;
    use crate::ops::OpAttributes;
    use std::cell::RefCell;
    use std::collections::HashMap;

    pub struct MockTensor {
        pub index: usize,
        pub element_type: SourceType,
        pub shape: Vec<usize>,
        pub allocation: AllocationClass,
        pub data: RefCell<Option<Vec<u8>>>,
        pub name: String,
    }

    impl MockTensor {
        /// Convenience constructor matching the shape tests were written against before
        /// `data` became interior-mutable.
        pub fn new(
            index: usize,
            element_type: SourceType,
            shape: Vec<usize>,
            allocation: AllocationClass,
            data: Option<Vec<u8>>,
            name: impl Into<String>,
        ) -> Self {
            Self {
                index,
                element_type,
                shape,
                allocation,
                data: RefCell::new(data),
                name: name.into(),
            }
        }
    }

    impl HostTensor for MockTensor {
        fn index(&self) -> usize {
            self.index
        }
        fn element_type(&self) -> SourceType {
            self.element_type
        }
        fn shape(&self) -> &[usize] {
            &self.shape
        }
        fn allocation(&self) -> AllocationClass {
            self.allocation
        }
        fn data(&self) -> Option<Vec<u8>> {
            self.data.borrow().clone()
        }
        fn set_data(&self, bytes: Vec<u8>) {
            *self.data.borrow_mut() = Some(bytes);
        }
        fn name(&self) -> &str {
            &self.name
        }
    }

    pub struct MockNode {
        pub id: usize,
        pub op_kind: String,
        pub inputs: Vec<usize>,
        pub outputs: Vec<usize>,
        pub attributes: OpAttributes,
    }

    impl HostNode for MockNode {
        fn id(&self) -> usize {
            self.id
        }
        fn op_kind(&self) -> &str {
            &self.op_kind
        }
        fn inputs(&self) -> &[usize] {
            &self.inputs
        }
        fn outputs(&self) -> &[usize] {
            &self.outputs
        }
        fn attributes(&self) -> &OpAttributes {
            &self.attributes
        }
    }

    /// An in-memory host context, built the way a test double for an opaque C API is built.
    #[derive(Default)]
    pub struct MockContext {
        pub nodes: HashMap<usize, MockNode>,
        pub tensors: HashMap<usize, MockTensor>,
    }

    impl MockContext {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn add_tensor(&mut self, t: MockTensor) {
            self.tensors.insert(t.index, t);
        }

        pub fn add_node(&mut self, n: MockNode) {
            self.nodes.insert(n.id, n);
        }
    }

    impl HostContext for MockContext {
        fn node(&self, id: usize) -> Option<&dyn HostNode> {
            self.nodes.get(&id).map(|n| n as &dyn HostNode)
        }
        fn tensor(&self, index: usize) -> Option<&dyn HostTensor> {
            self.tensors.get(&index).map(|t| t as &dyn HostTensor)
        }
    }
}
