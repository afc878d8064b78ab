//! The interface the core programs against instead of a concrete accelerator runtime.
//!
//! [`native`] is a reference, pure-Rust implementation used by every test in this crate --
//! an explicit stand-in, not a reimplementation of any real target library's internals.

use std::any::Any;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use crate::error::DelegateError;
use crate::types::TargetType;

pub mod native;

/// One node's single-output handle in the target graph (ยง3 `TargetNode`).
pub trait TargetNode {
    fn shape(&self) -> Vec<usize>;
    fn dtype(&self) -> TargetType;

    /// Escape hatch back to a concrete target implementation's own node type, used by that
    /// implementation's `build_model` to recover what it built. Not meant to be called outside
    /// a `TargetCore` impl.
    fn as_any_rc(self: Rc<Self>) -> Rc<dyn Any>;
}

/// The target library's top-level entry point: device enumeration, model (de)serialization.
pub trait TargetCore {
    type Model: TargetModelHandle;
    type Compiled: CompiledModel;

    fn available_devices(&self) -> Vec<String>;

    /// Build a model from the Graph Builder's result: ordered parameter nodes and ordered
    /// result (output) nodes.
    fn build_model(
        &self,
        input_params: Vec<Rc<dyn TargetNode>>,
        result_nodes: Vec<Rc<dyn TargetNode>>,
    ) -> Result<Self::Model, DelegateError>;

    /// Read a previously-serialized model back from `<cache_dir>/<model_token>.xml`.
    fn read_model(&self, xml_path: &Path) -> Result<Self::Model, DelegateError>;

    /// Serialize `model` to the `.xml`/`.bin` pair rooted at `xml_path` (without extension
    /// decisions made by the caller -- this trait method receives the full `.xml` path and is
    /// responsible for writing its `.bin` sibling too).
    fn serialize(&self, model: &Self::Model, xml_path: &Path) -> Result<(), DelegateError>;

    fn compile(&self, model: Self::Model, device: &str) -> Result<Self::Compiled, DelegateError>;
}

/// An in-memory (uncompiled) or loaded model: just enough to know its port counts.
pub trait TargetModelHandle {
    fn input_count(&self) -> usize;
    fn output_count(&self) -> usize;
}

/// A model compiled for a specific device.
pub trait CompiledModel {
    type Request: InferRequest;
    fn create_infer_request(&self) -> Self::Request;
    fn input_count(&self) -> usize;
    fn output_count(&self) -> usize;
}

/// One inference request: input/output ports plus synchronous execution with a timeout.
pub trait InferRequest {
    fn set_input(&mut self, port: usize, bytes: &[u8]);
    fn output(&self, port: usize) -> Vec<u8>;
    fn start_async(&mut self);
    fn wait_for(&mut self, timeout: Duration) -> Result<(), DelegateError>;
}
