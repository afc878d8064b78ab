//! A pure-Rust reference target: no accelerator library, no plugin path. It implements the
//! [`crate::target`] traits by walking [`NativeNode`] graphs directly in process, so the rest
//! of the crate -- translators, the graph builder, the delegate lifecycle -- can be exercised
//! without an actual OpenVINO install (ยง3, ยง9 Non-goals).

pub mod codec;
pub mod kernels;
mod node;

pub use node::{NativeBuffer, NativeNode};

use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use crate::error::DelegateError;
use crate::target::{CompiledModel, InferRequest, TargetCore, TargetModelHandle, TargetNode};

/// The reference target core. Holds no state of its own -- every model it builds owns its
/// node graph directly via `Rc`.
#[derive(Default)]
pub struct NativeCore;

impl NativeCore {
    pub fn new() -> Self {
        Self
    }
}

pub struct NativeModel {
    input_params: Vec<Rc<NativeNode>>,
    result_nodes: Vec<Rc<NativeNode>>,
}

impl TargetModelHandle for NativeModel {
    fn input_count(&self) -> usize {
        self.input_params.len()
    }

    fn output_count(&self) -> usize {
        self.result_nodes.len()
    }
}

pub struct NativeCompiled {
    model: NativeModel,
}

impl CompiledModel for NativeCompiled {
    type Request = NativeRequest;

    fn create_infer_request(&self) -> Self::Request {
        NativeRequest {
            input_params: self.model.input_params.clone(),
            result_nodes: self.model.result_nodes.clone(),
            outputs: Vec::new(),
            ready: false,
        }
    }

    fn input_count(&self) -> usize {
        self.model.input_count()
    }

    fn output_count(&self) -> usize {
        self.model.output_count()
    }
}

/// Single reused inference request. `start_async` computes eagerly -- there is no background
/// device to hand work off to -- so `wait_for` only ever waits on work already done (ยง5).
pub struct NativeRequest {
    input_params: Vec<Rc<NativeNode>>,
    result_nodes: Vec<Rc<NativeNode>>,
    outputs: Vec<Vec<u8>>,
    ready: bool,
}

fn encode_f32(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

impl InferRequest for NativeRequest {
    fn set_input(&mut self, port: usize, bytes: &[u8]) {
        let param = &self.input_params[port];
        let buffer = codec::decode_buffer(param.dtype(), bytes);
        param.bind(buffer);
        self.ready = false;
    }

    fn output(&self, port: usize) -> Vec<u8> {
        self.outputs[port].clone()
    }

    fn start_async(&mut self) {
        self.outputs = self.result_nodes.iter().map(|n| encode_f32(&n.eval())).collect();
        self.ready = true;
    }

    fn wait_for(&mut self, timeout: Duration) -> Result<(), DelegateError> {
        if self.ready {
            Ok(())
        } else {
            Err(DelegateError::InferTimeout(timeout))
        }
    }
}

impl TargetCore for NativeCore {
    type Model = NativeModel;
    type Compiled = NativeCompiled;

    fn available_devices(&self) -> Vec<String> {
        vec!["CPU".to_string()]
    }

    fn build_model(
        &self,
        input_params: Vec<Rc<dyn TargetNode>>,
        result_nodes: Vec<Rc<dyn TargetNode>>,
    ) -> Result<Self::Model, DelegateError> {
        Ok(NativeModel {
            input_params: downcast_all(input_params)?,
            result_nodes: downcast_all(result_nodes)?,
        })
    }

    fn read_model(&self, xml_path: &Path) -> Result<Self::Model, DelegateError> {
        let (input_params, result_nodes) = codec::load(xml_path)?;
        Ok(NativeModel { input_params, result_nodes })
    }

    fn serialize(&self, model: &Self::Model, xml_path: &Path) -> Result<(), DelegateError> {
        codec::save(xml_path, &model.input_params, &model.result_nodes)
    }

    fn compile(&self, model: Self::Model, device: &str) -> Result<Self::Compiled, DelegateError> {
        if device != "CPU" {
            return Err(DelegateError::DeviceUnavailable(device.to_string()));
        }
        Ok(NativeCompiled { model })
    }
}

fn downcast_all(nodes: Vec<Rc<dyn TargetNode>>) -> Result<Vec<Rc<NativeNode>>, DelegateError> {
    nodes
        .into_iter()
        .map(|n| {
            n.as_any_rc()
                .downcast::<NativeNode>()
                .map_err(|_| DelegateError::TargetCompileError("node was not produced by the native target".to_string()))
        })
        .collect()
}
