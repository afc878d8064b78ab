//! Top-level lifecycle: support probe, `Init`, `Eval` (ยง4.5). Grounded on
//! `openvino_delegate_kernel.cc` (`Init`/`Eval`) and `openvino_delegate_core.cc`
//! (`Init`/`CreateModel`/`CompileAndInfer`/`BuildModelFromCache`).

use std::rc::Rc;
use std::time::Duration;

use crate::cache;
use crate::config::DelegateOptions;
use crate::error::DelegateError;
use crate::graph_builder;
use crate::host::{DelegateSubgraph, HostContext};
use crate::probe;
use crate::target::native::NativeNode;
use crate::target::{CompiledModel, InferRequest, TargetCore, TargetNode};

const EVAL_TIMEOUT: Duration = Duration::from_secs(10);

enum State<C: TargetCore> {
    New,
    Ready {
        #[allow(dead_code)]
        compiled: C::Compiled,
        request: <C::Compiled as CompiledModel>::Request,
        compute_inputs: Vec<usize>,
        outputs: Vec<usize>,
    },
    Failed(String),
}

/// Clears `in_flight` on every exit path out of `eval`, including a panicking translator or
/// infer call, so the delegate can never get stuck reporting `Busy` forever (ยง5).
struct BusyGuard<'a>(&'a mut bool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        *self.0 = false;
    }
}

/// One delegate instance: owns the target library's core, the compiled model, and the single
/// reused inference request. `C` is the target backend (ยง4.6); this crate exercises it with
/// [`crate::target::native::NativeCore`].
pub struct Delegate<C: TargetCore> {
    core: C,
    options: DelegateOptions,
    state: State<C>,
    in_flight: bool,
}

impl<C: TargetCore> Delegate<C> {
    pub fn new(core: C, options: DelegateOptions) -> Self {
        Self {
            core,
            options,
            state: State::New,
            in_flight: false,
        }
    }

    /// `IsNodeSupportedByDelegate` (ยง4.5). A pure predicate; never fails.
    pub fn is_node_supported(&self, host: &dyn HostContext, node_id: usize) -> bool {
        probe::is_node_supported(host, node_id)
    }

    /// `[New] -> [Ready]` on success, `[New] -> [Failed]` otherwise. Re-running `Init` after a
    /// failure is allowed and simply retries from scratch.
    pub fn init(&mut self, host: &dyn HostContext, subgraph: &DelegateSubgraph) -> Result<(), DelegateError> {
        match self.try_init(host, subgraph) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.state = State::Failed(e.to_string());
                Err(e)
            }
        }
    }

    fn try_init(&mut self, host: &dyn HostContext, subgraph: &DelegateSubgraph) -> Result<(), DelegateError> {
        let devices = self.core.available_devices();
        if !devices.iter().any(|d| d == "CPU") {
            return Err(DelegateError::DeviceUnavailable("CPU".to_string()));
        }

        let (model, compute_inputs) = self.build_or_load(host, subgraph)?;

        if let Some(xml_path) = cache::should_write(&self.options) {
            if let Err(e) = self.core.serialize(&model, &xml_path) {
                log::warn!("failed to serialize compiled model to cache: {e}");
            }
        }

        let compiled = self.core.compile(model, "CPU")?;
        let request = compiled.create_infer_request();

        self.state = State::Ready {
            compiled,
            request,
            compute_inputs,
            outputs: subgraph.output_tensors.clone(),
        };
        Ok(())
    }

    /// Load a cached model if one is configured and readable; otherwise run the Graph Builder.
    /// Mirrors `CreateModel`'s cache-then-build fallback.
    fn build_or_load(
        &self,
        host: &dyn HostContext,
        subgraph: &DelegateSubgraph,
    ) -> Result<(C::Model, Vec<usize>), DelegateError> {
        if let Some(xml_path) = cache::should_read(&self.options) {
            match self.core.read_model(&xml_path) {
                Ok(model) => {
                    let compute_inputs = graph_builder::compute_inputs_for(host, subgraph)?;
                    return Ok((model, compute_inputs));
                }
                Err(e) => {
                    log::warn!("cached artifact at {} unusable, rebuilding: {e}", xml_path.display());
                }
            }
        }

        let built = graph_builder::build(host, subgraph)?;
        let model = self.core.build_model(to_dyn(built.input_params), to_dyn(built.result_nodes))?;
        Ok((model, built.compute_inputs))
    }

    /// Copy host tensors into the request, run it synchronously with a 10s ceiling, copy
    /// outputs back. Refuses re-entrant calls with `Busy` (ยง5).
    pub fn eval(&mut self, host: &dyn HostContext) -> Result<(), DelegateError> {
        if self.in_flight {
            return Err(DelegateError::Busy);
        }
        self.in_flight = true;
        let _guard = BusyGuard(&mut self.in_flight);

        let (request, compute_inputs, outputs) = match &mut self.state {
            State::Ready {
                request,
                compute_inputs,
                outputs,
                ..
            } => (request, compute_inputs, outputs),
            State::New => {
                return Err(DelegateError::InferError("eval called before init".to_string()))
            }
            State::Failed(reason) => {
                return Err(DelegateError::InferError(format!("eval called after failed init: {reason}")))
            }
        };

        for (port, &tensor_index) in compute_inputs.iter().enumerate() {
            let tensor = host
                .tensor(tensor_index)
                .ok_or(DelegateError::MissingProducer(tensor_index))?;
            let bytes = tensor.data().ok_or(DelegateError::MissingProducer(tensor_index))?;
            request.set_input(port, &bytes);
        }

        request.start_async();
        request.wait_for(EVAL_TIMEOUT)?;

        for (port, &tensor_index) in outputs.iter().enumerate() {
            let tensor = host
                .tensor(tensor_index)
                .ok_or(DelegateError::MissingProducer(tensor_index))?;
            tensor.set_data(request.output(port));
        }

        Ok(())
    }
}

fn to_dyn(nodes: Vec<Rc<NativeNode>>) -> Vec<Rc<dyn TargetNode>> {
    nodes.into_iter().map(|n| n as Rc<dyn TargetNode>).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::mock::{MockContext, MockNode, MockTensor};
    use crate::host::AllocationClass;
    use crate::layout::FusedActivation;
    use crate::ops::OpAttributes;
    use crate::target::native::NativeCore;
    use crate::types::SourceType;

    fn f32_bytes(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn add_subgraph_host() -> (MockContext, DelegateSubgraph) {
        let mut host = MockContext::new();
        host.add_tensor(MockTensor::new(0, SourceType::F32, vec![1, 4], AllocationClass::Dynamic, None, "a"));
        host.add_tensor(MockTensor::new(
            1,
            SourceType::F32,
            vec![1, 4],
            AllocationClass::MmapRo,
            Some(f32_bytes(&[10.0, 20.0, 30.0, 40.0])),
            "b",
        ));
        host.add_tensor(MockTensor::new(2, SourceType::F32, vec![1, 4], AllocationClass::Dynamic, None, "out"));
        host.add_node(MockNode {
            id: 0,
            op_kind: "ADD".to_string(),
            inputs: vec![0, 1],
            outputs: vec![2],
            attributes: OpAttributes::BinaryElementwise {
                activation: FusedActivation::None,
            },
        });
        let subgraph = DelegateSubgraph {
            node_ids: vec![0],
            input_tensors: vec![0],
            output_tensors: vec![2],
        };
        (host, subgraph)
    }

    #[test]
    fn init_then_eval_computes_add() {
        let (host, subgraph) = add_subgraph_host();
        let mut delegate = Delegate::new(NativeCore::new(), DelegateOptions::default());
        delegate.init(&host, &subgraph).unwrap();

        host.tensor(0).unwrap().set_data(f32_bytes(&[1.0, 2.0, 3.0, 4.0]));
        delegate.eval(&host).unwrap();

        let out = host.tensor(2).unwrap().data().unwrap();
        let values: Vec<f32> = out.chunks_exact(4).map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect();
        assert_eq!(values, vec![11.0, 22.0, 33.0, 44.0]);
    }

    #[test]
    fn eval_before_init_fails() {
        let (host, _subgraph) = add_subgraph_host();
        let mut delegate = Delegate::new(NativeCore::new(), DelegateOptions::default());
        assert!(matches!(delegate.eval(&host), Err(DelegateError::InferError(_))));
    }

    #[test]
    fn reentrant_eval_fails_busy() {
        // A direct Busy check: flip the flag the way `eval` would, then ask again.
        let (host, subgraph) = add_subgraph_host();
        let mut delegate = Delegate::new(NativeCore::new(), DelegateOptions::default());
        delegate.init(&host, &subgraph).unwrap();
        delegate.in_flight = true;
        assert!(matches!(delegate.eval(&host), Err(DelegateError::Busy)));
    }
}
