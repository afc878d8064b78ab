//! Orchestrates translation of one assigned subgraph into a target graph (ยง4.4).

use std::rc::Rc;

use tabled::Tabled;

use crate::error::DelegateError;
use crate::host::{AllocationClass, DelegateSubgraph, HostContext};
use crate::node_manager::NodeManager;
use crate::ops::{self, BuildContext};
use crate::target::native::NativeNode;
use crate::target::TargetNode as _;
use crate::types::map_type;

/// The result of a successful build: the input parameter nodes (index-parallel with
/// `compute_inputs`) and the result nodes, in the subgraph's declared output order.
pub struct BuiltGraph {
    pub input_params: Vec<Rc<NativeNode>>,
    pub compute_inputs: Vec<usize>,
    pub result_nodes: Vec<Rc<NativeNode>>,
}

/// Walk `subgraph` (ยง4.4 algorithm): materialize constants/parameters on first reference,
/// dispatch each op node to its translator, then collect output producers.
pub fn build(host: &dyn HostContext, subgraph: &DelegateSubgraph) -> Result<BuiltGraph, DelegateError> {
    let mut nodes = NodeManager::new();
    let input_set: std::collections::HashSet<usize> = subgraph.input_tensors.iter().copied().collect();

    let mut input_params = Vec::new();
    let mut compute_inputs = Vec::new();

    for &node_id in &host.subgraph_nodes(subgraph) {
        let host_node = host
            .node(node_id)
            .ok_or(DelegateError::MissingProducer(node_id))?;

        for &tensor_index in host_node.inputs() {
            if nodes.contains(tensor_index) {
                continue;
            }
            let tensor = host
                .tensor(tensor_index)
                .ok_or(DelegateError::MissingProducer(tensor_index))?;

            if tensor.allocation().is_constant() {
                let target_ty = map_type(tensor.element_type());
                let native = build_constant(tensor_index, tensor, target_ty)?;
                nodes.set(tensor_index, native)?;
            } else if input_set.contains(&tensor_index) && tensor.data().is_none() {
                let target_ty = map_type(tensor.element_type());
                let param = NativeNode::parameter(tensor.shape().to_vec(), target_ty);
                input_params.push(param.clone());
                compute_inputs.push(tensor_index);
                nodes.set(tensor_index, param)?;
            }
            // else: produced by an earlier node in this subgraph -- nothing to do yet.
        }

        let kind = ops::OpKind::parse(host_node.op_kind())
            .ok_or_else(|| DelegateError::UnsupportedOp(host_node.op_kind().to_string()))?;
        if host_node.outputs().len() != 1 {
            return Err(DelegateError::MultipleOutputsUnsupported(host_node.op_kind().to_string()));
        }
        let translator = ops::translator_for(kind);
        let mut ctx = BuildContext {
            host,
            nodes: &mut nodes,
        };
        translator.build(&mut ctx, host_node)?;
    }

    let mut result_nodes = Vec::with_capacity(subgraph.output_tensors.len());
    for &output in &subgraph.output_tensors {
        let producer = nodes.get(output)?;
        let native = producer
            .as_any_rc()
            .downcast::<NativeNode>()
            .map_err(|_| DelegateError::TargetCompileError("output producer was not a native node".to_string()))?;
        result_nodes.push(native);
    }
    if result_nodes.is_empty() {
        return Err(DelegateError::MissingProducer(0));
    }

    Ok(BuiltGraph {
        input_params,
        compute_inputs,
        result_nodes,
    })
}

/// Recomputes just the ordered compute-input tensor indices for `subgraph`, without building
/// the target graph -- used on a cache hit, when the translators never run. Mirrors
/// `BuildModelFromCache`'s duplicated input-classification loop in the original.
pub fn compute_inputs_for(host: &dyn HostContext, subgraph: &DelegateSubgraph) -> Result<Vec<usize>, DelegateError> {
    let input_set: std::collections::HashSet<usize> = subgraph.input_tensors.iter().copied().collect();
    let mut seen = std::collections::HashSet::new();
    let mut compute_inputs = Vec::new();
    for &node_id in &host.subgraph_nodes(subgraph) {
        let host_node = host.node(node_id).ok_or(DelegateError::MissingProducer(node_id))?;
        for &tensor_index in host_node.inputs() {
            if !seen.insert(tensor_index) {
                continue;
            }
            let tensor = host
                .tensor(tensor_index)
                .ok_or(DelegateError::MissingProducer(tensor_index))?;
            if !tensor.allocation().is_constant() && input_set.contains(&tensor_index) && tensor.data().is_none() {
                compute_inputs.push(tensor_index);
            }
        }
    }
    Ok(compute_inputs)
}

fn build_constant(
    tensor_index: usize,
    tensor: &dyn crate::host::HostTensor,
    target_ty: crate::types::TargetType,
) -> Result<Rc<NativeNode>, DelegateError> {
    let bytes = tensor.data().ok_or(DelegateError::MissingProducer(tensor_index))?;
    let shape = tensor.shape().to_vec();
    Ok(match target_ty {
        crate::types::TargetType::F32 => {
            let data: Vec<f32> = bytes
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect();
            NativeNode::constant_f32(shape, data)
        }
        crate::types::TargetType::F16 => {
            let data: Vec<u16> = bytes.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect();
            NativeNode::constant_f16(shape, data)
        }
        crate::types::TargetType::I32 => {
            let data: Vec<i32> = bytes
                .chunks_exact(4)
                .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect();
            NativeNode::constant_i32(shape, data)
        }
        crate::types::TargetType::I64 => {
            let data: Vec<i64> = bytes
                .chunks_exact(8)
                .map(|c| i64::from_le_bytes(c.try_into().unwrap()))
                .collect();
            NativeNode::constant_i64(shape, data)
        }
        other => {
            return Err(DelegateError::UnsupportedType {
                tensor: tensor_index,
                ty: format!("{other:?}"),
            })
        }
    })
}

/// A row in the debug dump of a built graph's result nodes, mirroring the teacher's
/// `Model::table_nodes`.
#[derive(Tabled)]
struct ResultRow {
    index: usize,
    shape: String,
}

pub fn debug_table(graph: &BuiltGraph) -> tabled::Table {
    let rows: Vec<ResultRow> = graph
        .result_nodes
        .iter()
        .enumerate()
        .map(|(i, n)| ResultRow {
            index: i,
            shape: format!("{:?}", n.shape()),
        })
        .collect();
    tabled::Table::new(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::mock::{MockContext, MockNode, MockTensor};
    use crate::ops::OpAttributes;
    use crate::types::SourceType;

    fn f32_bytes(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn builds_a_single_add_subgraph() {
        let mut host = MockContext::new();
        host.add_tensor(MockTensor::new(
            0,
            SourceType::F32,
            vec![1, 4],
            AllocationClass::Dynamic,
            None,
            "a",
        ));
        host.add_tensor(MockTensor::new(
            1,
            SourceType::F32,
            vec![1, 4],
            AllocationClass::MmapRo,
            Some(f32_bytes(&[10.0, 20.0, 30.0, 40.0])),
            "b",
        ));
        host.add_tensor(MockTensor::new(
            2,
            SourceType::F32,
            vec![1, 4],
            AllocationClass::Dynamic,
            None,
            "out",
        ));
        host.add_node(MockNode {
            id: 0,
            op_kind: "ADD".to_string(),
            inputs: vec![0, 1],
            outputs: vec![2],
            attributes: OpAttributes::BinaryElementwise {
                activation: crate::layout::FusedActivation::None,
            },
        });

        let subgraph = DelegateSubgraph {
            node_ids: vec![0],
            input_tensors: vec![0],
            output_tensors: vec![2],
        };

        let built = build(&host, &subgraph).unwrap();
        assert_eq!(built.input_params.len(), 1);
        assert_eq!(built.compute_inputs, vec![0]);
        assert_eq!(built.result_nodes.len(), 1);

        built.input_params[0].bind(crate::target::native::NativeBuffer::F32(vec![1.0, 2.0, 3.0, 4.0]));
        let out = built.result_nodes[0].eval();
        assert_eq!(*out, vec![11.0, 22.0, 33.0, 44.0]);
    }

    #[test]
    fn missing_output_producer_errors() {
        let host = MockContext::new();
        let subgraph = DelegateSubgraph {
            node_ids: vec![],
            input_tensors: vec![],
            output_tensors: vec![7],
        };
        match build(&host, &subgraph) {
            Err(DelegateError::MissingProducer(7)) => {}
            other => panic!("expected MissingProducer(7), got {other:?}"),
        }
    }
}
