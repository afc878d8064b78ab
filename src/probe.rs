//! The host-called predicate deciding, per node, whether this delegate will execute it
//! (ยง4.5, ยง6). Grounded on `openvino_delegate.cc`'s `CheckNodeSupportByOpenVINO` /
//! `CheckInputType` / `CheckDataTypeSupported` / `CheckDims`.

use crate::host::HostContext;
use crate::ops::{OpAttributes, OpKind};
use crate::types::SourceType;

/// Whether `node_id` in `host` can be executed by this delegate. Never surfaces a
/// `DelegateError` -- every rejection reason collapses to `false`, logged at `trace`.
pub fn is_node_supported(host: &dyn HostContext, node_id: usize) -> bool {
    let Some(node) = host.node(node_id) else {
        log::trace!("probe: node {node_id} has no registration");
        return false;
    };

    let Some(kind) = OpKind::parse(node.op_kind()) else {
        log::trace!("probe: unsupported op kind {}", node.op_kind());
        return false;
    };

    let inputs = node.inputs();
    for &t in inputs {
        let Some(tensor) = host.tensor(t) else {
            log::trace!("probe: node {node_id} references missing tensor {t}");
            return false;
        };
        if tensor.shape().iter().any(|&d| d == 0) {
            log::trace!("probe: tensor {t} has a zero dimension");
            return false;
        }
    }

    let types: Vec<SourceType> = inputs
        .iter()
        .map(|&t| host.tensor(t).unwrap().element_type())
        .collect();
    let ranks: Vec<usize> = inputs
        .iter()
        .map(|&t| host.tensor(t).unwrap().shape().len())
        .collect();

    let ok = match kind {
        OpKind::Add | OpKind::Mul => {
            inputs.len() == 2
                && types.iter().all(|t| *t == SourceType::F32)
                && ranks.iter().all(|&r| (1..=4).contains(&r))
        }
        OpKind::Conv2d | OpKind::DepthwiseConv2d => {
            (inputs.len() == 2 || inputs.len() == 3)
                && types[0] == SourceType::F32
                && types[1] == SourceType::F32
                && ranks[0] == 4
                && ranks[1] == 4
                && (inputs.len() == 2 || (types[2] == SourceType::F32 && ranks[2] == 1))
        }
        OpKind::TransposeConv => {
            (inputs.len() == 3 || inputs.len() == 4)
                && types[0] == SourceType::I32
                && ranks[0] == 1
                && types[1] == SourceType::F32
                && ranks[1] == 4
                && types[2] == SourceType::F32
                && ranks[2] == 4
                && (inputs.len() == 3 || (types[3] == SourceType::F32 && ranks[3] == 1))
        }
        OpKind::AveragePool2d | OpKind::MaxPool2d => {
            inputs.len() == 1 && types[0] == SourceType::F32 && ranks[0] == 4
        }
        OpKind::Concatenation => !inputs.is_empty() && types.iter().all(|t| *t == SourceType::F32),
        OpKind::Reshape => {
            inputs.len() == 2
                && types[0] == SourceType::F32
                && (1..=4).contains(&ranks[0])
                && types[1] == SourceType::I32
                && ranks[1] == 1
        }
        OpKind::Softmax => {
            inputs.len() == 1
                && types[0] == SourceType::F32
                && matches!(node.attributes(), OpAttributes::Softmax { beta } if (*beta - 1.0).abs() < f32::EPSILON)
        }
        OpKind::Mean => {
            inputs.len() == 2
                && types[0] == SourceType::F32
                && ranks[0] == 4
                && types[1] == SourceType::I32
                && ranks[1] == 1
        }
        OpKind::Pad => {
            inputs.len() == 2
                && types[0] == SourceType::F32
                && (1..=4).contains(&ranks[0])
                && matches!(types[1], SourceType::I32 | SourceType::I64)
                && ranks[1] == 2
        }
        OpKind::ResizeBilinear => {
            inputs.len() == 2 && types[0] == SourceType::F32 && types[1] == SourceType::I32
        }
        OpKind::Dequantize => inputs.len() == 1 && types[0] == SourceType::F16,
        OpKind::Relu | OpKind::Relu6 | OpKind::Logistic | OpKind::HardSwish | OpKind::Tanh => {
            inputs.len() == 1 && types[0] == SourceType::F32
        }
    };

    if !ok {
        log::trace!("probe: node {node_id} ({:?}) failed type/rank/attribute checks", kind);
    }
    ok
}
