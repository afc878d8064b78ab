//! The on-disk compiled-graph cache pair (ยง7): `<token>.xml` carries graph topology as JSON,
//! `<token>.bin` carries the concatenated raw constant buffers it references by offset. Graph
//! topology is flattened by a post-order walk so every node is written once and only after its
//! inputs, the way the original's IR serializer guarantees producer-before-consumer ordering.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::DelegateError;
use crate::layout::{PadType, ResizeMode};
use crate::types::TargetType;

use super::node::{NativeBuffer, NativeNode, NodeOp};

#[derive(Serialize, Deserialize)]
struct SerializedNode {
    shape: Vec<usize>,
    dtype: TargetType,
    op: SerializedOp,
}

#[derive(Serialize, Deserialize)]
enum SerializedOp {
    Constant { offset: usize, len: usize, elem_dtype: TargetType },
    Parameter,
    Add(usize, usize),
    Mul(usize, usize),
    Transpose { input: usize, order: Vec<usize> },
    Pool { input: usize, filter: (usize, usize), stride: (usize, usize), padding: PadType, is_max: bool },
    Conv2d { input: usize, filter: usize, bias: Option<usize>, stride: (usize, usize), padding: PadType, groups: usize },
    ConvTranspose { input: usize, filter: usize, bias: Option<usize>, stride: (usize, usize), out_hw: (usize, usize) },
    Concat { inputs: Vec<usize>, axis: usize },
    Reshape(usize),
    Softmax { input: usize, axis: usize },
    Resize { input: usize, out_hw: (usize, usize), mode: ResizeMode },
    ReduceMean { input: usize, axes: Vec<usize>, keep_dims: bool },
    Pad { input: usize, begin: Vec<usize>, end: Vec<usize> },
    ConvertToF32(usize),
    Relu(usize),
    Clamp(usize, f32, f32),
    Sigmoid(usize),
    Tanh(usize),
    HardSwish(usize),
}

#[derive(Serialize, Deserialize)]
struct SerializedGraph {
    nodes: Vec<SerializedNode>,
    input_params: Vec<usize>,
    result_nodes: Vec<usize>,
}

struct Flattener {
    ids: HashMap<*const NativeNode, usize>,
    nodes: Vec<SerializedNode>,
    blob: Vec<u8>,
}

impl Flattener {
    fn visit(&mut self, node: &Rc<NativeNode>) -> usize {
        let ptr = Rc::as_ptr(node);
        if let Some(&id) = self.ids.get(&ptr) {
            return id;
        }
        let op = match &node.op {
            NodeOp::Constant(buf) => {
                let (elem_dtype, bytes) = encode_buffer(buf);
                let offset = self.blob.len();
                self.blob.extend_from_slice(&bytes);
                SerializedOp::Constant { offset, len: bytes.len(), elem_dtype }
            }
            NodeOp::Parameter(_) => SerializedOp::Parameter,
            NodeOp::Add(a, b) => SerializedOp::Add(self.visit(a), self.visit(b)),
            NodeOp::Mul(a, b) => SerializedOp::Mul(self.visit(a), self.visit(b)),
            NodeOp::Transpose { input, order } => {
                SerializedOp::Transpose { input: self.visit(input), order: order.clone() }
            }
            NodeOp::Pool { input, filter, stride, padding, is_max } => {
                SerializedOp::Pool { input: self.visit(input), filter: *filter, stride: *stride, padding: *padding, is_max: *is_max }
            }
            NodeOp::Conv2d { input, filter, bias, stride, padding, groups } => SerializedOp::Conv2d {
                input: self.visit(input),
                filter: self.visit(filter),
                bias: bias.as_ref().map(|b| self.visit(b)),
                stride: *stride,
                padding: *padding,
                groups: *groups,
            },
            NodeOp::ConvTranspose { input, filter, bias, stride, out_hw } => SerializedOp::ConvTranspose {
                input: self.visit(input),
                filter: self.visit(filter),
                bias: bias.as_ref().map(|b| self.visit(b)),
                stride: *stride,
                out_hw: *out_hw,
            },
            NodeOp::Concat { inputs, axis } => {
                let ids = inputs.iter().map(|n| self.visit(n)).collect();
                SerializedOp::Concat { inputs: ids, axis: *axis }
            }
            NodeOp::Reshape(input) => SerializedOp::Reshape(self.visit(input)),
            NodeOp::Softmax { input, axis } => SerializedOp::Softmax { input: self.visit(input), axis: *axis },
            NodeOp::Resize { input, out_hw, mode } => {
                SerializedOp::Resize { input: self.visit(input), out_hw: *out_hw, mode: *mode }
            }
            NodeOp::ReduceMean { input, axes, keep_dims } => {
                SerializedOp::ReduceMean { input: self.visit(input), axes: axes.clone(), keep_dims: *keep_dims }
            }
            NodeOp::Pad { input, begin, end } => {
                SerializedOp::Pad { input: self.visit(input), begin: begin.clone(), end: end.clone() }
            }
            NodeOp::ConvertToF32(input) => SerializedOp::ConvertToF32(self.visit(input)),
            NodeOp::Relu(input) => SerializedOp::Relu(self.visit(input)),
            NodeOp::Clamp(input, lo, hi) => SerializedOp::Clamp(self.visit(input), *lo, *hi),
            NodeOp::Sigmoid(input) => SerializedOp::Sigmoid(self.visit(input)),
            NodeOp::Tanh(input) => SerializedOp::Tanh(self.visit(input)),
            NodeOp::HardSwish(input) => SerializedOp::HardSwish(self.visit(input)),
        };
        self.nodes.push(SerializedNode { shape: node.shape(), dtype: node.dtype(), op });
        let id = self.nodes.len() - 1;
        self.ids.insert(ptr, id);
        id
    }
}

fn encode_buffer(buf: &NativeBuffer) -> (TargetType, Vec<u8>) {
    match buf {
        NativeBuffer::F32(v) => (TargetType::F32, v.iter().flat_map(|x| x.to_le_bytes()).collect()),
        NativeBuffer::F16(v) => (TargetType::F16, v.iter().flat_map(|x| x.to_le_bytes()).collect()),
        NativeBuffer::I32(v) => (TargetType::I32, v.iter().flat_map(|x| x.to_le_bytes()).collect()),
        NativeBuffer::I64(v) => (TargetType::I64, v.iter().flat_map(|x| x.to_le_bytes()).collect()),
    }
}

pub(crate) fn decode_buffer(elem_dtype: TargetType, bytes: &[u8]) -> NativeBuffer {
    match elem_dtype {
        TargetType::F32 => NativeBuffer::F32(bytes.chunks_exact(4).map(|c| f32::from_le_bytes(c.try_into().unwrap())).collect()),
        TargetType::F16 => NativeBuffer::F16(bytes.chunks_exact(2).map(|c| u16::from_le_bytes(c.try_into().unwrap())).collect()),
        TargetType::I32 => NativeBuffer::I32(bytes.chunks_exact(4).map(|c| i32::from_le_bytes(c.try_into().unwrap())).collect()),
        TargetType::I64 => NativeBuffer::I64(bytes.chunks_exact(8).map(|c| i64::from_le_bytes(c.try_into().unwrap())).collect()),
        other => unreachable!("native target never writes a constant of element type {other:?}"),
    }
}

fn bin_path(xml_path: &Path) -> std::path::PathBuf {
    xml_path.with_extension("bin")
}

pub fn save(xml_path: &Path, input_params: &[Rc<NativeNode>], result_nodes: &[Rc<NativeNode>]) -> Result<(), DelegateError> {
    let mut flattener = Flattener { ids: HashMap::new(), nodes: Vec::new(), blob: Vec::new() };
    let input_ids = input_params.iter().map(|n| flattener.visit(n)).collect();
    let result_ids = result_nodes.iter().map(|n| flattener.visit(n)).collect();

    let graph = SerializedGraph { nodes: flattener.nodes, input_params: input_ids, result_nodes: result_ids };
    let json = serde_json::to_vec_pretty(&graph).map_err(|e| DelegateError::TargetCompileError(e.to_string()))?;

    fs::write(xml_path, json)
        .map_err(|e| DelegateError::CacheWriteError { path: xml_path.display().to_string(), source: e })?;
    let bin_path = bin_path(xml_path);
    fs::write(&bin_path, &flattener.blob)
        .map_err(|e| DelegateError::CacheWriteError { path: bin_path.display().to_string(), source: e })?;
    Ok(())
}

pub fn load(xml_path: &Path) -> Result<(Vec<Rc<NativeNode>>, Vec<Rc<NativeNode>>), DelegateError> {
    let json = fs::read(xml_path)
        .map_err(|e| DelegateError::CacheReadError { path: xml_path.display().to_string(), source: e })?;
    let graph: SerializedGraph =
        serde_json::from_slice(&json).map_err(|e| DelegateError::TargetCompileError(e.to_string()))?;
    let bin_path = bin_path(xml_path);
    let blob = fs::read(&bin_path)
        .map_err(|e| DelegateError::CacheReadError { path: bin_path.display().to_string(), source: e })?;

    let mut built: Vec<Rc<NativeNode>> = Vec::with_capacity(graph.nodes.len());
    for serialized in &graph.nodes {
        let shape = serialized.shape.clone();
        let get = |i: usize| built[i].clone();
        let node = match &serialized.op {
            SerializedOp::Constant { offset, len, elem_dtype } => {
                let bytes = &blob[*offset..*offset + *len];
                let buf = decode_buffer(*elem_dtype, bytes);
                match buf {
                    NativeBuffer::F32(v) => NativeNode::constant_f32(shape, v),
                    NativeBuffer::F16(v) => NativeNode::constant_f16(shape, v),
                    NativeBuffer::I32(v) => NativeNode::constant_i32(shape, v),
                    NativeBuffer::I64(v) => NativeNode::constant_i64(shape, v),
                }
            }
            SerializedOp::Parameter => NativeNode::parameter(shape, serialized.dtype),
            SerializedOp::Add(a, b) => NativeNode::add(shape, get(*a), get(*b)),
            SerializedOp::Mul(a, b) => NativeNode::mul(shape, get(*a), get(*b)),
            SerializedOp::Transpose { input, order } => {
                let order: [usize; 4] = order.as_slice().try_into().map_err(|_| {
                    DelegateError::TargetCompileError("cached transpose order was not rank 4".to_string())
                })?;
                NativeNode::transpose(get(*input), &order)
            }
            SerializedOp::Pool { input, filter, stride, padding, is_max } => {
                NativeNode::pool(shape, get(*input), *filter, *stride, *padding, *is_max)
            }
            SerializedOp::Conv2d { input, filter, bias, stride, padding, groups } => {
                NativeNode::conv2d(shape, get(*input), get(*filter), bias.map(get), *stride, *padding, *groups)
            }
            SerializedOp::ConvTranspose { input, filter, bias, stride, out_hw } => {
                NativeNode::conv_transpose(shape, get(*input), get(*filter), bias.map(get), *stride, *out_hw)
            }
            SerializedOp::Concat { inputs, axis } => {
                NativeNode::concat(shape, inputs.iter().map(|&i| get(i)).collect(), *axis)
            }
            SerializedOp::Reshape(input) => NativeNode::reshape(shape, get(*input)),
            SerializedOp::Softmax { input, axis } => NativeNode::softmax(shape, get(*input), *axis),
            SerializedOp::Resize { input, out_hw, mode } => NativeNode::resize(shape, get(*input), *out_hw, *mode),
            SerializedOp::ReduceMean { input, axes, keep_dims } => {
                NativeNode::reduce_mean(shape, get(*input), axes.clone(), *keep_dims)
            }
            SerializedOp::Pad { input, begin, end } => NativeNode::pad(shape, get(*input), begin.clone(), end.clone()),
            SerializedOp::ConvertToF32(input) => NativeNode::convert_to_f32(shape, get(*input)),
            SerializedOp::Relu(input) => NativeNode::relu(get(*input)),
            SerializedOp::Clamp(input, lo, hi) => NativeNode::clamp(get(*input), *lo, *hi),
            SerializedOp::Sigmoid(input) => NativeNode::sigmoid(get(*input)),
            SerializedOp::Tanh(input) => NativeNode::tanh(get(*input)),
            SerializedOp::HardSwish(input) => NativeNode::hard_swish(get(*input)),
        };
        built.push(node);
    }

    let input_params = graph.input_params.iter().map(|&i| built[i].clone()).collect();
    let result_nodes = graph.result_nodes.iter().map(|&i| built[i].clone()).collect();
    Ok((input_params, result_nodes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_small_graph_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let xml_path = dir.path().join("m.xml");

        let param = NativeNode::parameter(vec![1, 4], TargetType::F32);
        let constant = NativeNode::constant_f32(vec![1, 4], vec![10.0, 20.0, 30.0, 40.0]);
        let sum = NativeNode::add(vec![1, 4], param.clone(), constant);

        save(&xml_path, &[param], &[sum]).unwrap();
        assert!(xml_path.exists());
        assert!(dir.path().join("m.bin").exists());

        let (loaded_inputs, loaded_outputs) = load(&xml_path).unwrap();
        assert_eq!(loaded_inputs.len(), 1);
        assert_eq!(loaded_outputs.len(), 1);

        loaded_inputs[0].bind(NativeBuffer::F32(vec![1.0, 2.0, 3.0, 4.0]));
        assert_eq!(*loaded_outputs[0].eval(), vec![11.0, 22.0, 33.0, 44.0]);
    }
}
