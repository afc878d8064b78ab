//! `NativeNode`: the `Rc`-shared node of the native reference target's graph, its closed
//! op-tag set (`NodeOp`), and the typed flat-buffer value representation (`NativeBuffer`).
//! Evaluation (`eval_buffer`) is a plain recursive walk -- not memoized, since every node in
//! a translated subgraph is visited exactly once per `Eval` in practice (one result tree per
//! output, no diamond-heavy fan-in at the scale this crate targets).

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::layout::{PadType, ResizeMode};
use crate::target::TargetNode;
use crate::types::TargetType;

use super::kernels;

/// The host-tensor-shaped value a constant or bound parameter carries, as flat, typed,
/// row-major storage.
#[derive(Clone, Debug)]
pub enum NativeBuffer {
    F32(Vec<f32>),
    F16(Vec<u16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
}

impl NativeBuffer {
    /// Every downstream kernel computes in `f32`; this is the one place storage precision is
    /// widened to it. For `F16`, this performs the actual binary16->binary32 decode -- by the
    /// time any arithmetic node sees these values they are genuine floats, not bit patterns.
    fn to_f32(&self) -> Vec<f32> {
        match self {
            NativeBuffer::F32(v) => v.clone(),
            NativeBuffer::F16(v) => v.iter().map(|&b| kernels::half_to_f32(b)).collect(),
            NativeBuffer::I32(v) => v.iter().map(|&x| x as f32).collect(),
            NativeBuffer::I64(v) => v.iter().map(|&x| x as f32).collect(),
        }
    }

    pub(crate) fn dtype(&self) -> TargetType {
        match self {
            NativeBuffer::F32(_) => TargetType::F32,
            NativeBuffer::F16(_) => TargetType::F16,
            NativeBuffer::I32(_) => TargetType::I32,
            NativeBuffer::I64(_) => TargetType::I64,
        }
    }
}

/// The closed set of node kinds the native target can build and evaluate -- one entry per
/// translator primitive in ยง4.3, dispatched by tag rather than open inheritance (ยง9).
pub(crate) enum NodeOp {
    Constant(NativeBuffer),
    /// Bound via [`NativeNode::bind`] before the first `eval()`/`Eval` that needs it.
    Parameter(RefCell<Option<NativeBuffer>>),
    Add(Rc<NativeNode>, Rc<NativeNode>),
    Mul(Rc<NativeNode>, Rc<NativeNode>),
    Transpose {
        input: Rc<NativeNode>,
        order: Vec<usize>,
    },
    Pool {
        input: Rc<NativeNode>,
        filter: (usize, usize),
        stride: (usize, usize),
        padding: PadType,
        is_max: bool,
    },
    Conv2d {
        input: Rc<NativeNode>,
        filter: Rc<NativeNode>,
        bias: Option<Rc<NativeNode>>,
        stride: (usize, usize),
        padding: PadType,
        groups: usize,
    },
    ConvTranspose {
        input: Rc<NativeNode>,
        filter: Rc<NativeNode>,
        bias: Option<Rc<NativeNode>>,
        stride: (usize, usize),
        out_hw: (usize, usize),
    },
    Concat {
        inputs: Vec<Rc<NativeNode>>,
        axis: usize,
    },
    Reshape(Rc<NativeNode>),
    Softmax {
        input: Rc<NativeNode>,
        axis: usize,
    },
    Resize {
        input: Rc<NativeNode>,
        out_hw: (usize, usize),
        mode: ResizeMode,
    },
    ReduceMean {
        input: Rc<NativeNode>,
        axes: Vec<usize>,
        #[allow(dead_code)]
        keep_dims: bool,
    },
    Pad {
        input: Rc<NativeNode>,
        begin: Vec<usize>,
        end: Vec<usize>,
    },
    ConvertToF32(Rc<NativeNode>),
    Relu(Rc<NativeNode>),
    Clamp(Rc<NativeNode>, f32, f32),
    Sigmoid(Rc<NativeNode>),
    Tanh(Rc<NativeNode>),
    HardSwish(Rc<NativeNode>),
}

/// One node of the native reference target's graph: the stand-in for an accelerator
/// library's `ov::Node`/single-output handle (ยง3 `TargetNode`).
pub struct NativeNode {
    pub(crate) op: NodeOp,
    shape: Vec<usize>,
    dtype: TargetType,
}

impl NativeNode {
    pub fn shape(&self) -> Vec<usize> {
        self.shape.clone()
    }

    pub fn dtype(&self) -> TargetType {
        self.dtype
    }

    pub fn constant_f32(shape: Vec<usize>, data: Vec<f32>) -> Rc<Self> {
        Rc::new(Self { op: NodeOp::Constant(NativeBuffer::F32(data)), shape, dtype: TargetType::F32 })
    }

    pub fn constant_f16(shape: Vec<usize>, data: Vec<u16>) -> Rc<Self> {
        Rc::new(Self { op: NodeOp::Constant(NativeBuffer::F16(data)), shape, dtype: TargetType::F16 })
    }

    pub fn constant_i32(shape: Vec<usize>, data: Vec<i32>) -> Rc<Self> {
        Rc::new(Self { op: NodeOp::Constant(NativeBuffer::I32(data)), shape, dtype: TargetType::I32 })
    }

    pub fn constant_i64(shape: Vec<usize>, data: Vec<i64>) -> Rc<Self> {
        Rc::new(Self { op: NodeOp::Constant(NativeBuffer::I64(data)), shape, dtype: TargetType::I64 })
    }

    pub fn parameter(shape: Vec<usize>, dtype: TargetType) -> Rc<Self> {
        Rc::new(Self { op: NodeOp::Parameter(RefCell::new(None)), shape, dtype })
    }

    /// Bind a runtime value to a parameter node ahead of `eval()`. A no-op on any other node
    /// kind (mirrors the target library silently ignoring a set on a non-input port).
    pub fn bind(&self, buffer: NativeBuffer) {
        if let NodeOp::Parameter(cell) = &self.op {
            *cell.borrow_mut() = Some(buffer);
        }
    }

    pub fn add(shape: Vec<usize>, a: Rc<Self>, b: Rc<Self>) -> Rc<Self> {
        Rc::new(Self { op: NodeOp::Add(a, b), shape, dtype: TargetType::F32 })
    }

    pub fn mul(shape: Vec<usize>, a: Rc<Self>, b: Rc<Self>) -> Rc<Self> {
        Rc::new(Self { op: NodeOp::Mul(a, b), shape, dtype: TargetType::F32 })
    }

    pub fn transpose(input: Rc<Self>, order: &[usize; 4]) -> Rc<Self> {
        let shape: Vec<usize> = order.iter().map(|&i| input.shape[i]).collect();
        Rc::new(Self { op: NodeOp::Transpose { input, order: order.to_vec() }, shape, dtype: TargetType::F32 })
    }

    pub fn pool(
        shape: Vec<usize>,
        input: Rc<Self>,
        filter: (usize, usize),
        stride: (usize, usize),
        padding: PadType,
        is_max: bool,
    ) -> Rc<Self> {
        Rc::new(Self { op: NodeOp::Pool { input, filter, stride, padding, is_max }, shape, dtype: TargetType::F32 })
    }

    pub fn conv2d(
        shape: Vec<usize>,
        input: Rc<Self>,
        filter: Rc<Self>,
        bias: Option<Rc<Self>>,
        stride: (usize, usize),
        padding: PadType,
        groups: usize,
    ) -> Rc<Self> {
        Rc::new(Self {
            op: NodeOp::Conv2d { input, filter, bias, stride, padding, groups },
            shape,
            dtype: TargetType::F32,
        })
    }

    pub fn conv_transpose(
        shape: Vec<usize>,
        input: Rc<Self>,
        filter: Rc<Self>,
        bias: Option<Rc<Self>>,
        stride: (usize, usize),
        out_hw: (usize, usize),
    ) -> Rc<Self> {
        Rc::new(Self {
            op: NodeOp::ConvTranspose { input, filter, bias, stride, out_hw },
            shape,
            dtype: TargetType::F32,
        })
    }

    pub fn concat(shape: Vec<usize>, inputs: Vec<Rc<Self>>, axis: usize) -> Rc<Self> {
        Rc::new(Self { op: NodeOp::Concat { inputs, axis }, shape, dtype: TargetType::F32 })
    }

    pub fn reshape(shape: Vec<usize>, data: Rc<Self>) -> Rc<Self> {
        Rc::new(Self { op: NodeOp::Reshape(data), shape, dtype: TargetType::F32 })
    }

    pub fn softmax(shape: Vec<usize>, input: Rc<Self>, axis: usize) -> Rc<Self> {
        Rc::new(Self { op: NodeOp::Softmax { input, axis }, shape, dtype: TargetType::F32 })
    }

    pub fn resize(shape: Vec<usize>, input: Rc<Self>, out_hw: (usize, usize), mode: ResizeMode) -> Rc<Self> {
        Rc::new(Self { op: NodeOp::Resize { input, out_hw, mode }, shape, dtype: TargetType::F32 })
    }

    pub fn reduce_mean(shape: Vec<usize>, input: Rc<Self>, axes: Vec<usize>, keep_dims: bool) -> Rc<Self> {
        Rc::new(Self { op: NodeOp::ReduceMean { input, axes, keep_dims }, shape, dtype: TargetType::F32 })
    }

    pub fn pad(shape: Vec<usize>, input: Rc<Self>, begin: Vec<usize>, end: Vec<usize>) -> Rc<Self> {
        Rc::new(Self { op: NodeOp::Pad { input, begin, end }, shape, dtype: TargetType::F32 })
    }

    pub fn convert_to_f32(shape: Vec<usize>, input: Rc<Self>) -> Rc<Self> {
        Rc::new(Self { op: NodeOp::ConvertToF32(input), shape, dtype: TargetType::F32 })
    }

    pub fn relu(input: Rc<Self>) -> Rc<Self> {
        let shape = input.shape.clone();
        Rc::new(Self { op: NodeOp::Relu(input), shape, dtype: TargetType::F32 })
    }

    pub fn clamp(input: Rc<Self>, lo: f32, hi: f32) -> Rc<Self> {
        let shape = input.shape.clone();
        Rc::new(Self { op: NodeOp::Clamp(input, lo, hi), shape, dtype: TargetType::F32 })
    }

    pub fn sigmoid(input: Rc<Self>) -> Rc<Self> {
        let shape = input.shape.clone();
        Rc::new(Self { op: NodeOp::Sigmoid(input), shape, dtype: TargetType::F32 })
    }

    pub fn tanh(input: Rc<Self>) -> Rc<Self> {
        let shape = input.shape.clone();
        Rc::new(Self { op: NodeOp::Tanh(input), shape, dtype: TargetType::F32 })
    }

    pub fn hard_swish(input: Rc<Self>) -> Rc<Self> {
        let shape = input.shape.clone();
        Rc::new(Self { op: NodeOp::HardSwish(input), shape, dtype: TargetType::F32 })
    }

    /// Entry point for a host-facing read: evaluate the whole subtree rooted at `self`.
    pub fn eval(&self) -> Rc<Vec<f32>> {
        Rc::new(self.eval_buffer())
    }

    pub(crate) fn eval_buffer(&self) -> Vec<f32> {
        match &self.op {
            NodeOp::Constant(buf) => buf.to_f32(),
            NodeOp::Parameter(cell) => cell
                .borrow()
                .as_ref()
                .unwrap_or_else(|| panic!("native target: parameter node read before bind()"))
                .to_f32(),
            NodeOp::Add(a, b) => {
                kernels::broadcast_binary(&a.eval_buffer(), &a.shape, &b.eval_buffer(), &b.shape, &self.shape, |x, y| x + y)
            }
            NodeOp::Mul(a, b) => {
                kernels::broadcast_binary(&a.eval_buffer(), &a.shape, &b.eval_buffer(), &b.shape, &self.shape, |x, y| x * y)
            }
            NodeOp::Transpose { input, order } => kernels::transpose(&input.eval_buffer(), &input.shape, order),
            NodeOp::Pool { input, filter, stride, padding, is_max } => {
                kernels::pool2d(&input.eval_buffer(), &input.shape, *filter, *stride, *padding, *is_max, &self.shape)
            }
            NodeOp::Conv2d { input, filter, bias, stride, padding, groups } => kernels::conv2d(
                &input.eval_buffer(),
                &input.shape,
                &filter.eval_buffer(),
                &filter.shape,
                bias.as_ref().map(|b| b.eval_buffer()).as_deref(),
                *stride,
                *padding,
                *groups,
                &self.shape,
            ),
            NodeOp::ConvTranspose { input, filter, bias, stride, out_hw } => kernels::conv_transpose(
                &input.eval_buffer(),
                &input.shape,
                &filter.eval_buffer(),
                &filter.shape,
                bias.as_ref().map(|b| b.eval_buffer()).as_deref(),
                *stride,
                *out_hw,
                &self.shape,
            ),
            NodeOp::Concat { inputs, axis } => {
                let bufs: Vec<(Vec<f32>, Vec<usize>)> =
                    inputs.iter().map(|n| (n.eval_buffer(), n.shape.clone())).collect();
                let refs: Vec<(&[f32], &[usize])> = bufs.iter().map(|(b, s)| (b.as_slice(), s.as_slice())).collect();
                kernels::concat(&refs, *axis, &self.shape)
            }
            NodeOp::Reshape(input) => input.eval_buffer(),
            NodeOp::Softmax { input, axis } => kernels::softmax(&input.eval_buffer(), &input.shape, *axis),
            NodeOp::Resize { input, out_hw, mode } => {
                kernels::resize_bilinear(&input.eval_buffer(), &input.shape, *out_hw, *mode, &self.shape)
            }
            NodeOp::ReduceMean { input, axes, .. } => kernels::reduce_mean(&input.eval_buffer(), &input.shape, axes),
            NodeOp::Pad { input, begin, end } => kernels::pad(&input.eval_buffer(), &input.shape, begin, end),
            NodeOp::ConvertToF32(input) => input.eval_buffer(),
            NodeOp::Relu(input) => kernels::relu(&input.eval_buffer()),
            NodeOp::Clamp(input, lo, hi) => kernels::clamp(&input.eval_buffer(), *lo, *hi),
            NodeOp::Sigmoid(input) => kernels::sigmoid(&input.eval_buffer()),
            NodeOp::Tanh(input) => kernels::tanh(&input.eval_buffer()),
            NodeOp::HardSwish(input) => kernels::hard_swish(&input.eval_buffer()),
        }
    }
}

impl TargetNode for NativeNode {
    fn shape(&self) -> Vec<usize> {
        NativeNode::shape(self)
    }

    fn dtype(&self) -> TargetType {
        NativeNode::dtype(self)
    }

    fn as_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relu_zeroes_negative_values() {
        let input = NativeNode::constant_f32(vec![3], vec![-1.0, 0.0, 2.0]);
        let out = NativeNode::relu(input);
        assert_eq!(*out.eval(), vec![0.0, 0.0, 2.0]);
    }

    #[test]
    fn bind_then_eval_reads_back_the_bound_buffer() {
        let param = NativeNode::parameter(vec![2], TargetType::F32);
        param.bind(NativeBuffer::F32(vec![3.0, 4.0]));
        assert_eq!(*param.eval(), vec![3.0, 4.0]);
    }

    #[test]
    #[should_panic(expected = "read before bind")]
    fn unbound_parameter_panics_on_eval() {
        let param = NativeNode::parameter(vec![2], TargetType::F32);
        param.eval();
    }
}
