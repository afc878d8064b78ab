//! Operator translators: one per supported op kind (ยง4.3), dispatched by a closed tag set
//! rather than open inheritance -- grounded on the teacher's `Op<F>` trait / `LookupOp` enum.

pub mod activations;
pub mod add_mul;
pub mod concat;
pub mod conv;
pub mod dequantize;
pub mod mean;
pub mod pad;
pub mod pool;
pub mod reshape;
pub mod resize_bilinear;
pub mod softmax;
pub mod transpose_conv;

use std::rc::Rc;

use crate::error::DelegateError;
use crate::host::HostContext;
use crate::host::HostNode;
use crate::layout::{FusedActivation, SourcePadding};
use crate::node_manager::NodeManager;
use crate::target::native::NativeNode;
use crate::target::TargetNode as _;

/// Op-kind-specific attribute blob (ยง9: a sum type, never an untyped escape hatch).
#[derive(Clone, Debug)]
pub enum OpAttributes {
    None,
    BinaryElementwise {
        activation: FusedActivation,
    },
    Pool2d {
        filter: (usize, usize),
        stride: (usize, usize),
        padding: SourcePadding,
        activation: FusedActivation,
    },
    Conv2d {
        stride: (usize, usize),
        padding: SourcePadding,
        activation: FusedActivation,
    },
    TransposeConv {
        stride: (usize, usize),
        activation: FusedActivation,
    },
    Concatenation {
        axis: i64,
        activation: FusedActivation,
    },
    Reshape {
        new_shape: Vec<i64>,
    },
    Softmax {
        beta: f32,
    },
    ResizeBilinear {
        align_corners: bool,
        half_pixel_centers: bool,
    },
    Mean {
        keep_dims: bool,
    },
    Pad,
    Dequantize,
    Activation,
}

/// Everything a translator needs: the host context to pull shapes/constants from, the node
/// manager to read producers of earlier inputs from and register its own output into.
pub struct BuildContext<'a> {
    pub host: &'a dyn HostContext,
    pub nodes: &'a mut NodeManager,
}

impl<'a> BuildContext<'a> {
    /// Fetch the already-registered producer for a source tensor index.
    pub fn input(&self, tensor_index: usize) -> Result<Rc<NativeNode>, DelegateError> {
        let node = self.nodes.get(tensor_index)?;
        node.as_any_rc()
            .downcast::<NativeNode>()
            .map_err(|_| {
                DelegateError::TargetCompileError(format!(
                    "tensor {tensor_index} was not produced by the native target"
                ))
            })
    }

    /// Register `node` as the producer of `tensor_index` (the translator's single output).
    pub fn set_output(&mut self, tensor_index: usize, node: Rc<NativeNode>) -> Result<(), DelegateError> {
        self.nodes.set(tensor_index, node)
    }

    /// Read a constant tensor's data as a vector of integers, for the tensors several
    /// translators treat as build-time shape/axis arguments (reduction axes, new shape,
    /// padding amounts, resize target size) rather than as data-flow edges.
    pub fn host_ints(&self, tensor_index: usize) -> Result<Vec<i64>, DelegateError> {
        let tensor = self.host.tensor(tensor_index).ok_or(DelegateError::MissingProducer(tensor_index))?;
        let bytes = tensor.data().ok_or(DelegateError::MissingProducer(tensor_index))?;
        use crate::types::SourceType;
        Ok(match tensor.element_type() {
            SourceType::I32 => bytes
                .chunks_exact(4)
                .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]) as i64)
                .collect(),
            SourceType::I64 => bytes
                .chunks_exact(8)
                .map(|c| i64::from_le_bytes(c.try_into().unwrap()))
                .collect(),
            other => {
                return Err(DelegateError::UnsupportedType {
                    tensor: tensor_index,
                    ty: format!("{other:?}"),
                })
            }
        })
    }

    /// The declared shape of a host tensor, regardless of whether it has been registered as
    /// a target-graph node yet.
    pub fn host_shape(&self, tensor_index: usize) -> Result<Vec<usize>, DelegateError> {
        self.host
            .tensor(tensor_index)
            .map(|t| t.shape().to_vec())
            .ok_or(DelegateError::MissingProducer(tensor_index))
    }
}

/// Single entry point a translator implements (ยง4.3, ยง9): consume inputs + attrs, register
/// exactly one output producer.
pub trait Translator {
    fn build(&self, ctx: &mut BuildContext, node: &dyn HostNode) -> Result<(), DelegateError>;
}

/// The closed set of op kinds this crate translates (ยง6).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OpKind {
    Add,
    Mul,
    AveragePool2d,
    MaxPool2d,
    Conv2d,
    DepthwiseConv2d,
    TransposeConv,
    Concatenation,
    Reshape,
    Softmax,
    ResizeBilinear,
    Mean,
    Pad,
    Dequantize,
    Logistic,
    Relu,
    Relu6,
    HardSwish,
    Tanh,
}

impl OpKind {
    pub fn parse(name: &str) -> Option<OpKind> {
        Some(match name {
            "ADD" => OpKind::Add,
            "MUL" => OpKind::Mul,
            "AVERAGE_POOL_2D" => OpKind::AveragePool2d,
            "MAX_POOL_2D" => OpKind::MaxPool2d,
            "CONV_2D" => OpKind::Conv2d,
            "DEPTHWISE_CONV_2D" => OpKind::DepthwiseConv2d,
            "TRANSPOSE_CONV" => OpKind::TransposeConv,
            "CONCATENATION" => OpKind::Concatenation,
            "RESHAPE" => OpKind::Reshape,
            "SOFTMAX" => OpKind::Softmax,
            "RESIZE_BILINEAR" => OpKind::ResizeBilinear,
            "MEAN" => OpKind::Mean,
            "PAD" => OpKind::Pad,
            "DEQUANTIZE" => OpKind::Dequantize,
            "LOGISTIC" => OpKind::Logistic,
            "RELU" => OpKind::Relu,
            "RELU6" => OpKind::Relu6,
            "HARD_SWISH" => OpKind::HardSwish,
            "TANH" => OpKind::Tanh,
            _ => return None,
        })
    }
}

/// Dispatch to the translator for `kind`.
pub fn translator_for(kind: OpKind) -> Box<dyn Translator> {
    match kind {
        OpKind::Add => Box::new(add_mul::AddTranslator),
        OpKind::Mul => Box::new(add_mul::MulTranslator),
        OpKind::AveragePool2d => Box::new(pool::AveragePoolTranslator),
        OpKind::MaxPool2d => Box::new(pool::MaxPoolTranslator),
        OpKind::Conv2d => Box::new(conv::Conv2dTranslator),
        OpKind::DepthwiseConv2d => Box::new(conv::DepthwiseConv2dTranslator),
        OpKind::TransposeConv => Box::new(transpose_conv::TransposeConvTranslator),
        OpKind::Concatenation => Box::new(concat::ConcatenationTranslator),
        OpKind::Reshape => Box::new(reshape::ReshapeTranslator),
        OpKind::Softmax => Box::new(softmax::SoftmaxTranslator),
        OpKind::ResizeBilinear => Box::new(resize_bilinear::ResizeBilinearTranslator),
        OpKind::Mean => Box::new(mean::MeanTranslator),
        OpKind::Pad => Box::new(pad::PadTranslator),
        OpKind::Dequantize => Box::new(dequantize::DequantizeTranslator),
        OpKind::Logistic => Box::new(activations::LogisticTranslator),
        OpKind::Relu => Box::new(activations::ReluTranslator),
        OpKind::Relu6 => Box::new(activations::Relu6Translator),
        OpKind::HardSwish => Box::new(activations::HardSwishTranslator),
        OpKind::Tanh => Box::new(activations::TanhTranslator),
    }
}
