//! Grounded on `operations/src/relu.cc`, `hardswish.cc`, `tanh.cc`, `logistic.cc`. Each of
//! these is, in the original, implemented as a call into `ApplyActivation` with a fixed
//! activation kind rather than a bespoke op -- this crate preserves that by routing standalone
//! activation translators through the same `layout::apply_activation` helper binary/pool ops
//! use for their fused activation.

use crate::error::DelegateError;
use crate::host::HostNode;
use crate::ops::{BuildContext, Translator};
use crate::target::native::NativeNode;

pub struct ReluTranslator;

impl Translator for ReluTranslator {
    fn build(&self, ctx: &mut BuildContext, node: &dyn HostNode) -> Result<(), DelegateError> {
        let input = ctx.input(node.inputs()[0])?;
        ctx.set_output(node.outputs()[0], NativeNode::relu(input))
    }
}

pub struct Relu6Translator;

impl Translator for Relu6Translator {
    fn build(&self, ctx: &mut BuildContext, node: &dyn HostNode) -> Result<(), DelegateError> {
        let input = ctx.input(node.inputs()[0])?;
        ctx.set_output(node.outputs()[0], NativeNode::clamp(input, 0.0, 6.0))
    }
}

pub struct LogisticTranslator;

impl Translator for LogisticTranslator {
    fn build(&self, ctx: &mut BuildContext, node: &dyn HostNode) -> Result<(), DelegateError> {
        let input = ctx.input(node.inputs()[0])?;
        ctx.set_output(node.outputs()[0], NativeNode::sigmoid(input))
    }
}

pub struct TanhTranslator;

impl Translator for TanhTranslator {
    fn build(&self, ctx: &mut BuildContext, node: &dyn HostNode) -> Result<(), DelegateError> {
        let input = ctx.input(node.inputs()[0])?;
        ctx.set_output(node.outputs()[0], NativeNode::tanh(input))
    }
}

pub struct HardSwishTranslator;

impl Translator for HardSwishTranslator {
    fn build(&self, ctx: &mut BuildContext, node: &dyn HostNode) -> Result<(), DelegateError> {
        let input = ctx.input(node.inputs()[0])?;
        ctx.set_output(node.outputs()[0], NativeNode::hard_swish(input))
    }
}
