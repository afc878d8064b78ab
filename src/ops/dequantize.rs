//! Grounded on `operations/src/dequantize.cc`: a single `Convert` to 32-bit float.

use crate::error::DelegateError;
use crate::host::HostNode;
use crate::ops::{BuildContext, Translator};
use crate::target::native::NativeNode;

pub struct DequantizeTranslator;

impl Translator for DequantizeTranslator {
    fn build(&self, ctx: &mut BuildContext, node: &dyn HostNode) -> Result<(), DelegateError> {
        let input = ctx.input(node.inputs()[0])?;
        let shape = input.shape();
        let out = NativeNode::convert_to_f32(shape, input);
        ctx.set_output(node.outputs()[0], out)
    }
}
