//! Grounded on `operations/src/softmax.cc`. The translator takes no `beta` -- only the probe
//! reads it, and rejects anything but 1.0 before this translator ever runs (ยง9, DESIGN.md
//! Open Question decision 2).

use crate::error::DelegateError;
use crate::host::HostNode;
use crate::ops::{BuildContext, Translator};
use crate::target::native::NativeNode;

pub struct SoftmaxTranslator;

impl Translator for SoftmaxTranslator {
    fn build(&self, ctx: &mut BuildContext, node: &dyn HostNode) -> Result<(), DelegateError> {
        let input = ctx.input(node.inputs()[0])?;
        let axis = input.shape().len() - 1;
        let shape = input.shape();
        let out = NativeNode::softmax(shape, input, axis);
        ctx.set_output(node.outputs()[0], out)
    }
}
