//! Grounded on `operations/src/concat.cc`.

use crate::error::DelegateError;
use crate::host::HostNode;
use crate::layout::apply_activation;
use crate::ops::{BuildContext, OpAttributes, Translator};
use crate::target::native::NativeNode;

pub struct ConcatenationTranslator;

impl Translator for ConcatenationTranslator {
    fn build(&self, ctx: &mut BuildContext, node: &dyn HostNode) -> Result<(), DelegateError> {
        let OpAttributes::Concatenation { axis, activation } = node.attributes().clone() else {
            return Err(DelegateError::UnsupportedAttribute {
                op: "concatenation".to_string(),
                detail: "expected Concatenation attributes".to_string(),
            });
        };
        let inputs: Vec<_> = node
            .inputs()
            .iter()
            .map(|&i| ctx.input(i))
            .collect::<Result<_, _>>()?;
        let rank = inputs[0].shape().len() as i64;
        let axis = if axis < 0 { (rank + axis) as usize } else { axis as usize };

        let mut out_shape = inputs[0].shape();
        out_shape[axis] = inputs.iter().map(|n| n.shape()[axis]).sum();

        let out = NativeNode::concat(out_shape, inputs, axis);
        let out = apply_activation(out, activation);
        ctx.set_output(node.outputs()[0], out)
    }
}
