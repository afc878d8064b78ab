//! Grounded on `operations/src/reshape.cc`. `special_zero = false`: a zero in the shape
//! tensor is a literal zero-size dimension, not "keep this dim" (ยง4.3).

use crate::error::DelegateError;
use crate::host::HostNode;
use crate::ops::{BuildContext, OpAttributes, Translator};
use crate::target::native::NativeNode;

pub struct ReshapeTranslator;

impl Translator for ReshapeTranslator {
    fn build(&self, ctx: &mut BuildContext, node: &dyn HostNode) -> Result<(), DelegateError> {
        let inputs = node.inputs();
        let data = ctx.input(inputs[0])?;

        let new_shape = match node.attributes().clone() {
            OpAttributes::Reshape { new_shape } if !new_shape.is_empty() => new_shape,
            _ => ctx.host_ints(inputs[1])?,
        };

        let total: i64 = data.shape().iter().product::<usize>() as i64;
        let known_product: i64 = new_shape.iter().filter(|&&d| d > 0).product();
        let out_shape: Vec<usize> = new_shape
            .iter()
            .map(|&d| {
                if d == -1 {
                    (total / known_product.max(1)) as usize
                } else {
                    d as usize
                }
            })
            .collect();

        let out = NativeNode::reshape(out_shape, data);
        ctx.set_output(node.outputs()[0], out)
    }
}
