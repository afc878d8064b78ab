//! Grounded on `operations/src/pad.cc`. The padding tensor is shape [rank, 2]; even
//! (row, 0) entries are `pads_begin`, odd (row, 1) entries are `pads_end`.

use itertools::Itertools;

use crate::error::DelegateError;
use crate::host::HostNode;
use crate::ops::{BuildContext, Translator};
use crate::target::native::NativeNode;

pub struct PadTranslator;

impl Translator for PadTranslator {
    fn build(&self, ctx: &mut BuildContext, node: &dyn HostNode) -> Result<(), DelegateError> {
        let inputs = node.inputs();
        let data = ctx.input(inputs[0])?;
        let padding = ctx.host_ints(inputs[1])?;

        let (begin, end): (Vec<usize>, Vec<usize>) = padding
            .into_iter()
            .map(|v| v as usize)
            .tuples()
            .unzip();

        let out_shape: Vec<usize> = data
            .shape()
            .iter()
            .enumerate()
            .map(|(d, &s)| s + begin[d] + end[d])
            .collect();

        let out = NativeNode::pad(out_shape, data, begin, end);
        ctx.set_output(node.outputs()[0], out)
    }
}
