//! Grounded on `operations/src/mean.cc`. Axes are read from the constant reduction-axes
//! tensor at build time, not carried as a data-flow edge.

use crate::error::DelegateError;
use crate::host::HostNode;
use crate::ops::{BuildContext, OpAttributes, Translator};
use crate::target::native::NativeNode;

pub struct MeanTranslator;

impl Translator for MeanTranslator {
    fn build(&self, ctx: &mut BuildContext, node: &dyn HostNode) -> Result<(), DelegateError> {
        let inputs = node.inputs();
        let data = ctx.input(inputs[0])?;
        let axes_raw = ctx.host_ints(inputs[1])?;
        let rank = data.shape().len() as i64;
        let axes: Vec<usize> = axes_raw
            .iter()
            .map(|&a| if a < 0 { (rank + a) as usize } else { a as usize })
            .collect();

        let OpAttributes::Mean { keep_dims } = node.attributes().clone() else {
            return Err(DelegateError::UnsupportedAttribute {
                op: "mean".to_string(),
                detail: "expected Mean attributes".to_string(),
            });
        };

        let in_shape = data.shape();
        let out_shape: Vec<usize> = if keep_dims {
            in_shape
                .iter()
                .enumerate()
                .map(|(d, &s)| if axes.contains(&d) { 1 } else { s })
                .collect()
        } else {
            in_shape
                .iter()
                .enumerate()
                .filter(|(d, _)| !axes.contains(d))
                .map(|(_, &s)| s)
                .collect()
        };

        let out = NativeNode::reduce_mean(out_shape, data, axes, keep_dims);
        ctx.set_output(node.outputs()[0], out)
    }
}
