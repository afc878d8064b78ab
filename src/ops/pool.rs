//! Grounded on `operations/src/average_pool_2d.cc` and `operations/src/maxpool2d.cc`.

use crate::error::DelegateError;
use crate::host::HostNode;
use crate::layout::{apply_activation, transpose, LayoutConversion};
use crate::ops::{BuildContext, OpAttributes, Translator};
use crate::target::native::NativeNode;

fn pool_out_dim(input: usize, filter: usize, stride: usize, padding: crate::layout::PadType) -> usize {
    match padding {
        crate::layout::PadType::Valid => (input - filter) / stride + 1,
        crate::layout::PadType::SameUpper => input.div_ceil(stride),
    }
}

fn build_pool(ctx: &mut BuildContext, node: &dyn HostNode, is_max: bool) -> Result<(), DelegateError> {
    let input = ctx.input(node.inputs()[0])?;
    let OpAttributes::Pool2d {
        filter,
        stride,
        padding,
        activation,
    } = node.attributes().clone()
    else {
        return Err(DelegateError::UnsupportedAttribute {
            op: "pool2d".to_string(),
            detail: "expected Pool2d attributes".to_string(),
        });
    };
    let padding = crate::layout::translate_padding(padding)?;
    let nchw = transpose(input, LayoutConversion::NhwcToNchw);
    let in_shape = nchw.shape();
    let oh = pool_out_dim(in_shape[2], filter.0, stride.0, padding);
    let ow = pool_out_dim(in_shape[3], filter.1, stride.1, padding);
    let out_shape = vec![in_shape[0], in_shape[1], oh, ow];
    let pooled = NativeNode::pool(out_shape, nchw, filter, stride, padding, is_max);
    let nhwc = transpose(pooled, LayoutConversion::NchwToNhwc);
    let out = apply_activation(nhwc, activation);
    ctx.set_output(node.outputs()[0], out)
}

pub struct AveragePoolTranslator;

impl Translator for AveragePoolTranslator {
    fn build(&self, ctx: &mut BuildContext, node: &dyn HostNode) -> Result<(), DelegateError> {
        build_pool(ctx, node, false)
    }
}

pub struct MaxPoolTranslator;

impl Translator for MaxPoolTranslator {
    fn build(&self, ctx: &mut BuildContext, node: &dyn HostNode) -> Result<(), DelegateError> {
        build_pool(ctx, node, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::mock::{MockContext, MockNode};
    use crate::layout::{FusedActivation, SourcePadding};
    use crate::node_manager::NodeManager;

    #[test]
    fn max_pool_over_whole_2x2_input_picks_the_max() {
        let host = MockContext::new();
        let mut nodes = NodeManager::new();
        nodes.set(0, NativeNode::constant_f32(vec![1, 2, 2, 1], vec![1.0, 2.0, 3.0, 4.0])).unwrap();
        let mut ctx = BuildContext { host: &host, nodes: &mut nodes };
        let node = MockNode {
            id: 0,
            op_kind: "MAX_POOL_2D".to_string(),
            inputs: vec![0],
            outputs: vec![1],
            attributes: OpAttributes::Pool2d {
                filter: (2, 2),
                stride: (2, 2),
                padding: SourcePadding::Valid,
                activation: FusedActivation::None,
            },
        };
        MaxPoolTranslator.build(&mut ctx, &node).unwrap();
        let out = ctx.input(1).unwrap();
        assert_eq!(out.shape(), vec![1, 1, 1, 1]);
        assert_eq!(*out.eval(), vec![4.0]);
    }

    #[test]
    fn average_pool_over_whole_2x2_input_averages() {
        let host = MockContext::new();
        let mut nodes = NodeManager::new();
        nodes.set(0, NativeNode::constant_f32(vec![1, 2, 2, 1], vec![1.0, 2.0, 3.0, 4.0])).unwrap();
        let mut ctx = BuildContext { host: &host, nodes: &mut nodes };
        let node = MockNode {
            id: 0,
            op_kind: "AVERAGE_POOL_2D".to_string(),
            inputs: vec![0],
            outputs: vec![1],
            attributes: OpAttributes::Pool2d {
                filter: (2, 2),
                stride: (2, 2),
                padding: SourcePadding::Valid,
                activation: FusedActivation::None,
            },
        };
        AveragePoolTranslator.build(&mut ctx, &node).unwrap();
        let out = ctx.input(1).unwrap();
        assert_eq!(*out.eval(), vec![2.5]);
    }
}
