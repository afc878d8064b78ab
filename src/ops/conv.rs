//! Grounded on `operations/src/conv_2d.cc` and `operations/src/depthwise_conv2d.cc`.

use crate::error::DelegateError;
use crate::host::HostNode;
use crate::layout::{apply_activation, transpose, LayoutConversion, PadType};
use crate::ops::{BuildContext, OpAttributes, Translator};
use crate::target::native::NativeNode;

fn conv_out_dim(input: usize, filter: usize, stride: usize, padding: PadType) -> usize {
    match padding {
        PadType::Valid => (input - filter) / stride + 1,
        PadType::SameUpper => input.div_ceil(stride),
    }
}

/// Shared build for Conv2D (filter layout OHWI) and DepthwiseConv2D (filter layout IHWO),
/// differing only in the filter's layout conversion and how the group count is derived.
fn build_conv(
    ctx: &mut BuildContext,
    node: &dyn HostNode,
    filter_conversion: LayoutConversion,
) -> Result<(), DelegateError> {
    let inputs = node.inputs();
    let input = ctx.input(inputs[0])?;
    let filter = ctx.input(inputs[1])?;
    let bias = if inputs.len() > 2 {
        Some(ctx.input(inputs[2])?)
    } else {
        None
    };

    let OpAttributes::Conv2d {
        stride,
        padding,
        activation,
    } = node.attributes().clone()
    else {
        return Err(DelegateError::UnsupportedAttribute {
            op: "conv2d".to_string(),
            detail: "expected Conv2d attributes".to_string(),
        });
    };
    let padding = crate::layout::translate_padding(padding)?;

    let nchw_input = transpose(input, LayoutConversion::NhwcToNchw);
    let oihw_filter = transpose(filter, filter_conversion);

    let in_shape = nchw_input.shape();
    let filter_shape = oihw_filter.shape();
    let groups = in_shape[1] / filter_shape[1];
    let cout = filter_shape[0];

    let oh = conv_out_dim(in_shape[2], filter_shape[2], stride.0, padding);
    let ow = conv_out_dim(in_shape[3], filter_shape[3], stride.1, padding);
    let out_shape = vec![in_shape[0], cout, oh, ow];

    let conv = NativeNode::conv2d(out_shape, nchw_input, oihw_filter, bias, stride, padding, groups);
    let nhwc = transpose(conv, LayoutConversion::NchwToNhwc);
    let out = apply_activation(nhwc, activation);
    ctx.set_output(node.outputs()[0], out)
}

pub struct Conv2dTranslator;

impl Translator for Conv2dTranslator {
    fn build(&self, ctx: &mut BuildContext, node: &dyn HostNode) -> Result<(), DelegateError> {
        build_conv(ctx, node, LayoutConversion::OhwiToOihw)
    }
}

pub struct DepthwiseConv2dTranslator;

impl Translator for DepthwiseConv2dTranslator {
    fn build(&self, ctx: &mut BuildContext, node: &dyn HostNode) -> Result<(), DelegateError> {
        build_conv(ctx, node, LayoutConversion::IhwoToOihw)
    }
}
