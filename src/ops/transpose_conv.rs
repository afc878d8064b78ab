//! Grounded on `operations/src/transpose_conv.cc`. Inputs, in source order: output_shape
//! (i32), filter (IHWO), input (NHWC), optional bias. Dilations are fixed to (1,1).

use crate::error::DelegateError;
use crate::host::HostNode;
use crate::layout::{apply_activation, transpose, LayoutConversion};
use crate::ops::{BuildContext, OpAttributes, Translator};
use crate::target::native::NativeNode;

pub struct TransposeConvTranslator;

impl Translator for TransposeConvTranslator {
    fn build(&self, ctx: &mut BuildContext, node: &dyn HostNode) -> Result<(), DelegateError> {
        let inputs = node.inputs();
        if inputs.len() != 3 && inputs.len() != 4 {
            return Err(DelegateError::UnsupportedAttribute {
                op: "transpose_conv".to_string(),
                detail: format!("expected 3 or 4 inputs, got {}", inputs.len()),
            });
        }
        let output_shape_tensor = ctx.host_ints(inputs[0])?;
        let filter = ctx.input(inputs[1])?;
        let input = ctx.input(inputs[2])?;
        let bias = if inputs.len() == 4 { Some(ctx.input(inputs[3])?) } else { None };

        let OpAttributes::TransposeConv { stride, activation } = node.attributes().clone() else {
            return Err(DelegateError::UnsupportedAttribute {
                op: "transpose_conv".to_string(),
                detail: "expected TransposeConv attributes".to_string(),
            });
        };

        let out_h = output_shape_tensor[1] as usize;
        let out_w = output_shape_tensor[2] as usize;

        let nchw_input = transpose(input, LayoutConversion::NhwcToNchw);
        let oihw_filter = transpose(filter, LayoutConversion::IhwoToOihw);
        let filter_shape = oihw_filter.shape();
        let n = nchw_input.shape()[0];
        let cout = filter_shape[0];

        let out_shape = vec![n, cout, out_h, out_w];
        let deconv = NativeNode::conv_transpose(
            out_shape,
            nchw_input,
            oihw_filter,
            bias,
            stride,
            (out_h, out_w),
        );
        let nhwc = transpose(deconv, LayoutConversion::NchwToNhwc);
        let out = apply_activation(nhwc, activation);
        ctx.set_output(node.outputs()[0], out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::mock::{MockContext, MockNode, MockTensor};
    use crate::host::AllocationClass;
    use crate::node_manager::NodeManager;
    use crate::types::SourceType;

    fn i32_bytes(values: &[i32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn single_pixel_input_scatters_across_a_2x2_filter() {
        let mut host = MockContext::new();
        host.add_tensor(MockTensor::new(
            0,
            SourceType::I32,
            vec![4],
            AllocationClass::MmapRo,
            Some(i32_bytes(&[1, 2, 2, 1])),
            "output_shape",
        ));
        let mut nodes = NodeManager::new();
        nodes.set(1, NativeNode::constant_f32(vec![1, 2, 2, 1], vec![1.0; 4])).unwrap();
        nodes.set(2, NativeNode::constant_f32(vec![1, 1, 1, 1], vec![2.0])).unwrap();
        let mut ctx = BuildContext { host: &host, nodes: &mut nodes };
        let node = MockNode {
            id: 0,
            op_kind: "TRANSPOSE_CONV".to_string(),
            inputs: vec![0, 1, 2],
            outputs: vec![3],
            attributes: OpAttributes::TransposeConv { stride: (1, 1), activation: crate::layout::FusedActivation::None },
        };
        TransposeConvTranslator.build(&mut ctx, &node).unwrap();
        let out = ctx.input(3).unwrap();
        assert_eq!(out.shape(), vec![1, 2, 2, 1]);
        assert_eq!(*out.eval(), vec![2.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    fn relu6_activation_clips_the_biased_output() {
        let mut host = MockContext::new();
        host.add_tensor(MockTensor::new(
            0,
            SourceType::I32,
            vec![4],
            AllocationClass::MmapRo,
            Some(i32_bytes(&[1, 2, 2, 1])),
            "output_shape",
        ));
        let mut nodes = NodeManager::new();
        nodes.set(1, NativeNode::constant_f32(vec![1, 2, 2, 1], vec![1.0; 4])).unwrap();
        nodes.set(2, NativeNode::constant_f32(vec![1, 1, 1, 1], vec![2.0])).unwrap();
        nodes.set(3, NativeNode::constant_f32(vec![1], vec![10.0])).unwrap();
        let mut ctx = BuildContext { host: &host, nodes: &mut nodes };
        let node = MockNode {
            id: 0,
            op_kind: "TRANSPOSE_CONV".to_string(),
            inputs: vec![0, 1, 2, 3],
            outputs: vec![4],
            attributes: OpAttributes::TransposeConv {
                stride: (1, 1),
                activation: crate::layout::FusedActivation::Relu6,
            },
        };
        TransposeConvTranslator.build(&mut ctx, &node).unwrap();
        let out = ctx.input(4).unwrap();
        // conv_transpose output is 2.0 + bias 10.0 = 12.0 everywhere, clipped to 6.0 by Relu6.
        assert_eq!(*out.eval(), vec![6.0, 6.0, 6.0, 6.0]);
    }
}
