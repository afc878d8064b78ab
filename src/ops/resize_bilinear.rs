//! Grounded on `operations/src/resize_bilinear.cc`. Coordinate-transformation mode selection
//! is align_corners > half_pixel_centers > asymmetric; mode is `linear_onnx`, axes (2,3).

use crate::error::DelegateError;
use crate::host::HostNode;
use crate::layout::{select_resize_mode, transpose, LayoutConversion};
use crate::ops::{BuildContext, OpAttributes, Translator};
use crate::target::native::NativeNode;

pub struct ResizeBilinearTranslator;

impl Translator for ResizeBilinearTranslator {
    fn build(&self, ctx: &mut BuildContext, node: &dyn HostNode) -> Result<(), DelegateError> {
        let inputs = node.inputs();
        let data = ctx.input(inputs[0])?;
        let new_size = ctx.host_ints(inputs[1])?;
        let (out_h, out_w) = (new_size[0] as usize, new_size[1] as usize);

        let OpAttributes::ResizeBilinear { align_corners, half_pixel_centers } = node.attributes().clone() else {
            return Err(DelegateError::UnsupportedAttribute {
                op: "resize_bilinear".to_string(),
                detail: "expected ResizeBilinear attributes".to_string(),
            });
        };
        let mode = select_resize_mode(align_corners, half_pixel_centers);

        let nchw = transpose(data, LayoutConversion::NhwcToNchw);
        let in_shape = nchw.shape();
        let out_shape = vec![in_shape[0], in_shape[1], out_h, out_w];
        let resized = NativeNode::resize(out_shape, nchw, (out_h, out_w), mode);
        let nhwc = transpose(resized, LayoutConversion::NchwToNhwc);
        ctx.set_output(node.outputs()[0], nhwc)
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

    fn build(align_corners: bool, half_pixel_centers: bool) -> Vec<f32> {
        let mut host = MockContext::new();
        host.add_tensor(MockTensor::new(
            1,
            SourceType::I32,
            vec![2],
            AllocationClass::MmapRo,
            Some(i32_bytes(&[1, 4])),
            "new_size",
        ));
        let mut nodes = NodeManager::new();
        nodes.set(0, NativeNode::constant_f32(vec![1, 1, 2, 1], vec![0.0, 10.0])).unwrap();
        let mut ctx = BuildContext { host: &host, nodes: &mut nodes };
        let node = MockNode {
            id: 0,
            op_kind: "RESIZE_BILINEAR".to_string(),
            inputs: vec![0, 1],
            outputs: vec![2],
            attributes: OpAttributes::ResizeBilinear { align_corners, half_pixel_centers },
        };
        ResizeBilinearTranslator.build(&mut ctx, &node).unwrap();
        ctx.input(2).unwrap().eval().to_vec()
    }

    #[test]
    fn align_corners_anchors_both_endpoints() {
        let out = build(true, false);
        assert!((out[0] - 0.0).abs() < 1e-5);
        assert!((out[3] - 10.0).abs() < 1e-5);
        assert!((out[1] - 3.3333333).abs() < 1e-4);
    }

    #[test]
    fn asymmetric_mode_differs_from_align_corners() {
        let out = build(false, false);
        assert!((out[0] - 0.0).abs() < 1e-5);
        assert!((out[1] - 5.0).abs() < 1e-5);
        assert!((out[2] - 10.0).abs() < 1e-5);
    }
}
