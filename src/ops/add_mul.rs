//! Grounded on `operations/src/add.cc` and `operations/src/mul.cc`.

use crate::error::DelegateError;
use crate::host::HostNode;
use crate::layout::{apply_activation, broadcast_shape};
use crate::ops::{BuildContext, OpAttributes, Translator};
use crate::target::native::NativeNode;

fn activation_of(attrs: &OpAttributes) -> crate::layout::FusedActivation {
    match attrs {
        OpAttributes::BinaryElementwise { activation } => *activation,
        _ => crate::layout::FusedActivation::None,
    }
}

pub struct AddTranslator;

impl Translator for AddTranslator {
    fn build(&self, ctx: &mut BuildContext, node: &dyn HostNode) -> Result<(), DelegateError> {
        let inputs = node.inputs();
        let a = ctx.input(inputs[0])?;
        let b = ctx.input(inputs[1])?;
        let shape = broadcast_shape(&a.shape(), &b.shape())?;
        let sum = NativeNode::add(shape, a, b);
        let out = apply_activation(sum, activation_of(node.attributes()));
        ctx.set_output(node.outputs()[0], out)
    }
}

pub struct MulTranslator;

impl Translator for MulTranslator {
    fn build(&self, ctx: &mut BuildContext, node: &dyn HostNode) -> Result<(), DelegateError> {
        let inputs = node.inputs();
        let a = ctx.input(inputs[0])?;
        let b = ctx.input(inputs[1])?;
        let shape = broadcast_shape(&a.shape(), &b.shape())?;
        let prod = NativeNode::mul(shape, a, b);
        let out = apply_activation(prod, activation_of(node.attributes()));
        ctx.set_output(node.outputs()[0], out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::mock::{MockContext, MockNode};
    use crate::node_manager::NodeManager;

    #[test]
    fn add_registers_a_single_output_with_broadcast_shape() {
        let host = MockContext::new();
        let mut nodes = NodeManager::new();
        nodes
            .set(0, NativeNode::constant_f32(vec![1, 4], vec![1.0, 2.0, 3.0, 4.0]))
            .unwrap();
        nodes
            .set(1, NativeNode::constant_f32(vec![1, 4], vec![10.0, 20.0, 30.0, 40.0]))
            .unwrap();
        let mut ctx = BuildContext { host: &host, nodes: &mut nodes };
        let node = MockNode {
            id: 0,
            op_kind: "ADD".to_string(),
            inputs: vec![0, 1],
            outputs: vec![2],
            attributes: OpAttributes::BinaryElementwise {
                activation: crate::layout::FusedActivation::None,
            },
        };
        AddTranslator.build(&mut ctx, &node).unwrap();
        let out = ctx.input(2).unwrap();
        assert_eq!(out.shape(), vec![1, 4]);
        let values = out.eval();
        assert_eq!(*values, vec![11.0, 22.0, 33.0, 44.0]);
    }
}
