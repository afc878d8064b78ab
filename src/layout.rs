//! Shared primitives every operator translator reaches for: layout transpose, padding
//! translation, fused-activation application, and numpy-style broadcast shape resolution.
//!
//! Grounded on `OperationsBase::Transpose`/`CalculatePadding`/`ApplyActivation` in the
//! original delegate's `operations_base.cc`.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::DelegateError;
use crate::target::native::NativeNode;

/// Which of the four canonical layout conversions to apply.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LayoutConversion {
    NhwcToNchw,
    NchwToNhwc,
    IhwoToOihw,
    OhwiToOihw,
}

impl LayoutConversion {
    /// The axis permutation for this conversion (ยง4.3).
    pub fn order(self) -> [usize; 4] {
        match self {
            LayoutConversion::NhwcToNchw => [0, 3, 1, 2],
            LayoutConversion::NchwToNhwc => [0, 2, 3, 1],
            LayoutConversion::IhwoToOihw => [3, 0, 1, 2],
            // Carried over exactly as specified even though it is the same permutation as
            // IhwoToOihw's NHWC-style order -- see DESIGN.md for why this is preserved as-is.
            LayoutConversion::OhwiToOihw => [0, 3, 1, 2],
        }
    }
}

pub fn transpose(input: Rc<NativeNode>, conversion: LayoutConversion) -> Rc<NativeNode> {
    NativeNode::transpose(input, &conversion.order())
}

/// Source padding scheme, translated to the target's auto-pad enum (ยง4.3).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SourcePadding {
    Same,
    Valid,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PadType {
    SameUpper,
    Valid,
}

pub fn translate_padding(padding: SourcePadding) -> Result<PadType, DelegateError> {
    Ok(match padding {
        SourcePadding::Same => PadType::SameUpper,
        SourcePadding::Valid => PadType::Valid,
    })
}

/// `ResizeBilinear`'s coordinate-transformation mode, selected at build time from the op's
/// `align_corners`/`half_pixel_centers` flags (ยง4.3).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResizeMode {
    AlignCorners,
    HalfPixel,
    Asymmetric,
}

/// Precedence is align_corners > half_pixel_centers > asymmetric (ยง4.3).
pub fn select_resize_mode(align_corners: bool, half_pixel_centers: bool) -> ResizeMode {
    if align_corners {
        ResizeMode::AlignCorners
    } else if half_pixel_centers {
        ResizeMode::HalfPixel
    } else {
        ResizeMode::Asymmetric
    }
}

/// A source op's fused activation (ยง4.3).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FusedActivation {
    None,
    Relu,
    ReluN1To1,
    Relu6,
    Tanh,
    Sigmoid,
}

pub fn apply_activation(input: Rc<NativeNode>, activation: FusedActivation) -> Rc<NativeNode> {
    match activation {
        FusedActivation::None => input,
        FusedActivation::Relu => NativeNode::relu(input),
        FusedActivation::ReluN1To1 => NativeNode::clamp(input, -1.0, 1.0),
        FusedActivation::Relu6 => NativeNode::clamp(input, 0.0, 6.0),
        FusedActivation::Tanh => NativeNode::tanh(input),
        FusedActivation::Sigmoid => NativeNode::sigmoid(input),
    }
}

/// Resolve the broadcast output shape for a numpy-style binary op (Add, Mul).
pub fn broadcast_shape(a: &[usize], b: &[usize]) -> Result<Vec<usize>, DelegateError> {
    let rank = a.len().max(b.len());
    let pad = |s: &[usize]| -> Vec<usize> {
        let mut v = vec![1usize; rank - s.len()];
        v.extend_from_slice(s);
        v
    };
    let ap = pad(a);
    let bp = pad(b);
    let mut out = Vec::with_capacity(rank);
    for i in 0..rank {
        if ap[i] == bp[i] || ap[i] == 1 || bp[i] == 1 {
            out.push(ap[i].max(bp[i]));
        } else {
            return Err(DelegateError::UnsupportedAttribute {
                op: "broadcast".to_string(),
                detail: format!("shapes {a:?} and {b:?} are not numpy-broadcastable"),
            });
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permutations_match_spec() {
        assert_eq!(LayoutConversion::NhwcToNchw.order(), [0, 3, 1, 2]);
        assert_eq!(LayoutConversion::NchwToNhwc.order(), [0, 2, 3, 1]);
        assert_eq!(LayoutConversion::IhwoToOihw.order(), [3, 0, 1, 2]);
        assert_eq!(LayoutConversion::OhwiToOihw.order(), [0, 3, 1, 2]);
    }

    #[test]
    fn broadcast_shape_resolves_scalar_against_vector() {
        let shape = broadcast_shape(&[1, 4], &[4]).unwrap();
        assert_eq!(shape, vec![1, 4]);
    }

    #[test]
    fn broadcast_shape_rejects_incompatible_dims() {
        assert!(broadcast_shape(&[2, 3], &[2, 4]).is_err());
    }

    #[test]
    fn resize_mode_precedence_is_align_corners_then_half_pixel_then_asymmetric() {
        assert_eq!(select_resize_mode(true, true), ResizeMode::AlignCorners);
        assert_eq!(select_resize_mode(true, false), ResizeMode::AlignCorners);
        assert_eq!(select_resize_mode(false, true), ResizeMode::HalfPixel);
        assert_eq!(select_resize_mode(false, false), ResizeMode::Asymmetric);
    }
}
