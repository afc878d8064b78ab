//! The actual math behind every translated op kind: broadcasting, pooling, grouped and
//! transposed convolution, concat, softmax, bilinear resize, mean-reduce, constant padding,
//! and the binary16 -> binary32 widening `Dequantize`'s f16 constants need. Everything here
//! operates on flat row-major buffers plus explicit shapes, the way `tensor::ops` in the
//! teacher's own tensor module works over `Tensor<T>`'s flat-buffer-plus-dims representation.

use rayon::prelude::*;

use crate::layout::{PadType, ResizeMode};

/// Row-major strides for `shape` (outermost dimension varies slowest).
pub fn strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1usize; shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }
    strides
}

fn unravel(mut flat: usize, dim_strides: &[usize]) -> Vec<usize> {
    let mut coord = vec![0usize; dim_strides.len()];
    for d in 0..dim_strides.len() {
        coord[d] = flat / dim_strides[d];
        flat %= dim_strides[d];
    }
    coord
}

/// Elementwise binary op with numpy-style broadcasting, following the teacher's own
/// `lhs.par_iter_mut().zip(rhs).for_each(...)` binary-op idiom in `tensor/mod.rs`.
pub fn broadcast_binary(
    a: &[f32],
    a_shape: &[usize],
    b: &[f32],
    b_shape: &[usize],
    out_shape: &[usize],
    op: impl Fn(f32, f32) -> f32 + Sync,
) -> Vec<f32> {
    let rank = out_shape.len();
    let pad = |s: &[usize]| -> Vec<usize> {
        let mut v = vec![1usize; rank - s.len()];
        v.extend_from_slice(s);
        v
    };
    let ap = pad(a_shape);
    let bp = pad(b_shape);
    let a_strides = strides(&ap);
    let b_strides = strides(&bp);
    let out_strides = strides(out_shape);
    let total: usize = out_shape.iter().product();
    let mut out = vec![0.0f32; total];
    out.par_iter_mut().enumerate().for_each(|(flat, slot)| {
        let coord = unravel(flat, &out_strides);
        let mut a_idx = 0usize;
        let mut b_idx = 0usize;
        for d in 0..rank {
            let ac = if ap[d] == 1 { 0 } else { coord[d] };
            let bc = if bp[d] == 1 { 0 } else { coord[d] };
            a_idx += ac * a_strides[d];
            b_idx += bc * b_strides[d];
        }
        *slot = op(a[a_idx], b[b_idx]);
    });
    out
}

/// Permute `input` (shape `in_shape`) according to `order`: `out[i] = in[order-mapped i]`.
pub fn transpose(input: &[f32], in_shape: &[usize], order: &[usize]) -> Vec<f32> {
    let rank = in_shape.len();
    let out_shape: Vec<usize> = order.iter().map(|&i| in_shape[i]).collect();
    let in_strides = strides(in_shape);
    let out_strides = strides(&out_shape);
    let total: usize = out_shape.iter().product();
    let mut out = vec![0.0f32; total];
    for flat in 0..total {
        let coord = unravel(flat, &out_strides);
        let mut in_coord = vec![0usize; rank];
        for d in 0..rank {
            in_coord[order[d]] = coord[d];
        }
        let in_flat: usize = in_coord.iter().zip(in_strides.iter()).map(|(c, s)| c * s).sum();
        out[flat] = input[in_flat];
    }
    out
}

/// How much symmetric padding `SAME_UPPER` needs on one spatial dimension.
fn same_padding(in_dim: usize, out_dim: usize, filter: usize, stride: usize) -> usize {
    let total = (out_dim.saturating_sub(1) * stride + filter).saturating_sub(in_dim);
    total / 2
}

/// NCHW average/max pooling, `exclude_pad=true` (only in-bounds elements contribute to the
/// average), rounding floor (ยง4.3).
pub fn pool2d(
    input: &[f32],
    in_shape: &[usize],
    filter: (usize, usize),
    stride: (usize, usize),
    padding: PadType,
    is_max: bool,
    out_shape: &[usize],
) -> Vec<f32> {
    let (n, c, h, w) = (in_shape[0], in_shape[1], in_shape[2], in_shape[3]);
    let (oh, ow) = (out_shape[2], out_shape[3]);
    let (fh, fw) = filter;
    let (sh, sw) = stride;
    let (pad_top, pad_left) = match padding {
        PadType::Valid => (0, 0),
        PadType::SameUpper => (same_padding(h, oh, fh, sh), same_padding(w, ow, fw, sw)),
    };
    let mut out = vec![0.0f32; n * c * oh * ow];
    for ni in 0..n {
        for ci in 0..c {
            for oy in 0..oh {
                for ox in 0..ow {
                    let mut acc = if is_max { f32::NEG_INFINITY } else { 0.0f32 };
                    let mut count = 0usize;
                    for ky in 0..fh {
                        for kx in 0..fw {
                            let iy = oy * sh + ky;
                            let ix = ox * sw + kx;
                            if iy < pad_top || ix < pad_left {
                                continue;
                            }
                            let (iy, ix) = (iy - pad_top, ix - pad_left);
                            if iy >= h || ix >= w {
                                continue;
                            }
                            let v = input[((ni * c + ci) * h + iy) * w + ix];
                            if is_max {
                                acc = acc.max(v);
                            } else {
                                acc += v;
                                count += 1;
                            }
                        }
                    }
                    out[((ni * c + ci) * oh + oy) * ow + ox] = if is_max { acc } else { acc / count.max(1) as f32 };
                }
            }
        }
    }
    out
}

/// NCHW grouped convolution with an OIHW filter (`Conv2D`, `DepthwiseConv2D` after their
/// respective layout transposes) and an optional per-output-channel bias.
#[allow(clippy::too_many_arguments)]
pub fn conv2d(
    input: &[f32],
    in_shape: &[usize],
    filter: &[f32],
    filter_shape: &[usize],
    bias: Option<&[f32]>,
    stride: (usize, usize),
    padding: PadType,
    groups: usize,
    out_shape: &[usize],
) -> Vec<f32> {
    let (n, cin, h, w) = (in_shape[0], in_shape[1], in_shape[2], in_shape[3]);
    let (cout, cin_per_group, fh, fw) = (filter_shape[0], filter_shape[1], filter_shape[2], filter_shape[3]);
    let (oh, ow) = (out_shape[2], out_shape[3]);
    let (sh, sw) = stride;
    let (pad_top, pad_left) = match padding {
        PadType::Valid => (0, 0),
        PadType::SameUpper => (same_padding(h, oh, fh, sh), same_padding(w, ow, fw, sw)),
    };
    let cout_per_group = cout / groups;
    let mut out = vec![0.0f32; n * cout * oh * ow];
    for ni in 0..n {
        for g in 0..groups {
            for oc_in_g in 0..cout_per_group {
                let oc = g * cout_per_group + oc_in_g;
                for oy in 0..oh {
                    for ox in 0..ow {
                        let mut acc = 0.0f32;
                        for ic in 0..cin_per_group {
                            let in_c = g * cin_per_group + ic;
                            for ky in 0..fh {
                                for kx in 0..fw {
                                    let iy = oy * sh + ky;
                                    let ix = ox * sw + kx;
                                    if iy < pad_top || ix < pad_left {
                                        continue;
                                    }
                                    let (iy, ix) = (iy - pad_top, ix - pad_left);
                                    if iy >= h || ix >= w {
                                        continue;
                                    }
                                    let iv = input[((ni * cin + in_c) * h + iy) * w + ix];
                                    let fv = filter[((oc * cin_per_group + ic) * fh + ky) * fw + kx];
                                    acc += iv * fv;
                                }
                            }
                        }
                        if let Some(b) = bias {
                            acc += b[oc];
                        }
                        out[((ni * cout + oc) * oh + oy) * ow + ox] = acc;
                    }
                }
            }
        }
    }
    out
}

/// NCHW transposed convolution (scatter-add form): each input element is multiplied by the
/// whole filter and accumulated into the output window it lands on. Dilation is fixed to 1
/// (ยง4.3).
#[allow(clippy::too_many_arguments)]
pub fn conv_transpose(
    input: &[f32],
    in_shape: &[usize],
    filter: &[f32],
    filter_shape: &[usize],
    bias: Option<&[f32]>,
    stride: (usize, usize),
    out_hw: (usize, usize),
    out_shape: &[usize],
) -> Vec<f32> {
    let (n, cin, h, w) = (in_shape[0], in_shape[1], in_shape[2], in_shape[3]);
    let (cout, cin_f, fh, fw) = (filter_shape[0], filter_shape[1], filter_shape[2], filter_shape[3]);
    let (sh, sw) = stride;
    let (oh, ow) = out_hw;
    let _ = out_shape;
    let mut out = vec![0.0f32; n * cout * oh * ow];
    for ni in 0..n {
        for ic in 0..cin.min(cin_f) {
            for iy in 0..h {
                for ix in 0..w {
                    let iv = input[((ni * cin + ic) * h + iy) * w + ix];
                    if iv == 0.0 {
                        continue;
                    }
                    for oc in 0..cout {
                        for ky in 0..fh {
                            for kx in 0..fw {
                                let oy = iy * sh + ky;
                                let ox = ix * sw + kx;
                                if oy < oh && ox < ow {
                                    let fv = filter[((oc * cin_f + ic) * fh + ky) * fw + kx];
                                    out[((ni * cout + oc) * oh + oy) * ow + ox] += iv * fv;
                                }
                            }
                        }
                    }
                }
            }
        }
    }
    if let Some(b) = bias {
        for ni in 0..n {
            for oc in 0..cout {
                for oy in 0..oh {
                    for ox in 0..ow {
                        out[((ni * cout + oc) * oh + oy) * ow + ox] += b[oc];
                    }
                }
            }
        }
    }
    out
}

/// Concatenate `inputs` (each a `(data, shape)` pair) along `axis`.
pub fn concat(inputs: &[(&[f32], &[usize])], axis: usize, out_shape: &[usize]) -> Vec<f32> {
    let rank = out_shape.len();
    let out_strides = strides(out_shape);
    let total: usize = out_shape.iter().product();
    let mut prefix = vec![0usize; inputs.len() + 1];
    for (i, (_, shape)) in inputs.iter().enumerate() {
        prefix[i + 1] = prefix[i] + shape[axis];
    }
    let mut out = vec![0.0f32; total];
    for flat in 0..total {
        let coord = unravel(flat, &out_strides);
        let ac = coord[axis];
        let which = prefix.iter().rposition(|&p| p <= ac).unwrap();
        let (data, shape) = inputs[which];
        let in_strides = strides(shape);
        let mut in_coord = coord.clone();
        in_coord[axis] = ac - prefix[which];
        let in_flat: usize = (0..rank).map(|d| in_coord[d] * in_strides[d]).sum();
        out[flat] = data[in_flat];
    }
    out
}

/// Softmax along `axis`, numerically stabilized by subtracting the per-slice max.
pub fn softmax(input: &[f32], shape: &[usize], axis: usize) -> Vec<f32> {
    let rank = shape.len();
    let in_strides = strides(shape);
    let axis_size = shape[axis];
    let axis_stride = in_strides[axis];
    let mut outer_shape = shape.to_vec();
    outer_shape[axis] = 1;
    let outer_strides = strides(&outer_shape);
    let outer_total: usize = outer_shape.iter().product();
    let mut out = vec![0.0f32; input.len()];
    for flat in 0..outer_total {
        let coord = unravel(flat, &outer_strides);
        let base: usize = (0..rank).map(|d| coord[d] * in_strides[d]).sum();
        let mut maxv = f32::NEG_INFINITY;
        for a in 0..axis_size {
            maxv = maxv.max(input[base + a * axis_stride]);
        }
        let mut exps = vec![0.0f32; axis_size];
        let mut sum = 0.0f32;
        for a in 0..axis_size {
            let e = (input[base + a * axis_stride] - maxv).exp();
            exps[a] = e;
            sum += e;
        }
        for a in 0..axis_size {
            out[base + a * axis_stride] = exps[a] / sum;
        }
    }
    out
}

/// Maps an output coordinate to an input coordinate for one resize axis, per the selected
/// coordinate-transformation mode (ยง4.3).
fn resize_coord(out_coord: usize, in_dim: usize, out_dim: usize, mode: ResizeMode) -> f32 {
    match mode {
        ResizeMode::AlignCorners => {
            if out_dim > 1 {
                out_coord as f32 * (in_dim - 1) as f32 / (out_dim - 1) as f32
            } else {
                0.0
            }
        }
        ResizeMode::HalfPixel => {
            let scale = in_dim as f32 / out_dim as f32;
            ((out_coord as f32 + 0.5) * scale - 0.5).max(0.0)
        }
        ResizeMode::Asymmetric => {
            let scale = in_dim as f32 / out_dim as f32;
            out_coord as f32 * scale
        }
    }
}

/// Bilinear resize of an NCHW tensor's spatial dims (axes 2,3), coordinate-transformation mode
/// selected by the translator as align_corners > half_pixel_centers > asymmetric (ยง4.3).
pub fn resize_bilinear(
    input: &[f32],
    in_shape: &[usize],
    out_hw: (usize, usize),
    mode: ResizeMode,
    out_shape: &[usize],
) -> Vec<f32> {
    let (n, c, h, w) = (in_shape[0], in_shape[1], in_shape[2], in_shape[3]);
    let (oh, ow) = out_hw;
    let _ = out_shape;
    let mut out = vec![0.0f32; n * c * oh * ow];
    let get = |input: &[f32], ni: usize, ci: usize, y: usize, x: usize| input[((ni * c + ci) * h + y) * w + x];
    for ni in 0..n {
        for ci in 0..c {
            for oy in 0..oh {
                let in_y = resize_coord(oy, h, oh, mode);
                let y0 = in_y.floor() as usize;
                let y1 = (y0 + 1).min(h - 1);
                let wy = in_y - y0 as f32;
                for ox in 0..ow {
                    let in_x = resize_coord(ox, w, ow, mode);
                    let x0 = in_x.floor() as usize;
                    let x1 = (x0 + 1).min(w - 1);
                    let wx = in_x - x0 as f32;
                    let top = get(input, ni, ci, y0, x0) * (1.0 - wx) + get(input, ni, ci, y0, x1) * wx;
                    let bot = get(input, ni, ci, y1, x0) * (1.0 - wx) + get(input, ni, ci, y1, x1) * wx;
                    out[((ni * c + ci) * oh + oy) * ow + ox] = top * (1.0 - wy) + bot * wy;
                }
            }
        }
    }
    out
}

/// Reduce-mean over `axes`. `keep_dims` only affects the caller's declared output shape; the
/// flat data for a row-major tensor is identical either way since the reduced axes collapse
/// to size 1.
pub fn reduce_mean(input: &[f32], shape: &[usize], axes: &[usize]) -> Vec<f32> {
    let rank = shape.len();
    let in_strides = strides(shape);
    let mut reduced_shape = shape.to_vec();
    for &a in axes {
        reduced_shape[a] = 1;
    }
    let reduced_strides = strides(&reduced_shape);
    let reduced_total: usize = reduced_shape.iter().product();
    let mut sums = vec![0.0f32; reduced_total];
    let mut counts = vec![0usize; reduced_total];
    let total: usize = shape.iter().product();
    for flat in 0..total {
        let coord = unravel(flat, &in_strides);
        let mut reduced_coord = coord.clone();
        for &a in axes {
            reduced_coord[a] = 0;
        }
        let ridx: usize = (0..rank).map(|d| reduced_coord[d] * reduced_strides[d]).sum();
        sums[ridx] += input[flat];
        counts[ridx] += 1;
    }
    sums.iter().zip(counts.iter()).map(|(s, c)| s / *c as f32).collect()
}

/// Constant-mode (zero-fill) padding.
pub fn pad(input: &[f32], shape: &[usize], begin: &[usize], end: &[usize]) -> Vec<f32> {
    let rank = shape.len();
    let out_shape: Vec<usize> = shape.iter().enumerate().map(|(d, &s)| s + begin[d] + end[d]).collect();
    let in_strides = strides(shape);
    let out_strides = strides(&out_shape);
    let total: usize = out_shape.iter().product();
    let mut out = vec![0.0f32; total];
    for flat in 0..total {
        let coord = unravel(flat, &out_strides);
        let mut in_bounds = true;
        let mut in_coord = vec![0usize; rank];
        for d in 0..rank {
            if coord[d] < begin[d] || coord[d] >= begin[d] + shape[d] {
                in_bounds = false;
                break;
            }
            in_coord[d] = coord[d] - begin[d];
        }
        if in_bounds {
            let in_flat: usize = (0..rank).map(|d| in_coord[d] * in_strides[d]).sum();
            out[flat] = input[in_flat];
        }
    }
    out
}

pub fn relu(input: &[f32]) -> Vec<f32> {
    input.iter().map(|&v| v.max(0.0)).collect()
}

pub fn clamp(input: &[f32], lo: f32, hi: f32) -> Vec<f32> {
    input.iter().map(|&v| v.clamp(lo, hi)).collect()
}

pub fn sigmoid(input: &[f32]) -> Vec<f32> {
    input.iter().map(|&v| 1.0 / (1.0 + (-v).exp())).collect()
}

pub fn tanh(input: &[f32]) -> Vec<f32> {
    input.iter().map(|&v| v.tanh()).collect()
}

pub fn hard_swish(input: &[f32]) -> Vec<f32> {
    input.iter().map(|&v| v * (v + 3.0).clamp(0.0, 6.0) / 6.0).collect()
}

/// Binary16 -> binary32 widening, hand-rolled rather than pulling in a dedicated `half` crate
/// the teacher never depends on.
pub fn half_to_f32(bits: u16) -> f32 {
    let sign = (bits >> 15) & 0x1;
    let exponent = (bits >> 10) & 0x1f;
    let mantissa = (bits & 0x3ff) as f32;
    let magnitude = if exponent == 0 {
        if mantissa == 0.0 {
            0.0
        } else {
            (mantissa / 1024.0) * 2f32.powi(-14)
        }
    } else if exponent == 0x1f {
        if mantissa == 0.0 {
            f32::INFINITY
        } else {
            f32::NAN
        }
    } else {
        (1.0 + mantissa / 1024.0) * 2f32.powi(exponent as i32 - 15)
    };
    if sign == 1 {
        -magnitude
    } else {
        magnitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_to_f32_matches_known_values() {
        assert_eq!(half_to_f32(0x3C00), 1.0);
        assert_eq!(half_to_f32(0x0000), 0.0);
        assert!((half_to_f32(0xC000) - (-2.0)).abs() < 1e-6);
    }

    #[test]
    fn concat_along_last_axis_interleaves_rows() {
        let a = [1.0f32, 2.0];
        let b = [10.0f32, 20.0];
        let out = concat(&[(&a, &[1, 2]), (&b, &[1, 2])], 1, &[1, 4]);
        assert_eq!(out, vec![1.0, 2.0, 10.0, 20.0]);
    }

    #[test]
    fn pad_zero_fills_the_border() {
        let input = [1.0f32, 2.0, 3.0, 4.0];
        let out = pad(&input, &[2, 2], &[1, 1], &[1, 1]);
        assert_eq!(out.len(), 16);
        assert_eq!(out[5], 1.0);
        assert_eq!(out[0], 0.0);
    }

    #[test]
    fn reduce_mean_over_last_axis() {
        let input = [1.0f32, 2.0, 3.0, 4.0];
        let out = reduce_mean(&input, &[2, 2], &[1]);
        assert_eq!(out, vec![1.5, 3.5]);
    }

    #[test]
    fn softmax_sums_to_one() {
        let out = softmax(&[1.0, 2.0, 3.0], &[3], 0);
        let sum: f32 = out.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(out[2] > out[1] && out[1] > out[0]);
    }
}
