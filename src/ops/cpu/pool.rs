use rayon::prelude::*;

use crate::shape::conv_out_extent;
use crate::tensors::{Ten64, Tensor};

/// Square pooling window of `kernel × kernel` taps.
fn pool2d(
    input: &Ten64,
    kernel: usize,
    stride: usize,
    padding: usize,
    reduce: impl Fn(&mut dyn Iterator<Item = f64>) -> f64 + Sync,
) -> Ten64 {
    let (n, c, h, w) = input.dims4();
    let oh = conv_out_extent(h, kernel, stride, padding, padding, 1);
    let ow = conv_out_extent(w, kernel, stride, padding, padding, 1);
    let mut out = vec![0.0f64; n * c * oh * ow];
    if oh * ow == 0 {
        return Tensor::new(vec![n, c, oh, ow], out);
    }

    out.par_chunks_mut(oh * ow)
        .zip(input.data.par_chunks(h * w))
        .for_each(|(dst, src)| {
            for oy in 0..oh {
                // window clipped to the valid input rows/cols
                let y0 = (oy * stride).saturating_sub(padding);
                let y1 = (oy * stride + kernel).saturating_sub(padding).min(h);
                for ox in 0..ow {
                    let x0 = (ox * stride).saturating_sub(padding);
                    let x1 = (ox * stride + kernel).saturating_sub(padding).min(w);
                    let mut taps = (y0..y1).flat_map(|iy| src[iy * w + x0..iy * w + x1].iter().copied());
                    dst[oy * ow + ox] = reduce(&mut taps);
                }
            }
        });

    Tensor::new(vec![n, c, oh, ow], out)
}

/// Average pooling where padded positions are excluded from the divisor, so
/// border windows average only the pixels they actually cover.
///
/// # Example
/// ```rust
/// use cellops::ops::cpu::avg_pool2d;
/// use cellops::tensors::Tensor;
///
/// let x = Tensor::new(vec![1, 1, 2, 2], vec![1.0, 2.0, 3.0, 4.0]);
/// let y = avg_pool2d(&x, 3, 1, 1);
/// assert_eq!(y.data, vec![2.5, 2.5, 2.5, 2.5]);
/// ```
pub fn avg_pool2d(input: &Ten64, kernel: usize, stride: usize, padding: usize) -> Ten64 {
    pool2d(input, kernel, stride, padding, |taps| {
        let (sum, count) = taps.fold((0.0, 0usize), |(s, k), v| (s + v, k + 1));
        if count == 0 { 0.0 } else { sum / count as f64 }
    })
}

/// Max pooling; padding never wins the maximum.
pub fn max_pool2d(input: &Ten64, kernel: usize, stride: usize, padding: usize) -> Ten64 {
    pool2d(input, kernel, stride, padding, |taps| taps.fold(f64::NEG_INFINITY, f64::max))
}
