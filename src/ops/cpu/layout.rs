use rayon::prelude::*;

use crate::tensors::{Ten64, Tensor};

/// Zero-pads the spatial axes: `(top, bottom, left, right)`.
pub fn pad2d(input: &Ten64, top: usize, bottom: usize, left: usize, right: usize) -> Ten64 {
    let (n, c, h, w) = input.dims4();
    let (ph, pw) = (h + top + bottom, w + left + right);
    let mut out = vec![0.0f64; n * c * ph * pw];
    if h * w > 0 {
        out.par_chunks_mut(ph * pw)
            .zip(input.data.par_chunks(h * w))
            .for_each(|(dst, src)| {
                for y in 0..h {
                    let at = (y + top) * pw + left;
                    dst[at..at + w].copy_from_slice(&src[y * w..(y + 1) * w]);
                }
            });
    }
    Tensor::new(vec![n, c, ph, pw], out)
}

/// Drops the first `top` rows and `left` columns of every plane.
///
/// # Panics
/// Panics if the crop removes more rows or columns than exist.
pub fn crop2d(input: &Ten64, top: usize, left: usize) -> Ten64 {
    let (n, c, h, w) = input.dims4();
    assert!(top <= h && left <= w, "crop ({top}, {left}) exceeds plane {h}x{w}");
    let (oh, ow) = (h - top, w - left);
    let mut out = vec![0.0f64; n * c * oh * ow];
    if oh * ow > 0 {
        out.par_chunks_mut(oh * ow)
            .zip(input.data.par_chunks(h * w))
            .for_each(|(dst, src)| {
                for y in 0..oh {
                    let at = (y + top) * w + left;
                    dst[y * ow..(y + 1) * ow].copy_from_slice(&src[at..at + ow]);
                }
            });
    }
    Tensor::new(vec![n, c, oh, ow], out)
}

/// Concatenates tensors along the channel axis.
///
/// # Panics
/// Panics if the parts disagree on `N`, `H` or `W`, or if `parts` is empty.
pub fn concat_channels(parts: &[&Ten64]) -> Ten64 {
    assert!(!parts.is_empty(), "nothing to concatenate");
    let (n, _, h, w) = parts[0].dims4();
    for p in parts {
        let (pn, _, ph, pw) = p.dims4();
        assert_eq!((pn, ph, pw), (n, h, w), "concat parts disagree on (N, H, W)");
    }
    let c_total: usize = parts.iter().map(|p| p.shape[1]).sum();
    let mut data = Vec::with_capacity(n * c_total * h * w);
    for b in 0..n {
        for p in parts {
            let per_batch = p.shape[1] * h * w;
            data.extend_from_slice(&p.data[b * per_batch..(b + 1) * per_batch]);
        }
    }
    Tensor::new(vec![n, c_total, h, w], data)
}
