use rayon::prelude::*;

use crate::shape::conv_out_extent;
use crate::tensors::{Ten64, Tensor};

/// Window geometry of a 2D convolution. Pairs are `(rows, cols)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conv2dGeometry {
    pub kernel: (usize, usize),
    pub stride: (usize, usize),
    pub padding: (usize, usize),
    pub dilation: (usize, usize),
    pub groups: usize,
}

impl Conv2dGeometry {
    /// Square kernel with symmetric padding, no dilation, one group.
    pub const fn square(kernel: usize, stride: usize, padding: usize) -> Self {
        Self {
            kernel: (kernel, kernel),
            stride: (stride, stride),
            padding: (padding, padding),
            dilation: (1, 1),
            groups: 1,
        }
    }

    /// Output spatial extent for an `h × w` input.
    pub const fn output_hw(&self, h: usize, w: usize) -> (usize, usize) {
        (
            conv_out_extent(h, self.kernel.0, self.stride.0, self.padding.0, self.padding.0, self.dilation.0),
            conv_out_extent(w, self.kernel.1, self.stride.1, self.padding.1, self.padding.1, self.dilation.1),
        )
    }
}

/// Computes a bias-free 2D convolution.
///
/// # Requirements
/// - `input.shape = [n, c_in, h, w]`
/// - `weight.shape = [c_out, c_in / groups, kh, kw]`
/// - `c_in` and `c_out` divisible by `geom.groups`
///
/// Zero padding is implicit: taps falling outside the input contribute nothing.
///
/// # Panics
/// Panics if the channel layout of `input` and `weight` disagree.
///
/// # Example
/// ```rust
/// use cellops::ops::cpu::{conv2d, Conv2dGeometry};
/// use cellops::tensors::Tensor;
///
/// let x = Tensor::new(vec![1, 1, 2, 2], vec![1.0, 2.0, 3.0, 4.0]);
/// let k = Tensor::new(vec![1, 1, 1, 1], vec![2.0]);
/// let y = conv2d(&x, &k, &Conv2dGeometry::square(1, 1, 0));
/// assert_eq!(y.data, vec![2.0, 4.0, 6.0, 8.0]);
/// ```
pub fn conv2d(input: &Ten64, weight: &Ten64, geom: &Conv2dGeometry) -> Ten64 {
    let (n, c_in, h, w) = input.dims4();
    let (c_out, cin_g, kh, kw) = weight.dims4();
    assert_eq!((kh, kw), geom.kernel, "kernel shape does not match geometry");
    assert_eq!(c_in % geom.groups, 0, "c_in not divisible by groups");
    assert_eq!(c_out % geom.groups, 0, "c_out not divisible by groups");
    assert_eq!(cin_g, c_in / geom.groups, "weight expects {} input channels per group, input has {}", cin_g, c_in / geom.groups);

    let (oh, ow) = geom.output_hw(h, w);
    let cout_g = c_out / geom.groups;
    let (sy, sx) = geom.stride;
    let (py, px) = geom.padding;
    let (dy, dx) = geom.dilation;
    let x = &input.data;
    let k = &weight.data;

    let mut out = vec![0.0f64; n * c_out * oh * ow];
    if oh * ow == 0 {
        return Tensor::new(vec![n, c_out, oh, ow], out);
    }

    out.par_chunks_mut(oh * ow).enumerate().for_each(|(plane, dst)| {
        let b = plane / c_out;
        let oc = plane % c_out;
        let g = oc / cout_g;

        for icg in 0..cin_g {
            let ic = g * cin_g + icg;
            let src = &x[(b * c_in + ic) * h * w..(b * c_in + ic + 1) * h * w];
            let taps = &k[(oc * cin_g + icg) * kh * kw..(oc * cin_g + icg + 1) * kh * kw];

            for ky in 0..kh {
                for kx in 0..kw {
                    let wt = taps[ky * kw + kx];
                    if wt == 0.0 {
                        continue;
                    }
                    for oy in 0..oh {
                        let iy = (oy * sy + ky * dy) as isize - py as isize;
                        if iy < 0 || iy >= h as isize {
                            continue;
                        }
                        let row = &src[iy as usize * w..(iy as usize + 1) * w];
                        let dst_row = &mut dst[oy * ow..(oy + 1) * ow];
                        for (ox, acc) in dst_row.iter_mut().enumerate() {
                            let ix = (ox * sx + kx * dx) as isize - px as isize;
                            if ix >= 0 && ix < w as isize {
                                *acc += wt * row[ix as usize];
                            }
                        }
                    }
                }
            }
        }
    });

    Tensor::new(vec![n, c_out, oh, ow], out)
}
