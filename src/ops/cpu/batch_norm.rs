use rayon::prelude::*;

use crate::tensors::{Ten64, Tensor};

/// Normalizes each channel of an `(N, C, H, W)` tensor with the statistics of
/// the current mini-batch:
///
/// $$ y = \\gamma \\cdot \\frac{x - \\mu_c}{\\sqrt{\\sigma_c^2 + \\epsilon}} + \\beta $$
///
/// `mu_c` and `sigma_c^2` are the mean and biased variance over `N`, `H` and
/// `W`. Without `affine` parameters `gamma = 1` and `beta = 0`.
///
/// # Panics
/// Panics if `affine` slices are not `C` long.
pub fn batch_norm(input: &Ten64, affine: Option<(&[f64], &[f64])>, eps: f64) -> Ten64 {
    let (n, c, h, w) = input.dims4();
    let plane = h * w;
    if let Some((gamma, beta)) = affine {
        assert_eq!(gamma.len(), c, "gamma has {} entries for {} channels", gamma.len(), c);
        assert_eq!(beta.len(), c, "beta has {} entries for {} channels", beta.len(), c);
    }
    if input.is_empty() {
        return input.clone();
    }

    let x = &input.data;
    let count = (n * plane) as f64;

    let stats: Vec<(f64, f64)> = (0..c)
        .into_par_iter()
        .map(|ch| {
            let channel = |b: usize| &x[(b * c + ch) * plane..(b * c + ch + 1) * plane];
            let mean = (0..n).map(|b| channel(b).iter().sum::<f64>()).sum::<f64>() / count;
            let var = (0..n)
                .map(|b| channel(b).iter().map(|&v| (v - mean).powi(2)).sum::<f64>())
                .sum::<f64>()
                / count;
            (mean, var)
        })
        .collect();

    let mut out = vec![0.0f64; x.len()];
    out.par_chunks_mut(plane)
        .zip(x.par_chunks(plane))
        .enumerate()
        .for_each(|(idx, (dst, src))| {
            let ch = idx % c;
            let (mean, var) = stats[ch];
            let inv_std = 1.0 / (var + eps).sqrt();
            let (scale, shift) = match affine {
                Some((gamma, beta)) => (gamma[ch] * inv_std, beta[ch]),
                None => (inv_std, 0.0),
            };
            for (y, &v) in dst.iter_mut().zip(src) {
                *y = (v - mean) * scale + shift;
            }
        });

    Tensor::new(input.shape.clone(), out)
}
