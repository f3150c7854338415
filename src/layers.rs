//! Parameter-owning building blocks: convolution and batch normalization.
//!
//! Both layers own their learnable tensors as [`WithGrad`] so an external
//! optimizer can update them between forward passes. Forward passes take
//! `&self` and never touch the parameters.

use rand::Rng;

use crate::ops::cpu::{Conv2dGeometry, batch_norm, conv2d};
use crate::shape::Shape4;
use crate::tensors::{Ten64, Tensor, WithGrad};

/// Bias-free 2D convolution.
#[derive(Debug, Clone)]
pub struct Conv2d {
    weight: WithGrad<Ten64>,
    geom: Conv2dGeometry,
}

impl Conv2d {
    /// Builds a convolution with uniformly initialized weights in
    /// `[-1/sqrt(fan_in), 1/sqrt(fan_in)]`.
    ///
    /// # Panics
    /// Panics if channel counts are not divisible by `geom.groups`. Callers
    /// validate channels before building layers.
    pub fn new(c_in: usize, c_out: usize, geom: Conv2dGeometry) -> Self {
        assert!(geom.groups > 0 && c_in % geom.groups == 0 && c_out % geom.groups == 0);
        let (kh, kw) = geom.kernel;
        let cin_g = c_in / geom.groups;
        let fan_in = (cin_g * kh * kw) as f64;
        let bound = 1.0 / fan_in.sqrt();

        let mut rng = rand::rng();
        let len = c_out * cin_g * kh * kw;
        let data = (0..len).map(|_| rng.random_range(-bound..=bound)).collect();

        Self {
            weight: WithGrad::new(Tensor::new(vec![c_out, cin_g, kh, kw], data)),
            geom,
        }
    }

    /// Square `k × k` convolution.
    pub fn square(c_in: usize, c_out: usize, kernel: usize, stride: usize, padding: usize) -> Self {
        Self::new(c_in, c_out, Conv2dGeometry::square(kernel, stride, padding))
    }

    /// Per-channel (grouped) convolution with `groups == channels`.
    pub fn depthwise(channels: usize, kernel: usize, stride: usize, padding: usize, dilation: usize) -> Self {
        let geom = Conv2dGeometry {
            dilation: (dilation, dilation),
            groups: channels,
            ..Conv2dGeometry::square(kernel, stride, padding)
        };
        Self::new(channels, channels, geom)
    }

    /// 1×1 channel-mixing convolution.
    pub fn pointwise(c_in: usize, c_out: usize) -> Self {
        Self::square(c_in, c_out, 1, 1, 0)
    }

    pub fn forward(&self, input: &Ten64) -> Ten64 {
        conv2d(input, &self.weight.value, &self.geom)
    }

    pub fn geometry(&self) -> &Conv2dGeometry {
        &self.geom
    }

    pub fn in_channels(&self) -> usize {
        self.weight.value.shape[1] * self.geom.groups
    }

    pub fn out_channels(&self) -> usize {
        self.weight.value.shape[0]
    }

    pub fn output_shape(&self, input: Shape4) -> Shape4 {
        let (h, w) = self.geom.output_hw(input.h, input.w);
        Shape4::new(input.n, self.out_channels(), h, w)
    }

    /// Multiply-accumulates of one forward pass.
    pub fn macs(&self, input: Shape4) -> usize {
        let out = self.output_shape(input);
        let per_output = self.weight.value.shape[1] * self.geom.kernel.0 * self.geom.kernel.1;
        out.numel() * per_output
    }

    pub fn weight(&self) -> &WithGrad<Ten64> {
        &self.weight
    }

    pub fn weight_mut(&mut self) -> &mut WithGrad<Ten64> {
        &mut self.weight
    }
}

/// Batch normalization over `(N, H, W)` per channel.
#[derive(Debug, Clone)]
pub struct BatchNorm2d {
    channels: usize,
    eps: f64,
    affine: Option<(WithGrad<Ten64>, WithGrad<Ten64>)>,
}

impl BatchNorm2d {
    pub const DEFAULT_EPS: f64 = 1e-5;

    /// `affine` adds a learnable scale (initialized to one) and shift
    /// (initialized to zero).
    pub fn new(channels: usize, affine: bool, eps: f64) -> Self {
        let affine = affine.then(|| {
            (
                WithGrad::new(Tensor::full(vec![channels], 1.0)),
                WithGrad::new(Tensor::zeros(vec![channels])),
            )
        });
        Self { channels, eps, affine }
    }

    pub fn forward(&self, input: &Ten64) -> Ten64 {
        let params = self
            .affine
            .as_ref()
            .map(|(gamma, beta)| (gamma.value.data.as_slice(), beta.value.data.as_slice()));
        batch_norm(input, params, self.eps)
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn eps(&self) -> f64 {
        self.eps
    }

    pub fn is_affine(&self) -> bool {
        self.affine.is_some()
    }

    /// Scale then shift, empty when not affine.
    pub fn parameters(&self) -> Vec<&WithGrad<Ten64>> {
        self.affine.iter().flat_map(|(g, b)| [g, b]).collect()
    }

    pub fn parameters_mut(&mut self) -> Vec<&mut WithGrad<Ten64>> {
        self.affine.iter_mut().flat_map(|(g, b)| [g, b]).collect()
    }

    /// One multiply-add per element.
    pub fn macs(&self, input: Shape4) -> usize {
        input.numel()
    }
}
