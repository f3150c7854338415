use super::{Operation, assert_channels};
use crate::error::{OpError, Result};
use crate::layers::{BatchNorm2d, Conv2d};
use crate::ops::cpu::relu;
use crate::shape::{self, Shape4};
use crate::tensors::{Ten64, WithGrad};

/// Width of the bottleneck between the two separable stages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MidChannels {
    /// `round(c_out * multiplier)`; `1.0` keeps the output width, `4.0` is
    /// the "flood" variant.
    Multiplier(f64),
    /// A fixed width independent of `c_out` (the "choke" variant).
    Fixed(usize),
}

impl Default for MidChannels {
    fn default() -> Self {
        Self::Multiplier(1.0)
    }
}

impl MidChannels {
    /// Resolves the policy against an output width.
    pub fn resolve(self, c_out: usize) -> usize {
        match self {
            Self::Multiplier(m) => (c_out as f64 * m).round() as usize,
            Self::Fixed(c) => c,
        }
    }
}

/// Two depthwise-separable stages.
///
/// ```text
/// relu → dw k×k (stride, dilation) → pw c_in→mid → bn
///      → relu → dw k×k (stride 1)  → pw mid→c_out → bn
/// ```
///
/// Only the first depthwise stage carries the stride and dilation; the second
/// stage is padded so it preserves the spatial extent.
#[derive(Debug, Clone)]
pub struct SepConv {
    c_in: usize,
    mid: usize,
    dw1: Conv2d,
    pw1: Conv2d,
    bn1: BatchNorm2d,
    dw2: Conv2d,
    pw2: Conv2d,
    bn2: BatchNorm2d,
}

impl SepConv {
    pub const NAME: &'static str = "sep_conv";

    /// `padding` applies to the first depthwise stage and should be
    /// `dilation * (kernel - 1) / 2` to keep the resolution at stride 1.
    ///
    /// # Errors
    /// - [`OpError::InvalidStride`] for a zero stride
    /// - [`OpError::InvalidChannelConfig`] for zero channels, a multiplier
    ///   that is not finite and positive, or a bottleneck that resolves to
    ///   zero channels
    /// - [`OpError::InvalidGeometry`] for an even kernel or a padding other
    ///   than `dilation * (kernel - 1) / 2`
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        c_in: usize,
        c_out: usize,
        kernel: usize,
        stride: usize,
        padding: usize,
        dilation: usize,
        affine: bool,
        mid: MidChannels,
    ) -> Result<Self> {
        shape::check_stride(Self::NAME, stride)?;
        shape::check_channels(Self::NAME, c_in, c_out)?;
        shape::check_kernel(Self::NAME, kernel, padding, dilation)?;
        if let MidChannels::Multiplier(m) = mid
            && !(m.is_finite() && m > 0.0)
        {
            return Err(OpError::InvalidChannelConfig {
                op: Self::NAME,
                reason: format!("bottleneck multiplier must be finite and positive, got {m}"),
            });
        }
        let c_mid = mid.resolve(c_out);
        if c_mid == 0 {
            return Err(OpError::InvalidChannelConfig {
                op: Self::NAME,
                reason: format!("bottleneck {mid:?} resolves to zero channels for c_out={c_out}"),
            });
        }
        let eps = BatchNorm2d::DEFAULT_EPS;
        Ok(Self {
            c_in,
            mid: c_mid,
            dw1: Conv2d::depthwise(c_in, kernel, stride, padding, dilation),
            pw1: Conv2d::pointwise(c_in, c_mid),
            bn1: BatchNorm2d::new(c_mid, affine, eps),
            dw2: Conv2d::depthwise(c_mid, kernel, 1, (kernel - 1) / 2, 1),
            pw2: Conv2d::pointwise(c_mid, c_out),
            bn2: BatchNorm2d::new(c_out, affine, eps),
        })
    }

    /// Bottleneck width between the two stages.
    pub fn mid_channels(&self) -> usize {
        self.mid
    }

    /// First depthwise convolution.
    pub fn depthwise(&self) -> &Conv2d {
        &self.dw1
    }
}

impl Operation for SepConv {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn forward(&self, input: &Ten64) -> Ten64 {
        assert_channels(Self::NAME, input, self.c_in);
        let x = self.pw1.forward(&self.dw1.forward(&relu(input)));
        let x = self.bn1.forward(&x);
        let x = self.pw2.forward(&self.dw2.forward(&relu(&x)));
        self.bn2.forward(&x)
    }

    fn output_shape(&self, input: Shape4) -> Shape4 {
        let s = self.pw1.output_shape(self.dw1.output_shape(input));
        self.pw2.output_shape(self.dw2.output_shape(s))
    }

    fn parameters(&self) -> Vec<&WithGrad<Ten64>> {
        let mut params = vec![self.dw1.weight(), self.pw1.weight()];
        params.extend(self.bn1.parameters());
        params.extend([self.dw2.weight(), self.pw2.weight()]);
        params.extend(self.bn2.parameters());
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut WithGrad<Ten64>> {
        let mut params = vec![self.dw1.weight_mut(), self.pw1.weight_mut()];
        params.extend(self.bn1.parameters_mut());
        params.extend([self.dw2.weight_mut(), self.pw2.weight_mut()]);
        params.extend(self.bn2.parameters_mut());
        params
    }

    fn macs(&self, input: Shape4) -> usize {
        let s1 = self.dw1.output_shape(input);
        let s2 = self.pw1.output_shape(s1);
        let s3 = self.dw2.output_shape(s2);
        let s4 = self.pw2.output_shape(s3);
        self.dw1.macs(input)
            + self.pw1.macs(s1)
            + self.bn1.macs(s2)
            + self.dw2.macs(s2)
            + self.pw2.macs(s3)
            + self.bn2.macs(s4)
    }
}

/// Single dilated depthwise-separable stage: `relu → dw → pw → bn`.
#[derive(Debug, Clone)]
pub struct DilConv {
    c_in: usize,
    dw: Conv2d,
    pw: Conv2d,
    bn: BatchNorm2d,
}

impl DilConv {
    pub const NAME: &'static str = "dil_conv";

    /// # Errors
    /// - [`OpError::InvalidStride`] for a zero stride
    /// - [`OpError::InvalidChannelConfig`] for zero channels
    /// - [`OpError::InvalidGeometry`] unless `padding == dilation * (kernel - 1) / 2` with an odd kernel
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        c_in: usize,
        c_out: usize,
        kernel: usize,
        stride: usize,
        padding: usize,
        dilation: usize,
        affine: bool,
    ) -> Result<Self> {
        shape::check_stride(Self::NAME, stride)?;
        shape::check_channels(Self::NAME, c_in, c_out)?;
        shape::check_kernel(Self::NAME, kernel, padding, dilation)?;
        Ok(Self {
            c_in,
            dw: Conv2d::depthwise(c_in, kernel, stride, padding, dilation),
            pw: Conv2d::pointwise(c_in, c_out),
            bn: BatchNorm2d::new(c_out, affine, BatchNorm2d::DEFAULT_EPS),
        })
    }
}

impl Operation for DilConv {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn forward(&self, input: &Ten64) -> Ten64 {
        assert_channels(Self::NAME, input, self.c_in);
        self.bn.forward(&self.pw.forward(&self.dw.forward(&relu(input))))
    }

    fn output_shape(&self, input: Shape4) -> Shape4 {
        self.pw.output_shape(self.dw.output_shape(input))
    }

    fn parameters(&self) -> Vec<&WithGrad<Ten64>> {
        let mut params = vec![self.dw.weight(), self.pw.weight()];
        params.extend(self.bn.parameters());
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut WithGrad<Ten64>> {
        let mut params = vec![self.dw.weight_mut(), self.pw.weight_mut()];
        params.extend(self.bn.parameters_mut());
        params
    }

    fn macs(&self, input: Shape4) -> usize {
        let s1 = self.dw.output_shape(input);
        let s2 = self.pw.output_shape(s1);
        self.dw.macs(input) + self.pw.macs(s1) + self.bn.macs(s2)
    }
}
