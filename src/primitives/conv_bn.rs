use super::{Operation, assert_channels};
use crate::error::Result;
use crate::layers::{BatchNorm2d, Conv2d};
use crate::ops::cpu::relu;
use crate::shape::{self, Shape4};
use crate::tensors::{Ten64, WithGrad};

/// `relu → conv → bn`, used as a plain strided re-projection.
#[derive(Debug, Clone)]
pub struct ReluConvBn {
    conv: Conv2d,
    bn: BatchNorm2d,
}

impl ReluConvBn {
    pub const NAME: &'static str = "relu_conv_bn";

    /// # Errors
    /// - [`OpError::InvalidStride`](crate::error::OpError::InvalidStride) for a zero stride
    /// - [`OpError::InvalidChannelConfig`](crate::error::OpError::InvalidChannelConfig) for zero channels
    /// - [`OpError::InvalidGeometry`](crate::error::OpError::InvalidGeometry) for an even kernel or non-"same" padding
    pub fn new(c_in: usize, c_out: usize, kernel: usize, stride: usize, padding: usize, affine: bool) -> Result<Self> {
        shape::check_stride(Self::NAME, stride)?;
        shape::check_channels(Self::NAME, c_in, c_out)?;
        shape::check_kernel(Self::NAME, kernel, padding, 1)?;
        Ok(Self {
            conv: Conv2d::square(c_in, c_out, kernel, stride, padding),
            bn: BatchNorm2d::new(c_out, affine, BatchNorm2d::DEFAULT_EPS),
        })
    }
}

impl Operation for ReluConvBn {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn forward(&self, input: &Ten64) -> Ten64 {
        assert_channels(Self::NAME, input, self.conv.in_channels());
        self.bn.forward(&self.conv.forward(&relu(input)))
    }

    fn output_shape(&self, input: Shape4) -> Shape4 {
        self.conv.output_shape(input)
    }

    fn parameters(&self) -> Vec<&WithGrad<Ten64>> {
        let mut params = vec![self.conv.weight()];
        params.extend(self.bn.parameters());
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut WithGrad<Ten64>> {
        let mut params = vec![self.conv.weight_mut()];
        params.extend(self.bn.parameters_mut());
        params
    }

    fn macs(&self, input: Shape4) -> usize {
        self.conv.macs(input) + self.bn.macs(self.output_shape(input))
    }
}

/// `conv → bn → relu`, the plain convolution candidate.
#[derive(Debug, Clone)]
pub struct ConvBnRelu {
    conv: Conv2d,
    bn: BatchNorm2d,
}

impl ConvBnRelu {
    pub const NAME: &'static str = "conv_bn_relu";

    /// # Errors
    /// - [`OpError::InvalidStride`](crate::error::OpError::InvalidStride) for a zero stride
    /// - [`OpError::InvalidChannelConfig`](crate::error::OpError::InvalidChannelConfig) for zero channels
    /// - [`OpError::InvalidGeometry`](crate::error::OpError::InvalidGeometry) for an even kernel or non-"same" padding
    pub fn new(c_in: usize, c_out: usize, kernel: usize, stride: usize, padding: usize, affine: bool) -> Result<Self> {
        shape::check_stride(Self::NAME, stride)?;
        shape::check_channels(Self::NAME, c_in, c_out)?;
        shape::check_kernel(Self::NAME, kernel, padding, 1)?;
        Ok(Self {
            conv: Conv2d::square(c_in, c_out, kernel, stride, padding),
            bn: BatchNorm2d::new(c_out, affine, BatchNorm2d::DEFAULT_EPS),
        })
    }
}

impl Operation for ConvBnRelu {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn forward(&self, input: &Ten64) -> Ten64 {
        assert_channels(Self::NAME, input, self.conv.in_channels());
        relu(&self.bn.forward(&self.conv.forward(input)))
    }

    fn output_shape(&self, input: Shape4) -> Shape4 {
        self.conv.output_shape(input)
    }

    fn parameters(&self) -> Vec<&WithGrad<Ten64>> {
        let mut params = vec![self.conv.weight()];
        params.extend(self.bn.parameters());
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut WithGrad<Ten64>> {
        let mut params = vec![self.conv.weight_mut()];
        params.extend(self.bn.parameters_mut());
        params
    }

    fn macs(&self, input: Shape4) -> usize {
        self.conv.macs(input) + self.bn.macs(self.output_shape(input))
    }
}
