use super::{Operation, assert_channels};
use crate::error::Result;
use crate::layers::{BatchNorm2d, Conv2d};
use crate::ops::cpu::{Conv2dGeometry, relu};
use crate::shape::{self, Shape4};
use crate::tensors::{Ten64, WithGrad};

/// Asymmetric factorization of a `k × k` convolution:
/// `relu → conv 1×k (c_in→c_in) → conv k×1 (c_in→c_out) → bn`.
///
/// The row kernel carries the column stride and the column kernel carries the
/// row stride, so the block downsamples both axes exactly once.
#[derive(Debug, Clone)]
pub struct ConvPair {
    c_in: usize,
    row: Conv2d,
    col: Conv2d,
    bn: BatchNorm2d,
}

impl ConvPair {
    pub const NAME: &'static str = "conv_pair";

    /// # Errors
    /// - [`OpError::InvalidStride`](crate::error::OpError::InvalidStride) for a zero stride
    /// - [`OpError::InvalidChannelConfig`](crate::error::OpError::InvalidChannelConfig) for zero channels
    /// - [`OpError::InvalidGeometry`](crate::error::OpError::InvalidGeometry) for an even or zero kernel
    pub fn new(c_in: usize, c_out: usize, kernel: usize, stride: usize, affine: bool, eps: f64) -> Result<Self> {
        shape::check_stride(Self::NAME, stride)?;
        shape::check_channels(Self::NAME, c_in, c_out)?;
        let pad = kernel / 2;
        shape::check_kernel(Self::NAME, kernel, pad, 1)?;
        let row = Conv2dGeometry {
            kernel: (1, kernel),
            stride: (1, stride),
            padding: (0, pad),
            dilation: (1, 1),
            groups: 1,
        };
        let col = Conv2dGeometry {
            kernel: (kernel, 1),
            stride: (stride, 1),
            padding: (pad, 0),
            dilation: (1, 1),
            groups: 1,
        };
        Ok(Self {
            c_in,
            row: Conv2d::new(c_in, c_in, row),
            col: Conv2d::new(c_in, c_out, col),
            bn: BatchNorm2d::new(c_out, affine, eps),
        })
    }
}

impl Operation for ConvPair {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn forward(&self, input: &Ten64) -> Ten64 {
        assert_channels(Self::NAME, input, self.c_in);
        self.bn.forward(&self.col.forward(&self.row.forward(&relu(input))))
    }

    fn output_shape(&self, input: Shape4) -> Shape4 {
        self.col.output_shape(self.row.output_shape(input))
    }

    fn parameters(&self) -> Vec<&WithGrad<Ten64>> {
        let mut params = vec![self.row.weight(), self.col.weight()];
        params.extend(self.bn.parameters());
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut WithGrad<Ten64>> {
        let mut params = vec![self.row.weight_mut(), self.col.weight_mut()];
        params.extend(self.bn.parameters_mut());
        params
    }

    fn macs(&self, input: Shape4) -> usize {
        let s1 = self.row.output_shape(input);
        let s2 = self.col.output_shape(s1);
        self.row.macs(input) + self.col.macs(s1) + self.bn.macs(s2)
    }
}
