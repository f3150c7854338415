use super::{Operation, assert_channels};
use crate::error::Result;
use crate::layers::{BatchNorm2d, Conv2d};
use crate::ops::cpu::{concat_channels, crop2d, pad2d, relu};
use crate::shape::{self, Shape4};
use crate::tensors::{Ten64, WithGrad};

/// Channel-halving reduction.
///
/// Two strided 1×1 convolutions of `c_out / 2` channels each: path A reads
/// the rectified input as is, path B reads it shifted by one pixel down and
/// right (zero-pad the bottom/right edge, drop the first row and column), so
/// the two paths sample disjoint pixel grids. Their outputs are concatenated
/// on channels and normalized jointly.
#[derive(Debug, Clone)]
pub struct FactorizedReduce {
    c_in: usize,
    path_a: Conv2d,
    path_b: Conv2d,
    bn: BatchNorm2d,
}

impl FactorizedReduce {
    pub const NAME: &'static str = "factorized_reduce";

    /// # Errors
    /// - [`OpError::InvalidStride`](crate::error::OpError::InvalidStride) for a zero stride
    /// - [`OpError::InvalidChannelConfig`](crate::error::OpError::InvalidChannelConfig) for an odd `c_out`
    pub fn new(c_in: usize, c_out: usize, stride: usize, affine: bool) -> Result<Self> {
        shape::check_stride(Self::NAME, stride)?;
        shape::check_channels(Self::NAME, c_in, c_out)?;
        shape::check_even(Self::NAME, c_out)?;
        Ok(Self {
            c_in,
            path_a: Conv2d::square(c_in, c_out / 2, 1, stride, 0),
            path_b: Conv2d::square(c_in, c_out / 2, 1, stride, 0),
            bn: BatchNorm2d::new(c_out, affine, BatchNorm2d::DEFAULT_EPS),
        })
    }

    pub fn paths(&self) -> (&Conv2d, &Conv2d) {
        (&self.path_a, &self.path_b)
    }
}

impl Operation for FactorizedReduce {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn forward(&self, input: &Ten64) -> Ten64 {
        assert_channels(Self::NAME, input, self.c_in);
        let x = relu(input);
        let shifted = crop2d(&pad2d(&x, 0, 1, 0, 1), 1, 1);
        let a = self.path_a.forward(&x);
        let b = self.path_b.forward(&shifted);
        self.bn.forward(&concat_channels(&[&a, &b]))
    }

    fn output_shape(&self, input: Shape4) -> Shape4 {
        let half = self.path_a.output_shape(input);
        half.with_channels(self.bn.channels())
    }

    fn parameters(&self) -> Vec<&WithGrad<Ten64>> {
        let mut params = vec![self.path_a.weight(), self.path_b.weight()];
        params.extend(self.bn.parameters());
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut WithGrad<Ten64>> {
        let mut params = vec![self.path_a.weight_mut(), self.path_b.weight_mut()];
        params.extend(self.bn.parameters_mut());
        params
    }

    fn macs(&self, input: Shape4) -> usize {
        let out = self.output_shape(input);
        self.path_a.macs(input) + self.path_b.macs(input) + self.bn.macs(out)
    }
}
