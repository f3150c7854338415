use super::Operation;
use crate::error::Result;
use crate::shape::{self, Shape4};
use crate::tensors::{Ten64, Tensor, WithGrad};

/// The "no connection" candidate.
///
/// Produces zeros shaped like `x[:, :, ::stride, ::stride]`: the channel
/// count is the input's, the spatial extent follows the offset-zero stride
/// slice. Nothing is computed from the input values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zero {
    stride: usize,
}

impl Zero {
    pub const NAME: &'static str = "zero";

    /// `c_out` is only validated: the output keeps the input's channels.
    ///
    /// # Errors
    /// - [`OpError::InvalidStride`](crate::error::OpError::InvalidStride) for a zero stride
    /// - [`OpError::InvalidChannelConfig`](crate::error::OpError::InvalidChannelConfig) for zero channels
    pub fn new(c_in: usize, c_out: usize, stride: usize) -> Result<Self> {
        shape::check_stride(Self::NAME, stride)?;
        shape::check_channels(Self::NAME, c_in, c_out)?;
        Ok(Self { stride })
    }

    pub fn stride(&self) -> usize {
        self.stride
    }
}

impl Operation for Zero {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn forward(&self, input: &Ten64) -> Ten64 {
        Tensor::zeros(self.output_shape(input.shape4()).to_vec())
    }

    fn output_shape(&self, input: Shape4) -> Shape4 {
        input.strided(self.stride)
    }

    fn parameters(&self) -> Vec<&WithGrad<Ten64>> {
        Vec::new()
    }

    fn parameters_mut(&mut self) -> Vec<&mut WithGrad<Ten64>> {
        Vec::new()
    }

    fn macs(&self, _input: Shape4) -> usize {
        0
    }
}
