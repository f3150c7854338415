use super::{Operation, assert_channels};
use crate::error::{OpError, Result};
use crate::shape::{self, Shape4};
use crate::tensors::{Ten64, WithGrad};

/// Pass-through edge. Only valid where the cell keeps both the channel count
/// and the resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    channels: usize,
}

impl Identity {
    pub const NAME: &'static str = "identity";

    /// # Errors
    /// - [`OpError::InvalidStride`] unless `stride == 1`
    /// - [`OpError::InvalidChannelConfig`] unless `c_in == c_out`
    pub fn new(c_in: usize, c_out: usize, stride: usize) -> Result<Self> {
        shape::check_stride(Self::NAME, stride)?;
        if stride != 1 {
            return Err(OpError::InvalidStride {
                op: Self::NAME,
                stride,
                reason: "identity has no downsampling path",
            });
        }
        shape::check_channels(Self::NAME, c_in, c_out)?;
        shape::check_same_channels(Self::NAME, c_in, c_out)?;
        Ok(Self { channels: c_in })
    }
}

impl Operation for Identity {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn forward(&self, input: &Ten64) -> Ten64 {
        assert_channels(Self::NAME, input, self.channels);
        input.clone()
    }

    fn output_shape(&self, input: Shape4) -> Shape4 {
        input
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
