use super::{Operation, assert_channels};
use crate::error::Result;
use crate::layers::{BatchNorm2d, Conv2d};
use crate::ops::cpu::{avg_pool2d, max_pool2d};
use crate::shape::{self, Shape4, conv_out_extent};
use crate::tensors::{Ten64, WithGrad};

const KERNEL: usize = 3;
const PADDING: usize = 1;

/// Pooling flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    /// Mean over the covered pixels; padding is not counted.
    Avg,
    /// Maximum over the covered pixels.
    Max,
}

impl PoolKind {
    /// Kind name used in logs and errors.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Avg => "avg_pool",
            Self::Max => "max_pool",
        }
    }
}

/// 3×3 pooling with padding 1, followed by a 1×1 projection and batch norm
/// when the channel count changes.
#[derive(Debug, Clone)]
pub struct PoolBranch {
    kind: PoolKind,
    c_in: usize,
    stride: usize,
    projection: Option<(Conv2d, BatchNorm2d)>,
}

impl PoolBranch {
    /// `eps` is used by the projection's batch norm.
    ///
    /// # Errors
    /// - [`OpError::InvalidStride`](crate::error::OpError::InvalidStride) for a zero stride
    /// - [`OpError::InvalidChannelConfig`](crate::error::OpError::InvalidChannelConfig) for zero channels
    pub fn new(kind: PoolKind, c_in: usize, c_out: usize, stride: usize, affine: bool, eps: f64) -> Result<Self> {
        shape::check_stride(kind.name(), stride)?;
        shape::check_channels(kind.name(), c_in, c_out)?;
        let projection = (c_in != c_out)
            .then(|| (Conv2d::pointwise(c_in, c_out), BatchNorm2d::new(c_out, affine, eps)));
        Ok(Self { kind, c_in, stride, projection })
    }

    pub fn kind(&self) -> PoolKind {
        self.kind
    }

    /// Whether a 1×1 projection follows the pooling.
    pub fn is_projected(&self) -> bool {
        self.projection.is_some()
    }

    fn pooled_shape(&self, input: Shape4) -> Shape4 {
        let h = conv_out_extent(input.h, KERNEL, self.stride, PADDING, PADDING, 1);
        let w = conv_out_extent(input.w, KERNEL, self.stride, PADDING, PADDING, 1);
        Shape4::new(input.n, input.c, h, w)
    }
}

impl Operation for PoolBranch {
    fn name(&self) -> &'static str {
        self.kind.name()
    }

    fn forward(&self, input: &Ten64) -> Ten64 {
        assert_channels(self.name(), input, self.c_in);
        let pooled = match self.kind {
            PoolKind::Avg => avg_pool2d(input, KERNEL, self.stride, PADDING),
            PoolKind::Max => max_pool2d(input, KERNEL, self.stride, PADDING),
        };
        match &self.projection {
            Some((conv, bn)) => bn.forward(&conv.forward(&pooled)),
            None => pooled,
        }
    }

    fn output_shape(&self, input: Shape4) -> Shape4 {
        let pooled = self.pooled_shape(input);
        match &self.projection {
            Some((conv, _)) => conv.output_shape(pooled),
            None => pooled,
        }
    }

    fn parameters(&self) -> Vec<&WithGrad<Ten64>> {
        match &self.projection {
            Some((conv, bn)) => {
                let mut params = vec![conv.weight()];
                params.extend(bn.parameters());
                params
            }
            None => Vec::new(),
        }
    }

    fn parameters_mut(&mut self) -> Vec<&mut WithGrad<Ten64>> {
        match &mut self.projection {
            Some((conv, bn)) => {
                let mut params = vec![conv.weight_mut()];
                params.extend(bn.parameters_mut());
                params
            }
            None => Vec::new(),
        }
    }

    fn macs(&self, input: Shape4) -> usize {
        let pooled = self.pooled_shape(input);
        let window = pooled.numel() * KERNEL * KERNEL;
        match &self.projection {
            Some((conv, bn)) => window + conv.macs(pooled) + bn.macs(conv.output_shape(pooled)),
            None => window,
        }
    }
}
