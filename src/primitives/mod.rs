//! Operation primitives for search cells.
//!
//! Every primitive honours one contract: constructed from
//! `(c_in, c_out, stride, affine)`, it maps any `(N, c_in, H, W)` tensor to
//! `(N, c_out, ⌈H/stride⌉, ⌈W/stride⌉)`. Channel and stride preconditions are
//! checked when the primitive is built, so `forward` never fails on shape
//! grounds for a correctly wired cell.
//!
//! The set of kinds is closed: [`Op`] is a tagged union over every block, and
//! the [`registry`](crate::registry) maps operation keys onto its variants.
//!
//! | Block | Structure |
//! |-------|-----------|
//! | [`Identity`] | pass-through |
//! | [`Zero`] | strided zero tensor |
//! | [`FactorizedReduce`] | two shifted strided 1×1 paths, concatenated, normalized |
//! | [`SepConv`] | two depthwise-separable stages with a configurable bottleneck |
//! | [`DilConv`] | one dilated depthwise-separable stage |
//! | [`ConvPair`] | 1×k then k×1 convolution |
//! | [`PoolBranch`] | average/max pooling, projected when channels change |
//! | [`ReluConvBn`], [`ConvBnRelu`] | plain convolution stacks |

use crate::shape::Shape4;
use crate::tensors::{Ten64, WithGrad};

mod conv_bn;
mod conv_pair;
mod factorized_reduce;
mod identity;
mod pool_branch;
mod sep_conv;
mod zero;

pub use self::conv_bn::{ConvBnRelu, ReluConvBn};
pub use self::conv_pair::ConvPair;
pub use self::factorized_reduce::FactorizedReduce;
pub use self::identity::Identity;
pub use self::pool_branch::{PoolBranch, PoolKind};
pub use self::sep_conv::{DilConv, MidChannels, SepConv};
pub use self::zero::Zero;

/// The uniform forward contract shared by every primitive.
///
/// Forward passes borrow the operation immutably, so one instance may serve
/// concurrent forwards; parameter updates need `&mut self` and are therefore
/// exclusive.
pub trait Operation: Send + Sync {
    /// Kind name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Applies the operation. The input is never modified.
    ///
    /// # Panics
    /// Panics if the input channel count differs from the one the operation
    /// was built for.
    #[must_use]
    fn forward(&self, input: &Ten64) -> Ten64;

    /// Shape produced by [`Operation::forward`] for an input of shape `input`.
    fn output_shape(&self, input: Shape4) -> Shape4;

    /// Learnable tensors, in forward order.
    fn parameters(&self) -> Vec<&WithGrad<Ten64>>;

    /// Mutable access for an optimizer.
    fn parameters_mut(&mut self) -> Vec<&mut WithGrad<Ten64>>;

    /// Multiply-accumulates of one forward pass.
    fn macs(&self, input: Shape4) -> usize;

    /// Number of learnable scalars.
    fn param_count(&self) -> usize {
        self.parameters().iter().map(|p| p.value.len()).sum()
    }

    /// Zeroes every gradient slot.
    fn zero_grad(&mut self) {
        for p in self.parameters_mut() {
            p.zero_grad();
        }
    }

    /// Applies one SGD step to every parameter.
    fn sgd_step(&mut self, lr: f64) {
        for p in self.parameters_mut() {
            p.sgd(lr);
        }
    }
}

/// Panics unless `input` has `expected` channels.
#[track_caller]
pub(crate) fn assert_channels(op: &str, input: &Ten64, expected: usize) {
    let (_, c, _, _) = input.dims4();
    assert_eq!(c, expected, "`{op}` built for {expected} input channels, got {c}");
}

/// A constructed operation instance.
#[derive(Debug, Clone)]
pub enum Op {
    Identity(Identity),
    Zero(Zero),
    FactorizedReduce(FactorizedReduce),
    SepConv(SepConv),
    DilConv(DilConv),
    ConvPair(ConvPair),
    Pool(PoolBranch),
    ReluConvBn(ReluConvBn),
    ConvBnRelu(ConvBnRelu),
}

macro_rules! dispatch {
    ($self:expr, $op:ident => $body:expr) => {
        match $self {
            Op::Identity($op) => $body,
            Op::Zero($op) => $body,
            Op::FactorizedReduce($op) => $body,
            Op::SepConv($op) => $body,
            Op::DilConv($op) => $body,
            Op::ConvPair($op) => $body,
            Op::Pool($op) => $body,
            Op::ReluConvBn($op) => $body,
            Op::ConvBnRelu($op) => $body,
        }
    };
}

impl Operation for Op {
    fn name(&self) -> &'static str {
        dispatch!(self, op => op.name())
    }

    fn forward(&self, input: &Ten64) -> Ten64 {
        dispatch!(self, op => op.forward(input))
    }

    fn output_shape(&self, input: Shape4) -> Shape4 {
        dispatch!(self, op => op.output_shape(input))
    }

    fn parameters(&self) -> Vec<&WithGrad<Ten64>> {
        dispatch!(self, op => op.parameters())
    }

    fn parameters_mut(&mut self) -> Vec<&mut WithGrad<Ten64>> {
        dispatch!(self, op => op.parameters_mut())
    }

    fn macs(&self, input: Shape4) -> usize {
        dispatch!(self, op => op.macs(input))
    }
}

macro_rules! impl_from {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(impl From<$ty> for Op {
            fn from(op: $ty) -> Self {
                Op::$variant(op)
            }
        })*
    };
}

impl_from!(
    Identity(Identity),
    Zero(Zero),
    FactorizedReduce(FactorizedReduce),
    SepConv(SepConv),
    DilConv(DilConv),
    ConvPair(ConvPair),
    Pool(PoolBranch),
    ReluConvBn(ReluConvBn),
    ConvBnRelu(ConvBnRelu),
);
