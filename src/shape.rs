//! Shape and channel algebra.
//!
//! Operations never discover a shape problem while running: every channel and
//! stride precondition is checked here at construction time, and the output
//! extent of each stage is computed with the same arithmetic the kernels use.
//! The helpers at the bottom let a cell assembler verify that parallel edges
//! can be summed or concatenated before it wires them together.

use crate::error::{OpError, Result};

/// An `(N, C, H, W)` shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shape4 {
    pub n: usize,
    pub c: usize,
    pub h: usize,
    pub w: usize,
}

impl Shape4 {
    pub const fn new(n: usize, c: usize, h: usize, w: usize) -> Self {
        Self { n, c, h, w }
    }

    /// Number of elements.
    pub const fn numel(&self) -> usize {
        self.n * self.c * self.h * self.w
    }

    /// Same shape with a different channel count.
    pub const fn with_channels(self, c: usize) -> Self {
        Self { c, ..self }
    }

    /// Spatially reduced by `stride` with ceiling division, the rounding rule
    /// shared by every primitive.
    pub const fn strided(self, stride: usize) -> Self {
        Self {
            h: self.h.div_ceil(stride),
            w: self.w.div_ceil(stride),
            ..self
        }
    }

    pub const fn to_array(self) -> [usize; 4] {
        [self.n, self.c, self.h, self.w]
    }

    pub fn to_vec(self) -> Vec<usize> {
        self.to_array().to_vec()
    }
}

impl From<[usize; 4]> for Shape4 {
    fn from([n, c, h, w]: [usize; 4]) -> Self {
        Self::new(n, c, h, w)
    }
}

impl TryFrom<&[usize]> for Shape4 {
    type Error = OpError;

    fn try_from(dims: &[usize]) -> Result<Self> {
        match *dims {
            [n, c, h, w] => Ok(Self::new(n, c, h, w)),
            _ => Err(OpError::MalformedTensor { shape: dims.to_vec(), len: dims.iter().product() }),
        }
    }
}

/// Output length of a strided, padded, dilated window along one axis.
///
/// `floor((len + pad_lo + pad_hi - dilation * (kernel - 1) - 1) / stride) + 1`,
/// saturating to zero when the window does not fit.
pub const fn conv_out_extent(
    len: usize,
    kernel: usize,
    stride: usize,
    pad_lo: usize,
    pad_hi: usize,
    dilation: usize,
) -> usize {
    let padded = len + pad_lo + pad_hi;
    let span = dilation * (kernel - 1) + 1;
    if padded < span {
        0
    } else {
        (padded - span) / stride + 1
    }
}

/// Rejects non-positive strides.
pub fn check_stride(op: &'static str, stride: usize) -> Result<()> {
    if stride < 1 {
        return Err(OpError::InvalidStride { op, stride, reason: "stride must be at least 1" });
    }
    Ok(())
}

/// Rejects zero channel counts.
pub fn check_channels(op: &'static str, c_in: usize, c_out: usize) -> Result<()> {
    if c_in == 0 || c_out == 0 {
        return Err(OpError::InvalidChannelConfig {
            op,
            reason: format!("channel counts must be positive (c_in={c_in}, c_out={c_out})"),
        });
    }
    Ok(())
}

/// Requires `c_in == c_out`.
pub fn check_same_channels(op: &'static str, c_in: usize, c_out: usize) -> Result<()> {
    if c_in != c_out {
        return Err(OpError::InvalidChannelConfig {
            op,
            reason: format!("requires c_in == c_out, got c_in={c_in}, c_out={c_out}"),
        });
    }
    Ok(())
}

/// Requires an even channel count.
pub fn check_even(op: &'static str, c_out: usize) -> Result<()> {
    if c_out % 2 != 0 {
        return Err(OpError::InvalidChannelConfig {
            op,
            reason: format!("c_out must be even, got {c_out}"),
        });
    }
    Ok(())
}

/// Requires an odd kernel of at least one tap, a positive dilation and the
/// "same" padding `dilation * (kernel - 1) / 2`, so that stride alone decides
/// the output extent.
pub fn check_kernel(op: &'static str, kernel: usize, padding: usize, dilation: usize) -> Result<()> {
    if kernel == 0 || kernel % 2 == 0 {
        return Err(OpError::InvalidGeometry { op, reason: format!("kernel must be odd and positive, got {kernel}") });
    }
    if dilation == 0 {
        return Err(OpError::InvalidGeometry { op, reason: "dilation must be at least 1".to_owned() });
    }
    let same = dilation * (kernel - 1) / 2;
    if padding != same {
        return Err(OpError::InvalidGeometry {
            op,
            reason: format!("padding {padding} does not preserve extent for kernel {kernel}, dilation {dilation} (expected {same})"),
        });
    }
    Ok(())
}

/// Shape of a node fed by summing the given edges. All edges must agree on
/// every axis.
pub fn sum_compatible(shapes: &[Shape4]) -> Result<Shape4> {
    let Some(&first) = shapes.first() else {
        return Err(OpError::ShapeMismatch { context: "sum", shapes: Vec::new() });
    };
    if shapes.iter().any(|s| *s != first) {
        return Err(OpError::ShapeMismatch {
            context: "sum",
            shapes: shapes.iter().map(|s| s.to_array()).collect(),
        });
    }
    Ok(first)
}

/// Shape of a channel-wise concatenation. Edges must agree on `N`, `H` and `W`.
pub fn concat_channels(shapes: &[Shape4]) -> Result<Shape4> {
    let Some(&first) = shapes.first() else {
        return Err(OpError::ShapeMismatch { context: "concat", shapes: Vec::new() });
    };
    if shapes.iter().any(|s| (s.n, s.h, s.w) != (first.n, first.h, first.w)) {
        return Err(OpError::ShapeMismatch {
            context: "concat",
            shapes: shapes.iter().map(|s| s.to_array()).collect(),
        });
    }
    Ok(first.with_channels(shapes.iter().map(|s| s.c).sum()))
}
