//! Operation catalogs.
//!
//! A genotype names its edges with strings such as `"sep_conv_3x3"`. The
//! registry resolves such a key against one [`Catalog`] into a
//! [`Constructor`], which builds an [`Op`] for concrete channel counts and
//! stride. Two catalogs exist:
//!
//! - [`Catalog::Primary`]: independent `c_in`/`c_out`, capacity variants
//!   (`flood_*` widens the separable bottleneck ×4, `choke_*` pins it to 32)
//! - [`Catalog::Legacy`]: the older search space; every key assumes
//!   `c_in == c_out` and strided skips re-project through a 1×1 convolution
//!
//! The registry does no shape validation of its own: each block's
//! constructor checks its channel and stride preconditions.
//!
//! # Example
//!
//! ```rust
//! use cellops::primitives::Operation;
//! use cellops::registry::{Catalog, lookup};
//! use cellops::shape::Shape4;
//!
//! let op = lookup(Catalog::Primary, "sep_conv_3x3")?.build(16, 32, 2, true)?;
//! assert_eq!(op.output_shape(Shape4::new(2, 16, 32, 32)), Shape4::new(2, 32, 16, 16));
//! # Ok::<(), cellops::error::OpError>(())
//! ```

use core::fmt;
use core::str::FromStr;

use crate::error::{OpError, Result};
use crate::primitives::{
    ConvBnRelu, ConvPair, DilConv, FactorizedReduce, Identity, MidChannels, Op, PoolBranch,
    PoolKind, ReluConvBn, SepConv, Zero,
};
use crate::shape;

/// Batch-norm eps of primary-catalog pooling projections and the asymmetric block.
const PRIMARY_PROJECTION_EPS: f64 = 1e-3;
/// Bottleneck multiplier of the `flood_*` variants.
const FLOOD_MULTIPLIER: f64 = 4.0;
/// Bottleneck width of the `choke_*` variants.
const CHOKE_CHANNELS: usize = 32;

/// A versioned set of operation keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Catalog {
    /// Current search space.
    #[default]
    Primary = 0,
    /// Older search space with equal input and output widths.
    Legacy = 1,
}

impl Catalog {
    pub const ALL: [Catalog; 2] = [Catalog::Primary, Catalog::Legacy];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Legacy => "legacy",
        }
    }

    /// Keys of this catalog in their canonical order.
    pub const fn keys(self) -> &'static [Primitive] {
        match self {
            Self::Primary => PRIMARY_KEYS,
            Self::Legacy => LEGACY_KEYS,
        }
    }

    pub fn contains(self, primitive: Primitive) -> bool {
        self.keys().contains(&primitive)
    }

    /// Resolves `key` in this catalog.
    ///
    /// # Errors
    /// [`OpError::UnknownOperation`] if the key is not part of the catalog.
    pub fn lookup(self, key: &str) -> Result<Constructor> {
        match Primitive::from_key(key).filter(|p| self.contains(*p)) {
            Some(primitive) => Ok(Constructor { catalog: self, primitive }),
            None => {
                tracing::warn!(catalog = self.name(), key, "unknown operation");
                Err(OpError::UnknownOperation { catalog: self.name(), key: key.to_owned() })
            }
        }
    }
}

impl fmt::Display for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Catalog {
    type Err = OpError;

    /// Accepts `primary`/`ops` and `legacy`/`darts_ops`, case-insensitively.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "primary" | "ops" => Ok(Self::Primary),
            "legacy" | "darts_ops" => Ok(Self::Legacy),
            _ => Err(OpError::UnknownCatalog(s.to_owned())),
        }
    }
}

impl TryFrom<u8> for Catalog {
    type Error = ();

    fn try_from(value: u8) -> core::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Primary),
            1 => Ok(Self::Legacy),
            _ => Err(()),
        }
    }
}

macro_rules! primitives {
    ($($variant:ident => $key:literal),* $(,)?) => {
        /// Every operation key known to any catalog.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Primitive {
            $($variant,)*
        }

        impl Primitive {
            pub const ALL: &'static [Primitive] = &[$(Primitive::$variant,)*];

            /// Genotype key.
            pub const fn key(self) -> &'static str {
                match self {
                    $(Primitive::$variant => $key,)*
                }
            }

            pub fn from_key(key: &str) -> Option<Self> {
                match key {
                    $($key => Some(Primitive::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

primitives! {
    None => "none",
    AvgPool3x3 => "avg_pool_3x3",
    MaxPool3x3 => "max_pool_3x3",
    SkipConnect => "skip_connect",
    SepConv3x3 => "sep_conv_3x3",
    SepConv5x5 => "sep_conv_5x5",
    SepConv7x7 => "sep_conv_7x7",
    DilConv3x3 => "dil_conv_3x3",
    DilConv5x5 => "dil_conv_5x5",
    Conv7x1Then1x7 => "conv_7x1_1x7",
    FloodConv3x3 => "flood_conv_3x3",
    DilFloodConv3x3 => "dil_flood_conv_3x3",
    ChokeConv3x3 => "choke_conv_3x3",
    DilChokeConv3x3 => "dil_choke_conv_3x3",
    NorConv3x3 => "nor_conv_3x3",
    NorConv5x5 => "nor_conv_5x5",
    NorConv7x7 => "nor_conv_7x7",
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

const PRIMARY_KEYS: &[Primitive] = &[
    Primitive::None,
    Primitive::AvgPool3x3,
    Primitive::MaxPool3x3,
    Primitive::SkipConnect,
    Primitive::SepConv3x3,
    Primitive::SepConv5x5,
    Primitive::SepConv7x7,
    Primitive::DilConv3x3,
    Primitive::DilConv5x5,
    Primitive::Conv7x1Then1x7,
    Primitive::FloodConv3x3,
    Primitive::DilFloodConv3x3,
    Primitive::ChokeConv3x3,
    Primitive::DilChokeConv3x3,
];

const LEGACY_KEYS: &[Primitive] = &[
    Primitive::None,
    Primitive::AvgPool3x3,
    Primitive::MaxPool3x3,
    Primitive::SkipConnect,
    Primitive::SepConv3x3,
    Primitive::SepConv5x5,
    Primitive::SepConv7x7,
    Primitive::DilConv3x3,
    Primitive::DilConv5x5,
    Primitive::Conv7x1Then1x7,
    Primitive::NorConv3x3,
    Primitive::NorConv5x5,
    Primitive::NorConv7x7,
];

/// Resolves `key` in `catalog`. See [`Catalog::lookup`].
///
/// # Errors
/// [`OpError::UnknownOperation`] if the key is not part of the catalog.
pub fn lookup(catalog: Catalog, key: &str) -> Result<Constructor> {
    catalog.lookup(key)
}

/// A resolved catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constructor {
    catalog: Catalog,
    primitive: Primitive,
}

impl Constructor {
    pub fn catalog(&self) -> Catalog {
        self.catalog
    }

    pub fn primitive(&self) -> Primitive {
        self.primitive
    }

    /// Builds an operation instance.
    ///
    /// # Errors
    /// Whatever the underlying block rejects: [`OpError::InvalidStride`] or
    /// [`OpError::InvalidChannelConfig`].
    pub fn build(&self, c_in: usize, c_out: usize, stride: usize, affine: bool) -> Result<Op> {
        let built = match self.catalog {
            Catalog::Primary => build_primary(self.primitive, c_in, c_out, stride, affine),
            Catalog::Legacy => build_legacy(self.primitive, c_in, c_out, stride, affine),
        };
        match &built {
            Ok(op) => tracing::debug!(
                catalog = self.catalog.name(),
                key = self.primitive.key(),
                kind = crate::primitives::Operation::name(op),
                c_in,
                c_out,
                stride,
                affine,
                "constructed operation"
            ),
            Err(err) => tracing::debug!(
                catalog = self.catalog.name(),
                key = self.primitive.key(),
                %err,
                "operation rejected"
            ),
        }
        built
    }
}

fn sep_conv(c_in: usize, c_out: usize, kernel: usize, stride: usize, dilation: usize, affine: bool, mid: MidChannels) -> Result<Op> {
    let padding = dilation * (kernel - 1) / 2;
    SepConv::new(c_in, c_out, kernel, stride, padding, dilation, affine, mid).map(Op::from)
}

fn build_primary(primitive: Primitive, c_in: usize, c_out: usize, stride: usize, affine: bool) -> Result<Op> {
    use Primitive as P;

    let flood = MidChannels::Multiplier(FLOOD_MULTIPLIER);
    let choke = MidChannels::Fixed(CHOKE_CHANNELS);
    match primitive {
        P::None => Zero::new(c_in, c_out, stride).map(Op::from),
        P::AvgPool3x3 => PoolBranch::new(PoolKind::Avg, c_in, c_out, stride, affine, PRIMARY_PROJECTION_EPS).map(Op::from),
        P::MaxPool3x3 => PoolBranch::new(PoolKind::Max, c_in, c_out, stride, affine, PRIMARY_PROJECTION_EPS).map(Op::from),
        P::SkipConnect if stride == 1 => Identity::new(c_in, c_out, stride).map(Op::from),
        P::SkipConnect => FactorizedReduce::new(c_in, c_out, stride, affine).map(Op::from),
        P::SepConv3x3 => sep_conv(c_in, c_out, 3, stride, 1, affine, MidChannels::default()),
        P::SepConv5x5 => sep_conv(c_in, c_out, 5, stride, 1, affine, MidChannels::default()),
        P::SepConv7x7 => sep_conv(c_in, c_out, 7, stride, 1, affine, MidChannels::default()),
        P::DilConv3x3 => sep_conv(c_in, c_out, 3, stride, 2, affine, MidChannels::default()),
        P::DilConv5x5 => sep_conv(c_in, c_out, 5, stride, 2, affine, MidChannels::default()),
        P::Conv7x1Then1x7 => ConvPair::new(c_in, c_out, 7, stride, affine, PRIMARY_PROJECTION_EPS).map(Op::from),
        P::FloodConv3x3 => sep_conv(c_in, c_out, 3, stride, 1, affine, flood),
        P::DilFloodConv3x3 => sep_conv(c_in, c_out, 3, stride, 2, affine, flood),
        P::ChokeConv3x3 => sep_conv(c_in, c_out, 3, stride, 1, affine, choke),
        P::DilChokeConv3x3 => sep_conv(c_in, c_out, 3, stride, 2, affine, choke),
        P::NorConv3x3 | P::NorConv5x5 | P::NorConv7x7 => Err(OpError::UnknownOperation {
            catalog: Catalog::Primary.name(),
            key: primitive.key().to_owned(),
        }),
    }
}

fn build_legacy(primitive: Primitive, c_in: usize, c_out: usize, stride: usize, affine: bool) -> Result<Op> {
    use Primitive as P;

    shape::check_same_channels(primitive.key(), c_in, c_out)?;
    let c = c_in;
    let eps = crate::layers::BatchNorm2d::DEFAULT_EPS;
    match primitive {
        P::None => Zero::new(c, c, stride).map(Op::from),
        P::AvgPool3x3 => PoolBranch::new(PoolKind::Avg, c, c, stride, affine, eps).map(Op::from),
        P::MaxPool3x3 => PoolBranch::new(PoolKind::Max, c, c, stride, affine, eps).map(Op::from),
        P::SkipConnect if stride == 1 => Identity::new(c, c, stride).map(Op::from),
        P::SkipConnect => ReluConvBn::new(c, c, 1, stride, 0, affine).map(Op::from),
        P::SepConv3x3 => sep_conv(c, c, 3, stride, 1, affine, MidChannels::default()),
        P::SepConv5x5 => sep_conv(c, c, 5, stride, 1, affine, MidChannels::default()),
        P::SepConv7x7 => sep_conv(c, c, 7, stride, 1, affine, MidChannels::default()),
        P::DilConv3x3 => DilConv::new(c, c, 3, stride, 2, 2, affine).map(Op::from),
        P::DilConv5x5 => DilConv::new(c, c, 5, stride, 4, 2, affine).map(Op::from),
        P::Conv7x1Then1x7 => ConvPair::new(c, c, 7, stride, affine, eps).map(Op::from),
        P::NorConv3x3 => ConvBnRelu::new(c, c, 3, stride, 1, affine).map(Op::from),
        P::NorConv5x5 => ConvBnRelu::new(c, c, 5, stride, 2, affine).map(Op::from),
        P::NorConv7x7 => ConvBnRelu::new(c, c, 7, stride, 3, affine).map(Op::from),
        P::FloodConv3x3 | P::DilFloodConv3x3 | P::ChokeConv3x3 | P::DilChokeConv3x3 => {
            Err(OpError::UnknownOperation {
                catalog: Catalog::Legacy.name(),
                key: primitive.key().to_owned(),
            })
        }
    }
}
