//! Parallel CPU kernels.
//!
//! # CPU Backend
//!
//! Every kernel parallelizes over output planes (one `(batch, channel)` pair
//! per task) with `rayon`, so results are deterministic regardless of
//! scheduling.
//!
//! ## Implemented Kernels
//!
//! - `conv2d`: grouped, strided, dilated 2D convolution without bias
//! - `batch_norm`: per-channel normalization with batch statistics
//! - `avg_pool2d` / `max_pool2d`: padded pooling windows
//! - `relu`: element-wise rectifier
//! - `pad2d`, `crop2d`, `concat_channels`: layout transforms

mod batch_norm;
mod conv;
mod layout;
mod pool;
mod relu;

pub use self::batch_norm::batch_norm;
pub use self::conv::{Conv2dGeometry, conv2d};
pub use self::layout::{concat_channels, crop2d, pad2d};
pub use self::pool::{avg_pool2d, max_pool2d};
pub use self::relu::relu;
