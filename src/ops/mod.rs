//! # Forward Kernels
//!
//! Numeric kernels behind the operation primitives. Only a CPU backend is
//! provided; it is a reference implementation sized to apply every primitive
//! and check its shape contract, not a training-speed kernel library.
//!
//! ## Submodules
//!
//! - [`cpu`]: multi-threaded CPU kernels built on [`rayon`](https://docs.rs/rayon)
//!
//! ## Conventions
//!
//! - All kernels take `(N, C, H, W)` tensors by reference and return a fresh tensor
//! - Kernels never mutate their inputs
//! - Kernels panic on shape mismatches; shape validation belongs to construction

pub mod cpu;
