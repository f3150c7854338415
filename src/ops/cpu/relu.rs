use rayon::prelude::*;

use crate::tensors::{Ten64, Tensor};

/// Applies the ReLU activation element-wise: `max(0, x)`.
///
/// # Example
/// ```rust
/// use cellops::ops::cpu::relu;
/// use cellops::tensors::Tensor;
///
/// let y = relu(&Tensor::new(vec![3], vec![-1.0, 0.0, 2.0]));
/// assert_eq!(y.data, vec![0.0, 0.0, 2.0]);
/// ```
pub fn relu(input: &Ten64) -> Ten64 {
    let data = input
        .data
        .par_iter()
        .map(|&x| if x > 0.0 { x } else { 0.0 })
        .collect();
    Tensor::new(input.shape.clone(), data)
}
