//! Conversions between row buffers and burn tensors

use crate::data::Observation;
use anyhow::{anyhow, Result};
use burn::prelude::*;

/// Build a `[rows, n_features]` input tensor from a row-major buffer
pub fn feature_tensor<B: Backend>(
    values: Vec<f32>,
    n_rows: usize,
    n_features: usize,
    device: &B::Device,
) -> Tensor<B, 2> {
    Tensor::from_data(TensorData::new(values, [n_rows, n_features]), device)
}

/// Build the target tensor for `rows`
pub fn target_tensor<B: Backend>(rows: &[&Observation], device: &B::Device) -> Tensor<B, 1, Int> {
    let targets: Vec<i64> = rows.iter().map(|r| r.target as i64).collect();
    let n = targets.len();

    Tensor::from_data(TensorData::new(targets, [n]), device)
}

/// Copy a 1-d float tensor back to host memory
pub fn to_vec<B: Backend>(tensor: Tensor<B, 1>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec()
        .map_err(|e| anyhow!("Failed to read tensor data: {:?}", e))
}
