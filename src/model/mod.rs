pub mod architecture;
pub mod checkpoint;
pub mod tensor;

use burn::prelude::*;

/// Model configuration
#[derive(Config, Debug)]
pub struct ModelConfig {
    /// Number of input features
    pub input_size: usize,

    /// Number of hidden units in first layer
    #[config(default = "64")]
    pub hidden_size_1: usize,

    /// Number of hidden units in second layer
    #[config(default = "32")]
    pub hidden_size_2: usize,

    /// Dropout rate
    #[config(default = "0.2")]
    pub dropout: f64,
}

impl ModelConfig {
    /// Dive classifier for the given input width, hidden layers taken from
    /// the training configuration
    pub fn dive_default(input_size: usize, training: &crate::training::TrainingConfig) -> Self {
        Self::new(input_size)
            .with_hidden_size_1(training.hidden_size_1)
            .with_hidden_size_2(training.hidden_size_2)
            .with_dropout(training.dropout)
    }
}
