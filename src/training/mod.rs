pub mod callbacks;
pub mod trainer;

use serde::{Deserialize, Serialize};

/// Training configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Maximum number of training epochs
    pub epochs: usize,
    /// Batch size
    pub batch_size: usize,
    /// Learning rate
    pub learning_rate: f64,
    /// Units in the first hidden layer
    pub hidden_size_1: usize,
    /// Units in the second hidden layer
    pub hidden_size_2: usize,
    /// Dropout rate
    pub dropout: f64,
    /// Fraction of training rows held back to monitor early stopping
    pub validation_fraction: f64,
    /// Epochs without validation improvement before stopping (0 = never)
    pub early_stopping_patience: usize,
    /// Smallest loss decrease counted as an improvement
    pub min_delta: f64,
    /// Seed for shuffling and the validation split
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 50,
            batch_size: 32,
            learning_rate: 0.001,
            hidden_size_1: 64,
            hidden_size_2: 32,
            dropout: 0.2,
            validation_fraction: 0.1,
            early_stopping_patience: 5,
            min_delta: 1e-4,
            seed: 2026,
        }
    }
}

impl TrainingConfig {
    /// Configuration for quick testing
    pub fn quick_test() -> Self {
        Self {
            epochs: 3,
            batch_size: 8,
            learning_rate: 0.01,
            hidden_size_1: 8,
            hidden_size_2: 4,
            ..Default::default()
        }
    }
}

/// Losses observed at the end of one epoch
#[derive(Debug, Clone, Copy, Default)]
pub struct EpochMetrics {
    /// Mean batch loss over the epoch
    pub train_loss: f64,
    /// Loss on the held-back validation rows, if any
    pub val_loss: Option<f64>,
}

impl EpochMetrics {
    /// Loss used for early stopping
    pub fn monitored(&self) -> f64 {
        self.val_loss.unwrap_or(self.train_loss)
    }
}

/// Training state
#[derive(Debug, Clone)]
pub struct TrainingState {
    /// Epochs completed
    pub epoch: usize,
    /// Best monitored loss so far
    pub best_loss: f64,
    /// Epoch (1-based) that produced `best_loss`
    pub best_epoch: usize,
    /// Training loss history
    pub train_loss_history: Vec<f64>,
    /// Validation loss history
    pub val_loss_history: Vec<f64>,
}

impl TrainingState {
    pub fn new() -> Self {
        Self {
            epoch: 0,
            best_loss: f64::INFINITY,
            best_epoch: 0,
            train_loss_history: Vec::new(),
            val_loss_history: Vec::new(),
        }
    }

    /// Record an epoch; returns true when it improved on the best loss
    pub fn update_epoch(&mut self, metrics: &EpochMetrics, min_delta: f64) -> bool {
        self.epoch += 1;
        self.train_loss_history.push(metrics.train_loss);
        if let Some(val) = metrics.val_loss {
            self.val_loss_history.push(val);
        }

        let loss = metrics.monitored();
        if loss < self.best_loss - min_delta {
            self.best_loss = loss;
            self.best_epoch = self.epoch;
            true
        } else {
            false
        }
    }

    /// Training loss of the last completed epoch
    pub fn last_train_loss(&self) -> f64 {
        self.train_loss_history.last().copied().unwrap_or(f64::NAN)
    }
}

impl Default for TrainingState {
    fn default() -> Self {
        Self::new()
    }
}
