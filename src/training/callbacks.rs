use crate::training::{EpochMetrics, TrainingState};
use std::time::Instant;

/// Training callback trait
///
/// Callbacks observe the training loop; any of them may ask it to stop.
pub trait TrainingCallback: Send {
    /// Called at the start of training
    fn on_train_begin(&mut self) {}

    /// Called at the end of each epoch
    fn on_epoch_end(&mut self, _epoch: usize, _state: &TrainingState, _metrics: &EpochMetrics) {}

    /// Called at the end of training
    fn on_train_end(&mut self, _state: &TrainingState) {}

    /// Whether training should stop after the current epoch
    fn should_stop(&self) -> bool {
        false
    }
}

/// Callback manager that handles multiple callbacks
#[derive(Default)]
pub struct CallbackManager {
    callbacks: Vec<Box<dyn TrainingCallback>>,
}

impl CallbackManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_callback<C: TrainingCallback + 'static>(&mut self, callback: C) {
        self.callbacks.push(Box::new(callback));
    }

    pub fn on_train_begin(&mut self) {
        for callback in &mut self.callbacks {
            callback.on_train_begin();
        }
    }

    pub fn on_epoch_end(&mut self, epoch: usize, state: &TrainingState, metrics: &EpochMetrics) {
        for callback in &mut self.callbacks {
            callback.on_epoch_end(epoch, state, metrics);
        }
    }

    pub fn on_train_end(&mut self, state: &TrainingState) {
        for callback in &mut self.callbacks {
            callback.on_train_end(state);
        }
    }

    /// True once any callback requested a stop
    pub fn should_stop(&self) -> bool {
        self.callbacks.iter().any(|c| c.should_stop())
    }
}

/// Stops when the monitored loss has not improved for `patience` epochs
pub struct EarlyStoppingCallback {
    patience: usize,
    min_delta: f64,
    best_loss: f64,
    counter: usize,
    should_stop: bool,
}

impl EarlyStoppingCallback {
    pub fn new(patience: usize, min_delta: f64) -> Self {
        Self {
            patience,
            min_delta,
            best_loss: f64::INFINITY,
            counter: 0,
            should_stop: false,
        }
    }
}

impl TrainingCallback for EarlyStoppingCallback {
    fn on_epoch_end(&mut self, epoch: usize, _state: &TrainingState, metrics: &EpochMetrics) {
        if self.patience == 0 {
            return;
        }

        let loss = metrics.monitored();
        if loss < self.best_loss - self.min_delta {
            self.best_loss = loss;
            self.counter = 0;
        } else {
            self.counter += 1;
            if self.counter >= self.patience {
                tracing::debug!(
                    "Early stopping at epoch {} (best loss {:.4})",
                    epoch + 1,
                    self.best_loss
                );
                self.should_stop = true;
            }
        }
    }

    fn should_stop(&self) -> bool {
        self.should_stop
    }
}

/// Debug-level per-epoch log line tagged with the fold being trained
pub struct EpochLoggerCallback {
    label: String,
    started: Option<Instant>,
}

impl EpochLoggerCallback {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            started: None,
        }
    }
}

impl TrainingCallback for EpochLoggerCallback {
    fn on_train_begin(&mut self) {
        self.started = Some(Instant::now());
    }

    fn on_epoch_end(&mut self, epoch: usize, _state: &TrainingState, metrics: &EpochMetrics) {
        match metrics.val_loss {
            Some(val) => tracing::debug!(
                "[{}] epoch {} - loss {:.4}, val_loss {:.4}",
                self.label,
                epoch + 1,
                metrics.train_loss,
                val
            ),
            None => tracing::debug!(
                "[{}] epoch {} - loss {:.4}",
                self.label,
                epoch + 1,
                metrics.train_loss
            ),
        }
    }

    fn on_train_end(&mut self, state: &TrainingState) {
        if let Some(start) = self.started {
            tracing::debug!(
                "[{}] trained {} epochs in {:.2?} (best epoch {})",
                self.label,
                state.epoch,
                start.elapsed(),
                state.best_epoch
            );
        }
    }
}
