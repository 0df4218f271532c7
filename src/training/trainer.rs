use crate::data::preprocessing::{validation_split, Standardizer};
use crate::data::Observation;
use crate::model::architecture::{init_model, DiveClassifier};
use crate::model::tensor::{feature_tensor, target_tensor, to_vec};
use crate::model::ModelConfig;
use crate::training::callbacks::{CallbackManager, EarlyStoppingCallback, EpochLoggerCallback};
use crate::training::{EpochMetrics, TrainingConfig, TrainingState};
use anyhow::{bail, Result};
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::time::Instant;

/// Rows pushed through the network at once when predicting
const PREDICT_CHUNK: usize = 4096;

/// A fitted classifier together with the scaling it expects
pub struct TrainedModel<B: Backend> {
    pub model: DiveClassifier<B>,
    pub model_config: ModelConfig,
    pub standardizer: Standardizer,
    pub state: TrainingState,
    pub duration_secs: f64,
}

impl<B: Backend> TrainedModel<B> {
    /// Positive-class probability for each row
    pub fn predict(&self, rows: &[&Observation], device: &B::Device) -> Result<Vec<f32>> {
        let n_features = self.standardizer.num_features();
        let mut probabilities = Vec::with_capacity(rows.len());

        for chunk in rows.chunks(PREDICT_CHUNK) {
            let x = feature_tensor::<B>(
                self.standardizer.transform(chunk),
                chunk.len(),
                n_features,
                device,
            );
            probabilities.extend(to_vec(self.model.predict_proba(x))?);
        }

        Ok(probabilities)
    }
}

/// Fits dive classifiers on the autodiff backend `B`
pub struct Trainer<B: AutodiffBackend> {
    config: TrainingConfig,
    device: B::Device,
    /// Tag used in log lines, e.g. `ACC5/bird3`
    label: String,
}

impl<B: AutodiffBackend> Trainer<B> {
    pub fn new(config: TrainingConfig, device: B::Device) -> Self {
        Self {
            config,
            device,
            label: String::from("model"),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Train a fresh classifier on `rows`
    ///
    /// Runs at most `epochs` epochs of shuffled mini-batch Adam, stopping
    /// early when the validation loss stalls, and returns the weights of the
    /// best epoch on the inner (non-autodiff) backend.
    pub fn train(
        &self,
        rows: &[&Observation],
        n_features: usize,
    ) -> Result<TrainedModel<B::InnerBackend>> {
        if rows.is_empty() {
            bail!("[{}] no training rows", self.label);
        }
        if n_features == 0 {
            bail!("[{}] no feature columns", self.label);
        }

        let start_time = Instant::now();
        let config = &self.config;

        let (train_rows, val_rows) =
            validation_split(rows, config.validation_fraction, config.seed);
        let standardizer = Standardizer::fit(&train_rows, n_features);

        let x_train = standardizer.transform(&train_rows);
        let y_train: Vec<i64> = train_rows.iter().map(|r| r.target as i64).collect();

        let validation = if val_rows.is_empty() {
            None
        } else {
            Some((
                feature_tensor::<B::InnerBackend>(
                    standardizer.transform(&val_rows),
                    val_rows.len(),
                    n_features,
                    &self.device,
                ),
                target_tensor::<B::InnerBackend>(&val_rows, &self.device),
            ))
        };

        let model_config = ModelConfig::dive_default(n_features, config);
        let mut model = init_model::<B>(&model_config, &self.device);
        let mut optim = AdamConfig::new().init();

        let mut callbacks = CallbackManager::new();
        callbacks.add_callback(EpochLoggerCallback::new(self.label.clone()));
        callbacks.add_callback(EarlyStoppingCallback::new(
            config.early_stopping_patience,
            config.min_delta,
        ));

        let mut state = TrainingState::new();
        let mut best: Option<DiveClassifier<B>> = None;
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let mut order: Vec<usize> = (0..train_rows.len()).collect();
        let batch_size = config.batch_size.max(1);

        callbacks.on_train_begin();

        for epoch in 0..config.epochs {
            order.shuffle(&mut rng);

            let mut loss_sum = 0.0;
            let mut batches = 0usize;

            for batch in order.chunks(batch_size) {
                let (x, y) = gather(&x_train, &y_train, batch, n_features);
                let x = feature_tensor::<B>(x, batch.len(), n_features, &self.device);
                let y = Tensor::<B, 1, Int>::from_data(TensorData::new(y, [batch.len()]), &self.device);

                let loss = model.loss(x, y);
                loss_sum += loss.clone().into_scalar().elem::<f64>();
                batches += 1;

                let grads = GradientsParams::from_grads(loss.backward(), &model);
                model = optim.step(config.learning_rate, model, grads);
            }

            let val_loss = validation.as_ref().map(|(x, y)| {
                model
                    .valid()
                    .loss(x.clone(), y.clone())
                    .into_scalar()
                    .elem::<f64>()
            });

            let metrics = EpochMetrics {
                train_loss: loss_sum / batches.max(1) as f64,
                val_loss,
            };

            if !metrics.train_loss.is_finite() {
                bail!("[{}] training diverged at epoch {}", self.label, epoch + 1);
            }

            if state.update_epoch(&metrics, config.min_delta) {
                best = Some(model.clone());
            }
            callbacks.on_epoch_end(epoch, &state, &metrics);

            if callbacks.should_stop() {
                break;
            }
        }

        callbacks.on_train_end(&state);

        let model = best.unwrap_or(model).valid();

        Ok(TrainedModel {
            model,
            model_config,
            standardizer,
            state,
            duration_secs: start_time.elapsed().as_secs_f64(),
        })
    }
}

/// Copy the rows named by `batch` out of the scaled training buffer
fn gather(x: &[f32], y: &[i64], batch: &[usize], n_features: usize) -> (Vec<f32>, Vec<i64>) {
    let mut xs = Vec::with_capacity(batch.len() * n_features);
    let mut ys = Vec::with_capacity(batch.len());
    for &i in batch {
        xs.extend_from_slice(&x[i * n_features..(i + 1) * n_features]);
        ys.push(y[i]);
    }
    (xs, ys)
}
