//! Leave-one-subject-out cross-validation of one window data set

use crate::config::{FailurePolicy, RunConfig};
use crate::data::discovery::WindowFile;
use crate::data::Dataset;
use crate::error::DivenetError;
use crate::metrics::FoldMetrics;
use crate::model::checkpoint::{fold_model_path, save_model, ModelMetadata};
use crate::predict::{self, PredictionRecord};
use crate::training::trainer::{TrainedModel, Trainer};
use crate::utils::{catch_panic, file_safe, worker_count};
use anyhow::{bail, Context, Result};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::marker::PhantomData;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// One held-out subject
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub subject: String,
}

/// One fold per distinct subject, in subject order
pub fn plan_folds(dataset: &Dataset) -> Result<Vec<Fold>, DivenetError> {
    let subjects = dataset.subjects();
    if subjects.len() < 2 {
        return Err(DivenetError::TooFewSubjects {
            found: subjects.len(),
        });
    }
    Ok(subjects.into_iter().map(|subject| Fold { subject }).collect())
}

/// Everything a successful fold produces
#[derive(Debug, Clone)]
pub struct FoldResult {
    pub metrics: FoldMetrics,
    /// Held-out predictions, captured during evaluation
    pub predictions: Vec<PredictionRecord>,
    pub model_path: PathBuf,
    /// Width of the model input layer
    pub input_size: usize,
    pub epochs_run: usize,
}

/// Outcome of one fold task, success or failure
#[derive(Debug)]
pub struct FoldOutcome {
    pub subject: String,
    pub result: Result<FoldResult>,
}

/// Folds of one window after the failure policy was applied
#[derive(Debug)]
pub struct CrossValidation {
    /// Successful folds in subject order
    pub folds: Vec<FoldResult>,
    /// Subjects whose fold failed (only non-empty under `AllowPartial`)
    pub failed: Vec<String>,
}

impl CrossValidation {
    pub fn metrics(&self) -> Vec<FoldMetrics> {
        self.folds.iter().map(|f| f.metrics.clone()).collect()
    }

    /// All held-out predictions, concatenated in subject order
    pub fn predictions(&self) -> Vec<PredictionRecord> {
        self.folds
            .iter()
            .flat_map(|f| f.predictions.iter().cloned())
            .collect()
    }
}

/// Runs the folds of one window on a bounded worker pool
pub struct CrossValidator<'a, B: AutodiffBackend> {
    config: &'a RunConfig,
    window: &'a WindowFile,
    device: B::Device,
    _backend: PhantomData<B>,
}

impl<'a, B: AutodiffBackend> CrossValidator<'a, B> {
    pub fn new(config: &'a RunConfig, window: &'a WindowFile, device: B::Device) -> Self {
        Self {
            config,
            window,
            device,
            _backend: PhantomData,
        }
    }

    /// Train and evaluate every fold of `dataset`
    ///
    /// Each fold's outcome is captured separately, so one failing (or
    /// panicking) fold never cancels its siblings. The failure policy is
    /// applied once the pool has drained.
    pub fn run(&self, dataset: &Dataset) -> Result<CrossValidation> {
        let folds = plan_folds(dataset)?;
        let workers = worker_count(self.config.workers);

        info!(
            "Cross-validating {} folds on {} worker(s)",
            folds.len(),
            workers
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("fold-worker-{}", i))
            .build()
            .context("Failed to build worker pool")?;

        let progress = ProgressBar::new(folds.len() as u64);
        progress.set_style(
            ProgressStyle::with_template("{prefix} [{bar:30}] {pos}/{len} folds {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        progress.set_prefix(format!("{}{}", self.config.data_type, self.window.window));

        let outcomes: Vec<FoldOutcome> = pool.install(|| {
            folds
                .par_iter()
                .map(|fold| {
                    let result = catch_panic(|| self.run_fold(dataset, fold));
                    progress.inc(1);
                    FoldOutcome {
                        subject: fold.subject.clone(),
                        result,
                    }
                })
                .collect()
        });
        progress.finish_and_clear();

        self.apply_policy(outcomes)
    }

    fn apply_policy(&self, outcomes: Vec<FoldOutcome>) -> Result<CrossValidation> {
        let mut folds = Vec::with_capacity(outcomes.len());
        let mut failed = Vec::new();

        for outcome in outcomes {
            match outcome.result {
                Ok(result) => folds.push(result),
                Err(e) => {
                    error!(
                        "Fold {}{}/{} failed: {:#}",
                        self.config.data_type, self.window.window, outcome.subject, e
                    );
                    failed.push(outcome.subject);
                }
            }
        }

        if !failed.is_empty() {
            let fatal = match self.config.failure_policy {
                FailurePolicy::FailWindow => true,
                FailurePolicy::AllowPartial => folds.is_empty(),
            };
            if fatal {
                return Err(DivenetError::FoldsFailed {
                    window: self.window.window.clone(),
                    subjects: failed,
                }
                .into());
            }
            warn!(
                "Continuing window {} without {} failed fold(s): {:?}",
                self.window.window,
                failed.len(),
                failed
            );
        }

        Ok(CrossValidation { folds, failed })
    }

    /// Train without `fold.subject`, evaluate on it, persist the model
    fn run_fold(&self, dataset: &Dataset, fold: &Fold) -> Result<FoldResult> {
        let label = format!(
            "{}{}/{}",
            self.config.data_type, self.window.window, fold.subject
        );
        let train_rows = dataset.training_rows(&fold.subject);
        let test_rows = dataset.test_rows(&fold.subject);
        if test_rows.is_empty() {
            bail!("[{}] no rows for held-out subject", label);
        }

        debug!(
            "[{}] {} training rows, {} test rows",
            label,
            train_rows.len(),
            test_rows.len()
        );

        let trainer = Trainer::<B>::new(self.config.training.clone(), self.device.clone())
            .with_label(label.clone());
        let trained = trainer.train(&train_rows, dataset.num_features())?;

        let probabilities = trained.predict(&test_rows, &self.device)?;
        let targets: Vec<u8> = test_rows.iter().map(|r| r.target).collect();

        let metrics = FoldMetrics::evaluate(&fold.subject, &targets, &probabilities);
        let predictions = predict::records(&test_rows, &probabilities);

        let model_dir = self.config.model_dir(&self.window.window);
        let model_path = fold_model_path(&model_dir, &file_safe(&fold.subject));
        let metadata = model_metadata(
            self.config,
            self.window,
            Some(fold.subject.clone()),
            dataset,
            &trained,
        );
        let input_size = trained.model_config.input_size;
        let epochs_run = trained.state.epoch;

        save_model(trained.model, &model_path, &metadata)
            .with_context(|| format!("[{}] failed to persist model", label))?;

        debug!(
            "[{}] accuracy {:.3}, AUC {:.3} after {} epochs",
            label, metrics.accuracy, metrics.auc, epochs_run
        );

        Ok(FoldResult {
            metrics,
            predictions,
            model_path,
            input_size,
            epochs_run,
        })
    }
}

/// Sidecar metadata for a model trained on `dataset`
pub fn model_metadata<B: Backend>(
    config: &RunConfig,
    window: &WindowFile,
    held_out: Option<String>,
    dataset: &Dataset,
    trained: &TrainedModel<B>,
) -> ModelMetadata {
    ModelMetadata {
        version: crate::VERSION.to_string(),
        data_type: config.data_type.to_string(),
        window: window.window.clone(),
        held_out,
        feature_names: dataset.feature_names.clone(),
        standardizer: trained.standardizer.clone(),
        model_config: trained.model_config.clone(),
        epochs_run: trained.state.epoch,
        final_loss: trained.state.last_train_loss(),
        timestamp: ModelMetadata::timestamp_now(),
    }
}
