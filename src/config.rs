use crate::error::DivenetError;
use crate::training::TrainingConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

/// Sensor stream a set of windowed data files was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
pub enum DataType {
    /// Accelerometer
    #[value(name = "ACC")]
    Acc,
    /// Immersion (wet/dry)
    #[value(name = "IMM")]
    Imm,
}

impl DataType {
    /// Filename prefix and output tag
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Acc => "ACC",
            DataType::Imm => "IMM",
        }
    }

}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do when some folds of a window fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Any failed fold fails the whole window
    FailWindow,
    /// Drop failed folds and aggregate the rest
    AllowPartial,
}

/// Validated run configuration, built once in `main` and passed down
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub data_type: DataType,
    pub target_col: String,
    pub drop_cols: Vec<String>,
    pub epochs: usize,
    pub subject_col: String,
    /// Worker pool size; `None` uses every available core
    pub workers: Option<usize>,
    pub failure_policy: FailurePolicy,
    pub training: TrainingConfig,
}

impl RunConfig {
    /// Check the invariants the rest of the pipeline relies on
    pub fn validate(
        input_dir: &str,
        output_dir: &str,
        data_type: DataType,
        target_col: String,
        drop_cols: Vec<String>,
        epochs: usize,
    ) -> Result<Self, DivenetError> {
        check_dir_arg("input", input_dir)?;
        check_dir_arg("output", output_dir)?;

        if epochs == 0 {
            return Err(DivenetError::Config("epochs must be at least 1".to_string()));
        }
        if target_col.trim().is_empty() {
            return Err(DivenetError::Config("target column name is empty".to_string()));
        }

        let training = TrainingConfig {
            epochs,
            ..TrainingConfig::default()
        };

        Ok(Self {
            input_dir: PathBuf::from(input_dir),
            output_dir: PathBuf::from(output_dir),
            data_type,
            target_col,
            drop_cols,
            epochs,
            subject_col: "TagID".to_string(),
            workers: None,
            failure_policy: FailurePolicy::FailWindow,
            training,
        })
    }

    pub fn with_subject_col(mut self, subject_col: String) -> Self {
        self.subject_col = subject_col;
        self
    }

    pub fn with_workers(mut self, workers: Option<usize>) -> Self {
        self.workers = workers.filter(|&n| n > 0);
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Replace the training hyper-parameters; the epoch cap from the
    /// command line always wins.
    pub fn with_training(mut self, training: TrainingConfig) -> Self {
        self.training = TrainingConfig {
            epochs: self.epochs,
            ..training
        };
        self
    }

    /// Directory holding the fold models and full model of one window
    pub fn model_dir(&self, window: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}_models", self.data_type, window))
    }

    pub fn metrics_path(&self, window: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}_xval_metrics_keras.csv", self.data_type, window))
    }

    pub fn predictions_path(&self, window: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}_xval_predictions.csv", self.data_type, window))
    }

    pub fn summary_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_WindowComp_XVal_Metrics_Keras.csv", self.data_type))
    }

    /// Echo the resolved parameters before any work starts
    pub fn log(&self) {
        info!("PARAMS USED:");
        info!("  indir:       {}", self.input_dir.display());
        info!("  outdir:      {}", self.output_dir.display());
        info!("  dtype:       {}", self.data_type);
        info!("  y_col:       {}", self.target_col);
        info!("  subject_col: {}", self.subject_col);
        info!("  drop:        {:?}", self.drop_cols);
        info!("  epochs:      {}", self.epochs);
        match self.workers {
            Some(n) => info!("  workers:     {}", n),
            None => info!("  workers:     all available"),
        }
        info!("  on failure:  {:?}", self.failure_policy);
    }
}

fn check_dir_arg(name: &str, value: &str) -> Result<(), DivenetError> {
    if value.is_empty() {
        return Err(DivenetError::Config(format!("{} directory is empty", name)));
    }
    if !ends_with_separator(value) {
        return Err(DivenetError::Config(format!(
            "{} directory '{}' must end with a path separator",
            name, value
        )));
    }
    Ok(())
}

fn ends_with_separator(value: &str) -> bool {
    value
        .chars()
        .last()
        .map(std::path::is_separator)
        .unwrap_or(false)
}

/// Load a JSON training configuration file
pub fn load_training_config<P: AsRef<Path>>(path: P) -> anyhow::Result<TrainingConfig> {
    use anyhow::Context;

    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read training config {:?}", path))?;
    let config: TrainingConfig = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse training config {:?}", path))?;
    Ok(config)
}
