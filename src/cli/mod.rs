use crate::config::{load_training_config, DataType, FailurePolicy, RunConfig};
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

/// divenet: leave-one-subject-out cross-validation of dive classifiers
#[derive(Parser, Debug)]
#[command(name = "divenet")]
#[command(about = "Leave-one-subject-out cross-validation of dive classifiers")]
#[command(version)]
pub struct Cli {
    /// Input directory holding the windowed data files (trailing separator required)
    #[arg(short = 'i', long = "indir", default_value = "../Data/Reduced/")]
    pub input_dir: String,

    /// Output directory for metrics, predictions and models (trailing separator required)
    #[arg(short = 'o', long = "outdir", default_value = "../Results/")]
    pub output_dir: String,

    /// Data type to process
    #[arg(short = 't', long = "dtype", value_enum)]
    pub data_type: DataType,

    /// Binary target column
    #[arg(short = 'y', long = "ycol", default_value = "Dive")]
    pub target_col: String,

    /// Columns excluded from the features
    #[arg(short = 'd', long = "drop", num_args = 1.., default_values = ["TagID", "ix"])]
    pub drop_cols: Vec<String>,

    /// Maximum number of training epochs
    #[arg(short = 'e', long, default_value = "50")]
    pub epochs: usize,

    /// Subject identifier column (one fold per distinct value)
    #[arg(short = 's', long, default_value = "TagID")]
    pub subject_col: String,

    /// Worker threads per window (default: all cores)
    #[arg(short = 'j', long)]
    pub workers: Option<usize>,

    /// Aggregate the remaining folds when some fail instead of aborting
    #[arg(long)]
    pub allow_partial: bool,

    /// JSON file with training hyper-parameters
    #[arg(long)]
    pub train_config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Validate the arguments into a run configuration
    pub fn into_config(self) -> Result<RunConfig> {
        let mut config = RunConfig::validate(
            &self.input_dir,
            &self.output_dir,
            self.data_type,
            self.target_col,
            self.drop_cols,
            self.epochs,
        )?
        .with_subject_col(self.subject_col)
        .with_workers(self.workers);

        if self.allow_partial {
            config = config.with_failure_policy(FailurePolicy::AllowPartial);
        }
        if let Some(path) = &self.train_config {
            config = config.with_training(load_training_config(path)?);
        }

        Ok(config)
    }
}

/// Parse CLI arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Setup logging based on verbosity
pub fn setup_logging(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
