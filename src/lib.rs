//! # divenet: dive classifier cross-validation
//!
//! divenet trains feed-forward dive classifiers on windowed accelerometer
//! (ACC) or immersion (IMM) summaries and scores them with
//! leave-one-subject-out cross-validation, one window size at a time.
//!
//! ## Features
//!
//! - Discovery of `<dtype><window>_reduced` CSV files (plain or gzipped)
//! - One fold per subject, run on a bounded worker pool
//! - Per-fold and pooled metrics, held-out predictions, persisted models
//! - Cross-window comparison table sorted by window size
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use divenet::config::{DataType, RunConfig};
//! use divenet::pipeline::Pipeline;
//! use divenet::TrainBackend;
//!
//! let config = RunConfig::validate(
//!     "../Data/Reduced/",
//!     "../Results/",
//!     DataType::Acc,
//!     "Dive".to_string(),
//!     vec!["TagID".to_string(), "ix".to_string()],
//!     50,
//! )
//! .unwrap();
//!
//! let report = Pipeline::<TrainBackend>::new(config, Default::default())
//!     .run()
//!     .unwrap();
//! println!("summary written to {:?}", report.summary_path);
//! ```

pub mod cli;
pub mod config;
pub mod crossval;
pub mod data;
pub mod error;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod predict;
pub mod training;
pub mod utils;

use burn::backend::{Autodiff, NdArray};

/// Default backend type
pub type DefaultBackend = NdArray<f32>;

/// Backend used for training (records gradients)
pub type TrainBackend = Autodiff<DefaultBackend>;

/// Re-export commonly used types
pub use config::{DataType, RunConfig};
pub use data::loader::DataLoader;
pub use data::{Dataset, Observation};
pub use error::DivenetError;
pub use metrics::{FoldMetrics, WindowSummary};
pub use model::{architecture::DiveClassifier, ModelConfig};
pub use pipeline::{Pipeline, RunReport};
pub use training::TrainingConfig;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!(
        "{} v{} - leave-one-subject-out dive classifier training",
        NAME, VERSION
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_info() {
        let info_str = info();
        assert!(info_str.contains("divenet"));
        assert!(info_str.contains(VERSION));
    }
}
