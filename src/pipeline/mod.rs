//! Per-window orchestration: load, cross-validate, aggregate, report and
//! train the full model, one window size at a time

use crate::config::RunConfig;
use crate::crossval::{model_metadata, CrossValidation, CrossValidator};
use crate::data::discovery::{discover, WindowFile};
use crate::data::loader::{ColumnRoles, DataLoader};
use crate::data::Dataset;
use crate::error::DivenetError;
use crate::metrics::report::{save_fold_table, SummaryTable};
use crate::metrics::WindowSummary;
use crate::model::checkpoint::{full_model_path, save_model};
use crate::predict::save_predictions;
use crate::training::trainer::Trainer;
use crate::utils::{catch_panic, ensure_dir, format_duration};
use anyhow::{Context, Result};
use burn::tensor::backend::AutodiffBackend;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

/// What one window size produced
#[derive(Debug, Clone)]
pub struct WindowReport {
    pub summary: WindowSummary,
    pub model_dir: PathBuf,
    /// Subjects dropped under `--allow-partial`
    pub failed_subjects: Vec<String>,
    pub full_model_path: PathBuf,
}

/// What the whole run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub windows: Vec<WindowReport>,
    pub summary_path: PathBuf,
}

/// Drives every window file of one data type through cross-validation
pub struct Pipeline<B: AutodiffBackend> {
    config: RunConfig,
    device: B::Device,
}

impl<B: AutodiffBackend> Pipeline<B> {
    pub fn new(config: RunConfig, device: B::Device) -> Self {
        Self { config, device }
    }

    /// Process the window files in discovery order and write the summary
    pub fn run(&self) -> Result<RunReport> {
        let start = Instant::now();
        ensure_dir(&self.config.output_dir)?;

        let files = discover(&self.config.input_dir, self.config.data_type)?;

        let mut table = SummaryTable::new();
        let mut windows = Vec::with_capacity(files.len());

        for file in &files {
            let report = self
                .process_window(file)
                .with_context(|| format!("Window {} ({:?}) failed", file.window, file.path))?;
            table.push(report.summary.clone());
            windows.push(report);
        }

        if table.is_empty() {
            warn!(
                "No {} window files in {:?}; writing an empty summary",
                self.config.data_type, self.config.input_dir
            );
        }
        let summary_path = self.config.summary_path();
        table.save(&summary_path)?;

        info!(
            "Processed {} window(s) in {}",
            windows.len(),
            format_duration(start.elapsed().as_secs_f64())
        );

        Ok(RunReport {
            windows,
            summary_path,
        })
    }

    /// Cross-validate one window file and persist everything it produces
    pub fn process_window(&self, file: &WindowFile) -> Result<WindowReport> {
        let config = &self.config;
        info!("=== {} window {} ===", config.data_type, file.window);

        let roles = ColumnRoles::new(&config.subject_col, &config.target_col, &config.drop_cols);
        let dataset = DataLoader::new(roles).load(&file.path)?;

        let model_dir = config.model_dir(&file.window);
        ensure_dir(&model_dir)?;

        let xval = CrossValidator::<B>::new(config, file, self.device.clone()).run(&dataset)?;

        let folds = xval.metrics();
        save_fold_table(config.metrics_path(&file.window), &config.subject_col, &folds)?;
        let summary = WindowSummary::aggregate(&file.window, file.size, &folds);

        save_predictions(
            config.predictions_path(&file.window),
            &config.subject_col,
            &config.target_col,
            &xval.predictions(),
        )?;

        let full_model_path = catch_panic(|| self.train_full_model(file, &dataset, &xval))
            .with_context(|| format!("Full model for window {} failed", file.window))?;

        info!(
            "Window {}: mean accuracy {:.3}, mean AUC {:.3} over {} fold(s)",
            file.window, summary.means[0], summary.means[1], summary.folds
        );

        Ok(WindowReport {
            summary,
            model_dir,
            failed_subjects: xval.failed,
            full_model_path,
        })
    }

    /// Train on every subject with the same epoch budget as the folds
    fn train_full_model(
        &self,
        file: &WindowFile,
        dataset: &Dataset,
        xval: &CrossValidation,
    ) -> Result<PathBuf> {
        let expected = dataset.num_features();
        if let Some(fold) = xval.folds.iter().find(|f| f.input_size != expected) {
            return Err(DivenetError::InputWidthMismatch {
                expected,
                actual: fold.input_size,
            }
            .into());
        }

        let label = format!("{}{}/full", self.config.data_type, file.window);
        info!("[{}] training on all {} rows", label, dataset.len());

        let trained = Trainer::<B>::new(self.config.training.clone(), self.device.clone())
            .with_label(label.clone())
            .train(&dataset.all_rows(), expected)?;

        if trained.model_config.input_size != expected {
            return Err(DivenetError::InputWidthMismatch {
                expected,
                actual: trained.model_config.input_size,
            }
            .into());
        }

        let path = full_model_path(&self.config.model_dir(&file.window));
        let metadata = model_metadata(&self.config, file, None, dataset, &trained);
        save_model(trained.model, &path, &metadata)
            .with_context(|| format!("[{}] failed to persist model", label))?;

        info!(
            "[{}] saved after {} epochs ({})",
            label,
            metadata.epochs_run,
            format_duration(trained.duration_secs)
        );
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DataType;
    use crate::model::checkpoint::load_model;
    use crate::training::TrainingConfig;
    use crate::{DefaultBackend, TrainBackend};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_window(dir: &Path, name: &str, subjects: &[&str]) {
        let mut text = String::from("TagID,ix,odba,pitch,Dive\n");
        let mut ix = 0;
        for subject in subjects {
            for i in 0..10 {
                let dive = i % 2;
                let odba = (if dive == 1 { 1.5 } else { -0.5 }) + 0.05 * i as f32;
                text.push_str(&format!("{},{},{},{},{}\n", subject, ix, odba, 0.1 * i as f32, dive));
                ix += 1;
            }
        }
        fs::write(dir.join(name), text).unwrap();
    }

    fn config(input: &Path, output: &Path) -> RunConfig {
        RunConfig::validate(
            &format!("{}/", input.display()),
            &format!("{}/", output.display()),
            DataType::Acc,
            "Dive".to_string(),
            vec!["TagID".to_string(), "ix".to_string()],
            1,
        )
        .unwrap()
        .with_workers(Some(2))
        .with_training(TrainingConfig::quick_test())
    }

    fn line_count(path: &Path) -> usize {
        fs::read_to_string(path).unwrap().lines().count()
    }

    #[test]
    fn test_end_to_end_single_window() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write_window(input.path(), "ACC5_reduced.csv", &["A", "B", "C"]);
        write_window(input.path(), "IMM5_reduced.csv", &["A", "B"]);

        let config = config(input.path(), output.path());
        let report = Pipeline::<TrainBackend>::new(config.clone(), Default::default())
            .run()
            .unwrap();

        assert_eq!(report.windows.len(), 1);
        let window = &report.windows[0];
        assert!(window.failed_subjects.is_empty());

        let model_dir = config.model_dir("5");
        for subject in ["A", "B", "C"] {
            assert!(model_dir.join(format!("{}_withheld.mpk", subject)).exists());
        }
        assert!(window.full_model_path.exists());
        assert!(!output.path().join("IMM_5_models").exists());

        // header + one row per subject
        assert_eq!(line_count(&config.metrics_path("5")), 4);
        assert_eq!(line_count(&config.predictions_path("5")), 31);

        let summary = fs::read_to_string(&report.summary_path).unwrap();
        let rows: Vec<&str> = summary.lines().collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].starts_with("Window Size (s),"));
        assert!(rows[1].starts_with("5,"));

        let (_model, metadata) =
            load_model::<DefaultBackend, _>(&window.full_model_path, &Default::default()).unwrap();
        assert_eq!(metadata.held_out, None);
        assert_eq!(metadata.feature_names, vec!["odba", "pitch"]);
        assert_eq!(metadata.model_config.input_size, 2);
    }

    #[test]
    fn test_summary_sorted_across_windows() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write_window(input.path(), "ACC10_reduced.csv", &["A", "B"]);
        write_window(input.path(), "ACC5_reduced.csv", &["A", "B"]);

        let config = config(input.path(), output.path());
        let report = Pipeline::<TrainBackend>::new(config, Default::default())
            .run()
            .unwrap();

        let summary = fs::read_to_string(&report.summary_path).unwrap();
        let windows: Vec<&str> = summary
            .lines()
            .skip(1)
            .map(|l| l.split(',').next().unwrap())
            .collect();
        assert_eq!(windows, vec!["5", "10"]);
    }

    #[test]
    fn test_no_files_writes_header_only_summary() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write_window(input.path(), "IMM5_reduced.csv", &["A", "B"]);

        let config = config(input.path(), output.path());
        let report = Pipeline::<TrainBackend>::new(config, Default::default())
            .run()
            .unwrap();

        assert!(report.windows.is_empty());
        assert_eq!(line_count(&report.summary_path), 1);
    }

    #[test]
    fn test_single_subject_window_is_error() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write_window(input.path(), "ACC5_reduced.csv", &["A"]);

        let config = config(input.path(), output.path());
        let err = Pipeline::<TrainBackend>::new(config, Default::default())
            .run()
            .unwrap_err();
        assert!(err
            .chain()
            .any(|e| matches!(e.downcast_ref::<DivenetError>(), Some(DivenetError::TooFewSubjects { found: 1 }))));
    }
}
