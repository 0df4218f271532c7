use crate::data::preprocessing::Standardizer;
use crate::model::architecture::{init_model, DiveClassifier};
use crate::model::ModelConfig;
use anyhow::{anyhow, Context, Result};
use burn::prelude::*;
use burn::record::CompactRecorder;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Extension burn's compact recorder writes
pub const MODEL_EXTENSION: &str = "mpk";

/// Sidecar describing a persisted model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Crate version that wrote the model
    pub version: String,
    /// Data type tag (ACC/IMM)
    pub data_type: String,
    /// Window token from the source file name
    pub window: String,
    /// Subject withheld from training, `None` for the full model
    pub held_out: Option<String>,
    /// Feature column order expected at input
    pub feature_names: Vec<String>,
    /// Scaling fitted on the training rows
    pub standardizer: Standardizer,
    /// Network shape
    pub model_config: ModelConfig,
    /// Epochs actually run (early stopping may cut the cap short)
    pub epochs_run: usize,
    /// Training loss of the last epoch
    pub final_loss: f64,
    /// Seconds since the Unix epoch
    pub timestamp: String,
}

impl ModelMetadata {
    pub fn timestamp_now() -> String {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs().to_string())
            .unwrap_or_default()
    }
}

/// Path of the fold model trained without `subject`
pub fn fold_model_path(model_dir: &Path, subject: &str) -> PathBuf {
    model_dir.join(format!("{}_withheld.{}", subject, MODEL_EXTENSION))
}

/// Path of the model trained on every subject
pub fn full_model_path(model_dir: &Path) -> PathBuf {
    model_dir.join(format!("full_model.{}", MODEL_EXTENSION))
}

/// Save model weights and their JSON sidecar
pub fn save_model<B: Backend, P: AsRef<Path>>(
    model: DiveClassifier<B>,
    path: P,
    metadata: &ModelMetadata,
) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create model directory {:?}", parent))?;
    }

    model
        .save_file(path.to_path_buf(), &CompactRecorder::new())
        .map_err(|e| anyhow!("Failed to save model {:?}: {:?}", path, e))?;

    let metadata_path = path.with_extension("json");
    let metadata_json =
        serde_json::to_string_pretty(metadata).context("Failed to serialize metadata")?;
    fs::write(&metadata_path, metadata_json)
        .with_context(|| format!("Failed to write metadata file {:?}", metadata_path))?;

    debug!("Saved model: {:?}", path);
    Ok(())
}

/// Load a model saved by [`save_model`]
pub fn load_model<B: Backend, P: AsRef<Path>>(
    path: P,
    device: &B::Device,
) -> Result<(DiveClassifier<B>, ModelMetadata)> {
    let path = path.as_ref();
    info!("Loading model from {:?}", path);

    let metadata_path = path.with_extension("json");
    let metadata_json = fs::read_to_string(&metadata_path)
        .with_context(|| format!("Failed to read metadata file {:?}", metadata_path))?;
    let metadata: ModelMetadata =
        serde_json::from_str(&metadata_json).context("Failed to parse metadata")?;

    let model = init_model::<B>(&metadata.model_config, device)
        .load_file(path.to_path_buf(), &CompactRecorder::new(), device)
        .map_err(|e| anyhow!("Failed to load model {:?}: {:?}", path, e))?;

    Ok((model, metadata))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tensor::{feature_tensor, to_vec};
    use burn::backend::NdArray;
    use tempfile::TempDir;

    type TestBackend = NdArray<f32>;

    fn metadata(config: ModelConfig) -> ModelMetadata {
        ModelMetadata {
            version: crate::VERSION.to_string(),
            data_type: "ACC".to_string(),
            window: "5".to_string(),
            held_out: Some("A".to_string()),
            feature_names: vec!["odba".to_string(), "pitch".to_string()],
            standardizer: Standardizer {
                means: vec![0.0, 1.0],
                stds: vec![1.0, 2.0],
            },
            model_config: config,
            epochs_run: 3,
            final_loss: 0.4,
            timestamp: ModelMetadata::timestamp_now(),
        }
    }

    #[test]
    fn test_model_paths() {
        let dir = Path::new("out/ACC_5_models");
        assert_eq!(
            fold_model_path(dir, "bird.1"),
            PathBuf::from("out/ACC_5_models/bird.1_withheld.mpk")
        );
        assert_eq!(
            full_model_path(dir),
            PathBuf::from("out/ACC_5_models/full_model.mpk")
        );
    }

    #[test]
    fn test_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let device = <TestBackend as Backend>::Device::default();
        let config = ModelConfig::new(2).with_hidden_size_1(8).with_hidden_size_2(4);
        let model = init_model::<TestBackend>(&config, &device);

        let input = || feature_tensor::<TestBackend>(vec![0.5, -1.0, 2.0, 0.0], 2, 2, &device);
        let before = to_vec(model.predict_proba(input())).unwrap();

        let path = fold_model_path(temp_dir.path(), "A");
        save_model(model, &path, &metadata(config)).unwrap();
        assert!(path.exists());
        assert!(path.with_extension("json").exists());

        let (loaded, meta) = load_model::<TestBackend, _>(&path, &device).unwrap();
        assert_eq!(meta.held_out.as_deref(), Some("A"));
        assert_eq!(meta.model_config.hidden_size_1, 8);

        let after = to_vec(loaded.predict_proba(input())).unwrap();
        for (a, b) in before.iter().zip(&after) {
            // compact recorder stores half precision
            assert!((a - b).abs() < 1e-2);
        }
    }
}
