use crate::data::Observation;
use crate::metrics::DECISION_THRESHOLD;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Held-out prediction for one observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    /// Subject the row belongs to (and was withheld from training)
    pub subject: String,
    /// Zero-based data row in the source file
    pub row: usize,
    /// Observed label
    pub observed: u8,
    /// Predicted probability of diving
    pub probability: f32,
    /// Thresholded prediction (0 or 1)
    pub prediction: u8,
}

impl PredictionRecord {
    pub fn new(obs: &Observation, probability: f32) -> Self {
        Self {
            subject: obs.subject.clone(),
            row: obs.row,
            observed: obs.target,
            probability,
            prediction: (probability >= DECISION_THRESHOLD) as u8,
        }
    }

    pub fn is_positive(&self) -> bool {
        self.prediction == 1
    }
}

/// Pair each row with its predicted probability
pub fn records(rows: &[&Observation], probabilities: &[f32]) -> Vec<PredictionRecord> {
    rows.iter()
        .zip(probabilities)
        .map(|(obs, &p)| PredictionRecord::new(obs, p))
        .collect()
}

/// Write predictions as CSV, naming the subject and target columns as in
/// the input file
pub fn write_predictions<W: Write>(
    writer: W,
    subject_col: &str,
    target_col: &str,
    predictions: &[PredictionRecord],
) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record([subject_col, "row", target_col, "probability", "prediction"])?;

    for p in predictions {
        csv.write_record([
            p.subject.clone(),
            p.row.to_string(),
            p.observed.to_string(),
            format!("{:.6}", p.probability),
            p.prediction.to_string(),
        ])?;
    }

    csv.flush()?;
    Ok(())
}

pub fn save_predictions<P: AsRef<Path>>(
    path: P,
    subject_col: &str,
    target_col: &str,
    predictions: &[PredictionRecord],
) -> Result<()> {
    let path = path.as_ref();
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {:?}", path))?;
    write_predictions(file, subject_col, target_col, predictions)
        .with_context(|| format!("Failed to write predictions to {:?}", path))?;

    let positives = predictions.iter().filter(|p| p.is_positive()).count();
    info!(
        "Saved {} predictions ({} dives): {:?}",
        predictions.len(),
        positives,
        path
    );
    Ok(())
}
