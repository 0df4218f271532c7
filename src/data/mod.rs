pub mod discovery;
pub mod loader;
pub mod preprocessing;

use std::collections::BTreeSet;

/// One windowed observation of one tagged animal
#[derive(Debug, Clone)]
pub struct Observation {
    /// Subject (tag) identifier
    pub subject: String,
    /// Zero-based data row in the source file
    pub row: usize,
    /// Feature values, ordered as `Dataset::feature_names`
    pub features: Vec<f32>,
    /// Binary class label (1 = diving)
    pub target: u8,
}

/// A loaded window-size data set
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Names of the feature columns, in model input order
    pub feature_names: Vec<String>,
    /// All observations
    pub rows: Vec<Observation>,
}

impl Dataset {
    pub fn new(feature_names: Vec<String>, rows: Vec<Observation>) -> Self {
        Self { feature_names, rows }
    }

    /// Width of the model input layer
    pub fn num_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct subject identifiers, sorted
    pub fn subjects(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|r| r.subject.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Rows belonging to every subject except `held_out`
    pub fn training_rows(&self, held_out: &str) -> Vec<&Observation> {
        self.rows.iter().filter(|r| r.subject != held_out).collect()
    }

    /// Rows belonging to `held_out`
    pub fn test_rows(&self, held_out: &str) -> Vec<&Observation> {
        self.rows.iter().filter(|r| r.subject == held_out).collect()
    }

    /// Every row, for the full model
    pub fn all_rows(&self) -> Vec<&Observation> {
        self.rows.iter().collect()
    }

    /// Number of positive (diving) rows
    pub fn positive_count(&self) -> usize {
        self.rows.iter().filter(|r| r.target == 1).count()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Small data set: three subjects, two informative features
    pub fn three_subjects() -> Dataset {
        let mut rows = Vec::new();
        for (s, subject) in ["A", "B", "C"].iter().enumerate() {
            for i in 0..12 {
                let dive = (i % 3 == 0) as u8;
                let signal = if dive == 1 { 2.0 } else { -1.0 };
                rows.push(Observation {
                    subject: subject.to_string(),
                    row: s * 12 + i,
                    features: vec![signal + 0.1 * i as f32, 0.5 * s as f32],
                    target: dive,
                });
            }
        }
        Dataset::new(vec!["odba".to_string(), "pitch".to_string()], rows)
    }
}
