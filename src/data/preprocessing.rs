use crate::data::Observation;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Standard deviations below this are treated as constant columns
const MIN_STD: f32 = 1e-6;

/// Z-score scaling fitted on training rows only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    /// Mean of each feature
    pub means: Vec<f32>,
    /// Standard deviation of each feature (1.0 for constant columns)
    pub stds: Vec<f32>,
}

impl Standardizer {
    /// Fit means and standard deviations over `rows`
    pub fn fit(rows: &[&Observation], n_features: usize) -> Self {
        let mut means = vec![0.0f64; n_features];
        let mut m2 = vec![0.0f64; n_features];
        let mut count = 0.0f64;

        // Welford, to stay stable on long recordings
        for row in rows {
            count += 1.0;
            for (i, &value) in row.features.iter().enumerate().take(n_features) {
                let value = value as f64;
                let delta = value - means[i];
                means[i] += delta / count;
                m2[i] += delta * (value - means[i]);
            }
        }

        let stds = m2
            .iter()
            .map(|&m| {
                let std = if count > 1.0 { (m / count).sqrt() as f32 } else { 0.0 };
                if std < MIN_STD {
                    1.0
                } else {
                    std
                }
            })
            .collect();

        Self {
            means: means.into_iter().map(|m| m as f32).collect(),
            stds,
        }
    }

    pub fn num_features(&self) -> usize {
        self.means.len()
    }

    /// Scale rows into a row-major buffer of shape `[rows.len(), num_features]`
    pub fn transform(&self, rows: &[&Observation]) -> Vec<f32> {
        let mut out = Vec::with_capacity(rows.len() * self.num_features());
        for row in rows {
            out.extend(
                row.features
                    .iter()
                    .zip(self.means.iter().zip(&self.stds))
                    .map(|(&v, (&mean, &std))| (v - mean) / std),
            );
        }
        out
    }
}

/// Hold out a seeded random fraction of `rows` for early stopping
///
/// Returns `(train, validation)`. The validation part is empty when the
/// fraction is zero or there are too few rows to spare one.
pub fn validation_split<'a>(
    rows: &[&'a Observation],
    fraction: f64,
    seed: u64,
) -> (Vec<&'a Observation>, Vec<&'a Observation>) {
    let n_val = (rows.len() as f64 * fraction).floor() as usize;
    if n_val == 0 || n_val >= rows.len() {
        return (rows.to_vec(), Vec::new());
    }

    let mut shuffled = rows.to_vec();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    shuffled.shuffle(&mut rng);

    let train = shuffled.split_off(n_val);
    (train, shuffled)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(features: Vec<f32>) -> Observation {
        Observation {
            subject: "A".to_string(),
            row: 0,
            features,
            target: 0,
        }
    }

    #[test]
    fn test_fit_transform() {
        let rows = vec![obs(vec![1.0, 5.0]), obs(vec![3.0, 5.0])];
        let refs: Vec<&Observation> = rows.iter().collect();
        let scaler = Standardizer::fit(&refs, 2);

        assert!((scaler.means[0] - 2.0).abs() < 1e-6);
        assert!((scaler.stds[0] - 1.0).abs() < 1e-6);
        // constant column keeps unit scale
        assert_eq!(scaler.stds[1], 1.0);

        let scaled = scaler.transform(&refs);
        assert_eq!(scaled.len(), 4);
        assert!((scaled[0] + 1.0).abs() < 1e-6);
        assert!((scaled[2] - 1.0).abs() < 1e-6);
        assert_eq!(scaled[1], 0.0);
    }

    #[test]
    fn test_validation_split_sizes() {
        let rows: Vec<Observation> = (0..20).map(|i| obs(vec![i as f32])).collect();
        let refs: Vec<&Observation> = rows.iter().collect();

        let (train, val) = validation_split(&refs, 0.1, 7);
        assert_eq!(train.len(), 18);
        assert_eq!(val.len(), 2);

        let (train, val) = validation_split(&refs, 0.0, 7);
        assert_eq!(train.len(), 20);
        assert!(val.is_empty());
    }

    #[test]
    fn test_validation_split_is_seeded() {
        let rows: Vec<Observation> = (0..50).map(|i| obs(vec![i as f32])).collect();
        let refs: Vec<&Observation> = rows.iter().collect();

        let (_, a) = validation_split(&refs, 0.2, 42);
        let (_, b) = validation_split(&refs, 0.2, 42);
        let a: Vec<f32> = a.iter().map(|r| r.features[0]).collect();
        let b: Vec<f32> = b.iter().map(|r| r.features[0]).collect();
        assert_eq!(a, b);
    }
}
