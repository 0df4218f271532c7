use crate::data::{Dataset, Observation};
use crate::error::DivenetError;
use anyhow::{Context, Result};
use csv::ReaderBuilder;
use flate2::read::GzDecoder;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Supported file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileFormat {
    Csv,
    GzippedCsv,
}

impl FileFormat {
    /// Detect file format from path
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let ext = path.extension().and_then(|e| e.to_str());
        let stem = path.file_stem().and_then(|s| s.to_str());

        match (ext, stem) {
            (Some("gz"), Some(stem)) if stem.ends_with(".csv") => Ok(FileFormat::GzippedCsv),
            (Some("csv"), _) => Ok(FileFormat::Csv),
            _ => Err(anyhow::anyhow!("Unsupported file format: {:?}", path)),
        }
    }

    pub fn is_gzipped(&self) -> bool {
        matches!(self, FileFormat::GzippedCsv)
    }
}

/// Which columns play which role in a window data file
#[derive(Debug, Clone)]
pub struct ColumnRoles {
    /// Subject identifier column
    pub subject: String,
    /// Binary target column
    pub target: String,
    /// Columns excluded from the features besides the target
    pub drop: Vec<String>,
}

impl ColumnRoles {
    pub fn new(subject: &str, target: &str, drop: &[String]) -> Self {
        Self {
            subject: subject.to_string(),
            target: target.to_string(),
            drop: drop.to_vec(),
        }
    }

    /// Feature columns: everything but target, drop list and subject
    pub fn feature_columns(&self, headers: &[String]) -> Vec<(usize, String)> {
        let excluded: HashSet<&str> = self
            .drop
            .iter()
            .map(String::as_str)
            .chain([self.target.as_str(), self.subject.as_str()])
            .collect();

        headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !excluded.contains(h.as_str()))
            .map(|(i, h)| (i, h.clone()))
            .collect()
    }
}

/// Loads one window data file into a `Dataset`
pub struct DataLoader {
    roles: ColumnRoles,
}

impl DataLoader {
    pub fn new(roles: ColumnRoles) -> Self {
        Self { roles }
    }

    /// Load a data set from file
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Dataset> {
        let path = path.as_ref();
        info!("Loading data from {:?}", path);

        let format = FileFormat::from_path(path)?;
        debug!("Detected file format: {:?}", format);

        let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        let dataset = if format.is_gzipped() {
            self.parse(BufReader::new(GzDecoder::new(file)), path)?
        } else {
            self.parse(BufReader::new(file), path)?
        };

        if dataset.is_empty() {
            return Err(DivenetError::EmptyDataset(path.to_path_buf()).into());
        }

        info!(
            "Loaded {} rows, {} features, {} positives",
            dataset.len(),
            dataset.num_features(),
            dataset.positive_count()
        );
        Ok(dataset)
    }

    fn parse<R: Read>(&self, reader: R, path: &Path) -> Result<Dataset> {
        let mut csv_reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader
            .headers()
            .context("Failed to read CSV header")?
            .iter()
            .map(|s| s.to_string())
            .collect();
        debug!("Headers: {:?}", headers);

        let column = |name: &str| -> Result<usize, DivenetError> {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| DivenetError::MissingColumn {
                    column: name.to_string(),
                    path: PathBuf::from(path),
                })
        };
        let subject_idx = column(&self.roles.subject)?;
        let target_idx = column(&self.roles.target)?;
        let features = self.roles.feature_columns(&headers);

        let mut rows = Vec::new();
        let mut skipped = 0usize;

        for (row, result) in csv_reader.records().enumerate() {
            let record = result
                .with_context(|| format!("Failed to parse CSV record at line {}", row + 2))?;

            match parse_observation(&record, row, subject_idx, target_idx, &features) {
                Ok(obs) => rows.push(obs),
                Err(e) => {
                    skipped += 1;
                    warn!("Skipping line {} of {:?}: {}", row + 2, path, e);
                }
            }
        }

        if skipped > 0 {
            warn!("Skipped {} unparseable row(s) in {:?}", skipped, path);
        }

        let names = features.into_iter().map(|(_, name)| name).collect();
        Ok(Dataset::new(names, rows))
    }
}

fn parse_observation(
    record: &csv::StringRecord,
    row: usize,
    subject_idx: usize,
    target_idx: usize,
    features: &[(usize, String)],
) -> Result<Observation> {
    let subject = record
        .get(subject_idx)
        .filter(|s| !s.is_empty())
        .context("empty subject identifier")?
        .to_string();

    let target = parse_target(record.get(target_idx).unwrap_or(""))?;

    let mut values = Vec::with_capacity(features.len());
    for (idx, name) in features {
        let raw = record.get(*idx).unwrap_or("");
        let value = raw
            .parse::<f32>()
            .ok()
            .filter(|v| v.is_finite())
            .with_context(|| format!("column '{}' has non-numeric value '{}'", name, raw))?;
        values.push(value);
    }

    Ok(Observation {
        subject,
        row,
        features: values,
        target,
    })
}

/// Accepts `0`/`1` in integer, float or boolean spelling
fn parse_target(raw: &str) -> Result<u8> {
    match raw {
        "1" | "1.0" | "True" | "true" => Ok(1),
        "0" | "0.0" | "False" | "false" => Ok(0),
        other => anyhow::bail!("target value '{}' is not binary", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::TempDir;

    fn roles() -> ColumnRoles {
        ColumnRoles::new("TagID", "Dive", &["TagID".to_string(), "ix".to_string()])
    }

    #[test]
    fn test_file_format_detection() {
        assert_eq!(FileFormat::from_path("ACC5_reduced.csv").unwrap(), FileFormat::Csv);
        assert_eq!(
            FileFormat::from_path("ACC5_reduced.csv.gz").unwrap(),
            FileFormat::GzippedCsv
        );
        assert!(FileFormat::from_path("ACC5_reduced.tsv").is_err());
    }

    #[test]
    fn test_feature_columns_exclude_roles() {
        let headers: Vec<String> = ["ix", "TagID", "odba", "Dive", "pitch"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let cols = roles().feature_columns(&headers);
        assert_eq!(
            cols,
            vec![(2, "odba".to_string()), (4, "pitch".to_string())]
        );

        // target repeated in the drop list
        let drop = vec!["ix".to_string(), "Dive".to_string()];
        let cols = ColumnRoles::new("TagID", "Dive", &drop).feature_columns(&headers);
        assert_eq!(
            cols,
            vec![(2, "odba".to_string()), (4, "pitch".to_string())]
        );
    }

    #[test]
    fn test_parse_simple_csv() {
        let csv_data = "ix,TagID,odba,pitch,Dive\n0,A,0.5,1.5,1\n1,A,0.1,-2,0\n2,B,0.3,0.0,0.0";
        let loader = DataLoader::new(roles());
        let ds = loader.parse(Cursor::new(csv_data), Path::new("t.csv")).unwrap();

        assert_eq!(ds.feature_names, vec!["odba", "pitch"]);
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.rows[0].subject, "A");
        assert_eq!(ds.rows[0].features, vec![0.5, 1.5]);
        assert_eq!(ds.rows[0].target, 1);
        assert_eq!(ds.rows[2].row, 2);
        assert_eq!(ds.rows[2].target, 0);
    }

    #[test]
    fn test_bad_rows_are_skipped() {
        let csv_data = "TagID,odba,Dive\nA,0.5,1\nA,oops,0\nB,0.2,7\nB,0.1,0";
        let loader = DataLoader::new(roles());
        let ds = loader.parse(Cursor::new(csv_data), Path::new("t.csv")).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.rows[1].row, 3);
    }

    #[test]
    fn test_missing_target_column() {
        let csv_data = "TagID,odba\nA,0.5";
        let loader = DataLoader::new(roles());
        let err = loader
            .parse(Cursor::new(csv_data), Path::new("t.csv"))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DivenetError>(),
            Some(DivenetError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_load_gzipped() {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("IMM5_reduced.csv.gz");
        let mut enc = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        enc.write_all(b"TagID,wet,Dive\nA,1,1\nB,0,0\n").unwrap();
        enc.finish().unwrap();

        let ds = DataLoader::new(roles()).load(&path).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.subjects(), vec!["A", "B"]);
    }

    #[test]
    fn test_empty_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ACC5_reduced.csv");
        std::fs::write(&path, "TagID,odba,Dive\n").unwrap();
        assert!(DataLoader::new(roles()).load(&path).is_err());
    }
}
