use crate::config::DataType;
use crate::error::DivenetError;
use anyhow::{Context, Result};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A data file for one window size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowFile {
    /// Path to the CSV
    pub path: PathBuf,
    /// Window token as written in the file name (used in output names)
    pub window: String,
    /// Numeric window size (used for ordering)
    pub size: u64,
}

/// List the window data files of one data type in `dir`
///
/// Candidates are files named `<dtype>*.csv` (or `.csv.gz`). Every candidate
/// must carry a `<dtype><digits>_reduced` token; one that does not is an
/// error rather than being skipped.
pub fn discover<P: AsRef<Path>>(dir: P, data_type: DataType) -> Result<Vec<WindowFile>> {
    let dir = dir.as_ref();
    let prefix = data_type.as_str();

    let mut candidates = Vec::new();
    for entry in fs::read_dir(dir)
        .with_context(|| format!("Failed to read input directory {:?}", dir))?
    {
        let entry = entry.context("Failed to read directory entry")?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => continue,
        };
        if is_candidate(name, prefix) {
            candidates.push(path);
        } else {
            debug!("Ignoring {:?}", path);
        }
    }
    candidates.sort();

    let pattern = WindowPattern::new(data_type)?;
    let mut files = Vec::with_capacity(candidates.len());
    for path in candidates {
        let window = pattern.token(&path)?;
        let size = window
            .parse::<u64>()
            .map_err(|_| pattern.error(&path))?;
        files.push(WindowFile { path, window, size });
    }

    info!("Found {} {} data file(s) in {:?}", files.len(), prefix, dir);
    Ok(files)
}

fn is_candidate(name: &str, prefix: &str) -> bool {
    name.starts_with(prefix) && (name.ends_with(".csv") || name.ends_with(".csv.gz"))
}

/// File name pattern `<dtype><digits>_reduced*.csv[.gz]` for one data type
#[derive(Debug, Clone)]
pub struct WindowPattern {
    prefix: &'static str,
    regex: Regex,
}

impl WindowPattern {
    pub fn new(data_type: DataType) -> Result<Self> {
        let prefix = data_type.as_str();
        let regex = Regex::new(&format!(
            r"^{}(\d+)_reduced.*\.csv(\.gz)?$",
            regex::escape(prefix)
        ))
        .with_context(|| format!("Failed to build file pattern for {}", prefix))?;
        Ok(Self { prefix, regex })
    }

    /// Window digits captured from the file name of `path`
    pub fn token(&self, path: &Path) -> Result<String, DivenetError> {
        path.file_name()
            .and_then(|n| n.to_str())
            .and_then(|name| self.regex.captures(name))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| self.error(path))
    }

    fn error(&self, path: &Path) -> DivenetError {
        DivenetError::FilePattern {
            path: path.to_path_buf(),
            prefix: self.prefix.to_string(),
        }
    }
}
