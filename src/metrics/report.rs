use crate::metrics::{FoldMetrics, WindowSummary};
use anyhow::{Context, Result};
use csv::Writer;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Scalar statistic column names, in table order
pub const SCALAR_COLUMNS: [&str; 5] = [
    "Accuracy",
    "AUC",
    "Precision",
    "Sensitivity",
    "Specificity",
];

/// Confusion percentage column names, in table order
pub const CONFUSION_COLUMNS: [&str; 4] = [
    "TruePos (%)",
    "FalsePos (%)",
    "FalseNeg (%)",
    "TrueNeg (%)",
];

/// Index column of the cross-window table
pub const WINDOW_INDEX: &str = "Window Size (s)";

fn header(first: &str) -> Vec<&str> {
    std::iter::once(first)
        .chain(SCALAR_COLUMNS)
        .chain(CONFUSION_COLUMNS)
        .collect()
}

fn number_cells(values: impl IntoIterator<Item = f64>) -> impl Iterator<Item = String> {
    values.into_iter().map(|v| v.to_string())
}

/// Write the per-fold table, one row per held-out subject
pub fn write_fold_table<W: Write>(
    writer: W,
    subject_col: &str,
    folds: &[FoldMetrics],
) -> Result<()> {
    let mut csv = Writer::from_writer(writer);
    csv.write_record(header(subject_col))?;

    for fold in folds {
        let cells = std::iter::once(fold.subject.clone())
            .chain(number_cells(fold.scalars()))
            .chain(number_cells(fold.confusion.percentages()));
        csv.write_record(cells)?;
    }

    csv.flush()?;
    Ok(())
}

/// Write the per-fold table to `path`
pub fn save_fold_table<P: AsRef<Path>>(
    path: P,
    subject_col: &str,
    folds: &[FoldMetrics],
) -> Result<()> {
    let path = path.as_ref();
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {:?}", path))?;
    write_fold_table(file, subject_col, folds)
        .with_context(|| format!("Failed to write fold metrics to {:?}", path))?;
    info!("Saved fold metrics: {:?}", path);
    Ok(())
}

/// Cross-window comparison table, filled one window at a time
#[derive(Debug, Default)]
pub struct SummaryTable {
    rows: Vec<WindowSummary>,
}

impl SummaryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, summary: WindowSummary) {
        self.rows.push(summary);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows ordered by ascending numeric window size
    pub fn sorted(&self) -> Vec<&WindowSummary> {
        let mut rows: Vec<&WindowSummary> = self.rows.iter().collect();
        rows.sort_by(|a, b| a.size.cmp(&b.size).then_with(|| a.window.cmp(&b.window)));
        rows
    }

    pub fn write<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = Writer::from_writer(writer);
        csv.write_record(header(WINDOW_INDEX))?;

        for row in self.sorted() {
            let cells = std::iter::once(row.window.clone())
                .chain(number_cells(row.means))
                .chain(number_cells(row.pooled));
            csv.write_record(cells)?;
        }

        csv.flush()?;
        Ok(())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create {:?}", path))?;
        self.write(file)
            .with_context(|| format!("Failed to write summary to {:?}", path))?;
        info!("Saved window comparison ({} rows): {:?}", self.len(), path);
        Ok(())
    }
}
