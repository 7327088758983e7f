//! Results report rendering and atomic checkpoint writes.
//!
//! The report is plain UTF-8 text; for every direction in sorted order:
//!
//! ```text
//! GOLD: a, PRED: b
//! TP: 3 FP: 1 FN: 0 prec: 75.0% rec: 100.0% fscore: 85.7%
//! TP:	2	cat
//! FP:	1	dog
//! OVERLAP:	1	cat	cats
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::fs;
use tracing::info;

use super::stats::{Metrics, Stats, TableKind};
use crate::domain::Direction;

/// Default number of entries listed per table and direction
pub const DEFAULT_TOP_N: usize = 1000;

fn percent(value: f64) -> String {
    format!("{:.1}%", 100.0 * value)
}

/// Render the text report; identical statistics give identical output
pub fn render_report(stats: &Stats, top_n: usize) -> String {
    let mut out = String::new();

    for direction in stats.directions() {
        let metrics = stats.metrics(direction);
        out.push_str(&format!("{}\n", direction));
        out.push_str(&format!(
            "TP: {} FP: {} FN: {} prec: {} rec: {} fscore: {}\n",
            stats.true_positives(direction),
            stats.false_positives(direction),
            stats.false_negatives(direction),
            percent(metrics.precision),
            percent(metrics.recall),
            percent(metrics.f1),
        ));
        for kind in TableKind::ALL {
            for (text, count) in stats.most_common(direction, kind, top_n) {
                out.push_str(&format!("{}:\t{}\t{}\n", kind.label(), count, text));
            }
        }
    }

    out
}

/// One direction in the JSON summary
#[derive(Debug, Clone, Serialize)]
pub struct DirectionSummary<'a> {
    #[serde(flatten)]
    pub direction: &'a Direction,
    pub true_positives: u64,
    pub false_positives: u64,
    pub false_negatives: u64,
    #[serde(flatten)]
    pub metrics: Metrics,
}

/// Render per-direction counters and metrics as pretty JSON
pub fn render_summary(stats: &Stats) -> Result<String> {
    let directions: Vec<DirectionSummary<'_>> = stats
        .directions()
        .map(|direction| DirectionSummary {
            direction,
            true_positives: stats.true_positives(direction),
            false_positives: stats.false_positives(direction),
            false_negatives: stats.false_negatives(direction),
            metrics: stats.metrics(direction),
        })
        .collect();

    serde_json::to_string_pretty(&directions).context("Failed to serialize summary")
}

/// Replace `path` with `contents` so readers never see a partial file
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    fs::write(&tmp_path, contents)
        .await
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("Failed to replace {}", path.display()))?;

    Ok(())
}

/// Writes the report (and optional JSON summary) to fixed paths.
///
/// Each call overwrites the previous output, so it can be invoked at every
/// checkpoint and once more at the end of the run.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    path: PathBuf,
    summary_path: Option<PathBuf>,
    top_n: usize,
}

impl ReportWriter {
    pub fn new(path: impl Into<PathBuf>, top_n: usize) -> Self {
        Self {
            path: path.into(),
            summary_path: None,
            top_n,
        }
    }

    /// Also write a JSON summary to `path`
    pub fn with_summary(mut self, path: Option<PathBuf>) -> Self {
        self.summary_path = path;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn write(&self, stats: &Stats) -> Result<()> {
        let report = render_report(stats, self.top_n);
        write_atomic(&self.path, report.as_bytes()).await?;

        if let Some(summary_path) = &self.summary_path {
            let summary = render_summary(stats)?;
            write_atomic(summary_path, summary.as_bytes()).await?;
        }

        info!("saved results in {}", self.path.display());
        Ok(())
    }
}
