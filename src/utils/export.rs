
//! End-of-run export.
//!
//! - `metrics_summary.csv`: metric,value,description rows from the node's counters.
//! - event log CSV: drained from the EventRecorder by its exporter thread.

use std::{
    fs::create_dir_all,
    path::{Path, PathBuf},
};

use csv::Writer;
use log::{error, info};
use serde::Serialize;

use crate::utils::metrics::{EventRecorder, SharedMetrics};

#[derive(Debug, Serialize)]
struct SummaryRow<'a> {
    metric: &'a str,
    value: u64,
    description: &'a str,
}

/// Writes the counter summary to `<dir>/metrics_summary.csv`.
pub fn export_metrics_summary(metrics: &SharedMetrics, dir: &Path) -> Result<PathBuf, String> {
    create_dir_all(dir).map_err(|e| format!("create {:?}: {}", dir, e))?;
    let path = dir.join("metrics_summary.csv");

    let mut wtr = Writer::from_path(&path).map_err(|e| format!("open {:?}: {}", path, e))?;
    for (metric, value, description) in metrics.snapshot().rows() {
        wtr.serialize(SummaryRow {
            metric,
            value,
            description,
        })
        .map_err(|e| format!("write {:?}: {}", path, e))?;
    }
    wtr.flush().map_err(|e| format!("flush {:?}: {}", path, e))?;
    Ok(path)
}

/// Runs both exports, logging rather than failing.
pub fn run_exports(metrics: &SharedMetrics, events: &EventRecorder, dir: &Path) {
    match export_metrics_summary(metrics, dir) {
        Ok(path) => info!("Summary metrics exported to: {:?}", path),
        Err(e) => error!("Failed to export metrics: {}", e),
    }

    let log_dir = dir.join("logs");
    if let Err(e) = create_dir_all(&log_dir) {
        error!("Failed to create log directory {:?}: {}", log_dir, e);
        return;
    }
    let events_path = log_dir.join("events.csv");
    let handle = events.start_exporter(events_path.to_string_lossy().into_owned());
    match handle.join() {
        Ok(_) => info!("Events exported to: {:?}", events_path),
        Err(_) => error!("Event exporter thread panicked"),
    }
}
