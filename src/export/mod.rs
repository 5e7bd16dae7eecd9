//! Offline export of stored history to Parquet

mod parquet;

pub use parquet::{
    assessment_schema, calibration_schema, AssessmentRecord, ParquetExporter, ParquetReader,
};

use crate::store::{HistoryStore, Store};
use chrono::NaiveDate;
use std::path::PathBuf;

/// Export every stored assessment and calibration snapshot. Returns the
/// files written.
pub async fn export_all(
    store: &dyn Store,
    exporter: &ParquetExporter,
    date: NaiveDate,
) -> anyhow::Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    let assessments = store.all_assessments().await?;
    let path = exporter.file_path("assessments", date);
    if exporter.write_assessments(&path, &assessments)? {
        written.push(path);
    }

    let calibration = store.calibration_history().await?;
    let path = exporter.file_path("calibration", date);
    if exporter.write_calibration(&path, &calibration)? {
        written.push(path);
    }

    tracing::info!(files = written.len(), "Export complete");
    Ok(written)
}
