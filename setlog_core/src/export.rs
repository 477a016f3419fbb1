//! CSV export of workout history.
//!
//! Flattens completed executions to one row per set so the history can be
//! opened in a spreadsheet.

use crate::{CompletedExecution, Result};
use std::io::Write;
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow<'a> {
    execution_id: String,
    started_at: String,
    finished_at: String,
    template_name: Option<&'a str>,
    duration_minutes: Option<u32>,
    body_weight: Option<f64>,
    exercise_order: u32,
    exercise_id: &'a str,
    set_order: u32,
    reps: Option<u32>,
    weight: Option<f64>,
    duration_seconds: Option<u32>,
    completed: bool,
}

/// Write executions as CSV to any writer
///
/// Returns the number of set rows written.
pub fn write_csv<W: Write>(executions: &[CompletedExecution], writer: W) -> Result<usize> {
    let mut writer = csv::Writer::from_writer(writer);
    let mut rows = 0;

    for execution in executions {
        for exercise in &execution.exercises {
            for set in &exercise.sets {
                writer.serialize(CsvRow {
                    execution_id: execution.id.to_string(),
                    started_at: execution.started_at.to_rfc3339(),
                    finished_at: execution.finished_at.to_rfc3339(),
                    template_name: execution.template_name.as_deref(),
                    duration_minutes: execution.duration_minutes,
                    body_weight: execution.body_weight,
                    exercise_order: exercise.order,
                    exercise_id: &exercise.exercise_id,
                    set_order: set.order,
                    reps: set.reps,
                    weight: set.weight,
                    duration_seconds: set.duration_seconds,
                    completed: set.completed,
                })?;
                rows += 1;
            }
        }
    }

    writer.flush()?;
    Ok(rows)
}

/// Export executions to a CSV file, replacing any existing file
///
/// The file is fsynced before returning.
pub fn export_csv(executions: &[CompletedExecution], path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = std::fs::File::create(path)?;
    let rows = write_csv(executions, &file)?;
    file.sync_all()?;

    tracing::info!(
        "Exported {} executions ({} sets) to {:?}",
        executions.len(),
        rows,
        path
    );
    Ok(rows)
}
