#![allow(clippy::too_many_arguments)]

mod compare_floats;
pub mod core;
pub mod errors;
pub mod input;
pub mod output;
pub mod pipeline;
mod statistics;
pub mod timeseries;

pub use crate::errors::BifiError;
pub use crate::pipeline::{Pipeline, PipelineOutput, ReviewRequest};

use crate::input::ProjectConfig;
use crate::output::{Output, AUGMENTED_KEY, LONG_KEY};
use crate::timeseries::{write_long_csv, Timeseries};
use std::io::Read;
use tracing::info;

/// Reads telemetry and a project configuration, runs the review pipeline and writes
/// the wide and long results to `output`.
pub fn run_review(
    data: impl Read,
    config: impl Read,
    output: impl Output,
    request: &ReviewRequest,
) -> Result<PipelineOutput, anyhow::Error> {
    let project = ProjectConfig::from_json(config)?;
    let table = Timeseries::read_csv(data)?;
    info!(
        rows = table.len(),
        columns = table.column_names().count(),
        "read telemetry"
    );

    let result = Pipeline::from_project(&project).run(table, request)?;

    if !output.is_noop() {
        result
            .wide
            .write_csv(output.writer_for_location_key(AUGMENTED_KEY)?)?;
        write_long_csv(&result.long, output.writer_for_location_key(LONG_KEY)?)?;
    }

    Ok(result)
}
