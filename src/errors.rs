use thiserror::Error;

/// Errors raised by the bifacial irradiance core and its augmentation steps.
///
/// Physically degenerate but well-defined inputs (sun below the horizon, negative
/// modelled irradiance) are not errors and never produce one of these.
#[derive(Debug, Error)]
pub enum BifiError {
    #[error("Required column '{0}' was not found in the time series")]
    MissingColumn(String),
    #[error("Length mismatch for '{name}': expected {expected} values, got {actual}")]
    LengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("Domain violation in {function}: {detail}")]
    DomainViolation {
        function: &'static str,
        detail: String,
    },
    #[error("Invalid array geometry: {0}")]
    InvalidGeometry(String),
    #[error("Ground cover ratio must be within (0, 1], got {0}")]
    InvalidGroundCoverRatio(f64),
    #[error("No system information for site '{site}' and row '{row}'")]
    UnknownSystem { site: String, row: String },
    #[error("Time series index is not strictly increasing at row {0}")]
    UnsortedIndex(usize),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Could not parse timestamp '{value}': {source}")]
    Timestamp {
        value: String,
        source: chrono::ParseError,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    SolarPosition(#[from] solar_positioning::Error),
}

impl BifiError {
    pub(crate) fn length_mismatch(name: &str, expected: usize, actual: usize) -> Self {
        Self::LengthMismatch {
            name: name.to_string(),
            expected,
            actual,
        }
    }
}

/// Checks that a named slice has the length of the series it must be parallel to.
pub(crate) fn check_length(name: &str, expected: usize, values: &[f64]) -> Result<(), BifiError> {
    if values.len() != expected {
        return Err(BifiError::length_mismatch(name, expected, values.len()));
    }
    Ok(())
}
