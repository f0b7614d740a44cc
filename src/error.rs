use thiserror::Error;

use crate::model::{ClampId, RecordingId, SectionId};

/// Everything that can go wrong while building, running or saving a model.
#[derive(Error, Debug)]
pub enum CableError {
    #[error("no section with id {0:?}")]
    SectionNotFound(SectionId),

    #[error("no current clamp with id {0:?}")]
    ClampNotFound(ClampId),

    #[error("no recording with id {0:?}")]
    RecordingNotFound(RecordingId),

    /// Normalised positions along a section live in [0, 1].
    #[error("location {0} is outside [0, 1]")]
    InvalidLocation(f64),

    #[error("nseg must be at least 1")]
    ZeroSegments,

    #[error("time step {0} ms must be positive and finite")]
    InvalidTimeStep(f64),

    #[error("connecting {child} to {parent} would form a loop")]
    ConnectionCycle { child: String, parent: String },

    #[error("line {line}: {reason}")]
    MalformedRow { line: u64, reason: String },

    #[error("swc line {line}: {reason}")]
    MalformedSwc { line: usize, reason: String },

    #[error("invalid morphology: {0}")]
    Morphology(String),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("plot error: {0}")]
    Plot(#[from] plotters::drawing::DrawingAreaErrorKind<std::io::Error>),
}

pub type Result<T> = std::result::Result<T, CableError>;

#[cfg(feature = "python")]
impl From<CableError> for pyo3::PyErr {
    fn from(err: CableError) -> pyo3::PyErr {
        match err {
            CableError::Io(_) | CableError::Csv(_) => {
                pyo3::exceptions::PyIOError::new_err(err.to_string())
            }
            _ => pyo3::exceptions::PyValueError::new_err(err.to_string()),
        }
    }
}
