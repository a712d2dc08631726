//! Error taxonomy of the take engine

use thiserror::Error;

use crate::domain::{
    CameraError, ConflictSet, NumberingError, ProjectId, RangeError, ResolutionError,
    SettingsError, Strategy, TakeError, TakeId,
};

#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("Invalid range: {start}..{end}")]
    InvalidRange { start: u32, end: u32 },

    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    #[error("Unknown camera {camera}: project has {count} camera(s)")]
    UnknownCamera { camera: u32, count: u32 },

    #[error("Project {0} records a single camera; it has no recording state")]
    SingleCamera(ProjectId),

    #[error("Take conflicts with {} existing record(s)", .0.len())]
    Duplicate(ConflictSet),

    #[error("Renumbering found no free numbers after {0}")]
    RenumberExhausted(u32),

    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Take not found: {0}")]
    TakeNotFound(TakeId),

    #[error("Project not found: {0}")]
    ProjectNotFound(ProjectId),

    #[error("Invalid project settings: {0}")]
    Settings(#[from] SettingsError),

    #[error("Invalid take: {0}")]
    InvalidTake(String),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidFieldValue { field: String, reason: String },

    #[error("Resolution handle is no longer pending")]
    StaleResolution,

    #[error("Strategy '{0}' is not available for these conflicts")]
    StrategyUnavailable(Strategy),

    #[error("Strategy '{0}' would leave conflicts behind")]
    Unresolvable(Strategy),

    #[error("Workflow error: {0}")]
    Workflow(String),
}

impl EngineError {
    /// Wraps a storage failure; the message keeps the whole context chain
    pub fn persistence(err: anyhow::Error) -> Self {
        EngineError::Persistence(format!("{:#}", err))
    }
}

impl From<NumberingError> for EngineError {
    fn from(err: NumberingError) -> Self {
        match err {
            NumberingError::InvalidRange { start, end } => EngineError::InvalidRange { start, end },
            NumberingError::InvalidNumber(n) => EngineError::InvalidNumber(n),
        }
    }
}

impl From<CameraError> for EngineError {
    fn from(err: CameraError) -> Self {
        match err {
            CameraError::UnknownCamera { camera, count } => {
                EngineError::UnknownCamera { camera, count }
            }
        }
    }
}

impl From<TakeError> for EngineError {
    fn from(err: TakeError) -> Self {
        match err {
            TakeError::Camera(camera) => camera.into(),
            other => EngineError::InvalidTake(other.to_string()),
        }
    }
}

impl From<RangeError> for EngineError {
    fn from(err: RangeError) -> Self {
        match err {
            RangeError::Numbering(n) => n.into(),
            RangeError::InvalidValue { field, reason } => {
                EngineError::InvalidFieldValue { field, reason }
            }
        }
    }
}

impl From<ResolutionError> for EngineError {
    fn from(err: ResolutionError) -> Self {
        match err {
            ResolutionError::StrategyUnavailable(s) => EngineError::StrategyUnavailable(s),
            ResolutionError::RenumberExhausted(n) => EngineError::RenumberExhausted(n),
            ResolutionError::Unresolvable(s) => EngineError::Unresolvable(s),
            other @ ResolutionError::InvalidState { .. } => EngineError::Workflow(other.to_string()),
        }
    }
}
