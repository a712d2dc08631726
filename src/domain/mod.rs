//! Domain models for takelog
//!
//! Contains the numbering rules, take records and the duplicate-resolution
//! state machine without any I/O concerns.

mod id;
mod numbering;
mod camera;
mod take;
mod project;
mod duplicate;
mod resolution;
mod range;

pub use id::{IdError, ProjectId, TakeId};
pub use numbering::{
    compare, expand_range, format_runs, is_valid_number, next_available, parse_number,
    split_runs, NumberingError, MAX_NUMBER,
};
pub use camera::{
    CameraChannel, CameraError, CameraRecForm, CameraRecState, PersistedChannel, MAX_CAMERAS,
};
pub use take::{
    compare_scenes, normalize_scene, Classification, FieldTemplate, LogSheet, TakeEditRequest,
    TakeError, TakeFields, TakePatch, WasteReason,
};
pub use project::{Project, ProjectSettings, SettingsError};
pub use duplicate::{detect, violations, Conflict, ConflictKind, ConflictSet};
pub use resolution::{
    Changeset, Decision, ResolutionError, ResolutionWorkflow, Strategy, Transition, WorkflowState,
};
pub use range::{apply as apply_range, RangeError, RangeField, RangeRequest, RangeSpec};
