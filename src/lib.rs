//! takelog - A take registry for film production logging
//!
//! takelog records every take of a shoot (scene, take number, camera, file
//! number) and keeps the numbering free of duplicates. When a new or edited
//! take collides with an existing one, the save is held until a resolution
//! strategy (renumber, overwrite, swap or cancel) is chosen.

pub mod domain;
pub mod engine;
pub mod storage;
pub mod cli;

pub use domain::{LogSheet, Project, ProjectId, Strategy, TakeEditRequest, TakeId};
pub use engine::{EngineError, SaveResult, TakeService};
