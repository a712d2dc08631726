//! # Take Engine
//!
//! Everything that mutates take records goes through this module.
//!
//! - [`TakeRegistry`] owns one project's takes and commits write-then-confirm
//! - [`TakeService`] serializes work per project and drives the duplicate
//!   resolution workflow for saves
//! - [`EngineError`] is the error every engine operation reports

mod error;
mod registry;
mod service;

pub use error::EngineError;
pub use registry::TakeRegistry;
pub use service::{PendingResolution, ResolutionHandle, SaveResult, TakeService};
