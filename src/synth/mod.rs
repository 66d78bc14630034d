//! The project synthesis pipeline and its components.
//!
//! Leaf components (import scanners, context selection, the structure
//! quality gate) are pure. Everything that talks to the model goes through
//! [`chat::ask`], which applies the per-role timeout. [`pipeline::Pipeline`]
//! sequences the phases.

pub mod chat;
pub mod context_select;
pub mod deps;
pub mod extract;
pub mod generator;
pub mod model;
pub mod pipeline;
pub mod planner;
pub mod refiner;
pub mod senior;
pub mod structure;
pub mod structure_review;
pub mod workspace;

pub use model::{GeneratedFiles, ProjectSpec};
pub use pipeline::{Pipeline, PipelineOutcome, PipelineState};
