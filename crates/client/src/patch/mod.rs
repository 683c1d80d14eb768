//! Partial updates: structural diffing and edit accumulation.
//!
//! The change analyzer turns two versions of a resource into a minimal
//! ordered JSON-Patch; the accumulator coalesces field-level edits into
//! one flush-able batch.

mod accumulator;
mod diff;

pub use accumulator::{AccumulatorState, PatchAccumulator};
pub use diff::{ChangeAnalyzer, DefaultChangeAnalyzer, diff};
