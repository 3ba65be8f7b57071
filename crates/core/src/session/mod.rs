//! Explicit session objects for in-progress conversions.
//!
//! A [`Workspace`] holds at most one batch and one task session. Starting a
//! new session, or resetting the workspace, cancels any poll still running on
//! the session it replaces.

mod batch;
mod task;
mod workspace;

pub use batch::{BatchPhase, BatchSession};
pub use task::TaskSession;
pub use workspace::Workspace;
