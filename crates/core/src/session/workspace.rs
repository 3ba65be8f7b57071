//! Holder for the active sessions.

use tracing::debug;

use crate::error::ValidationError;

use super::batch::BatchSession;
use super::task::TaskSession;

/// The active batch and task sessions, if any.
#[derive(Debug, Default)]
pub struct Workspace {
    batch: Option<BatchSession>,
    task: Option<TaskSession>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `session` the active batch, cancelling the one it replaces.
    pub fn begin_batch(&mut self, session: BatchSession) -> &mut BatchSession {
        if let Some(previous) = self.batch.take() {
            debug!("Replacing batch session {}", previous.batch_job_id());
            previous.cancel();
        }
        self.batch.insert(session)
    }

    /// Make `session` the active task, cancelling the one it replaces.
    pub fn begin_task(&mut self, session: TaskSession) -> &mut TaskSession {
        if let Some(previous) = self.task.take() {
            debug!("Replacing task session {}", previous.task_id());
            previous.cancel();
        }
        self.task.insert(session)
    }

    pub fn batch(&self) -> Option<&BatchSession> {
        self.batch.as_ref()
    }

    /// The active batch; uploading and processing require one.
    pub fn batch_mut(&mut self) -> Result<&mut BatchSession, ValidationError> {
        self.batch.as_mut().ok_or(ValidationError::NoActiveBatch)
    }

    pub fn task(&self) -> Option<&TaskSession> {
        self.task.as_ref()
    }

    pub fn task_mut(&mut self) -> Option<&mut TaskSession> {
        self.task.as_mut()
    }

    /// Cancel in-progress polls and forget every session.
    pub fn reset(&mut self) {
        if let Some(batch) = self.batch.take() {
            batch.cancel();
        }
        if let Some(task) = self.task.take() {
            task.cancel();
        }
        debug!("Workspace reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_workspace_has_no_batch() {
        let mut workspace = Workspace::new();
        assert!(workspace.batch().is_none());
        assert_eq!(
            workspace.batch_mut().unwrap_err(),
            ValidationError::NoActiveBatch
        );
        workspace.reset();
        assert!(workspace.task().is_none());
    }
}
