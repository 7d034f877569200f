//! In-process stand-in for the simulation runner.

use crate::error::EnvError;
use crate::runner::SimulationRunner;
use crate::types::{RunRequest, RunStatus, StatusQuery};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct RunnerState {
    /// Status per submitted test name
    statuses: HashMap<String, RunStatus>,

    /// Every accepted request, in submission order
    submissions: Vec<RunRequest>,

    /// When set, `submit` fails with this message
    reject_with: Option<String>,
}

/// Runner that executes nothing and advances each test one step per query.
///
/// `submit` records the request as `queued`; each subsequent `status` call
/// moves it `queued -> running -> finished`. Useful for exercising the
/// authoring side without a runner service.
#[derive(Debug, Clone, Default)]
pub struct LocalRunner {
    state: Arc<Mutex<RunnerState>>,
}

impl LocalRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following submission fail with `reason`.
    pub async fn reject_submissions(&self, reason: impl Into<String>) {
        self.state.lock().await.reject_with = Some(reason.into());
    }

    /// Returns a copy of all accepted requests.
    pub async fn submissions(&self) -> Vec<RunRequest> {
        self.state.lock().await.submissions.clone()
    }
}

#[async_trait]
impl SimulationRunner for LocalRunner {
    async fn submit(&self, request: RunRequest) -> Result<(), EnvError> {
        let mut state = self.state.lock().await;
        if let Some(reason) = &state.reject_with {
            return Err(EnvError::runner(reason.clone()));
        }

        state.statuses.insert(request.name.clone(), RunStatus::Queued);
        state.submissions.push(request);
        Ok(())
    }

    async fn status(&self, query: &StatusQuery) -> Result<RunStatus, EnvError> {
        let mut state = self.state.lock().await;
        let status = state.statuses.get_mut(&query.name)
            .ok_or_else(|| EnvError::runner(format!("Unknown test: {}", query.name)))?;

        *status = match *status {
            RunStatus::Queued => RunStatus::Running,
            RunStatus::Running | RunStatus::Finished => RunStatus::Finished,
            RunStatus::Idle => RunStatus::Idle,
        };

        Ok(*status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_runner_progression() {
        let runner = LocalRunner::new();
        runner.submit(RunRequest::new("Test 1", b"{}".to_vec())).await.unwrap();

        let query = StatusQuery::new("Test 1");
        assert_eq!(runner.status(&query).await.unwrap(), RunStatus::Running);
        assert_eq!(runner.status(&query).await.unwrap(), RunStatus::Finished);
        assert_eq!(runner.status(&query).await.unwrap(), RunStatus::Finished);

        assert_eq!(runner.submissions().await.len(), 1);
    }

    #[tokio::test]
    async fn test_local_runner_unknown_test() {
        let runner = LocalRunner::new();
        let result = runner.status(&StatusQuery::new("missing")).await;

        assert!(matches!(result, Err(EnvError::Runner(_))));
    }

    #[tokio::test]
    async fn test_local_runner_rejects() {
        let runner = LocalRunner::new();
        runner.reject_submissions("runner offline").await;

        let result = runner.submit(RunRequest::new("Test 1", Vec::new())).await;
        assert!(result.is_err());
        assert!(runner.submissions().await.is_empty());
    }
}
