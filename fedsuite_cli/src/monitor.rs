//! Run monitor - submits a test to a runner and follows it to completion.
//!
//! ```text
//!  idle ──submit──► queued ──accepted──► running ──poll──► ... ──► finished
//!   ▲                  │                    │
//!   └──── rejected ────┘                    │
//!   └──────────────── poll failed ──────────┘
//! ```
//!
//! Polling stops once the runner reports `finished` or `idle`, after a
//! failed poll, or when the poll budget is exhausted.

use fedsuite_core::TestPayload;
use fedsuite_env::{EnvError, RunRequest, RunStatus, SimulationRunner, StatusQuery};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Polling parameters.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Delay between status queries (default: 1000 ms)
    pub poll_interval: Duration,

    /// Status queries before giving up (default: 120)
    pub max_polls: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            max_polls: 120,
        }
    }
}

impl MonitorConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = max_polls;
        self
    }

    fn budget_ms(&self) -> u64 {
        self.poll_interval.as_millis() as u64 * self.max_polls as u64
    }
}

/// Outcome of one monitored run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub name: String,
    pub status: RunStatus,
    /// Every status the monitor went through, starting with `queued`
    pub transitions: Vec<RunStatus>,
    pub polls: u32,
}

/// Drives one run at a time against a [`SimulationRunner`].
pub struct RunMonitor<R: SimulationRunner> {
    runner: R,
    config: MonitorConfig,
    status: RunStatus,
}

impl<R: SimulationRunner> RunMonitor<R> {
    pub fn new(runner: R, config: MonitorConfig) -> Self {
        Self {
            runner,
            config,
            status: RunStatus::Idle,
        }
    }

    /// Current status.
    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// True while a run is queued or running.
    pub fn is_busy(&self) -> bool {
        self.status.is_pending()
    }

    fn transition(&mut self, status: RunStatus, transitions: &mut Vec<RunStatus>) {
        if self.status != status {
            info!(from = %self.status, to = %status, "run status changed");
        }
        self.status = status;
        transitions.push(status);
    }

    /// Submits `payload` and polls until the run settles.
    ///
    /// Runner failures are not errors: they leave the monitor `idle` and are
    /// visible in the report. Exhausting the poll budget is
    /// [`EnvError::Timeout`].
    pub async fn run(&mut self, payload: &TestPayload) -> Result<RunReport, EnvError> {
        let body = payload
            .to_json_bytes()
            .map_err(|e| EnvError::Serialization(e.to_string()))?;
        let name = payload.name.clone();
        let mut transitions = Vec::new();

        self.transition(RunStatus::Queued, &mut transitions);
        let request = RunRequest::new(name.clone(), body);
        debug!(test = %name, bytes = request.size(), "submitting run");

        if let Err(e) = self.runner.submit(request).await {
            warn!(test = %name, error = %e, "submission failed, back to idle");
            self.transition(RunStatus::Idle, &mut transitions);
            return Ok(RunReport {
                name,
                status: self.status,
                transitions,
                polls: 0,
            });
        }
        self.transition(RunStatus::Running, &mut transitions);

        let query = StatusQuery::new(name.clone());
        let mut polls = 0;

        while self.status.is_pending() {
            if polls >= self.config.max_polls {
                warn!(test = %name, polls, "poll budget exhausted");
                return Err(EnvError::Timeout(self.config.budget_ms()));
            }

            tokio::time::sleep(self.config.poll_interval).await;
            polls += 1;

            match self.runner.status(&query).await {
                Ok(status) => self.transition(status, &mut transitions),
                Err(e) => {
                    warn!(test = %name, error = %e, "status query failed, back to idle");
                    self.transition(RunStatus::Idle, &mut transitions);
                }
            }
        }

        Ok(RunReport {
            name,
            status: self.status,
            transitions,
            polls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fedsuite_core::TestData;
    use fedsuite_env::LocalRunner;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> MonitorConfig {
        MonitorConfig::default().with_poll_interval(Duration::from_millis(1))
    }

    fn payload(name: &str) -> TestPayload {
        TestPayload::from(&TestData::with_defaults(name))
    }

    /// Accepts submissions, answers `running` a fixed number of times, then fails.
    struct FlakyRunner {
        ok_polls: u32,
        polls: AtomicU32,
    }

    #[async_trait]
    impl SimulationRunner for FlakyRunner {
        async fn submit(&self, _request: RunRequest) -> Result<(), EnvError> {
            Ok(())
        }

        async fn status(&self, _query: &StatusQuery) -> Result<RunStatus, EnvError> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst);
            if n < self.ok_polls {
                Ok(RunStatus::Running)
            } else {
                Err(EnvError::runner("connection reset"))
            }
        }
    }

    #[tokio::test]
    async fn test_run_to_completion() {
        let mut monitor = RunMonitor::new(LocalRunner::new(), fast());
        let report = monitor.run(&payload("Test 1")).await.unwrap();

        assert_eq!(report.status, RunStatus::Finished);
        assert_eq!(
            report.transitions,
            vec![RunStatus::Queued, RunStatus::Running, RunStatus::Running, RunStatus::Finished]
        );
        assert_eq!(report.polls, 2);
        assert!(!monitor.is_busy());

        let submissions = monitor.runner().submissions().await;
        assert_eq!(submissions.len(), 1);
        let body: serde_json::Value = serde_json::from_slice(&submissions[0].body).unwrap();
        assert_eq!(body["name"], "Test 1");
        assert_eq!(body["timeline"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_rejected_submission_falls_back_to_idle() {
        let runner = LocalRunner::new();
        runner.reject_submissions("runner offline").await;

        let mut monitor = RunMonitor::new(runner, fast());
        let report = monitor.run(&payload("Test 1")).await.unwrap();

        assert_eq!(report.status, RunStatus::Idle);
        assert_eq!(report.transitions, vec![RunStatus::Queued, RunStatus::Idle]);
        assert_eq!(report.polls, 0);
    }

    #[tokio::test]
    async fn test_failed_poll_stops_monitoring() {
        let runner = FlakyRunner {
            ok_polls: 2,
            polls: AtomicU32::new(0),
        };
        let mut monitor = RunMonitor::new(runner, fast());
        let report = monitor.run(&payload("Test 1")).await.unwrap();

        assert_eq!(report.status, RunStatus::Idle);
        assert_eq!(report.polls, 3);
        assert_eq!(monitor.status(), RunStatus::Idle);
    }

    #[tokio::test]
    async fn test_poll_budget() {
        let runner = FlakyRunner {
            ok_polls: u32::MAX,
            polls: AtomicU32::new(0),
        };
        let mut monitor = RunMonitor::new(runner, fast().with_max_polls(3));

        let result = monitor.run(&payload("Test 1")).await;
        assert!(matches!(result, Err(EnvError::Timeout(3))));
    }
}
