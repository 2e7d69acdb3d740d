use std::fmt;

use crate::catalog::TaskCatalog;
use crate::config::FailureRecoveryPolicy;

use super::types::WaveResults;

/// What the engine does after a wave's barrier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Move on; failed tasks stay failed and their dependents get cancelled.
    Proceed,
    /// Stop the plan and report what completed.
    Abort { failed: Vec<String> },
    /// Re-dispatch these tasks after backoff.
    Retry(Vec<String>),
}

impl RecoveryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proceed => "proceed",
            Self::Abort { .. } => "abort",
            Self::Retry(_) => "retry",
        }
    }
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Applies the configured failure recovery policy to a wave's results.
#[derive(Debug, Clone, Copy)]
pub struct RecoveryController {
    policy: FailureRecoveryPolicy,
}

impl RecoveryController {
    pub fn new(policy: FailureRecoveryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> FailureRecoveryPolicy {
        self.policy
    }

    /// Decide on the latest result of every task in the wave.
    pub fn decide(&self, results: &WaveResults, catalog: &TaskCatalog) -> RecoveryAction {
        let failed: Vec<String> = results
            .values()
            .filter(|r| r.status.is_failure())
            .map(|r| r.task_id.clone())
            .collect();

        if failed.is_empty() {
            return RecoveryAction::Proceed;
        }

        match self.policy {
            FailureRecoveryPolicy::AbortAll => RecoveryAction::Abort { failed },
            FailureRecoveryPolicy::ContinueOthers => RecoveryAction::Proceed,
            FailureRecoveryPolicy::RetryFailed => {
                // attempt N has used N-1 retries; budget B allows attempts up to B+1
                let retry: Vec<String> = failed
                    .into_iter()
                    .filter(|id| {
                        let budget = catalog.get(id).map(|t| t.retry_budget).unwrap_or(0);
                        results
                            .get(id)
                            .map(|r| r.attempt <= budget)
                            .unwrap_or(false)
                    })
                    .collect();
                if retry.is_empty() {
                    RecoveryAction::Proceed
                } else {
                    RecoveryAction::Retry(retry)
                }
            }
        }
    }
}
