use std::time::Duration;

/// Backoff schedule between retry attempts.
///
/// `attempt` is the 1-based number of the attempt that just failed. How many
/// attempts a task gets is decided by its retry budget, not by the strategy.
pub trait RetryStrategyPlugin: Send + Sync {
    fn name(&self) -> &str;
    fn next_delay(&self, attempt: u32) -> Duration;
}
