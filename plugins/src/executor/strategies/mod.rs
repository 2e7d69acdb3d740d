pub mod retry;

pub use retry::{BackoffBounds, ExponentialBackoffPlugin, LinearRetryPlugin};
