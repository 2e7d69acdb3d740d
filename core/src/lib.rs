pub mod catalog;
pub mod config;
pub mod conflict;
pub mod error;
pub mod executor;
pub mod report;
pub mod synthesis;

pub use catalog::{TaskCatalog, TaskSpec};
pub use error::{CliError, ExecutorError, TaskError};
