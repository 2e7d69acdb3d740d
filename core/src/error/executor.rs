use thiserror::Error;

/// Coarse error classes, mapped to process exit codes by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    GeneralError = 1,
    ValidationError = 3,
    DependencyError = 11,
    CircularDependency = 12,
    ConfigError = 13,
    UnknownStrategy = 14,
    IoError = 60,
}

impl ErrorCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

/// Fatal errors raised while building or launching a plan.
///
/// None of these are absorbed by the failure recovery controller: they are
/// reported before the first task is dispatched.
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Duplicate task ID: {0}")]
    DuplicateTaskId(String),

    #[error("Empty task ID at catalog position {0}")]
    EmptyTaskId(usize),

    #[error("Dependency not found: task '{task_id}' depends on '{missing_dep}'")]
    DependencyNotFound {
        task_id: String,
        missing_dep: String,
    },

    #[error("Circular dependency detected: {}", .cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },

    #[error("Unknown synthesis strategy: {0}")]
    UnknownStrategy(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Report rendering failed: {0}")]
    Render(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExecutorError {
    /// Map executor error to its error class
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::DuplicateTaskId(_) | Self::EmptyTaskId(_) => ErrorCode::ValidationError,
            Self::DependencyNotFound { .. } => ErrorCode::DependencyError,
            Self::CircularDependency { .. } => ErrorCode::CircularDependency,
            Self::UnknownStrategy(_) => ErrorCode::UnknownStrategy,
            Self::InvalidConfig(_) => ErrorCode::ConfigError,
            Self::Catalog(_) => ErrorCode::ValidationError,
            Self::Render(_) => ErrorCode::GeneralError,
            Self::Io(_) => ErrorCode::IoError,
        }
    }

    /// Whether the error concerns the shape of the submitted plan.
    pub fn is_plan_error(&self) -> bool {
        matches!(
            self.error_code(),
            ErrorCode::ValidationError
                | ErrorCode::DependencyError
                | ErrorCode::CircularDependency
                | ErrorCode::UnknownStrategy
        )
    }
}
