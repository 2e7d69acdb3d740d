pub mod command;
pub mod replay;

pub use command::CommandRunnerPlugin;
pub use replay::{ReplayRunnerPlugin, ReplayScript, ReplayStep};
