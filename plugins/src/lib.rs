//! Runners, synthesis strategies, renderers and the factory that wires them
//! into a `parawave_core` engine from configuration.

pub mod executor;
pub mod factory;
pub mod report;
pub mod runner;
pub mod synthesis;
