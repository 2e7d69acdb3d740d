pub mod renderer;
pub mod runner;
pub mod strategy;

pub use renderer::*;
pub use runner::*;
pub use strategy::*;
