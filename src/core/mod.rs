pub mod extract;
pub mod generator;
pub mod pipeline;
pub mod quiz;
pub mod resources;
pub mod session;
pub mod summary;
pub mod transcript;

pub use pipeline::Orchestrator;
