mod executor;
mod orchestrator;
mod router;

pub use orchestrator::{Orchestrator, RunOptions, RunReport};
