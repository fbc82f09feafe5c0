pub mod runner;

pub use runner::{run_writer, PipelineError};
