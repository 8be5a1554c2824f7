//! Turning the model into files

mod engine;
mod pipeline;
mod post_run;
mod process;
mod static_files;
mod writer;

pub use engine::ExternalEngine;
pub use pipeline::{GenerationPipeline, GenerationReport};
pub use post_run::PostRunExecutor;
pub use static_files::copy_static_files;
pub use writer::{AtomicFileWriter, NoOverwritePolicy};
