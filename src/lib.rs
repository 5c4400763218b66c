pub mod cli;
pub mod common;
pub mod downloader;
pub mod parser;
pub mod pipeline;
pub mod post_process;

pub use common::context::AppContext;
pub use common::error::JobError;
pub use common::models::{JobDescriptor, OutputKind};
pub use pipeline::{JobHandle, PipelineController};
