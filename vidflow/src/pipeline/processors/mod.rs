//! Workflow processors and the command plumbing they run on.

mod article;
mod assembly;
mod clips;
mod context;
pub mod ffmpeg;
mod links;
pub mod silence;
pub mod subtitles;
mod traits;
mod utils;
mod video;

#[cfg(test)]
pub(crate) mod testing;

pub use article::ArticleProcessor;
pub use clips::{ClipsProcessor, ConcatProcessor};
pub use context::{ProcessorOutput, WorkflowContext};
pub use ffmpeg::FfmpegCommands;
pub use links::LinkAnalysisProcessor;
pub use traits::{CommandError, CommandExecutor, CommandOutput, GovernedCommands};
pub use utils::{GovernedExecutor, ShellCommandExecutor};
pub use video::AutoEditProcessor;
