//! Job queue and workflow engine.
//!
//! - A file-locked JSON queue of actions with dependency edges
//! - A level-synchronous scheduler for automatic items
//! - An information-request processor for items that need a human
//! - Resource pools that cap how many external commands run at once
//! - Builders that expand high-level requests into wired queue items

pub mod actions;
pub mod info_requests;
pub mod job_queue;
pub mod processors;
pub mod scheduler;
pub mod worker_pool;
pub mod workflows;

pub use actions::{
    Action, AnalyzeTranscriptForLinks, ClipRange, CodeData, CodeRequest, ConcatenateVideos,
    CreateAutoEditedVideo, CreateVideoFromClips, GenerateArticleFromTranscript, LinkRequest,
    LinksData, LinksRequest,
};
pub use info_requests::{
    InfoPassSummary, InformationRequestProcessor, InquirePrompter, UserPrompter,
    select_information_requests,
};
pub use job_queue::{QueueCounts, QueueItem, QueueState, QueueStatus, QueueStore};
pub use processors::{
    CommandError, CommandExecutor, CommandOutput, GovernedCommands, GovernedExecutor,
    ShellCommandExecutor, WorkflowContext,
};
pub use scheduler::{PassSummary, Scheduler, select_eligible};
pub use worker_pool::{GovernorError, PoolConfig, ResourceGovernor, ResourcePool};
pub use workflows::{
    AutoEditedVideoRequest, build_auto_edited_video_items, build_concatenate_videos_items,
    build_video_from_clips_items,
};
