//! Shared collaborators handed to every workflow processor.

use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

use super::ffmpeg::FfmpegCommands;
use super::traits::GovernedCommands;
use crate::Result;
use crate::ai::AiServices;
use crate::config::{AppConfig, PathsConfig};
use crate::pipeline::job_queue::QueueStore;
use crate::pipeline::worker_pool::ResourceGovernor;
use crate::storage::{ArticleStorage, LinksStorage};
use crate::utils::fs;

/// What a processor produced, for logging.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessorOutput {
    pub outputs: Vec<PathBuf>,
}

impl ProcessorOutput {
    pub fn single(path: PathBuf) -> Self {
        Self {
            outputs: vec![path],
        }
    }
}

/// Everything a workflow may touch while running one queue item.
#[derive(Clone)]
pub struct WorkflowContext {
    pub store: Arc<QueueStore>,
    pub commands: Arc<dyn GovernedCommands>,
    pub governor: Arc<ResourceGovernor>,
    pub ai: AiServices,
    pub ffmpeg: FfmpegCommands,
    pub paths: PathsConfig,
    pub articles: ArticleStorage,
    pub links: LinksStorage,
    /// How many recent articles to show the author.
    pub style_examples: usize,
}

impl WorkflowContext {
    pub fn from_config(
        config: &AppConfig,
        store: Arc<QueueStore>,
        commands: Arc<dyn GovernedCommands>,
        governor: Arc<ResourceGovernor>,
        ai: AiServices,
    ) -> Self {
        Self {
            store,
            commands,
            governor,
            ai,
            ffmpeg: FfmpegCommands::new(&config.tools),
            paths: config.paths.clone(),
            articles: ArticleStorage::new(&config.paths.articles_dir),
            links: LinksStorage::new(&config.paths.links_file),
            style_examples: config.article.style_examples,
        }
    }

    /// Fresh scratch directory for one item, removed when dropped.
    pub async fn working_dir(&self, item_id: &str) -> Result<TempDir> {
        let parent = &self.paths.temp_dir;
        fs::ensure_dir_all_with_op("creating temp directory", parent).await?;
        tempfile::Builder::new()
            .prefix(&format!("{item_id}-"))
            .tempdir_in(parent)
            .map_err(|e| fs::io_error("creating working directory", parent, e))
    }
}
