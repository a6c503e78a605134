//! Information-request processor.
//!
//! Resolves `requires-user-input` items by asking a human. It never touches
//! `ready-to-run` items, and the scheduler never touches these, so each item
//! is advanced by exactly one of the two passes.

use async_trait::async_trait;
use inquire::InquireError;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::actions::{Action, CodeData, CodeRequest, LinksData, LinksRequest};
use super::job_queue::{QueueItem, QueueState, QueueStatus, QueueStore};
use crate::storage::{Link, LinksStorage};
use crate::utils::fs;
use crate::{Error, Result};

/// Asks the user for the data an information request needs.
#[async_trait]
pub trait UserPrompter: Send + Sync {
    /// URL for a link the transcript refers to.
    async fn ask_url(&self, description: &str) -> Result<String>;

    /// Path of a code sample, or `None` to attach none.
    async fn ask_code_path(&self) -> Result<Option<PathBuf>>;
}

/// Terminal prompts via `inquire`.
#[derive(Debug, Default, Clone, Copy)]
pub struct InquirePrompter;

impl InquirePrompter {
    async fn text(message: String, help: &'static str) -> Result<String> {
        tokio::task::spawn_blocking(move || {
            inquire::Text::new(&message)
                .with_help_message(help)
                .prompt()
                .map_err(|e| match e {
                    InquireError::OperationCanceled | InquireError::OperationInterrupted => {
                        Error::Cancelled
                    }
                    other => Error::Other(format!("prompt failed: {other}")),
                })
        })
        .await
        .map_err(|e| Error::Other(format!("prompt task failed: {e}")))?
    }
}

#[async_trait]
impl UserPrompter for InquirePrompter {
    async fn ask_url(&self, description: &str) -> Result<String> {
        let url = Self::text(
            format!("URL for \"{description}\":"),
            "Paste the link the video refers to",
        )
        .await?;
        Ok(url.trim().to_string())
    }

    async fn ask_code_path(&self) -> Result<Option<PathBuf>> {
        let path = Self::text(
            "Code file to attach:".to_string(),
            "Leave empty to attach no code",
        )
        .await?;
        let path = path.trim();
        Ok((!path.is_empty()).then(|| PathBuf::from(path)))
    }
}

/// `requires-user-input` items whose dependencies are all completed, in queue
/// order. A links request waits for its transcript analysis to fill it.
pub fn select_information_requests(state: &QueueState) -> Vec<QueueItem> {
    state
        .queue
        .iter()
        .filter(|item| item.status == QueueStatus::RequiresUserInput)
        .filter(|item| {
            item.dependency_ids().iter().all(|id| {
                state
                    .find(id)
                    .is_some_and(|dep| dep.status == QueueStatus::Completed)
            })
        })
        .cloned()
        .collect()
}

/// Totals for one information-request pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InfoPassSummary {
    pub completed: usize,
    pub failed: usize,
}

pub struct InformationRequestProcessor {
    store: Arc<QueueStore>,
    links: LinksStorage,
    prompter: Arc<dyn UserPrompter>,
}

impl InformationRequestProcessor {
    pub fn new(
        store: Arc<QueueStore>,
        links: LinksStorage,
        prompter: Arc<dyn UserPrompter>,
    ) -> Self {
        Self {
            store,
            links,
            prompter,
        }
    }

    /// Resolve every answerable request, one at a time.
    ///
    /// A cancelled prompt stops the pass with [`Error::Cancelled`]. The
    /// cancelled item and the ones after it stay `requires-user-input`.
    pub async fn process_all(&self) -> Result<InfoPassSummary> {
        let state = self.store.get_state().await?;
        let pending = select_information_requests(&state);
        let mut summary = InfoPassSummary::default();

        if pending.is_empty() {
            info!("No information requests waiting for input");
            return Ok(summary);
        }
        info!(count = pending.len(), "Processing information requests");

        for mut item in pending {
            match self.resolve(&mut item).await {
                Ok(()) => {
                    item.mark_completed()?;
                    summary.completed += 1;
                    info!(
                        item_id = %item.id,
                        action = item.action.kind(),
                        "Information request completed"
                    );
                }
                Err(e) if e.is_invariant_violation() => return Err(e),
                Err(e) if e.is_cancelled() => {
                    warn!(item_id = %item.id, "Prompt cancelled; request stays waiting");
                    return Err(e);
                }
                Err(e) => {
                    error!(item_id = %item.id, error = %e, "Information request failed");
                    item.mark_failed(e.to_string())?;
                    summary.failed += 1;
                }
            }
            self.store.update_item(item).await?;
        }
        Ok(summary)
    }

    async fn resolve(&self, item: &mut QueueItem) -> Result<()> {
        let kind = item.action.kind();
        let id = item.id.clone();
        match &mut item.action {
            Action::LinksRequest(request) => self.resolve_links(request).await,
            Action::CodeRequest(request) => self.resolve_code(request).await,
            Action::CreateAutoEditedVideo(_)
            | Action::CreateVideoFromClips(_)
            | Action::ConcatenateVideos(_)
            | Action::AnalyzeTranscriptForLinks(_)
            | Action::GenerateArticleFromTranscript(_) => Err(Error::invariant(format!(
                "{kind} item {id} is waiting for user input but is not an information request"
            ))),
        }
    }

    async fn resolve_links(&self, request: &mut LinksRequest) -> Result<()> {
        if request.requests.is_empty() {
            request.temporary_data = Some(LinksData::default());
            return Ok(());
        }

        let mut links = Vec::with_capacity(request.requests.len());
        for link_request in &request.requests {
            let url = self.prompter.ask_url(&link_request.description).await?;
            if url.is_empty() {
                warn!(description = %link_request.description, "No URL given; link skipped");
                continue;
            }
            links.push(Link {
                description: link_request.description.clone(),
                url,
            });
        }

        self.links.append(&links).await?;
        request.temporary_data = Some(LinksData { links });
        Ok(())
    }

    async fn resolve_code(&self, request: &mut CodeRequest) -> Result<()> {
        let code = match self.prompter.ask_code_path().await? {
            Some(path) => {
                let content = tokio::fs::read_to_string(&path)
                    .await
                    .map_err(|e| fs::io_error("reading code file", &path, e))?;
                CodeData {
                    code_path: path.to_string_lossy().into_owned(),
                    code_content: content,
                }
            }
            None => CodeData::default(),
        };
        request.temporary_data = Some(code);
        Ok(())
    }
}
