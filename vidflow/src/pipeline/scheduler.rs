//! Level-synchronous queue scheduler.
//!
//! A pass repeatedly reads the persisted queue, runs every eligible item
//! concurrently, and stops once a read finds nothing eligible. All state is
//! re-derived from the queue file on every wave, so an interrupted pass
//! resumes simply by running again.

use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::actions::Action;
use super::job_queue::{QueueItem, QueueState, QueueStatus};
use super::processors::{
    ArticleProcessor, AutoEditProcessor, ClipsProcessor, ConcatProcessor, LinkAnalysisProcessor,
    ProcessorOutput, WorkflowContext,
};
use crate::{Error, Result};

/// Items that are `ready-to-run` and whose dependencies are all `completed`.
///
/// A dependency ID with no matching item keeps its dependent out forever;
/// that is logged because it usually means a broken builder.
pub fn select_eligible(state: &QueueState) -> Vec<QueueItem> {
    state
        .queue
        .iter()
        .filter(|item| item.status == QueueStatus::ReadyToRun)
        .filter(|item| dependencies_satisfied(state, item))
        .cloned()
        .collect()
}

fn dependencies_satisfied(state: &QueueState, item: &QueueItem) -> bool {
    item.dependency_ids().iter().all(|id| match state.find(id) {
        Some(dependency) => dependency.status == QueueStatus::Completed,
        None => {
            warn!(
                item_id = %item.id,
                dependency_id = %id,
                "Dependency not found in queue; item can never run"
            );
            false
        }
    })
}

/// Totals for one scheduler pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub waves: usize,
    pub completed: usize,
    pub failed: usize,
}

impl PassSummary {
    pub fn processed(&self) -> usize {
        self.completed + self.failed
    }
}

/// Runs automatic queue items to a fixed point.
pub struct Scheduler {
    ctx: Arc<WorkflowContext>,
}

impl Scheduler {
    pub fn new(ctx: WorkflowContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }

    /// Run waves until nothing is eligible.
    ///
    /// Item failures are persisted and never abort the pass. Queue store
    /// errors and invariant violations do, after the current wave settles.
    pub async fn run_pass(&self) -> Result<PassSummary> {
        let mut summary = PassSummary::default();

        loop {
            let state = self.ctx.store.get_state().await?;
            let eligible = select_eligible(&state);

            if eligible.is_empty() {
                if summary.processed() == 0 {
                    info!(queued = state.len(), "No eligible queue items to process");
                } else {
                    info!(
                        waves = summary.waves,
                        completed = summary.completed,
                        failed = summary.failed,
                        "All eligible queue items processed"
                    );
                }
                return Ok(summary);
            }

            summary.waves += 1;
            info!(wave = summary.waves, items = eligible.len(), "Starting wave");

            let mut tasks = JoinSet::new();
            for item in eligible {
                let ctx = self.ctx.clone();
                tasks.spawn(async move { execute_item(&ctx, item).await });
            }

            let mut abort: Option<Error> = None;
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(Ok(QueueStatus::Completed)) => summary.completed += 1,
                    Ok(Ok(_)) => summary.failed += 1,
                    Ok(Err(e)) => {
                        error!(error = %e, "Aborting scheduler pass");
                        abort.get_or_insert(e);
                    }
                    Err(e) => {
                        error!(error = %e, "Queue item task panicked");
                        abort.get_or_insert(Error::Other(format!("queue item task panicked: {e}")));
                    }
                }
            }
            if let Some(e) = abort {
                return Err(e);
            }
        }
    }
}

/// Run one item and persist its terminal status. Returns that status, or an
/// error only when the pass itself must stop.
async fn execute_item(ctx: &WorkflowContext, mut item: QueueItem) -> Result<QueueStatus> {
    let start = Instant::now();
    let action = item.action.kind();
    info!(item_id = %item.id, action, "Running queue item");

    match dispatch(ctx, &item).await {
        Ok(output) => {
            item.mark_completed()?;
            info!(
                item_id = %item.id,
                action,
                outputs = ?output.outputs,
                elapsed_secs = start.elapsed().as_secs_f64(),
                "Queue item completed"
            );
        }
        Err(e) if e.is_invariant_violation() => return Err(e),
        Err(e) => {
            error!(item_id = %item.id, action, error = %e, "Queue item failed");
            item.mark_failed(e.to_string())?;
        }
    }

    let status = item.status;
    ctx.store.update_item(item).await?;
    debug!(status = %status, "Persisted queue item status");
    Ok(status)
}

async fn dispatch(ctx: &WorkflowContext, item: &QueueItem) -> Result<ProcessorOutput> {
    match &item.action {
        Action::CreateAutoEditedVideo(action) => {
            AutoEditProcessor::process(ctx, &item.id, action).await
        }
        Action::CreateVideoFromClips(action) => {
            ClipsProcessor::process(ctx, &item.id, action).await
        }
        Action::ConcatenateVideos(action) => ConcatProcessor::process(ctx, &item.id, action).await,
        Action::AnalyzeTranscriptForLinks(action) => {
            LinkAnalysisProcessor::process(ctx, item, action).await
        }
        Action::GenerateArticleFromTranscript(action) => {
            ArticleProcessor::process(ctx, &item.id, action).await
        }
        Action::LinksRequest(_) | Action::CodeRequest(_) => Err(Error::invariant(format!(
            "{} item {} is ready-to-run; information requests are resolved by the user",
            item.action.kind(),
            item.id
        ))),
    }
}
