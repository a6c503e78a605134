//! Transcript link analysis.
//!
//! Asks the AI which links a transcript mentions and turns each into a
//! question on the links request that depends on this item.

use std::path::Path;
use tracing::{info, warn};

use super::context::{ProcessorOutput, WorkflowContext};
use crate::error::WorkflowError;
use crate::pipeline::actions::{Action, AnalyzeTranscriptForLinks, LinkRequest};
use crate::pipeline::job_queue::{QueueItem, QueueStatus};
use crate::utils::fs;
use crate::{Error, Result};

/// Read a transcript, rejecting one that has no words in it.
pub async fn read_transcript(path: &Path) -> Result<String> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| fs::io_error("reading transcript", path, e))?;
    if text.trim().is_empty() {
        return Err(WorkflowError::EmptyTranscript {
            path: path.to_path_buf(),
        }
        .into());
    }
    Ok(text)
}

pub struct LinkAnalysisProcessor;

impl LinkAnalysisProcessor {
    pub async fn process(
        ctx: &WorkflowContext,
        item: &QueueItem,
        action: &AnalyzeTranscriptForLinks,
    ) -> Result<ProcessorOutput> {
        let transcript = read_transcript(&action.transcript_path).await?;
        let descriptions = ctx
            .ai
            .links
            .find_links(&transcript)
            .await
            .map_err(WorkflowError::LinkDiscovery)?;

        let found = descriptions.len();
        let populated = ctx
            .store
            .update_first_dependent(
                &item.id,
                |i| matches!(i.action, Action::LinksRequest(_)),
                move |target| {
                    let Action::LinksRequest(request) = &mut target.action else {
                        return Err(Error::invariant(
                            "dependent matched as links request but is not one",
                        ));
                    };
                    request.requests = descriptions
                        .into_iter()
                        .map(|description| LinkRequest { description })
                        .collect();

                    // Nothing to ask the user: resolve the request here so the article can run.
                    if request.requests.is_empty()
                        && target.status == QueueStatus::RequiresUserInput
                    {
                        target.mark_completed()?;
                    }
                    Ok((target.id.clone(), target.status))
                },
            )
            .await?;

        match populated {
            Some((links_request_id, status)) => info!(
                item_id = %item.id,
                links_request_id = %links_request_id,
                requests = found,
                status = %status,
                "Populated links request"
            ),
            None => warn!(
                item_id = %item.id,
                found,
                "No links request depends on this analysis; discovered links dropped"
            ),
        }
        Ok(ProcessorOutput::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::actions::LinksRequest;
    use crate::pipeline::processors::testing::{FakeAi, FakeCommands, harness};
    use tempfile::TempDir;

    fn items(root: &Path) -> (QueueItem, QueueItem) {
        let analysis = QueueItem::new(
            Action::AnalyzeTranscriptForLinks(AnalyzeTranscriptForLinks {
                transcript_path: root.join("take.txt"),
                original_video_path: root.join("take.mkv"),
            }),
            QueueStatus::ReadyToRun,
        )
        .with_id("analysis");
        let links = QueueItem::new(
            Action::LinksRequest(LinksRequest {
                original_video_path: root.join("take.mkv"),
                requests: Vec::new(),
                temporary_data: None,
            }),
            QueueStatus::RequiresUserInput,
        )
        .with_id("links")
        .with_dependencies(vec!["analysis".into()]);
        (analysis, links)
    }

    fn analyze_action(item: &QueueItem) -> &AnalyzeTranscriptForLinks {
        match &item.action {
            Action::AnalyzeTranscriptForLinks(a) => a,
            other => panic!("unexpected action {}", other.kind()),
        }
    }

    #[tokio::test]
    async fn test_populates_dependent_links_request() {
        let dir = TempDir::new().unwrap();
        let ai = FakeAi {
            links: vec!["the tokio docs".into(), "the repo".into()],
            ..FakeAi::default()
        };
        let h = harness(dir.path(), FakeCommands::ffmpeg_like(), ai);
        tokio::fs::write(h.root.join("take.txt"), "see the tokio docs").await.unwrap();
        let (analysis, links) = items(&h.root);
        h.ctx.store.append_items(vec![analysis.clone(), links]).await.unwrap();

        LinkAnalysisProcessor::process(&h.ctx, &analysis, analyze_action(&analysis))
            .await
            .unwrap();

        let state = h.ctx.store.get_state().await.unwrap();
        let links = state.find("links").unwrap();
        assert_eq!(links.status, QueueStatus::RequiresUserInput);
        let Action::LinksRequest(request) = &links.action else {
            panic!("links item changed type");
        };
        let descriptions: Vec<_> = request
            .requests
            .iter()
            .map(|r| r.description.as_str())
            .collect();
        assert_eq!(descriptions, vec!["the tokio docs", "the repo"]);
    }

    #[tokio::test]
    async fn test_zero_links_completes_request() {
        let dir = TempDir::new().unwrap();
        let h = harness(dir.path(), FakeCommands::ffmpeg_like(), FakeAi::default());
        tokio::fs::write(h.root.join("take.txt"), "nothing to link").await.unwrap();
        let (analysis, links) = items(&h.root);
        h.ctx.store.append_items(vec![analysis.clone(), links]).await.unwrap();

        LinkAnalysisProcessor::process(&h.ctx, &analysis, analyze_action(&analysis))
            .await
            .unwrap();

        let state = h.ctx.store.get_state().await.unwrap();
        let links = state.find("links").unwrap();
        assert_eq!(links.status, QueueStatus::Completed);
        assert!(links.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_empty_transcript_fails() {
        let dir = TempDir::new().unwrap();
        let h = harness(dir.path(), FakeCommands::ffmpeg_like(), FakeAi::default());
        tokio::fs::write(h.root.join("take.txt"), "  \n").await.unwrap();
        let (analysis, _) = items(&h.root);

        let err = LinkAnalysisProcessor::process(&h.ctx, &analysis, analyze_action(&analysis))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Workflow(WorkflowError::EmptyTranscript { .. })
        ));
    }
}
