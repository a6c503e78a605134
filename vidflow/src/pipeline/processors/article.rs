//! Article generation from a transcript plus the links and code the user
//! supplied.

use chrono::Local;
use std::path::Path;
use tracing::{debug, info, warn};

use super::context::{ProcessorOutput, WorkflowContext};
use super::links::read_transcript;
use crate::Result;
use crate::ai::ArticleRequest;
use crate::error::WorkflowError;
use crate::pipeline::actions::{Action, CodeData, GenerateArticleFromTranscript};
use crate::pipeline::job_queue::{QueueItem, QueueState, QueueStatus};
use crate::storage::{Article, Link, MetaBundle, write_meta_folder};

/// Look up a dependency by ID and check it is a completed item of the
/// expected kind.
fn completed_dependency<'a>(
    state: &'a QueueState,
    id: &str,
    expected: &'static str,
) -> std::result::Result<&'a QueueItem, WorkflowError> {
    let item = state
        .find(id)
        .ok_or_else(|| WorkflowError::DependencyNotFound { id: id.to_string() })?;
    if item.action.kind() != expected {
        return Err(WorkflowError::DependencyWrongType {
            id: id.to_string(),
            expected,
            actual: item.action.kind(),
        });
    }
    if item.status != QueueStatus::Completed {
        return Err(WorkflowError::DependencyNotCompleted {
            id: id.to_string(),
            status: item.status,
        });
    }
    Ok(item)
}

/// Links and code gathered from the completed information requests.
fn gather_inputs(
    state: &QueueState,
    action: &GenerateArticleFromTranscript,
) -> std::result::Result<(Vec<Link>, Option<CodeData>), WorkflowError> {
    let links_item = completed_dependency(state, &action.links_request_id, "links-request")?;
    let links = match &links_item.action {
        Action::LinksRequest(request) => request
            .temporary_data
            .as_ref()
            .map(|data| data.links.clone())
            .unwrap_or_default(),
        _ => Vec::new(),
    };

    let code = match &action.code_request_id {
        Some(id) => match &completed_dependency(state, id, "code-request")?.action {
            Action::CodeRequest(request) => {
                request.temporary_data.clone().filter(|code| !code.is_empty())
            }
            _ => None,
        },
        None => None,
    };
    Ok((links, code))
}

pub struct ArticleProcessor;

impl ArticleProcessor {
    pub async fn process(
        ctx: &WorkflowContext,
        item_id: &str,
        action: &GenerateArticleFromTranscript,
    ) -> Result<ProcessorOutput> {
        let state = ctx.store.get_state().await?;
        let (links, code) = gather_inputs(&state, action)?;

        let transcript = read_transcript(&action.transcript_path).await?;
        let recent_articles = ctx.articles.recent(ctx.style_examples).await?;
        debug!(
            item_id,
            links = links.len(),
            has_code = code.is_some(),
            style_examples = recent_articles.len(),
            "Gathered article inputs"
        );

        let request = ArticleRequest {
            transcript,
            recent_articles,
            code,
            links,
        };
        let body = ctx
            .ai
            .articles
            .write_article(&request)
            .await
            .map_err(WorkflowError::ArticleWriting)?;
        let title = ctx
            .ai
            .titles
            .generate_title(&request)
            .await
            .map_err(WorkflowError::TitleGeneration)?;

        let article = Article {
            date: Local::now().date_naive(),
            original_video_path: action.original_video_path.clone(),
            title,
            body,
        };

        let stored = if action.store_alongside {
            let code_path = request
                .code
                .as_ref()
                .map(|code| Path::new(&code.code_path))
                .filter(|path| {
                    let exists = path.is_file();
                    if !exists {
                        warn!(
                            path = %path.display(),
                            "Code file no longer exists; not bundling it"
                        );
                    }
                    exists
                });
            write_meta_folder(&MetaBundle {
                export_path: &action.export_path,
                video_name: &action.video_name,
                article: &article,
                transcript_path: &action.transcript_path,
                code_path,
            })
            .await?
        } else {
            ctx.articles.store(&article).await?
        };

        info!(item_id, title = %article.title, path = %stored.display(), "Article generated");
        Ok(ProcessorOutput::single(stored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::pipeline::actions::{CodeRequest, LinksData, LinksRequest};
    use crate::pipeline::processors::testing::{FakeAi, FakeCommands, Harness, harness};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn links_item(status: QueueStatus, links: Vec<Link>) -> QueueItem {
        QueueItem::new(
            Action::LinksRequest(LinksRequest {
                original_video_path: "take.mkv".into(),
                requests: Vec::new(),
                temporary_data: Some(LinksData { links }),
            }),
            status,
        )
        .with_id("links")
    }

    fn code_item(code: CodeData) -> QueueItem {
        let mut item = QueueItem::new(
            Action::CodeRequest(CodeRequest {
                temporary_data: Some(code),
            }),
            QueueStatus::ReadyToRun,
        )
        .with_id("code");
        item.mark_completed().unwrap();
        item
    }

    fn article_action(h: &Harness, alongside: bool, code: bool) -> GenerateArticleFromTranscript {
        GenerateArticleFromTranscript {
            transcript_path: h.root.join("transcripts/take.txt"),
            original_video_path: h.root.join("take.mkv"),
            video_name: "take".into(),
            export_path: h.root.join("shorts/take.mp4"),
            links_request_id: "links".into(),
            code_request_id: code.then(|| "code".to_string()),
            store_alongside: alongside,
        }
    }

    async fn setup(h: &Harness, items: Vec<QueueItem>) {
        tokio::fs::create_dir_all(h.root.join("transcripts")).await.unwrap();
        tokio::fs::write(h.root.join("transcripts/take.txt"), "We build a queue.")
            .await
            .unwrap();
        h.ctx.store.append_items(items).await.unwrap();
    }

    fn docs_link() -> Link {
        Link {
            description: "docs".into(),
            url: "https://docs.rs".into(),
        }
    }

    #[tokio::test]
    async fn test_sixth_article_in_central_archive() {
        let dir = TempDir::new().unwrap();
        let h = harness(dir.path(), FakeCommands::ffmpeg_like(), FakeAi::default());
        let mut links = links_item(QueueStatus::RequiresUserInput, vec![docs_link()]);
        links.mark_completed().unwrap();
        setup(&h, vec![links]).await;
        tokio::fs::create_dir_all(h.root.join("articles")).await.unwrap();
        for i in 1..=5 {
            tokio::fs::write(h.root.join(format!("articles/{i:03}-old.md")), format!("old {i}"))
                .await
                .unwrap();
        }

        let output = ArticleProcessor::process(&h.ctx, "article", &article_action(&h, false, false))
            .await
            .unwrap();

        assert_eq!(
            output.outputs,
            vec![h.root.join("articles/006-async-rust-basics.md")]
        );
        let requests = h.ai.article_requests.lock().unwrap();
        assert_eq!(requests[0].links, vec![docs_link()]);
        assert_eq!(requests[0].recent_articles, vec!["old 5", "old 4", "old 3"]);
        assert!(requests[0].code.is_none());
    }

    #[tokio::test]
    async fn test_alongside_writes_meta_folder_with_code() {
        let dir = TempDir::new().unwrap();
        let h = harness(dir.path(), FakeCommands::ffmpeg_like(), FakeAi::default());
        let code_path: PathBuf = h.root.join("demo.rs");
        tokio::fs::write(&code_path, "fn main() {}").await.unwrap();
        let mut links = links_item(QueueStatus::RequiresUserInput, Vec::new());
        links.mark_completed().unwrap();
        let code = code_item(CodeData {
            code_path: code_path.to_string_lossy().into_owned(),
            code_content: "fn main() {}".into(),
        });
        setup(&h, vec![links, code]).await;

        let output = ArticleProcessor::process(&h.ctx, "article", &article_action(&h, true, true))
            .await
            .unwrap();

        let folder = h.root.join("shorts/take_meta");
        assert_eq!(output.outputs, vec![folder.clone()]);
        assert!(folder.join("take.md").is_file());
        assert!(folder.join("take.txt").is_file());
        assert!(folder.join("demo.rs").is_file());
        assert!(!h.root.join("articles").exists());
        let requests = h.ai.article_requests.lock().unwrap();
        assert_eq!(requests[0].code.as_ref().unwrap().code_content, "fn main() {}");
    }

    #[tokio::test]
    async fn test_dependency_validation() {
        let dir = TempDir::new().unwrap();
        let h = harness(dir.path(), FakeCommands::ffmpeg_like(), FakeAi::default());
        setup(&h, vec![links_item(QueueStatus::RequiresUserInput, Vec::new())]).await;

        let err = ArticleProcessor::process(&h.ctx, "article", &article_action(&h, false, false))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Workflow(WorkflowError::DependencyNotCompleted {
                status: QueueStatus::RequiresUserInput,
                ..
            })
        ));

        let err = ArticleProcessor::process(&h.ctx, "article", &article_action(&h, false, true))
            .await
            .unwrap_err();
        // Links are checked first.
        assert!(matches!(
            err,
            Error::Workflow(WorkflowError::DependencyNotCompleted { .. })
        ));
    }

    #[test]
    fn test_wrong_type_and_missing_dependencies() {
        let state = QueueState::new(vec![code_item(CodeData::default())]);
        let mut action = GenerateArticleFromTranscript {
            transcript_path: "t.txt".into(),
            original_video_path: "v.mkv".into(),
            video_name: "v".into(),
            export_path: "v.mp4".into(),
            links_request_id: "code".into(),
            code_request_id: None,
            store_alongside: false,
        };
        assert!(matches!(
            gather_inputs(&state, &action),
            Err(WorkflowError::DependencyWrongType {
                expected: "links-request",
                actual: "code-request",
                ..
            })
        ));

        action.links_request_id = "nope".into();
        assert!(matches!(
            gather_inputs(&state, &action),
            Err(WorkflowError::DependencyNotFound { .. })
        ));
    }
}
