mod cli;

use anyhow::Context;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use cli::{Args, Commands};
use vidflow::ai::{AiServices, OpenAiClient};
use vidflow::config::AppConfig;
use vidflow::logging;
use vidflow::pipeline::{
    AutoEditedVideoRequest, CodeData, GovernedExecutor, InformationRequestProcessor,
    InquirePrompter, QueueItem, QueueStore, ResourceGovernor, Scheduler, ShellCommandExecutor,
    WorkflowContext, build_auto_edited_video_items, build_concatenate_videos_items,
    build_video_from_clips_items,
};
use vidflow::storage::LinksStorage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    let _guard = logging::init_logging(&config.paths.log_dir, args.verbose)
        .context("Failed to initialise logging")?;
    let retention = logging::LOG_RETENTION_DAYS;
    if let Err(e) = logging::cleanup_old_logs(&config.paths.log_dir, retention).await {
        warn!(error = %e, "Log cleanup failed");
    }

    let store = Arc::new(QueueStore::new(&config.paths.queue_file));

    match args.command {
        Commands::Run => run_scheduler(&config, store).await,
        Commands::Requests => {
            let processor = InformationRequestProcessor::new(
                store,
                LinksStorage::new(&config.paths.links_file),
                Arc::new(InquirePrompter),
            );
            match processor.process_all().await {
                Ok(summary) => {
                    println!(
                        "Information requests: {} completed, {} failed",
                        summary.completed, summary.failed
                    );
                    Ok(())
                }
                Err(e) if e.is_cancelled() => {
                    println!("Stopped. Unanswered requests are still waiting for input.");
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        }
        Commands::Enqueue {
            video,
            subtitles,
            dry_run,
            article,
            alongside,
            code,
        } => {
            let code = match code {
                Some(path) => Some(read_code(&path).await?),
                None => None,
            };
            let request = AutoEditedVideoRequest {
                input_video: video,
                subtitles,
                dry_run,
                generate_article: article,
                store_alongside: alongside,
                code,
            };
            enqueue(&store, build_auto_edited_video_items(&request, &config.paths)).await
        }
        Commands::EnqueueClips {
            output,
            dry_run,
            clips,
        } => enqueue(&store, build_video_from_clips_items(clips, output, dry_run)).await,
        Commands::EnqueueConcat {
            output,
            dry_run,
            videos,
        } => enqueue(&store, build_concatenate_videos_items(videos, output, dry_run)).await,
        Commands::Status { only } => show_status(&store, only.as_deref()).await,
    }
}

async fn run_scheduler(config: &AppConfig, store: Arc<QueueStore>) -> anyhow::Result<()> {
    let governor = Arc::new(ResourceGovernor::new(config.pools));
    let commands = Arc::new(GovernedExecutor::new(
        Arc::new(ShellCommandExecutor::new()),
        governor.clone(),
    ));
    let client = OpenAiClient::new(&config.ai).context("Failed to create AI client")?;
    if !client.has_api_key() {
        warn!(api_base = client.api_base(), "No AI API key configured; AI steps will fail");
    }

    let ctx = WorkflowContext::from_config(
        config,
        store,
        commands,
        governor,
        AiServices::from_client(Arc::new(client)),
    );
    let summary = Scheduler::new(ctx).run_pass().await?;
    println!(
        "Scheduler pass: {} waves, {} completed, {} failed",
        summary.waves, summary.completed, summary.failed
    );
    Ok(())
}

async fn read_code(path: &Path) -> anyhow::Result<CodeData> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read code file {}", path.display()))?;
    Ok(CodeData {
        code_path: path.to_string_lossy().into_owned(),
        code_content: content,
    })
}

async fn enqueue(store: &QueueStore, items: Vec<QueueItem>) -> anyhow::Result<()> {
    let summary: Vec<(String, &'static str)> = items
        .iter()
        .map(|item| (item.id.clone(), item.action.kind()))
        .collect();
    store.append_items(items).await?;

    info!(count = summary.len(), "Queued items");
    for (id, kind) in summary {
        println!("{id}  {kind}");
    }
    Ok(())
}

async fn show_status(store: &QueueStore, only: Option<&str>) -> anyhow::Result<()> {
    let state = store.get_state().await?;
    let counts = state.counts();
    println!("Queue file: {}", store.path().display());
    println!(
        "{} items: {} ready, {} waiting for input, {} completed, {} failed",
        counts.total(),
        counts.ready_to_run,
        counts.requires_user_input,
        counts.completed,
        counts.failed
    );

    for item in state
        .queue
        .iter()
        .filter(|item| only.is_none_or(|status| item.status.as_str() == status))
    {
        println!(
            "{}  {:<20}  {}{}",
            item.id,
            item.status.as_str(),
            item.action.kind(),
            item.error
                .as_deref()
                .map(|e| format!("  ({e})"))
                .unwrap_or_default()
        );
    }
    Ok(())
}
