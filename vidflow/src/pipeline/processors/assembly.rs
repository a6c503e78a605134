//! Cut, join and publish steps shared by the video workflows.

use futures::future::try_join_all;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::context::WorkflowContext;
use super::ffmpeg::concat_list;
use crate::error::WorkflowError;
use crate::pipeline::worker_pool::ResourcePool;
use crate::utils::fs;
use crate::{Error, Result};

/// A time range to cut out of a source file.
#[derive(Debug, Clone, Copy)]
pub struct ClipCut<'a> {
    pub source: &'a Path,
    pub start: f64,
    pub duration: f64,
}

/// Cut every range into `work/clip_NNN.mp4`, concurrently under the GPU pool.
/// Returns the clip files in input order.
pub async fn extract_clips(
    ctx: &WorkflowContext,
    work: &Path,
    cuts: &[ClipCut<'_>],
) -> Result<Vec<PathBuf>> {
    let jobs = cuts.iter().enumerate().map(|(index, cut)| {
        let output = work.join(format!("clip_{index:03}.mp4"));
        let command = ctx
            .ffmpeg
            .extract_clip(cut.source, cut.start, cut.duration, &output);
        async move {
            ctx.commands
                .run_in(ResourcePool::GpuEncode, &command)
                .await
                .map_err(WorkflowError::ClipExtraction)?;
            debug!(clip = %output.display(), "Extracted clip");
            Ok::<_, Error>(output)
        }
    });

    let clips = try_join_all(jobs).await?;
    info!(count = clips.len(), "Extracted clips");
    Ok(clips)
}

/// Join `files` in order into `output` via a concat list in `work`.
pub async fn concat_files(
    ctx: &WorkflowContext,
    work: &Path,
    files: &[PathBuf],
    output: &Path,
) -> Result<()> {
    let list = work.join("concat.txt");
    tokio::fs::write(&list, concat_list(files))
        .await
        .map_err(|e| fs::io_error("writing concat list", &list, e))?;

    ctx.commands
        .run_in(ResourcePool::GpuEncode, &ctx.ffmpeg.concat(&list, output))
        .await
        .map_err(WorkflowError::Concatenation)?;
    info!(inputs = files.len(), output = %output.display(), "Concatenated videos");
    Ok(())
}

/// Move the finished video to the shorts directory, or to the dry-run
/// holding area under the temp directory.
pub async fn publish(
    ctx: &WorkflowContext,
    produced: &Path,
    output_name: &str,
    dry_run: bool,
) -> Result<PathBuf> {
    let dir = if dry_run {
        ctx.paths.temp_dir.join("dry-run")
    } else {
        ctx.paths.shorts_dir.clone()
    };
    let target = dir.join(format!("{output_name}.mp4"));

    fs::move_file(produced, &target)
        .await
        .map_err(|source| WorkflowError::Publish {
            path: target.clone(),
            source,
        })?;

    if dry_run {
        info!(path = %target.display(), "Dry run: output held back from publishing");
    } else {
        info!(path = %target.display(), "Published video");
    }
    Ok(target)
}
