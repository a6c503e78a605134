//! Videos assembled from explicit parts: time ranges of source files, or
//! whole files joined end to end.

use std::path::PathBuf;
use tracing::info;

use super::assembly::{self, ClipCut};
use super::context::{ProcessorOutput, WorkflowContext};
use crate::pipeline::actions::{ConcatenateVideos, CreateVideoFromClips};
use crate::{Error, Result};

pub struct ClipsProcessor;

impl ClipsProcessor {
    pub async fn process(
        ctx: &WorkflowContext,
        item_id: &str,
        action: &CreateVideoFromClips,
    ) -> Result<ProcessorOutput> {
        if action.clips.is_empty() {
            return Err(Error::validation("create-video-from-clips needs at least one clip"));
        }
        if let Some(bad) = action.clips.iter().find(|c| c.duration_secs() <= 0.0) {
            return Err(Error::validation(format!(
                "clip of {} ends at {} before it starts at {}",
                bad.source.display(),
                bad.end_secs,
                bad.start_secs
            )));
        }

        let work = ctx.working_dir(item_id).await?;
        let cuts: Vec<ClipCut<'_>> = action
            .clips
            .iter()
            .map(|clip| ClipCut {
                source: &clip.source,
                start: clip.start_secs,
                duration: clip.duration_secs(),
            })
            .collect();
        let files = assembly::extract_clips(ctx, work.path(), &cuts).await?;

        let joined = work.path().join("joined.mp4");
        assembly::concat_files(ctx, work.path(), &files, &joined).await?;
        let published =
            assembly::publish(ctx, &joined, &action.output_name, action.dry_run).await?;

        info!(item_id, clips = files.len(), "Video from clips finished");
        Ok(ProcessorOutput::single(published))
    }
}

pub struct ConcatProcessor;

impl ConcatProcessor {
    pub async fn process(
        ctx: &WorkflowContext,
        item_id: &str,
        action: &ConcatenateVideos,
    ) -> Result<ProcessorOutput> {
        if action.videos.is_empty() {
            return Err(Error::validation("concatenate-videos needs at least one video"));
        }

        // The concat demuxer resolves relative entries against the list file.
        let videos = action
            .videos
            .iter()
            .map(|video| {
                std::path::absolute(video)
                    .map_err(|e| Error::io_path("resolving video path", video, e))
            })
            .collect::<Result<Vec<PathBuf>>>()?;

        let work = ctx.working_dir(item_id).await?;
        let joined = work.path().join("joined.mp4");
        assembly::concat_files(ctx, work.path(), &videos, &joined).await?;
        let published =
            assembly::publish(ctx, &joined, &action.output_name, action.dry_run).await?;

        info!(item_id, videos = videos.len(), "Concatenation finished");
        Ok(ProcessorOutput::single(published))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::actions::ClipRange;
    use crate::pipeline::processors::testing::{FakeAi, FakeCommands, harness};
    use crate::pipeline::worker_pool::ResourcePool;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_clips_are_cut_joined_and_published() {
        let dir = TempDir::new().unwrap();
        let h = harness(dir.path(), FakeCommands::ffmpeg_like(), FakeAi::default());
        let action = CreateVideoFromClips {
            clips: vec![
                ClipRange {
                    source: h.root.join("a.mkv"),
                    start_secs: 1.0,
                    end_secs: 4.0,
                },
                ClipRange {
                    source: h.root.join("b.mkv"),
                    start_secs: 0.0,
                    end_secs: 2.5,
                },
            ],
            output_name: "combo".into(),
            dry_run: false,
        };

        let output = ClipsProcessor::process(&h.ctx, "clips1", &action).await.unwrap();

        assert_eq!(output.outputs, vec![h.root.join("shorts/combo.mp4")]);
        assert_eq!(h.commands.pools_for("-ss "), vec![ResourcePool::GpuEncode; 2]);
        assert!(
            h.commands
                .calls()
                .iter()
                .any(|(_, c)| c.contains("-ss 1.000") && c.contains("-t 3.000"))
        );
    }

    #[tokio::test]
    async fn test_inverted_clip_is_rejected() {
        let dir = TempDir::new().unwrap();
        let h = harness(dir.path(), FakeCommands::ffmpeg_like(), FakeAi::default());
        let action = CreateVideoFromClips {
            clips: vec![ClipRange {
                source: "a.mkv".into(),
                start_secs: 5.0,
                end_secs: 2.0,
            }],
            output_name: "bad".into(),
            dry_run: false,
        };

        let err = ClipsProcessor::process(&h.ctx, "clips2", &action).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(h.commands.calls().is_empty());
    }

    #[tokio::test]
    async fn test_concatenate_dry_run() {
        let dir = TempDir::new().unwrap();
        let h = harness(dir.path(), FakeCommands::ffmpeg_like(), FakeAi::default());
        let action = ConcatenateVideos {
            videos: vec![h.root.join("one.mp4"), h.root.join("two.mp4")],
            output_name: "joined".into(),
            dry_run: true,
        };

        let output = ConcatProcessor::process(&h.ctx, "concat1", &action).await.unwrap();

        assert_eq!(output.outputs, vec![h.root.join("tmp/dry-run/joined.mp4")]);
        assert_eq!(h.commands.pools_for("-f concat"), vec![ResourcePool::GpuEncode]);
    }

    #[tokio::test]
    async fn test_concatenate_requires_videos() {
        let dir = TempDir::new().unwrap();
        let h = harness(dir.path(), FakeCommands::ffmpeg_like(), FakeAi::default());
        let action = ConcatenateVideos {
            videos: Vec::new(),
            output_name: "empty".into(),
            dry_run: false,
        };
        assert!(ConcatProcessor::process(&h.ctx, "concat2", &action).await.is_err());
    }
}
