//! Auto-edited video workflow: silence-trim a recording, transcribe it, and
//! optionally burn in subtitles with a call-to-action overlay.

use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::assembly::{self, ClipCut};
use super::context::{ProcessorOutput, WorkflowContext};
use super::ffmpeg::{parse_duration, parse_frame_rate};
use super::silence::{
    ClipPlan, cta_duration_frames, parse_silence_events, plan_clips, speech_segments,
    total_duration_frames,
};
use super::subtitles::{RenderMetadata, to_frame_subtitles};
use crate::Result;
use crate::ai::Transcript;
use crate::error::WorkflowError;
use crate::pipeline::actions::CreateAutoEditedVideo;
use crate::pipeline::worker_pool::ResourcePool;
use crate::pipeline::workflows::transcript_path_for;
use crate::utils::fs;

/// Where an assembly is up to. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    DetectingSilence,
    ExtractingClips,
    Concatenating,
    ReadingFrameRate,
    Transcribing,
    ClassifyingCta,
    Rendering,
    Compositing,
    Publishing,
}

pub struct AutoEditProcessor;

impl AutoEditProcessor {
    pub async fn process(
        ctx: &WorkflowContext,
        item_id: &str,
        action: &CreateAutoEditedVideo,
    ) -> Result<ProcessorOutput> {
        let start = Instant::now();
        let input = action.input_video.as_path();
        let work = ctx.working_dir(item_id).await?;
        let enter = |stage: Stage| debug!(item_id, ?stage, "Assembly stage");

        enter(Stage::DetectingSilence);
        let clips = detect_speech(ctx, input).await?;

        enter(Stage::ExtractingClips);
        let cuts: Vec<ClipCut<'_>> = clips
            .iter()
            .map(|clip| ClipCut {
                source: input,
                start: clip.start,
                duration: clip.duration,
            })
            .collect();
        let clip_files = assembly::extract_clips(ctx, work.path(), &cuts).await?;

        enter(Stage::Concatenating);
        let trimmed = work.path().join("trimmed.mp4");
        assembly::concat_files(ctx, work.path(), &clip_files, &trimmed).await?;

        enter(Stage::ReadingFrameRate);
        let fps = read_frame_rate(ctx, input).await?;

        enter(Stage::Transcribing);
        let transcript = transcribe(ctx, work.path(), &trimmed).await?;
        let transcript_path = transcript_path_for(&ctx.paths, input);
        write_transcript(&transcript_path, &transcript).await?;

        enter(Stage::ClassifyingCta);
        let cta = ctx
            .ai
            .cta
            .classify_cta(&transcript.text)
            .await
            .map_err(WorkflowError::CtaClassification)?;
        info!(item_id, cta = %cta, "Chose call-to-action");

        let finished = if action.subtitles {
            enter(Stage::Rendering);
            let metadata = RenderMetadata {
                subtitles: to_frame_subtitles(&transcript.segments, fps),
                cta_variant: cta,
                cta_duration_in_frames: cta_duration_frames(&clips, fps),
                duration_in_frames: total_duration_frames(&clips, fps),
                fps,
            };
            let overlay = render_overlay(ctx, work.path(), &metadata).await?;

            enter(Stage::Compositing);
            let composited = work.path().join("final.mp4");
            ctx.commands
                .run_in(
                    ResourcePool::Cpu,
                    &ctx.ffmpeg.overlay(&trimmed, &overlay, &composited),
                )
                .await
                .map_err(WorkflowError::Overlay)?;
            composited
        } else {
            trimmed
        };

        enter(Stage::Publishing);
        let published =
            assembly::publish(ctx, &finished, &action.output_name, action.dry_run).await?;

        info!(
            item_id,
            clips = clips.len(),
            subtitles = action.subtitles,
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Auto-edited video finished"
        );
        Ok(ProcessorOutput {
            outputs: vec![published, transcript_path],
        })
    }
}

/// Measure the duration, run silence detection and plan the clips to keep.
async fn detect_speech(ctx: &WorkflowContext, input: &Path) -> Result<Vec<ClipPlan>> {
    let duration = ctx
        .commands
        .run_in(ResourcePool::Cpu, &ctx.ffmpeg.duration_query(input))
        .await
        .map_err(|e| WorkflowError::SilenceDetection(e.summary()))?;
    let total = parse_duration(&duration.stdout);
    if total.is_none() {
        warn!(
            input = %input.display(),
            "Could not read input duration; trailing speech will be dropped"
        );
    }

    let detection = ctx
        .commands
        .run_in(ResourcePool::Cpu, &ctx.ffmpeg.detect_silence(input))
        .await
        .map_err(|e| WorkflowError::SilenceDetection(e.summary()))?;

    let events = parse_silence_events(&detection.stderr);
    let segments = speech_segments(&events, total);
    let clips = plan_clips(&segments);
    if clips.is_empty() {
        return Err(WorkflowError::NoSpeechSegments {
            path: input.to_path_buf(),
        }
        .into());
    }

    info!(
        input = %input.display(),
        silences = events.len(),
        segments = segments.len(),
        clips = clips.len(),
        "Planned clips from silence detection"
    );
    Ok(clips)
}

async fn read_frame_rate(ctx: &WorkflowContext, video: &Path) -> Result<f64> {
    let output = ctx
        .commands
        .run_in(ResourcePool::Cpu, &ctx.ffmpeg.frame_rate_query(video))
        .await
        .map_err(|e| WorkflowError::FrameRate(e.summary()))?;
    parse_frame_rate(&output.stdout).ok_or_else(|| {
        WorkflowError::FrameRate(format!(
            "unreadable frame rate {:?}",
            output.stdout.trim()
        ))
        .into()
    })
}

/// Extract the audio track and transcribe it under the transcription pool.
async fn transcribe(ctx: &WorkflowContext, work: &Path, video: &Path) -> Result<Transcript> {
    let audio = work.join("audio.mp3");
    ctx.commands
        .run_in(ResourcePool::Cpu, &ctx.ffmpeg.extract_audio(video, &audio))
        .await
        .map_err(WorkflowError::AudioExtraction)?;

    let transcriber = ctx.ai.transcriber.clone();
    let transcript = ctx
        .governor
        .with_permit(ResourcePool::Transcription, || async {
            transcriber.transcribe(&audio).await
        })
        .await
        .map_err(WorkflowError::Transcription)?;

    info!(
        segments = transcript.segments.len(),
        chars = transcript.text.len(),
        "Transcribed audio"
    );
    Ok(transcript)
}

async fn write_transcript(path: &Path, transcript: &Transcript) -> Result<()> {
    fs::ensure_parent_dir(path).await?;
    let text = if transcript.text.trim().is_empty() {
        transcript
            .segments
            .iter()
            .map(|s| s.text.trim())
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        transcript.text.clone()
    };
    tokio::fs::write(path, text)
        .await
        .map_err(|e| fs::io_error("writing transcript", path, e))?;
    debug!(path = %path.display(), "Wrote transcript");
    Ok(())
}

/// Write the render metadata and run the renderer. Returns the overlay path.
async fn render_overlay(
    ctx: &WorkflowContext,
    work: &Path,
    metadata: &RenderMetadata,
) -> Result<PathBuf> {
    let metadata_path = work.join("render-metadata.json");
    tokio::fs::write(&metadata_path, serde_json::to_vec_pretty(metadata)?)
        .await
        .map_err(|e| fs::io_error("writing render metadata", &metadata_path, e))?;

    let overlay = work.join("overlay.mov");
    ctx.commands
        .run_in(
            ResourcePool::Render,
            &ctx.ffmpeg.render(&metadata_path, &overlay),
        )
        .await
        .map_err(WorkflowError::Render)?;

    debug!(
        overlay = %overlay.display(),
        cta = %metadata.cta_variant,
        frames = metadata.duration_in_frames,
        "Rendered overlay"
    );
    Ok(overlay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::processors::silence::{END_PADDING_SECS, FINAL_END_PADDING_SECS};
    use crate::pipeline::processors::testing::{FakeAi, FakeCommands, ffmpeg_response, harness};
    use crate::{Error, error::WorkflowError as WE};
    use tempfile::TempDir;

    fn action(root: &Path, subtitles: bool, dry_run: bool) -> CreateAutoEditedVideo {
        CreateAutoEditedVideo {
            input_video: root.join("take.mkv"),
            output_name: "take".into(),
            subtitles,
            dry_run,
        }
    }

    #[tokio::test]
    async fn test_two_windows_without_subtitles() {
        let dir = TempDir::new().unwrap();
        let h = harness(dir.path(), FakeCommands::ffmpeg_like(), FakeAi::default());

        let output = AutoEditProcessor::process(&h.ctx, "item1", &action(&h.root, false, false))
            .await
            .unwrap();

        let published = h.root.join("shorts/take.mp4");
        assert_eq!(output.outputs[0], published);
        assert!(published.is_file());

        // Two clips, cut on the GPU pool.
        let clip_pools = h.commands.pools_for("-ss ");
        assert_eq!(clip_pools, vec![ResourcePool::GpuEncode; 2]);
        let calls = h.commands.calls();
        let cut = |start: &str, duration: f64| {
            let duration = format!("-t {duration:.3}");
            calls
                .iter()
                .any(|(_, c)| c.contains(start) && c.contains(&duration))
        };
        assert!(cut("-ss 0.000", 3.0 + END_PADDING_SECS));
        assert!(cut("-ss 10.000", 5.0 + FINAL_END_PADDING_SECS));

        // Frame rate comes from the source recording, not the re-encoded cut.
        let fps_calls: Vec<_> = calls.iter().filter(|(_, c)| c.contains("r_frame_rate")).collect();
        assert_eq!(fps_calls.len(), 1);
        assert!(fps_calls[0].1.contains("take.mkv"));
        assert!(!fps_calls[0].1.contains("trimmed.mp4"));

        assert_eq!(h.commands.pools_for("-f concat"), vec![ResourcePool::GpuEncode]);
        assert_eq!(h.commands.pools_for("silencedetect"), vec![ResourcePool::Cpu]);
        assert!(h.commands.pools_for("render").is_empty());

        let transcript = tokio::fs::read_to_string(h.root.join("transcripts/take.txt"))
            .await
            .unwrap();
        assert_eq!(transcript, "Hello there. Check the docs.");

        // Working directory is gone.
        let leftovers: Vec<_> = std::fs::read_dir(h.root.join("tmp")).unwrap().collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_subtitles_render_single_flight_and_metadata() {
        let dir = TempDir::new().unwrap();
        let commands = FakeCommands::with_responder(|pool, command| {
            if command.starts_with("render") {
                let metadata_path = command
                    .split(' ')
                    .find_map(|arg| arg.strip_prefix("--props="))
                    .unwrap();
                let json: serde_json::Value =
                    serde_json::from_slice(&std::fs::read(metadata_path).unwrap()).unwrap();
                assert_eq!(json["fps"], 30.0);
                assert_eq!(json["ctaVariant"], "course");
                let kept_secs = 3.0 + END_PADDING_SECS + 5.0 + FINAL_END_PADDING_SECS;
                assert_eq!(json["durationInFrames"], (kept_secs * 30.0_f64).round() as u64);
                assert_eq!(
                    json["ctaDurationInFrames"],
                    ((3.0 + END_PADDING_SECS) * 30.0_f64).round() as u64
                );
                assert_eq!(json["subtitles"][1]["startFrame"], 105);
            }
            ffmpeg_response(pool, command)
        });
        let h = harness(dir.path(), commands, FakeAi::default());

        AutoEditProcessor::process(&h.ctx, "item2", &action(&h.root, true, false))
            .await
            .unwrap();

        assert_eq!(h.commands.pools_for("render"), vec![ResourcePool::Render]);
        assert_eq!(h.commands.pools_for("overlay="), vec![ResourcePool::Cpu]);
        assert!(h.root.join("shorts/take.mp4").is_file());
    }

    #[tokio::test]
    async fn test_dry_run_holds_output_in_temp() {
        let dir = TempDir::new().unwrap();
        let h = harness(dir.path(), FakeCommands::ffmpeg_like(), FakeAi::default());

        let output = AutoEditProcessor::process(&h.ctx, "item3", &action(&h.root, false, true))
            .await
            .unwrap();

        assert_eq!(output.outputs[0], h.root.join("tmp/dry-run/take.mp4"));
        assert!(output.outputs[0].is_file());
        assert!(!h.root.join("shorts/take.mp4").exists());
    }

    #[tokio::test]
    async fn test_transcription_failure_is_tagged_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let ai = FakeAi {
            fail_transcription: true,
            ..FakeAi::default()
        };
        let h = harness(dir.path(), FakeCommands::ffmpeg_like(), ai);

        let err = AutoEditProcessor::process(&h.ctx, "item4", &action(&h.root, false, false))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Workflow(WE::Transcription(_))));
        assert!(err.to_string().starts_with("Transcription failed"));
        let leftovers: Vec<_> = std::fs::read_dir(h.root.join("tmp")).unwrap().collect();
        assert!(leftovers.is_empty());
        assert!(!h.root.join("shorts/take.mp4").exists());
    }

    #[tokio::test]
    async fn test_all_silence_fails_with_no_segments() {
        let dir = TempDir::new().unwrap();
        let commands = FakeCommands::with_responder(|pool, command| {
            if command.contains("silencedetect") {
                return Ok(crate::pipeline::processors::CommandOutput {
                    stdout: String::new(),
                    stderr: "silence_start: 0\nsilence_end: 20".into(),
                });
            }
            ffmpeg_response(pool, command)
        });
        let h = harness(dir.path(), commands, FakeAi::default());

        let err = AutoEditProcessor::process(&h.ctx, "item5", &action(&h.root, false, false))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Workflow(WE::NoSpeechSegments { .. })));
    }

    #[tokio::test]
    async fn test_clip_failure_is_tagged() {
        let dir = TempDir::new().unwrap();
        let h = harness(dir.path(), FakeCommands::failing_on("-ss "), FakeAi::default());

        let err = AutoEditProcessor::process(&h.ctx, "item6", &action(&h.root, false, false))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Clip extraction failed"));
    }
}
