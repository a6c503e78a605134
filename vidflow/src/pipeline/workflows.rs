//! Workflow builders.
//!
//! Pure functions that expand a high-level request into queue items wired
//! together by dependency edges. Nothing here touches the filesystem; the
//! caller appends the result to the queue store.

use std::path::{Path, PathBuf};

use super::actions::{
    Action, AnalyzeTranscriptForLinks, ClipRange, CodeData, CodeRequest, ConcatenateVideos,
    CreateAutoEditedVideo, CreateVideoFromClips, GenerateArticleFromTranscript, LinksRequest,
};
use super::job_queue::{QueueItem, QueueStatus};
use crate::config::PathsConfig;

/// File stem of a video, used to name everything derived from it.
pub fn video_stem(video: &Path) -> String {
    video
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string())
}

/// Where the raw transcript of `video` is written.
pub fn transcript_path_for(paths: &PathsConfig, video: &Path) -> PathBuf {
    paths
        .transcripts_dir
        .join(format!("{}.txt", video_stem(video)))
}

/// Where the published short for `video` lands.
pub fn export_path_for(paths: &PathsConfig, video: &Path) -> PathBuf {
    paths.shorts_dir.join(format!("{}.mp4", video_stem(video)))
}

/// Options for [`build_auto_edited_video_items`].
#[derive(Debug, Clone, Default)]
pub struct AutoEditedVideoRequest {
    pub input_video: PathBuf,
    pub subtitles: bool,
    pub dry_run: bool,
    pub generate_article: bool,
    /// Put the article in a meta folder beside the video instead of the archive.
    pub store_alongside: bool,
    /// Code sample already read by the caller.
    pub code: Option<CodeData>,
}

/// One video item, or five items when an article is wanted:
///
/// 1. create the video
/// 2. analyze its transcript for links (after 1)
/// 3. code request, already completed with whatever code was supplied
/// 4. links request, waiting for the user (after 2)
/// 5. generate the article (after 3 and 4)
pub fn build_auto_edited_video_items(
    request: &AutoEditedVideoRequest,
    paths: &PathsConfig,
) -> Vec<QueueItem> {
    let input = request.input_video.as_path();
    let video_name = video_stem(input);

    let video = QueueItem::new(
        Action::CreateAutoEditedVideo(CreateAutoEditedVideo {
            input_video: input.to_path_buf(),
            output_name: video_name.clone(),
            subtitles: request.subtitles,
            dry_run: request.dry_run,
        }),
        QueueStatus::ReadyToRun,
    );
    if !request.generate_article {
        return vec![video];
    }

    let transcript_path = transcript_path_for(paths, input);

    let analysis = QueueItem::new(
        Action::AnalyzeTranscriptForLinks(AnalyzeTranscriptForLinks {
            transcript_path: transcript_path.clone(),
            original_video_path: input.to_path_buf(),
        }),
        QueueStatus::ReadyToRun,
    )
    .with_dependencies(vec![video.id.clone()]);

    let code = QueueItem::completed(Action::CodeRequest(CodeRequest {
        temporary_data: Some(request.code.clone().unwrap_or_default()),
    }));

    let links = QueueItem::new(
        Action::LinksRequest(LinksRequest {
            original_video_path: input.to_path_buf(),
            requests: Vec::new(),
            temporary_data: None,
        }),
        QueueStatus::RequiresUserInput,
    )
    .with_dependencies(vec![analysis.id.clone()]);

    let article = QueueItem::new(
        Action::GenerateArticleFromTranscript(GenerateArticleFromTranscript {
            transcript_path,
            original_video_path: input.to_path_buf(),
            video_name,
            export_path: export_path_for(paths, input),
            links_request_id: links.id.clone(),
            code_request_id: Some(code.id.clone()),
            store_alongside: request.store_alongside,
        }),
        QueueStatus::ReadyToRun,
    )
    .with_dependencies(vec![code.id.clone(), links.id.clone()]);

    vec![video, analysis, code, links, article]
}

/// A single item cutting `clips` out of their sources and joining them.
pub fn build_video_from_clips_items(
    clips: Vec<ClipRange>,
    output_name: impl Into<String>,
    dry_run: bool,
) -> Vec<QueueItem> {
    vec![QueueItem::new(
        Action::CreateVideoFromClips(CreateVideoFromClips {
            clips,
            output_name: output_name.into(),
            dry_run,
        }),
        QueueStatus::ReadyToRun,
    )]
}

/// A single item joining whole videos end to end.
pub fn build_concatenate_videos_items(
    videos: Vec<PathBuf>,
    output_name: impl Into<String>,
    dry_run: bool,
) -> Vec<QueueItem> {
    vec![QueueItem::new(
        Action::ConcatenateVideos(ConcatenateVideos {
            videos,
            output_name: output_name.into(),
            dry_run,
        }),
        QueueStatus::ReadyToRun,
    )]
}
