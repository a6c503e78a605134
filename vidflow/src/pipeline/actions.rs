//! Queue item actions.
//!
//! `Action` is a closed set: the scheduler and the information-request
//! processor both match on it exhaustively, so a new kind of work cannot be
//! added without deciding who runs it.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::storage::Link;

/// The work a queue item performs, with the parameters that work needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Action {
    /// Silence-trim a recording into a short, optionally with subtitles and CTA overlay.
    CreateAutoEditedVideo(CreateAutoEditedVideo),
    /// Cut explicit time ranges out of source videos and join them.
    CreateVideoFromClips(CreateVideoFromClips),
    /// Join whole video files end to end.
    ConcatenateVideos(ConcatenateVideos),
    /// Ask the AI which links a transcript mentions and fill the dependent links request.
    AnalyzeTranscriptForLinks(AnalyzeTranscriptForLinks),
    /// Human input: one URL per requested link description.
    LinksRequest(LinksRequest),
    /// Human input: a code sample to attach to an article.
    CodeRequest(CodeRequest),
    /// Write and store an article from a transcript.
    GenerateArticleFromTranscript(GenerateArticleFromTranscript),
}

impl Action {
    /// Stable wire name of this action's variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::CreateAutoEditedVideo(_) => "create-auto-edited-video",
            Action::CreateVideoFromClips(_) => "create-video-from-clips",
            Action::ConcatenateVideos(_) => "concatenate-videos",
            Action::AnalyzeTranscriptForLinks(_) => "analyze-transcript-for-links",
            Action::LinksRequest(_) => "links-request",
            Action::CodeRequest(_) => "code-request",
            Action::GenerateArticleFromTranscript(_) => "generate-article-from-transcript",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAutoEditedVideo {
    /// Raw recording to trim.
    pub input_video: PathBuf,
    /// File stem of the published short.
    pub output_name: String,
    /// Render subtitles and the CTA overlay on top of the trimmed video.
    pub subtitles: bool,
    /// Keep the result in the temp area instead of publishing it.
    #[serde(default)]
    pub dry_run: bool,
}

/// A `[start, end]` range, in seconds, of a source video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipRange {
    pub source: PathBuf,
    pub start_secs: f64,
    pub end_secs: f64,
}

impl ClipRange {
    pub fn duration_secs(&self) -> f64 {
        (self.end_secs - self.start_secs).max(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVideoFromClips {
    pub clips: Vec<ClipRange>,
    pub output_name: String,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcatenateVideos {
    pub videos: Vec<PathBuf>,
    pub output_name: String,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeTranscriptForLinks {
    pub transcript_path: PathBuf,
    pub original_video_path: PathBuf,
}

/// One link the user is asked to supply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRequest {
    pub description: String,
}

/// Answers collected for a links request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LinksData {
    pub links: Vec<Link>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinksRequest {
    pub original_video_path: PathBuf,
    /// Filled in by the transcript analysis this request depends on.
    #[serde(default)]
    pub requests: Vec<LinkRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temporary_data: Option<LinksData>,
}

/// A code sample attached to an article.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeData {
    pub code_path: String,
    pub code_content: String,
}

impl CodeData {
    pub fn is_empty(&self) -> bool {
        self.code_path.is_empty() && self.code_content.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temporary_data: Option<CodeData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateArticleFromTranscript {
    pub transcript_path: PathBuf,
    pub original_video_path: PathBuf,
    /// Stem shared by the exported video and its meta folder.
    pub video_name: String,
    /// Where the published short lands; the meta folder sits beside it.
    pub export_path: PathBuf,
    pub links_request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_request_id: Option<String>,
    /// Store into a `{video_name}_meta` folder instead of the article archive.
    #[serde(default)]
    pub store_alongside: bool,
}
