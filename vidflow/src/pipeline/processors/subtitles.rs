//! Frame-based render metadata for the subtitle and CTA overlay.

use serde::{Deserialize, Serialize};

use super::silence::seconds_to_frames;
use crate::ai::{CtaVariant, TranscriptSegment};

/// One subtitle line in frame units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleFrame {
    pub start_frame: u64,
    pub end_frame: u64,
    pub text: String,
}

/// Everything the overlay renderer reads from its metadata file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderMetadata {
    pub subtitles: Vec<SubtitleFrame>,
    pub cta_variant: CtaVariant,
    pub cta_duration_in_frames: u64,
    pub duration_in_frames: u64,
    pub fps: f64,
}

/// Convert timed transcript segments to frames. Blank lines are dropped and
/// every line lasts at least one frame.
pub fn to_frame_subtitles(segments: &[TranscriptSegment], fps: f64) -> Vec<SubtitleFrame> {
    segments
        .iter()
        .filter_map(|segment| {
            let text = segment.text.trim();
            if text.is_empty() {
                return None;
            }
            let start_frame = seconds_to_frames(segment.start, fps);
            let end_frame = seconds_to_frames(segment.end, fps).max(start_frame + 1);
            Some(SubtitleFrame {
                start_frame,
                end_frame,
                text: text.to_string(),
            })
        })
        .collect()
}
