//! Speech segment detection from ffmpeg `silencedetect` output, and the clip
//! plan derived from it.

use regex::Regex;
use std::sync::OnceLock;

/// Padding added after every clip except the last.
pub const END_PADDING_SECS: f64 = 0.25;
/// Padding added after the last clip, so the video does not end mid-breath.
pub const FINAL_END_PADDING_SECS: f64 = 1.0;
/// Speech segments shorter than this are dropped.
pub const MIN_CLIP_LENGTH_SECS: f64 = 0.5;

/// A `silencedetect` event, in seconds from the start of the input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SilenceEvent {
    Start(f64),
    End(f64),
}

/// Stretch of speech between two silences.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeechSegment {
    pub start: f64,
    pub end: f64,
}

impl SpeechSegment {
    pub fn len(&self) -> f64 {
        self.end - self.start
    }
}

/// A clip to cut from the input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipPlan {
    pub start: f64,
    /// Segment length plus the applicable end padding.
    pub duration: f64,
}

fn silence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"silence_(start|end):\s*(-?[0-9]+(?:\.[0-9]+)?)")
            .expect("silence regex is valid")
    })
}

/// Pull silence events out of ffmpeg's stderr, in order.
pub fn parse_silence_events(stderr: &str) -> Vec<SilenceEvent> {
    silence_regex()
        .captures_iter(stderr)
        .filter_map(|caps| {
            let at: f64 = caps[2].parse().ok()?;
            let at = at.max(0.0);
            Some(match &caps[1] {
                "start" => SilenceEvent::Start(at),
                _ => SilenceEvent::End(at),
            })
        })
        .collect()
}

/// Speech segments are the gaps between a `silence_end` and the next
/// `silence_start`. The start of the input counts as a `silence_end`, and if
/// the input ends while speaking, the final segment runs to `total_duration`.
pub fn speech_segments(events: &[SilenceEvent], total_duration: Option<f64>) -> Vec<SpeechSegment> {
    let mut segments = Vec::new();
    let mut speech_start = Some(0.0);

    for event in events {
        match *event {
            SilenceEvent::Start(at) => {
                if let Some(start) = speech_start.take() {
                    if at > start {
                        segments.push(SpeechSegment { start, end: at });
                    }
                }
            }
            SilenceEvent::End(at) => speech_start = Some(at),
        }
    }

    if let (Some(start), Some(end)) = (speech_start, total_duration) {
        if end > start {
            segments.push(SpeechSegment { start, end });
        }
    }
    segments
}

/// Drop short segments, then pad: every clip but the last gets
/// [`END_PADDING_SECS`], the last gets [`FINAL_END_PADDING_SECS`].
pub fn plan_clips(segments: &[SpeechSegment]) -> Vec<ClipPlan> {
    let kept: Vec<&SpeechSegment> = segments
        .iter()
        .filter(|s| s.len() >= MIN_CLIP_LENGTH_SECS)
        .collect();
    let last = kept.len().saturating_sub(1);

    kept.iter()
        .enumerate()
        .map(|(i, segment)| {
            let padding = if i == last {
                FINAL_END_PADDING_SECS
            } else {
                END_PADDING_SECS
            };
            ClipPlan {
                start: segment.start,
                duration: segment.len() + padding,
            }
        })
        .collect()
}

/// Total length of the assembled video, in frames.
pub fn total_duration_frames(clips: &[ClipPlan], fps: f64) -> u64 {
    seconds_to_frames(clips.iter().map(|c| c.duration).sum(), fps)
}

/// How long the call-to-action stays on screen: the whole first clip.
pub fn cta_duration_frames(clips: &[ClipPlan], fps: f64) -> u64 {
    clips
        .first()
        .map(|c| seconds_to_frames(c.duration, fps))
        .unwrap_or(0)
}

pub fn seconds_to_frames(seconds: f64, fps: f64) -> u64 {
    (seconds * fps).round().max(0.0) as u64
}
