//! Command lines for ffmpeg, ffprobe and the overlay renderer.
//!
//! Builders only produce strings; running them (and choosing the pool) is the
//! caller's job.

use process_utils::shell_quote;
use std::path::Path;

use crate::config::ToolsConfig;

/// Noise floor below which audio counts as silence.
pub const SILENCE_NOISE: &str = "-35dB";
/// Minimum silence length, in seconds, that splits speech.
pub const SILENCE_MIN_DURATION_SECS: f64 = 0.8;

fn quote_path(path: &Path) -> String {
    shell_quote(&path.to_string_lossy())
}

/// Builds tool invocations from [`ToolsConfig`].
#[derive(Debug, Clone)]
pub struct FfmpegCommands {
    ffmpeg: String,
    ffprobe: String,
    encoder: String,
    render_template: String,
}

impl FfmpegCommands {
    pub fn new(tools: &ToolsConfig) -> Self {
        Self {
            ffmpeg: shell_quote(&tools.ffmpeg_path),
            ffprobe: shell_quote(&tools.ffprobe_path),
            encoder: tools.video_encoder.clone(),
            render_template: tools.render_command.clone(),
        }
    }

    /// Decode audio only and print `silence_start` / `silence_end` to stderr.
    pub fn detect_silence(&self, input: &Path) -> String {
        format!(
            "{} -hide_banner -nostats -i {} -vn -af silencedetect=noise={}:d={} -f null -",
            self.ffmpeg,
            quote_path(input),
            SILENCE_NOISE,
            SILENCE_MIN_DURATION_SECS
        )
    }

    /// Print the container duration in seconds.
    pub fn duration_query(&self, input: &Path) -> String {
        format!(
            "{} -v error -show_entries format=duration -of default=noprint_wrappers=1:nokey=1 {}",
            self.ffprobe,
            quote_path(input)
        )
    }

    /// Print the first video stream's frame rate as a fraction.
    pub fn frame_rate_query(&self, input: &Path) -> String {
        format!(
            "{} -v error -select_streams v:0 -show_entries stream=r_frame_rate -of default=noprint_wrappers=1:nokey=1 {}",
            self.ffprobe,
            quote_path(input)
        )
    }

    /// Re-encode `[start, start + duration)` of `input` into `output`.
    pub fn extract_clip(&self, input: &Path, start: f64, duration: f64, output: &Path) -> String {
        format!(
            "{} -y -hide_banner -loglevel error -ss {:.3} -i {} -t {:.3} -c:v {} -c:a aac -b:a 192k {}",
            self.ffmpeg,
            start,
            quote_path(input),
            duration,
            self.encoder,
            quote_path(output)
        )
    }

    /// Join the files named in a concat-demuxer list without re-encoding.
    pub fn concat(&self, list_file: &Path, output: &Path) -> String {
        format!(
            "{} -y -hide_banner -loglevel error -f concat -safe 0 -i {} -c copy {}",
            self.ffmpeg,
            quote_path(list_file),
            quote_path(output)
        )
    }

    /// Mono 16 kHz MP3, small enough for transcription uploads.
    pub fn extract_audio(&self, input: &Path, output: &Path) -> String {
        format!(
            "{} -y -hide_banner -loglevel error -i {} -vn -ac 1 -ar 16000 -c:a libmp3lame -b:a 64k {}",
            self.ffmpeg,
            quote_path(input),
            quote_path(output)
        )
    }

    /// Composite a rendered overlay (with alpha) on top of `base`.
    pub fn overlay(&self, base: &Path, overlay: &Path, output: &Path) -> String {
        format!(
            "{} -y -hide_banner -loglevel error -i {} -i {} -filter_complex {} -c:v {} -c:a copy {}",
            self.ffmpeg,
            quote_path(base),
            quote_path(overlay),
            shell_quote("[0:v][1:v]overlay=0:0:format=auto"),
            self.encoder,
            quote_path(output)
        )
    }

    /// Fill the renderer template with the metadata file and output path.
    pub fn render(&self, metadata: &Path, output: &Path) -> String {
        self.render_template
            .replace("{metadata}", &quote_path(metadata))
            .replace("{output}", &quote_path(output))
    }
}

/// Contents of an ffmpeg concat-demuxer list file for `files`.
pub fn concat_list(files: &[impl AsRef<Path>]) -> String {
    files
        .iter()
        .map(|file| {
            let escaped = file.as_ref().to_string_lossy().replace('\'', r"'\''");
            format!("file '{escaped}'\n")
        })
        .collect()
}

/// Parse an ffprobe rate such as `30000/1001` or `25`.
pub fn parse_frame_rate(raw: &str) -> Option<f64> {
    let raw = raw.lines().next()?.trim();
    let fps = match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => raw.parse().ok()?,
    };
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

/// Parse ffprobe's `format=duration` output.
pub fn parse_duration(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d > 0.0)
}
