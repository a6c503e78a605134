use clap::{Parser, Subcommand};
use std::path::PathBuf;
use vidflow::pipeline::ClipRange;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Config file (defaults to <config dir>/vidflow/config.toml)
    #[arg(short, long, global = true, env = "VIDFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run every eligible queue item until nothing is left to do
    Run,

    /// Answer queue items that are waiting for user input
    Requests,

    /// Queue an auto-edited video, optionally with an article
    Enqueue {
        /// Raw recording to edit
        video: PathBuf,

        /// Burn in subtitles and the call-to-action overlay
        #[arg(long)]
        subtitles: bool,

        /// Keep the output in the temp directory instead of publishing it
        #[arg(long)]
        dry_run: bool,

        /// Also write an article about the video
        #[arg(long)]
        article: bool,

        /// Store the article in a meta folder next to the video
        #[arg(long, requires = "article")]
        alongside: bool,

        /// Code sample to attach to the article
        #[arg(long, requires = "article")]
        code: Option<PathBuf>,
    },

    /// Queue a video cut from explicit time ranges
    EnqueueClips {
        /// Name of the published file, without extension
        #[arg(short, long)]
        output: String,

        #[arg(long)]
        dry_run: bool,

        /// Clips as SOURCE:START:END, in seconds
        #[arg(required = true, value_parser = parse_clip)]
        clips: Vec<ClipRange>,
    },

    /// Queue whole videos to be joined end to end
    EnqueueConcat {
        /// Name of the published file, without extension
        #[arg(short, long)]
        output: String,

        #[arg(long)]
        dry_run: bool,

        #[arg(required = true)]
        videos: Vec<PathBuf>,
    },

    /// Show queue counts and items
    Status {
        /// Only show items with this status
        #[arg(long, value_parser = ["ready-to-run", "requires-user-input", "completed", "failed"])]
        only: Option<String>,
    },
}

/// Parse `SOURCE:START:END`. The source may itself contain colons.
pub fn parse_clip(raw: &str) -> Result<ClipRange, String> {
    let mut parts = raw.rsplitn(3, ':');
    let (Some(end), Some(start), Some(source)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(format!("expected SOURCE:START:END, got {raw:?}"));
    };
    let start_secs: f64 = start
        .parse()
        .map_err(|_| format!("invalid start time {start:?}"))?;
    let end_secs: f64 = end.parse().map_err(|_| format!("invalid end time {end:?}"))?;
    if end_secs <= start_secs {
        return Err(format!("clip ends at {end_secs} before it starts at {start_secs}"));
    }
    Ok(ClipRange {
        source: PathBuf::from(source),
        start_secs,
        end_secs,
    })
}
