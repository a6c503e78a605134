//! Scripted command runner and AI fakes for workflow tests.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::context::WorkflowContext;
use super::traits::{CommandError, CommandOutput, GovernedCommands};
use crate::ai::{
    AiError, AiServices, ArticleRequest, ArticleWriter, CtaClassifier, CtaVariant, LinkFinder,
    TitleGenerator, Transcriber, Transcript, TranscriptSegment,
};
use crate::config::AppConfig;
use crate::pipeline::job_queue::QueueStore;
use crate::pipeline::worker_pool::{ResourceGovernor, ResourcePool};

pub const SILENCE_STDERR: &str = "\
[silencedetect @ 0x1] silence_start: 3
[silencedetect @ 0x1] silence_end: 10 | silence_duration: 7
[silencedetect @ 0x1] silence_start: 15
[silencedetect @ 0x1] silence_end: 20 | silence_duration: 5";

type Responder = dyn Fn(ResourcePool, &str) -> Result<CommandOutput, CommandError> + Send + Sync;

/// Records every command and answers like ffmpeg would, creating the output
/// file named by the last argument.
pub struct FakeCommands {
    pub calls: Mutex<Vec<(ResourcePool, String)>>,
    responder: Box<Responder>,
}

impl FakeCommands {
    pub fn ffmpeg_like() -> Self {
        Self::with_responder(ffmpeg_response)
    }

    /// Like [`FakeCommands::ffmpeg_like`], but any command containing `needle` fails.
    pub fn failing_on(needle: &'static str) -> Self {
        Self::with_responder(move |pool, command| {
            if command.contains(needle) {
                return Err(CommandError::NonZeroExit {
                    command: command.to_string(),
                    code: Some(1),
                    stderr: format!("{needle}: simulated failure"),
                });
            }
            ffmpeg_response(pool, command)
        })
    }

    pub fn with_responder(
        responder: impl Fn(ResourcePool, &str) -> Result<CommandOutput, CommandError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            responder: Box::new(responder),
        }
    }

    pub fn calls(&self) -> Vec<(ResourcePool, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn pools_for(&self, needle: &str) -> Vec<ResourcePool> {
        self.calls()
            .into_iter()
            .filter(|(_, command)| command.contains(needle))
            .map(|(pool, _)| pool)
            .collect()
    }
}

fn last_argument(command: &str) -> String {
    let last = command.rsplit(' ').next().unwrap_or_default();
    last.trim_matches('\'').to_string()
}

pub fn ffmpeg_response(_pool: ResourcePool, command: &str) -> Result<CommandOutput, CommandError> {
    let mut output = CommandOutput::default();
    if command.contains("format=duration") {
        output.stdout = "20.000000\n".into();
    } else if command.contains("r_frame_rate") {
        output.stdout = "30/1\n".into();
    } else if command.contains("silencedetect") {
        output.stderr = SILENCE_STDERR.into();
    } else {
        std::fs::write(last_argument(command), b"video").map_err(|source| {
            CommandError::Spawn {
                command: command.to_string(),
                source,
            }
        })?;
    }
    Ok(output)
}

#[async_trait]
impl GovernedCommands for FakeCommands {
    async fn run_in(
        &self,
        pool: ResourcePool,
        command: &str,
    ) -> Result<CommandOutput, CommandError> {
        self.calls.lock().unwrap().push((pool, command.to_string()));
        (self.responder)(pool, command)
    }
}

/// Canned AI answers.
pub struct FakeAi {
    pub transcript: Transcript,
    pub links: Vec<String>,
    pub article: String,
    pub title: String,
    pub cta: CtaVariant,
    pub fail_transcription: bool,
    pub article_requests: Mutex<Vec<ArticleRequest>>,
}

impl Default for FakeAi {
    fn default() -> Self {
        Self {
            transcript: Transcript {
                text: "Hello there. Check the docs.".into(),
                segments: vec![
                    TranscriptSegment {
                        start: 0.0,
                        end: 2.0,
                        text: "Hello there.".into(),
                    },
                    TranscriptSegment {
                        start: 3.5,
                        end: 5.0,
                        text: "Check the docs.".into(),
                    },
                ],
            },
            links: Vec::new(),
            article: "An article body.".into(),
            title: "Async Rust Basics".into(),
            cta: CtaVariant::Course,
            fail_transcription: false,
            article_requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Transcriber for FakeAi {
    async fn transcribe(&self, _audio: &Path) -> Result<Transcript, AiError> {
        if self.fail_transcription {
            return Err(AiError::Api {
                code: 500,
                message: "transcription backend down".into(),
            });
        }
        Ok(self.transcript.clone())
    }
}

#[async_trait]
impl LinkFinder for FakeAi {
    async fn find_links(&self, _transcript: &str) -> Result<Vec<String>, AiError> {
        Ok(self.links.clone())
    }
}

#[async_trait]
impl ArticleWriter for FakeAi {
    async fn write_article(&self, request: &ArticleRequest) -> Result<String, AiError> {
        self.article_requests.lock().unwrap().push(request.clone());
        Ok(self.article.clone())
    }
}

#[async_trait]
impl TitleGenerator for FakeAi {
    async fn generate_title(&self, _request: &ArticleRequest) -> Result<String, AiError> {
        Ok(self.title.clone())
    }
}

#[async_trait]
impl CtaClassifier for FakeAi {
    async fn classify_cta(&self, _transcript: &str) -> Result<CtaVariant, AiError> {
        Ok(self.cta)
    }
}

/// Config with every path under `root` and a renderer whose last argument is
/// its output.
pub fn test_config(root: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.paths.queue_file = root.join("queue.json");
    config.paths.shorts_dir = root.join("shorts");
    config.paths.transcripts_dir = root.join("transcripts");
    config.paths.articles_dir = root.join("articles");
    config.paths.links_file = root.join("links.json");
    config.paths.temp_dir = root.join("tmp");
    config.paths.log_dir = root.join("logs");
    config.tools.render_command = "render --props={metadata} {output}".into();
    config
}

pub struct Harness {
    pub ctx: WorkflowContext,
    pub commands: Arc<FakeCommands>,
    pub ai: Arc<FakeAi>,
    pub root: PathBuf,
}

pub fn harness(root: &Path, commands: FakeCommands, ai: FakeAi) -> Harness {
    let config = test_config(root);
    let commands = Arc::new(commands);
    let ai = Arc::new(ai);
    let ctx = WorkflowContext::from_config(
        &config,
        Arc::new(QueueStore::new(&config.paths.queue_file)),
        commands.clone(),
        Arc::new(ResourceGovernor::new(config.pools)),
        AiServices::from_client(ai.clone()),
    );
    Harness {
        ctx,
        commands,
        ai,
        root: root.to_path_buf(),
    }
}
