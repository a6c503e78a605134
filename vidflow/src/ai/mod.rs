//! AI service boundaries.
//!
//! Each service is a single request/response trait so workflows can be
//! exercised with fakes. [`OpenAiClient`] implements all of them against an
//! OpenAI-compatible API.

mod client;
mod prompts;

pub use client::OpenAiClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::pipeline::actions::CodeData;
use crate::pipeline::worker_pool::GovernorError;
use crate::storage::Link;

/// Failure talking to an AI service.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("API error {code}: {message}")]
    Api { code: u16, message: String },

    #[error("unexpected response: {0}")]
    Parse(String),

    #[error("no API key configured")]
    MissingApiKey,

    #[error("reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Governor(#[from] GovernorError),
}

/// One timed line of a transcription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Seconds from the start of the transcribed audio.
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Result of transcribing an audio file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    #[serde(default)]
    pub segments: Vec<TranscriptSegment>,
}

/// Call-to-action overlay variants the renderer knows how to draw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CtaVariant {
    #[default]
    Newsletter,
    Course,
    Community,
}

impl CtaVariant {
    pub const ALL: [CtaVariant; 3] = [
        CtaVariant::Newsletter,
        CtaVariant::Course,
        CtaVariant::Community,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CtaVariant::Newsletter => "newsletter",
            CtaVariant::Course => "course",
            CtaVariant::Community => "community",
        }
    }

    /// Pick the variant named in a free-text model answer.
    pub fn from_response(text: &str) -> Option<Self> {
        let lowered = text.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|variant| lowered == variant.as_str())
            .or_else(|| {
                Self::ALL
                    .into_iter()
                    .find(|variant| lowered.contains(variant.as_str()))
            })
    }
}

impl std::fmt::Display for CtaVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the article author and title generator see.
#[derive(Debug, Clone, Default)]
pub struct ArticleRequest {
    pub transcript: String,
    /// Most recent stored articles, newest first, for style continuity.
    pub recent_articles: Vec<String>,
    pub code: Option<CodeData>,
    pub links: Vec<Link>,
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &Path) -> Result<Transcript, AiError>;
}

#[async_trait]
pub trait LinkFinder: Send + Sync {
    /// Descriptions of the links a transcript refers to.
    async fn find_links(&self, transcript: &str) -> Result<Vec<String>, AiError>;
}

#[async_trait]
pub trait ArticleWriter: Send + Sync {
    async fn write_article(&self, request: &ArticleRequest) -> Result<String, AiError>;
}

#[async_trait]
pub trait TitleGenerator: Send + Sync {
    async fn generate_title(&self, request: &ArticleRequest) -> Result<String, AiError>;
}

#[async_trait]
pub trait CtaClassifier: Send + Sync {
    async fn classify_cta(&self, transcript: &str) -> Result<CtaVariant, AiError>;
}

/// The AI collaborators a scheduler needs.
#[derive(Clone)]
pub struct AiServices {
    pub transcriber: Arc<dyn Transcriber>,
    pub links: Arc<dyn LinkFinder>,
    pub articles: Arc<dyn ArticleWriter>,
    pub titles: Arc<dyn TitleGenerator>,
    pub cta: Arc<dyn CtaClassifier>,
}

impl AiServices {
    /// Use one client for every service.
    pub fn from_client<C>(client: Arc<C>) -> Self
    where
        C: Transcriber + LinkFinder + ArticleWriter + TitleGenerator + CtaClassifier + 'static,
    {
        Self {
            transcriber: client.clone(),
            links: client.clone(),
            articles: client.clone(),
            titles: client.clone(),
            cta: client,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cta_from_response() {
        assert_eq!(CtaVariant::from_response("course"), Some(CtaVariant::Course));
        assert_eq!(
            CtaVariant::from_response("  Community\n"),
            Some(CtaVariant::Community)
        );
        assert_eq!(
            CtaVariant::from_response("I would pick the newsletter one."),
            Some(CtaVariant::Newsletter)
        );
        assert_eq!(CtaVariant::from_response("banana"), None);
    }

    #[test]
    fn test_transcript_deserializes_without_segments() {
        let transcript: Transcript = serde_json::from_str(r#"{"text":"hi"}"#).unwrap();
        assert_eq!(transcript.text, "hi");
        assert!(transcript.segments.is_empty());
    }
}
