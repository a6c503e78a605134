//! OpenAI-compatible client implementing every AI service trait.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, warn};

use super::prompts;
use super::{
    AiError, ArticleRequest, ArticleWriter, CtaClassifier, CtaVariant, LinkFinder,
    TitleGenerator, Transcriber, Transcript,
};
use crate::config::AiConfig;
use crate::{Error, Result};

fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Another crate got there first; either provider works.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Client for OpenAI-compatible chat and transcription endpoints.
pub struct OpenAiClient {
    api_base: String,
    api_key: Option<String>,
    chat_model: String,
    transcription_model: String,
    http_client: Client,
}

impl OpenAiClient {
    pub fn new(config: &AiConfig) -> Result<Self> {
        install_rustls_provider();
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            chat_model: config.chat_model.clone(),
            transcription_model: config.transcription_model.clone(),
            http_client,
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn authorized(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> std::result::Result<reqwest::RequestBuilder, AiError> {
        let key = self.api_key.as_ref().ok_or(AiError::MissingApiKey)?;
        Ok(builder.bearer_auth(key))
    }

    async fn check_status(
        response: reqwest::Response,
    ) -> std::result::Result<reqwest::Response, AiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "failed to read error response".to_string());
        let message = serde_json::from_str::<ApiErrorResponse>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);
        Err(AiError::Api {
            code: status.as_u16(),
            message,
        })
    }

    /// Send a system + user message pair and return the first answer.
    pub async fn complete(&self, system: &str, user: &str) -> std::result::Result<String, AiError> {
        let request = ChatRequest {
            model: &self.chat_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: None,
        };

        let url = format!("{}/chat/completions", self.api_base);
        let response = self
            .authorized(self.http_client.post(&url))?
            .json(&request)
            .send()
            .await
            .map_err(|e| AiError::RequestFailed(e.to_string()))?;

        let response: ChatResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| AiError::Parse(format!("chat completion: {e}")))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| AiError::Parse("chat completion returned no content".to_string()))
    }
}

#[async_trait]
impl Transcriber for OpenAiClient {
    async fn transcribe(&self, audio: &Path) -> std::result::Result<Transcript, AiError> {
        let bytes = tokio::fs::read(audio).await.map_err(|source| AiError::Io {
            path: audio.display().to_string(),
            source,
        })?;
        let file_name = audio
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.mp3".to_string());

        let form = Form::new()
            .text("model", self.transcription_model.clone())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "segment")
            .part("file", Part::bytes(bytes).file_name(file_name));

        let url = format!("{}/audio/transcriptions", self.api_base);
        let response = self
            .authorized(self.http_client.post(&url))?
            .multipart(form)
            .send()
            .await
            .map_err(|e| AiError::RequestFailed(e.to_string()))?;

        let transcript: Transcript = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| AiError::Parse(format!("transcription: {e}")))?;
        debug!(
            audio = %audio.display(),
            segments = transcript.segments.len(),
            "Transcription received"
        );
        Ok(transcript)
    }
}

#[async_trait]
impl LinkFinder for OpenAiClient {
    async fn find_links(&self, transcript: &str) -> std::result::Result<Vec<String>, AiError> {
        let answer = self
            .complete(prompts::LINKS_SYSTEM_PROMPT, transcript)
            .await?;
        prompts::parse_string_array(&answer)
            .map(|links| {
                links
                    .into_iter()
                    .map(|l| l.trim().to_string())
                    .filter(|l| !l.is_empty())
                    .collect()
            })
            .ok_or_else(|| AiError::Parse(format!("expected a JSON array of links, got: {answer}")))
    }
}

#[async_trait]
impl ArticleWriter for OpenAiClient {
    async fn write_article(
        &self,
        request: &ArticleRequest,
    ) -> std::result::Result<String, AiError> {
        let answer = self
            .complete(
                prompts::ARTICLE_SYSTEM_PROMPT,
                &prompts::article_user_prompt(request),
            )
            .await?;
        Ok(answer.trim().to_string())
    }
}

#[async_trait]
impl TitleGenerator for OpenAiClient {
    async fn generate_title(
        &self,
        request: &ArticleRequest,
    ) -> std::result::Result<String, AiError> {
        let answer = self
            .complete(
                prompts::TITLE_SYSTEM_PROMPT,
                &prompts::article_user_prompt(request),
            )
            .await?;
        let title = prompts::clean_title(&answer);
        if title.is_empty() {
            return Err(AiError::Parse("empty title".to_string()));
        }
        Ok(title)
    }
}

#[async_trait]
impl CtaClassifier for OpenAiClient {
    async fn classify_cta(&self, transcript: &str) -> std::result::Result<CtaVariant, AiError> {
        let answer = self
            .complete(&prompts::cta_system_prompt(), transcript)
            .await?;
        Ok(CtaVariant::from_response(&answer).unwrap_or_else(|| {
            warn!(answer = %answer, "Unrecognised CTA variant, using default");
            CtaVariant::default()
        }))
    }
}
