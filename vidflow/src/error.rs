//! Application-wide error types.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::ai::AiError;
use crate::pipeline::QueueStatus;
use crate::pipeline::processors::CommandError;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid state transition: cannot transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A queue invariant was broken. These indicate a builder bug and abort the pass.
    #[error("Queue invariant violated: {0}")]
    Invariant(String),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error while {op} {}: {source}", path.display())]
    IoPath {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The user backed out of a prompt. Nothing is persisted for the item.
    #[error("Cancelled by user")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }

    pub fn io_path(op: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::IoPath {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether this error must abort a scheduler pass instead of failing one item.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::Invariant(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Failures raised while executing a queue item's workflow.
///
/// Every external step has its own variant so the persisted `error` string
/// names the operation that failed.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Transcript at {} is empty", path.display())]
    EmptyTranscript { path: PathBuf },

    #[error("Dependency {id} not found in queue")]
    DependencyNotFound { id: String },

    #[error("Dependency {id} is a {actual} item, expected {expected}")]
    DependencyWrongType {
        id: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Dependency {id} is {status}, expected completed")]
    DependencyNotCompleted { id: String, status: QueueStatus },

    #[error("No speech segments long enough to clip in {}", path.display())]
    NoSpeechSegments { path: PathBuf },

    #[error("Silence detection failed: {0}")]
    SilenceDetection(String),

    #[error("Clip extraction failed: {}", .0.summary())]
    ClipExtraction(#[source] CommandError),

    #[error("Concatenation failed: {}", .0.summary())]
    Concatenation(#[source] CommandError),

    #[error("Audio extraction failed: {}", .0.summary())]
    AudioExtraction(#[source] CommandError),

    #[error("Frame rate lookup failed: {0}")]
    FrameRate(String),

    #[error("Transcription failed: {0}")]
    Transcription(#[source] AiError),

    #[error("CTA classification failed: {0}")]
    CtaClassification(#[source] AiError),

    #[error("Render failed: {}", .0.summary())]
    Render(#[source] CommandError),

    #[error("Overlay failed: {}", .0.summary())]
    Overlay(#[source] CommandError),

    #[error("Publishing {} failed: {source}", path.display())]
    Publish {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Link discovery failed: {0}")]
    LinkDiscovery(#[source] AiError),

    #[error("Article writing failed: {0}")]
    ArticleWriting(#[source] AiError),

    #[error("Title generation failed: {0}")]
    TitleGeneration(#[source] AiError),
}
