//! Types exchanged between the stage executor and its collaborators.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The fixed, ordered stage sequence every item passes through.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Enrich,
    GenerateContent,
    GenerateMedia,
    Publish,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Enrich,
        Stage::GenerateContent,
        Stage::GenerateMedia,
        Stage::Publish,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Enrich => "enrich",
            Stage::GenerateContent => "generate_content",
            Stage::GenerateMedia => "generate_media",
            Stage::Publish => "publish",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from an external collaborator call.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CollaboratorError {
    /// A required credential or endpoint is missing.
    #[error("not configured: {0}")]
    NotConfigured(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The collaborator answered with a non-success status.
    #[error("rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl CollaboratorError {
    pub fn is_config_error(&self) -> bool {
        matches!(self, CollaboratorError::NotConfigured(_))
    }
}

impl From<reqwest::Error> for CollaboratorError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            CollaboratorError::InvalidResponse(e.to_string())
        } else {
            CollaboratorError::Network(e.to_string())
        }
    }
}

/// Item-level failure naming the stage that broke. The unit of retry and diagnosis.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("stage {stage} failed: {cause}")]
pub struct StageFailure {
    pub stage: Stage,
    pub cause: CollaboratorError,
}

impl StageFailure {
    pub fn new(stage: Stage, cause: CollaboratorError) -> Self {
        Self { stage, cause }
    }
}

/// A candidate returned by discovery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiscoveryCandidate {
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub source_url: String,
}

/// Output of the content stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GeneratedContent {
    pub primary_html: String,
    #[serde(default)]
    pub short_form_copies: Vec<String>,
    /// Script the media stage renders from. Blank means no media.
    #[serde(default)]
    pub media_script: String,
}

/// Output of the media stage. Either path may be absent without failing the item.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MediaArtifacts {
    #[serde(default)]
    pub image_path: Option<String>,
    #[serde(default)]
    pub video_path: Option<String>,
    /// Partial failures reported by the collaborator (e.g. video render failed).
    #[serde(default)]
    pub issues: Vec<String>,
}

/// Everything the distribution collaborator needs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublishRequest {
    pub title: String,
    pub html: String,
    pub tracking_link: String,
    pub image_path: Option<String>,
}

/// Acknowledgement from the distribution collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PublishReceipt {
    #[serde(default)]
    pub reference: Option<String>,
}

/// Result of a successful pass through all stages.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductionReport {
    pub content: GeneratedContent,
    pub media: MediaArtifacts,
    pub receipt: PublishReceipt,
    pub tracking_link: String,
    /// Media problems that degraded the item without failing it.
    pub media_issues: Vec<String>,
}
