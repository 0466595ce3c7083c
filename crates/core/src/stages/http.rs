//! HTTP adapter implementing every collaborator role against JSON endpoints.
//!
//! Each role POSTs a JSON body to its configured URL with
//! `Authorization: Bearer {api_key}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    CollaboratorError, ContentGenerator, DiscoveryCandidate, Discoverer, Enricher,
    GeneratedContent, MediaArtifacts, MediaGenerator, PublishReceipt, PublishRequest, Publisher,
};
use crate::config::CollaboratorsConfig;

/// Collaborator backed by HTTP endpoints.
pub struct HttpCollaborator {
    client: Client,
    api_key: Option<String>,
    timeout: Duration,
    discover_url: Option<String>,
    enrich_url: Option<String>,
    content_url: Option<String>,
    media_url: Option<String>,
    publish_url: Option<String>,
}

#[derive(Serialize)]
struct DiscoverBody<'a> {
    seed_topic: &'a str,
}

#[derive(Deserialize)]
struct DiscoverResponse {
    #[serde(default)]
    items: Vec<DiscoveryCandidate>,
}

#[derive(Serialize)]
struct TopicBody<'a> {
    topic: &'a str,
}

#[derive(Deserialize)]
struct EnrichResponse {
    #[serde(default)]
    facts: String,
}

#[derive(Serialize)]
struct ContentBody<'a> {
    topic: &'a str,
    facts: &'a str,
}

#[derive(Serialize)]
struct MediaBody<'a> {
    topic: &'a str,
    script: &'a str,
}

impl HttpCollaborator {
    pub fn new(config: &CollaboratorsConfig) -> Result<Self, CollaboratorError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CollaboratorError::NotConfigured(format!("HTTP client: {}", e)))?;

        let clean = |url: &Option<String>| {
            url.as_ref()
                .map(|u| u.trim().trim_end_matches('/').to_string())
                .filter(|u| !u.is_empty())
        };

        Ok(Self {
            client,
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            timeout,
            discover_url: clean(&config.discover_url),
            enrich_url: clean(&config.enrich_url),
            content_url: clean(&config.content_url),
            media_url: clean(&config.media_url),
            publish_url: clean(&config.publish_url),
        })
    }

    fn require_key(&self) -> Result<&str, CollaboratorError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| CollaboratorError::NotConfigured("collaborators.api_key is not set".to_string()))
    }

    fn require_url<'a>(url: &'a Option<String>, name: &str) -> Result<&'a str, CollaboratorError> {
        url.as_deref().ok_or_else(|| {
            CollaboratorError::NotConfigured(format!("collaborators.{} is not set", name))
        })
    }

    async fn post_json<B, R>(&self, url: &str, body: &B) -> Result<R, CollaboratorError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let key = self.require_key()?;
        debug!("POST {}", url);

        let response = self
            .client
            .post(url)
            .bearer_auth(key)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if status == 401 || status == 403 {
            return Err(CollaboratorError::NotConfigured(format!(
                "credential rejected by {}",
                url
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Rejected {
                status: status.as_u16(),
                message: body,
            });
        }

        response.json::<R>().await.map_err(|e| {
            CollaboratorError::InvalidResponse(format!("Failed to parse response from {}: {}", url, e))
        })
    }

    fn map_send_error(&self, e: reqwest::Error) -> CollaboratorError {
        if e.is_timeout() {
            CollaboratorError::Timeout(self.timeout)
        } else {
            CollaboratorError::from(e)
        }
    }
}

#[async_trait]
impl Discoverer for HttpCollaborator {
    async fn discover(&self, seed_topic: &str) -> Result<Vec<DiscoveryCandidate>, CollaboratorError> {
        let url = Self::require_url(&self.discover_url, "discover_url")?;
        let response: DiscoverResponse = self.post_json(url, &DiscoverBody { seed_topic }).await?;
        Ok(response.items)
    }

    fn validate(&self) -> Result<(), CollaboratorError> {
        self.require_key()?;
        Self::require_url(&self.discover_url, "discover_url").map(|_| ())
    }
}

#[async_trait]
impl Enricher for HttpCollaborator {
    async fn enrich(&self, topic: &str) -> Result<String, CollaboratorError> {
        let url = Self::require_url(&self.enrich_url, "enrich_url")?;
        let response: EnrichResponse = self.post_json(url, &TopicBody { topic }).await?;
        Ok(response.facts)
    }

    fn validate(&self) -> Result<(), CollaboratorError> {
        self.require_key()?;
        Self::require_url(&self.enrich_url, "enrich_url").map(|_| ())
    }
}

#[async_trait]
impl ContentGenerator for HttpCollaborator {
    async fn generate_content(
        &self,
        topic: &str,
        facts: &str,
    ) -> Result<GeneratedContent, CollaboratorError> {
        let url = Self::require_url(&self.content_url, "content_url")?;
        self.post_json(url, &ContentBody { topic, facts }).await
    }

    fn validate(&self) -> Result<(), CollaboratorError> {
        self.require_key()?;
        Self::require_url(&self.content_url, "content_url").map(|_| ())
    }
}

#[async_trait]
impl MediaGenerator for HttpCollaborator {
    /// Without a media endpoint, items are published without media.
    async fn generate_media(
        &self,
        topic: &str,
        script: &str,
    ) -> Result<MediaArtifacts, CollaboratorError> {
        match self.media_url.as_deref() {
            Some(url) => self.post_json(url, &MediaBody { topic, script }).await,
            None => Ok(MediaArtifacts::default()),
        }
    }
}

#[async_trait]
impl Publisher for HttpCollaborator {
    async fn publish(&self, request: &PublishRequest) -> Result<PublishReceipt, CollaboratorError> {
        let url = Self::require_url(&self.publish_url, "publish_url")?;
        self.post_json(url, request).await
    }

    fn validate(&self) -> Result<(), CollaboratorError> {
        self.require_key()?;
        Self::require_url(&self.publish_url, "publish_url").map(|_| ())
    }
}
