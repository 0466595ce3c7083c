//! Mock collaborators for testing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::stages::{
    CollaboratorError, ContentGenerator, DiscoveryCandidate, Discoverer, Enricher,
    GeneratedContent, MediaArtifacts, MediaGenerator, PublishReceipt, PublishRequest, Publisher,
    Stage,
};

/// Mock implementation of every collaborator role.
///
/// Provides controllable behavior for testing:
/// - Configurable discovery results, content and media
/// - Per-stage failure injection and artificial delays
/// - Recording of every stage call and publish request
///
/// # Example
///
/// ```rust,ignore
/// use conveyor_core::testing::MockCollaborators;
/// use conveyor_core::stages::{Collaborators, CollaboratorError, Stage};
///
/// let mock = Arc::new(MockCollaborators::new());
/// mock.fail_stage(Stage::Publish, CollaboratorError::Network("down".into())).await;
///
/// let collaborators = Collaborators::from_single(mock.clone());
/// // ... run the executor ...
/// assert!(mock.published().await.is_empty());
/// ```
pub struct MockCollaborators {
    /// Candidates returned by discovery. Drained on each call.
    discovery_results: Arc<RwLock<Vec<DiscoveryCandidate>>>,
    /// If set, discovery fails with this error.
    discovery_error: Arc<RwLock<Option<CollaboratorError>>>,
    /// Stages that fail on every call.
    stage_failures: Arc<RwLock<HashMap<Stage, CollaboratorError>>>,
    /// Artificial latency per stage.
    delays: Arc<RwLock<HashMap<Stage, Duration>>>,
    content: Arc<RwLock<GeneratedContent>>,
    media: Arc<RwLock<MediaArtifacts>>,
    /// Reported by `validate()`. Sync because validation is sync.
    config_error: Arc<Mutex<Option<CollaboratorError>>>,
    /// Recorded stage calls, in order.
    calls: Arc<RwLock<Vec<Stage>>>,
    /// Recorded discovery seed topics.
    discover_calls: Arc<RwLock<Vec<String>>>,
    /// Recorded publish requests.
    published: Arc<RwLock<Vec<PublishRequest>>>,
}

impl std::fmt::Debug for MockCollaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCollaborators")
            .field("discovery_results", &"<results>")
            .field("stage_failures", &"<failures>")
            .field("calls", &"<calls>")
            .field("published", &"<published>")
            .finish()
    }
}

impl Default for MockCollaborators {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCollaborators {
    /// Create a mock where every stage succeeds.
    pub fn new() -> Self {
        Self {
            discovery_results: Arc::new(RwLock::new(Vec::new())),
            discovery_error: Arc::new(RwLock::new(None)),
            stage_failures: Arc::new(RwLock::new(HashMap::new())),
            delays: Arc::new(RwLock::new(HashMap::new())),
            content: Arc::new(RwLock::new(super::fixtures::content("Mock"))),
            media: Arc::new(RwLock::new(MediaArtifacts {
                image_path: Some("/media/mock.png".to_string()),
                video_path: Some("/media/mock.mp4".to_string()),
                issues: Vec::new(),
            })),
            config_error: Arc::new(Mutex::new(None)),
            calls: Arc::new(RwLock::new(Vec::new())),
            discover_calls: Arc::new(RwLock::new(Vec::new())),
            published: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Set the candidates the next discovery call returns.
    pub async fn set_discovery_results(&self, results: Vec<DiscoveryCandidate>) {
        *self.discovery_results.write().await = results;
    }

    /// Make discovery fail (or succeed again with `None`).
    pub async fn set_discovery_error(&self, error: Option<CollaboratorError>) {
        *self.discovery_error.write().await = error;
    }

    /// Make every call to `stage` fail with `error`.
    pub async fn fail_stage(&self, stage: Stage, error: CollaboratorError) {
        self.stage_failures.write().await.insert(stage, error);
    }

    /// Remove all injected stage failures.
    pub async fn clear_failures(&self) {
        self.stage_failures.write().await.clear();
    }

    /// Delay every call to `stage`.
    pub async fn set_delay(&self, stage: Stage, delay: Duration) {
        self.delays.write().await.insert(stage, delay);
    }

    pub async fn set_content(&self, content: GeneratedContent) {
        *self.content.write().await = content;
    }

    pub async fn set_media(&self, media: MediaArtifacts) {
        *self.media.write().await = media;
    }

    /// Make `validate()` report a configuration error.
    pub fn set_config_error(&self, error: Option<CollaboratorError>) {
        *self.config_error.lock().unwrap() = error;
    }

    /// Stage calls made so far, in order.
    pub async fn stage_calls(&self) -> Vec<Stage> {
        self.calls.read().await.clone()
    }

    /// Number of calls made to one stage.
    pub async fn call_count(&self, stage: Stage) -> usize {
        self.calls.read().await.iter().filter(|s| **s == stage).count()
    }

    /// Seed topics passed to discovery.
    pub async fn discover_calls(&self) -> Vec<String> {
        self.discover_calls.read().await.clone()
    }

    /// Publish requests received so far.
    pub async fn published(&self) -> Vec<PublishRequest> {
        self.published.read().await.clone()
    }

    async fn enter_stage(&self, stage: Stage) -> Result<(), CollaboratorError> {
        self.calls.write().await.push(stage);

        let delay = self.delays.read().await.get(&stage).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.stage_failures.read().await.get(&stage) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn check_config(&self) -> Result<(), CollaboratorError> {
        match self.config_error.lock().unwrap().as_ref() {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Discoverer for MockCollaborators {
    async fn discover(&self, seed_topic: &str) -> Result<Vec<DiscoveryCandidate>, CollaboratorError> {
        self.discover_calls.write().await.push(seed_topic.to_string());

        if let Some(error) = self.discovery_error.read().await.clone() {
            return Err(error);
        }
        Ok(std::mem::take(&mut *self.discovery_results.write().await))
    }

    fn validate(&self) -> Result<(), CollaboratorError> {
        self.check_config()
    }
}

#[async_trait]
impl Enricher for MockCollaborators {
    async fn enrich(&self, topic: &str) -> Result<String, CollaboratorError> {
        self.enter_stage(Stage::Enrich).await?;
        Ok(format!("Facts about {}", topic))
    }

    fn validate(&self) -> Result<(), CollaboratorError> {
        self.check_config()
    }
}

#[async_trait]
impl ContentGenerator for MockCollaborators {
    async fn generate_content(
        &self,
        _topic: &str,
        _facts: &str,
    ) -> Result<GeneratedContent, CollaboratorError> {
        self.enter_stage(Stage::GenerateContent).await?;
        Ok(self.content.read().await.clone())
    }
}

#[async_trait]
impl MediaGenerator for MockCollaborators {
    async fn generate_media(
        &self,
        _topic: &str,
        _script: &str,
    ) -> Result<MediaArtifacts, CollaboratorError> {
        self.enter_stage(Stage::GenerateMedia).await?;
        Ok(self.media.read().await.clone())
    }
}

#[async_trait]
impl Publisher for MockCollaborators {
    async fn publish(&self, request: &PublishRequest) -> Result<PublishReceipt, CollaboratorError> {
        self.enter_stage(Stage::Publish).await?;
        let mut published = self.published.write().await;
        published.push(request.clone());
        Ok(PublishReceipt {
            reference: Some(format!("post-{}", published.len())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_discovery_drains_results() {
        let mock = MockCollaborators::new();
        mock.set_discovery_results(fixtures::candidates(&["A", "B"])).await;

        assert_eq!(mock.discover("General").await.unwrap().len(), 2);
        assert!(mock.discover("General").await.unwrap().is_empty());
        assert_eq!(mock.discover_calls().await, vec!["General", "General"]);
    }

    #[tokio::test]
    async fn test_stage_failure_injection() {
        let mock = MockCollaborators::new();
        mock.fail_stage(Stage::Enrich, CollaboratorError::Network("down".to_string()))
            .await;

        assert!(mock.enrich("Widget").await.is_err());
        mock.clear_failures().await;
        assert!(mock.enrich("Widget").await.is_ok());
        assert_eq!(mock.call_count(Stage::Enrich).await, 2);
    }

    #[test]
    fn test_config_error() {
        let mock = MockCollaborators::new();
        assert!(Enricher::validate(&mock).is_ok());

        mock.set_config_error(Some(CollaboratorError::NotConfigured("api key".to_string())));
        assert!(Enricher::validate(&mock).is_err());
    }
}
