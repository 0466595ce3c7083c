//! Collaborator traits consumed by the stage executor and discovery.

use std::sync::Arc;

use async_trait::async_trait;

use super::{
    CollaboratorError, DiscoveryCandidate, GeneratedContent, MediaArtifacts, PublishReceipt,
    PublishRequest,
};

/// Proposes new candidate items when the queue runs dry.
#[async_trait]
pub trait Discoverer: Send + Sync {
    async fn discover(&self, seed_topic: &str) -> Result<Vec<DiscoveryCandidate>, CollaboratorError>;

    /// Report `NotConfigured` when a required secret or endpoint is missing.
    fn validate(&self) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

/// Gathers supporting facts for a topic.
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(&self, topic: &str) -> Result<String, CollaboratorError>;

    fn validate(&self) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

/// Produces the primary text artifact and short-form copy.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate_content(
        &self,
        topic: &str,
        facts: &str,
    ) -> Result<GeneratedContent, CollaboratorError>;

    fn validate(&self) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

/// Renders an image and derived video from a script.
#[async_trait]
pub trait MediaGenerator: Send + Sync {
    async fn generate_media(
        &self,
        topic: &str,
        script: &str,
    ) -> Result<MediaArtifacts, CollaboratorError>;

    fn validate(&self) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

/// Submits finished content to the distribution target.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, request: &PublishRequest) -> Result<PublishReceipt, CollaboratorError>;

    fn validate(&self) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

/// The full set of collaborators the pipeline needs.
#[derive(Clone)]
pub struct Collaborators {
    pub discoverer: Arc<dyn Discoverer>,
    pub enricher: Arc<dyn Enricher>,
    pub content: Arc<dyn ContentGenerator>,
    pub media: Arc<dyn MediaGenerator>,
    pub publisher: Arc<dyn Publisher>,
}

impl Collaborators {
    /// Use one value for every role.
    pub fn from_single<T>(collaborator: Arc<T>) -> Self
    where
        T: Discoverer + Enricher + ContentGenerator + MediaGenerator + Publisher + 'static,
    {
        Self {
            discoverer: collaborator.clone(),
            enricher: collaborator.clone(),
            content: collaborator.clone(),
            media: collaborator.clone(),
            publisher: collaborator,
        }
    }

    /// Check every collaborator. The first configuration problem wins.
    pub fn validate(&self) -> Result<(), CollaboratorError> {
        Discoverer::validate(self.discoverer.as_ref())?;
        Enricher::validate(self.enricher.as_ref())?;
        ContentGenerator::validate(self.content.as_ref())?;
        MediaGenerator::validate(self.media.as_ref())?;
        Publisher::validate(self.publisher.as_ref())?;
        Ok(())
    }
}
