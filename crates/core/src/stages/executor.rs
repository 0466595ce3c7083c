//! Runs the fixed stage sequence for one item.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{
    tracking_link, Collaborators, CollaboratorError, GeneratedContent, MediaArtifacts,
    ProductionReport, PublishRequest, Stage, StageFailure,
};
use crate::item::Item;
use crate::metrics;

/// Executor settings.
#[derive(Debug, Clone)]
pub struct StageExecutorConfig {
    /// Upper bound on a single collaborator call.
    pub stage_timeout: Duration,
    /// Base URL for tracking links. `None` publishes the raw destination link.
    pub tracking_base_url: Option<String>,
}

impl Default for StageExecutorConfig {
    fn default() -> Self {
        Self {
            stage_timeout: Duration::from_secs(180),
            tracking_base_url: None,
        }
    }
}

/// Runs enrich, content, media and publish for one item.
///
/// Each stage sees only the outputs of earlier stages. The first failing stage
/// aborts the rest and is returned as a [`StageFailure`]. Media problems never
/// fail the item; they are collected in the report instead.
#[derive(Clone)]
pub struct StageExecutor {
    collaborators: Collaborators,
    config: StageExecutorConfig,
}

impl StageExecutor {
    pub fn new(collaborators: Collaborators, config: StageExecutorConfig) -> Self {
        Self {
            collaborators,
            config,
        }
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// Run every stage for `item`.
    pub async fn run(&self, item: &Item) -> Result<ProductionReport, StageFailure> {
        let topic = item.name.as_str();
        let destination = item
            .destination_link
            .as_deref()
            .filter(|l| !l.trim().is_empty())
            .ok_or_else(|| {
                StageFailure::new(
                    Stage::Publish,
                    CollaboratorError::InvalidResponse("item has no destination link".to_string()),
                )
            })?;

        // Stage 1
        let facts = self
            .timed(Stage::Enrich, self.collaborators.enricher.enrich(topic))
            .await?;
        debug!("Enriched {} ({} chars of facts)", topic, facts.len());

        // Stage 2
        let content = self
            .timed(
                Stage::GenerateContent,
                self.collaborators.content.generate_content(topic, &facts),
            )
            .await?;
        if content.primary_html.trim().is_empty() {
            return Err(StageFailure::new(
                Stage::GenerateContent,
                CollaboratorError::InvalidResponse("empty primary content".to_string()),
            ));
        }

        // Stage 3
        let (media, media_issues) = self.generate_media(topic, &content).await;

        // Stage 4
        let link = tracking_link(self.config.tracking_base_url.as_deref(), topic, destination);
        let request = PublishRequest {
            title: item.name.clone(),
            html: content.primary_html.clone(),
            tracking_link: link.clone(),
            image_path: media.image_path.clone(),
        };
        let receipt = self
            .timed(Stage::Publish, self.collaborators.publisher.publish(&request))
            .await?;

        info!("All stages completed for {}", topic);

        Ok(ProductionReport {
            content,
            media,
            receipt,
            tracking_link: link,
            media_issues,
        })
    }

    /// Media is best effort: any failure degrades to whatever artifacts exist.
    async fn generate_media(
        &self,
        topic: &str,
        content: &GeneratedContent,
    ) -> (MediaArtifacts, Vec<String>) {
        if content.media_script.trim().is_empty() {
            debug!("No media script for {}, skipping media", topic);
            return (MediaArtifacts::default(), Vec::new());
        }

        let result = self
            .timed(
                Stage::GenerateMedia,
                self.collaborators
                    .media
                    .generate_media(topic, &content.media_script),
            )
            .await;

        match result {
            Ok(mut media) => {
                let issues = std::mem::take(&mut media.issues);
                for issue in &issues {
                    warn!("Partial media failure for {}: {}", topic, issue);
                }
                (media, issues)
            }
            Err(failure) => {
                warn!("Media generation failed for {}: {}", topic, failure.cause);
                (MediaArtifacts::default(), vec![failure.cause.to_string()])
            }
        }
    }

    async fn timed<T, F>(&self, stage: Stage, fut: F) -> Result<T, StageFailure>
    where
        F: Future<Output = Result<T, CollaboratorError>>,
    {
        let start = std::time::Instant::now();
        let result = match tokio::time::timeout(self.config.stage_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(cause)) => Err(StageFailure::new(stage, cause)),
            Err(_) => Err(StageFailure::new(
                stage,
                CollaboratorError::Timeout(self.config.stage_timeout),
            )),
        };

        let label = if result.is_ok() { "success" } else { "failed" };
        metrics::STAGE_DURATION
            .with_label_values(&[stage.as_str(), label])
            .observe(start.elapsed().as_secs_f64());

        result
    }
}
