//! Pipeline stages: the collaborator interfaces, the executor that sequences them,
//! and an HTTP adapter for real collaborators.

mod executor;
mod http;
mod tracking;
mod traits;
mod types;

pub use executor::{StageExecutor, StageExecutorConfig};
pub use http::HttpCollaborator;
pub use tracking::{tracking_link, tracking_slug};
pub use traits::{
    Collaborators, ContentGenerator, Discoverer, Enricher, MediaGenerator, Publisher,
};
pub use types::{
    CollaboratorError, DiscoveryCandidate, GeneratedContent, MediaArtifacts, ProductionReport,
    PublishReceipt, PublishRequest, Stage, StageFailure,
};
