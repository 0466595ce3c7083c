//! Testing utilities and mock implementations.
//!
//! Provides mock collaborators, a controllable clock and fixtures so the whole
//! pipeline can run in tests without network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use conveyor_core::testing::{fixtures, MockCollaborators};
//!
//! let mock = Arc::new(MockCollaborators::new());
//! mock.set_discovery_results(fixtures::candidates(&["Widget"])).await;
//! ```

mod mock_collaborators;

pub use crate::clock::FakeClock;
pub use crate::governor::StaticSampler;
pub use mock_collaborators::MockCollaborators;

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::Utc;

    use crate::item::{Artifacts, Item, ItemStatus};
    use crate::stages::{DiscoveryCandidate, GeneratedContent};

    /// A Ready item with the given link, not yet persisted.
    pub fn ready_item(name: &str, link: &str) -> Item {
        let now = Utc::now();
        Item {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            category: "General".to_string(),
            source_url: format!("https://source.example/{}", name.to_lowercase()),
            destination_link: Some(link.to_string()),
            status: ItemStatus::Ready,
            fail_count: 0,
            artifacts: Artifacts::default(),
            last_error: None,
            ready_at: Some(now),
            claimed_at: None,
            created_at: now,
            last_update: now,
        }
    }

    /// Discovery candidates with the given names.
    pub fn candidates(names: &[&str]) -> Vec<DiscoveryCandidate> {
        names
            .iter()
            .map(|name| DiscoveryCandidate {
                name: name.to_string(),
                category: Some("General".to_string()),
                source_url: format!("https://source.example/{}", name.to_lowercase()),
            })
            .collect()
    }

    /// Plausible generated content for a topic.
    pub fn content(topic: &str) -> GeneratedContent {
        GeneratedContent {
            primary_html: format!("<h1>{}</h1><p>Review</p>", topic),
            short_form_copies: vec![format!("{} in 30 seconds", topic)],
            media_script: format!("Here is why {} matters.", topic),
        }
    }
}
