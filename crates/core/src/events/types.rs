//! Pipeline event definitions.

use serde::{Deserialize, Serialize};

/// Something observable that happened in the pipeline.
///
/// Each variant has a dotted name (see [`PipelineEvent::name`]) used for
/// subscription matching.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    OrchestratorStarted,
    OrchestratorStopped,

    ItemDiscovered {
        item_id: String,
        name: String,
        category: String,
    },
    ItemReady {
        name: String,
        link: String,
    },
    ItemClaimed {
        item_id: String,
        name: String,
    },
    ItemPublished {
        item_id: String,
        name: String,
        publish_ref: Option<String>,
    },
    ItemRetryScheduled {
        item_id: String,
        name: String,
        stage: String,
        fail_count: u32,
    },
    ItemFailed {
        item_id: String,
        name: String,
        stage: String,
        fail_count: u32,
    },
    /// Operator reset. `name` is `None` for a bulk reset.
    ItemReset {
        name: Option<String>,
        count: usize,
    },

    StageFailed {
        item_name: String,
        stage: String,
        reason: String,
    },
    MediaDegraded {
        item_name: String,
        reason: String,
    },

    GovernorThrottle {
        cpu_percent: f32,
        ram_percent: f32,
    },
    GovernorPause {
        cpu_percent: f32,
        ram_percent: f32,
    },
    BudgetExhausted {
        completed_today: u32,
        daily_limit: u32,
    },
    LoopError {
        message: String,
    },
    SettingsChanged {
        key: String,
        value: String,
    },
}

impl PipelineEvent {
    /// Dotted event name, `namespace.action`.
    pub fn name(&self) -> &'static str {
        match self {
            PipelineEvent::OrchestratorStarted => "orchestrator.started",
            PipelineEvent::OrchestratorStopped => "orchestrator.stopped",
            PipelineEvent::ItemDiscovered { .. } => "item.discovered",
            PipelineEvent::ItemReady { .. } => "item.ready",
            PipelineEvent::ItemClaimed { .. } => "item.claimed",
            PipelineEvent::ItemPublished { .. } => "item.published",
            PipelineEvent::ItemRetryScheduled { .. } => "item.retry_scheduled",
            PipelineEvent::ItemFailed { .. } => "item.failed",
            PipelineEvent::ItemReset { .. } => "item.reset",
            PipelineEvent::StageFailed { .. } => "stage.failed",
            PipelineEvent::MediaDegraded { .. } => "media.degraded",
            PipelineEvent::GovernorThrottle { .. } => "governor.throttle",
            PipelineEvent::GovernorPause { .. } => "governor.pause",
            PipelineEvent::BudgetExhausted { .. } => "budget.exhausted",
            PipelineEvent::LoopError { .. } => "loop.error",
            PipelineEvent::SettingsChanged { .. } => "settings.changed",
        }
    }

    /// The part of the name before the first dot.
    pub fn namespace(&self) -> &'static str {
        let name = self.name();
        name.split_once('.').map(|(ns, _)| ns).unwrap_or(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_and_namespaces() {
        let event = PipelineEvent::ItemRetryScheduled {
            item_id: "1".to_string(),
            name: "Widget".to_string(),
            stage: "publish".to_string(),
            fail_count: 1,
        };
        assert_eq!(event.name(), "item.retry_scheduled");
        assert_eq!(event.namespace(), "item");
        assert_eq!(PipelineEvent::OrchestratorStarted.namespace(), "orchestrator");
    }

    #[test]
    fn test_serializes_with_type_tag() {
        let event = PipelineEvent::LoopError {
            message: "database is locked".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "loop_error");
        assert_eq!(json["message"], "database is locked");
    }
}
