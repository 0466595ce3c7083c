pub mod budget;
pub mod clock;
pub mod config;
pub mod db;
pub mod diagnostics;
pub mod events;
pub mod governor;
pub mod item;
pub mod metrics;
pub mod orchestrator;
pub mod settings;
pub mod stages;
pub mod testing;

pub use budget::{BudgetLimiter, BudgetStatus};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, DatabaseConfig,
    SanitizedConfig,
};
pub use diagnostics::{
    DiagnosticsError, ErrorEntry, ErrorFilter, ErrorLog, ErrorStats, SqliteErrorLog,
};
pub use events::{EventBus, EventPattern, HandlerError, PipelineEvent, SubscriptionId};
pub use governor::{
    LoadSample, LoadSampler, Pressure, ResourceGovernor, SysinfoSampler, Thresholds,
};
pub use item::{
    Artifacts, DiscoveredItem, Item, ItemError, ItemFilter, ItemOutcome, ItemStatus, ItemStore,
    RunLogEntry, SqliteItemStore, StatusCounts,
};
pub use orchestrator::{
    OrchestratorConfig, OrchestratorError, OrchestratorStatus, PipelineOrchestrator, TickOutcome,
};
pub use settings::{RuntimeSettings, SettingKey, SettingsError, SystemStatus};
pub use stages::{
    Collaborators, CollaboratorError, HttpCollaborator, Stage, StageExecutor,
    StageExecutorConfig, StageFailure,
};
