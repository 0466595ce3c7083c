//! Pipeline orchestrator implementation.
//!
//! One loop task decides, tick by tick, whether to idle, discover or dispatch.
//! Dispatched items run on a bounded pool of worker tasks.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::{broadcast, Mutex, Notify, OwnedSemaphorePermit, RwLock, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::budget::{BudgetLimiter, BudgetStatus};
use crate::config::DiscoveryConfig;
use crate::diagnostics::{system_stage, ErrorLog, SYSTEM_ITEM};
use crate::events::{EventBus, PipelineEvent};
use crate::governor::{GovernorReading, Pressure, ResourceGovernor};
use crate::item::{
    Artifacts, DiscoveredItem, Item, ItemError, ItemOutcome, ItemStatus, ItemStore,
};
use crate::settings::{RuntimeSettings, SettingsError};
use crate::stages::{ProductionReport, Stage, StageExecutor, StageFailure};

use super::config::OrchestratorConfig;
use super::types::{OrchestratorError, OrchestratorStatus, TickOutcome};

/// Attempts for a store write at the end of production before giving up.
const STORE_WRITE_ATTEMPTS: u32 = 3;

/// First pause between store write attempts. Doubles each time.
const STORE_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Bookkeeping shared between the loop and status queries.
#[derive(Debug)]
struct LoopState {
    last_outcome: Option<TickOutcome>,
    last_tick_at: Option<chrono::DateTime<Utc>>,
    consecutive_errors: u32,
    last_error: Option<String>,
    pressure: Pressure,
    budget_exhausted: bool,
    /// Settings or collaborator problem last logged.
    config_fault: Option<String>,
    /// Credential rejection reported by a stage, cleared once an item gets through.
    credential_fault: Option<String>,
    /// Set by a worker whose stage was rejected for credentials; the next tick idles.
    config_idle: bool,
    /// No claim before this instant. Set when an item finishes.
    not_before: Option<Instant>,
}

impl Default for LoopState {
    fn default() -> Self {
        Self {
            last_outcome: None,
            last_tick_at: None,
            consecutive_errors: 0,
            last_error: None,
            pressure: Pressure::Ok,
            budget_exhausted: false,
            config_fault: None,
            credential_fault: None,
            config_idle: false,
            not_before: None,
        }
    }
}

/// Everything one tick needs. Cheap to clone into spawned tasks.
#[derive(Clone)]
struct Pipeline {
    config: OrchestratorConfig,
    discovery: DiscoveryConfig,
    store: Arc<dyn ItemStore>,
    errors: Arc<dyn ErrorLog>,
    governor: ResourceGovernor,
    budget: BudgetLimiter,
    executor: Arc<StageExecutor>,
    bus: EventBus,
    workers: Arc<Semaphore>,
    tasks: Arc<Mutex<JoinSet<()>>>,
    state: Arc<RwLock<LoopState>>,
}

/// The pipeline orchestrator - moves Ready items through the stage executor.
pub struct PipelineOrchestrator {
    pipeline: Pipeline,

    // Runtime state
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    wake: Arc<Notify>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl PipelineOrchestrator {
    /// Create a new orchestrator.
    pub fn new(
        config: OrchestratorConfig,
        store: Arc<dyn ItemStore>,
        errors: Arc<dyn ErrorLog>,
        governor: ResourceGovernor,
        executor: StageExecutor,
        bus: EventBus,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let workers = Arc::new(Semaphore::new(config.max_workers.max(1)));

        Self {
            pipeline: Pipeline {
                budget: BudgetLimiter::new(Arc::clone(&store)),
                config,
                discovery: DiscoveryConfig::default(),
                store,
                errors,
                governor,
                executor: Arc::new(executor),
                bus,
                workers,
                tasks: Arc::new(Mutex::new(JoinSet::new())),
                state: Arc::new(RwLock::new(LoopState::default())),
            },
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            wake: Arc::new(Notify::new()),
            loop_handle: Mutex::new(None),
        }
    }

    /// Seed topic and default category used for discovery.
    pub fn with_discovery(mut self, discovery: DiscoveryConfig) -> Self {
        self.pipeline.discovery = discovery;
        self
    }

    /// Start the orchestrator loop.
    pub async fn start(&self) -> Result<(), OrchestratorError> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Orchestrator already running");
            return Err(OrchestratorError::AlreadyRunning);
        }

        info!("Starting pipeline orchestrator");

        // Claims left behind by a previous process are stale; make those items claimable again
        self.recover_claims();

        let handle = self.spawn_loop();
        *self.loop_handle.lock().await = Some(handle);

        self.pipeline.bus.publish(&PipelineEvent::OrchestratorStarted);
        info!(
            "Pipeline orchestrator started with {} worker(s)",
            self.pipeline.config.max_workers
        );
        Ok(())
    }

    /// Stop the loop and wait for in-flight items to finish.
    pub async fn stop(&self) -> Result<(), OrchestratorError> {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Orchestrator not running");
            return Err(OrchestratorError::NotRunning);
        }

        info!("Stopping pipeline orchestrator");

        // Signal shutdown to the loop
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.loop_handle.lock().await.take() {
            if let Err(e) = handle.await {
                error!("Orchestrator loop ended abnormally: {}", e);
            }
        }

        // In-flight stage calls are not preempted
        let grace = self.pipeline.config.stage_timeout() * 5;
        if tokio::time::timeout(grace, self.wait_idle()).await.is_err() {
            warn!("Workers still busy after {:?}, leaving them running", grace);
        }

        self.pipeline.bus.publish(&PipelineEvent::OrchestratorStopped);
        info!("Pipeline orchestrator stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Cut the current sleep short so the next tick happens now.
    ///
    /// Called after operator actions (a link was supplied, the system was
    /// started) so they take effect without waiting out a long idle sleep.
    pub fn wake(&self) {
        self.wake.notify_one();
    }

    /// Run a single tick. The loop calls this; tests drive it directly.
    pub async fn tick(&self) -> Result<TickOutcome, OrchestratorError> {
        self.pipeline.tick().await
    }

    /// Wait until every dispatched item has finished.
    pub async fn wait_idle(&self) {
        self.pipeline.wait_idle().await
    }

    /// Get current orchestrator status.
    pub async fn status(&self) -> OrchestratorStatus {
        let state = self.pipeline.state.read().await;

        let counts = self.pipeline.store.status_counts().unwrap_or_default();
        let completed_today = self.pipeline.store.count_completed_today().unwrap_or(0);

        OrchestratorStatus {
            running: self.running.load(Ordering::Relaxed),
            in_flight: self.pipeline.in_flight(),
            max_workers: self.pipeline.config.max_workers,
            last_outcome: state.last_outcome.clone(),
            last_tick_at: state.last_tick_at,
            consecutive_errors: state.consecutive_errors,
            last_error: state.last_error.clone(),
            counts,
            completed_today,
        }
    }

    fn recover_claims(&self) {
        match self.pipeline.store.release_claims() {
            Ok(0) => {}
            Ok(count) => info!("Released {} stale claim(s) from a previous run", count),
            Err(e) => error!("Failed to release stale claims: {}", e),
        }
    }

    /// Spawn the orchestrator loop task.
    fn spawn_loop(&self) -> JoinHandle<()> {
        let running = Arc::clone(&self.running);
        let pipeline = self.pipeline.clone();
        let wake = Arc::clone(&self.wake);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Orchestrator loop started");
            loop {
                if !running.load(Ordering::Relaxed) {
                    break;
                }

                let delay = pipeline.guarded_tick().await;
                debug!("Next tick in {:?}", delay);

                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Orchestrator loop received shutdown signal");
                        break;
                    }
                    _ = wake.notified() => {
                        debug!("Orchestrator loop woken early");
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            info!("Orchestrator loop stopped");
        })
    }
}

impl Pipeline {
    /// Run one tick and turn whatever happened into the next sleep.
    ///
    /// Errors and panics end here: they are logged, recorded and answered with
    /// an exponential backoff, never propagated.
    async fn guarded_tick(&self) -> Duration {
        let result = match AssertUnwindSafe(self.tick()).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(OrchestratorError::Panicked(message))
            }
        };

        let mut state = self.state.write().await;
        state.last_tick_at = Some(Utc::now());

        match result {
            Ok(outcome) => {
                let delay = outcome.delay(&self.config);
                state.consecutive_errors = 0;
                state.last_outcome = Some(outcome);
                delay
            }
            Err(e) => {
                state.consecutive_errors = state.consecutive_errors.saturating_add(1);
                let delay = self.config.backoff(state.consecutive_errors);
                let message = e.to_string();
                state.last_error = Some(message.clone());
                drop(state);

                error!("Orchestrator tick failed: {} (retrying in {:?})", message, delay);
                let stage = match e {
                    OrchestratorError::Discovery(_) => system_stage::DISCOVERY,
                    _ => system_stage::MAIN_LOOP,
                };
                self.log_error(SYSTEM_ITEM, stage, &message);
                self.bus.publish(&PipelineEvent::LoopError { message });
                delay
            }
        }
    }

    async fn tick(&self) -> Result<TickOutcome, OrchestratorError> {
        self.reap_workers().await;

        // 1. Settings are re-read every tick
        let settings = match RuntimeSettings::load(self.store.as_ref()) {
            Ok(settings) => settings,
            Err(SettingsError::Store(e)) => return Err(e.into()),
            Err(e) => {
                let reason = format!("invalid runtime settings: {}", e);
                self.note_misconfigured(&reason).await;
                return Ok(TickOutcome::Misconfigured { reason });
            }
        };

        if !settings.is_running() {
            debug!("System stopped, not dequeuing");
            return Ok(TickOutcome::Stopped);
        }

        if let Err(e) = self.executor.collaborators().validate() {
            let reason = format!("collaborators misconfigured: {}", e);
            self.note_misconfigured(&reason).await;
            return Ok(TickOutcome::Misconfigured { reason });
        }
        self.note_configured().await;

        if let Some(reason) = self.take_config_idle().await {
            debug!("Idling after rejected credentials: {}", reason);
            return Ok(TickOutcome::Misconfigured { reason });
        }

        // 2. Governor
        let reading = self.governor.check(&settings.thresholds).await;
        self.note_pressure(&reading).await;
        let throttled = match reading.pressure {
            Pressure::Pause => return Ok(TickOutcome::Paused),
            Pressure::Throttle => true,
            Pressure::Ok => false,
        };

        // 3. Budget, counting what is already in production
        let in_flight = self.in_flight();
        let budget = self
            .budget
            .status(settings.daily_run_limit, in_flight as u32)?;
        let exhausted = budget.completed_today >= budget.daily_limit;
        self.note_budget(exhausted, &budget).await;
        if exhausted {
            return Ok(TickOutcome::BudgetExhausted);
        }
        if !budget.has_capacity() {
            return Ok(TickOutcome::Busy);
        }

        // Post-item delay, counted from when the last item finished
        if self.cooling_down().await {
            return Ok(TickOutcome::Busy);
        }

        // 4. Claim and dispatch
        let Ok(permit) = Arc::clone(&self.workers).try_acquire_owned() else {
            return Ok(TickOutcome::Busy);
        };

        if let Some(item) = self.store.next_ready_item()? {
            let name = item.name.clone();
            info!("Claimed item '{}' ({})", name, item.id);
            self.bus.publish(&PipelineEvent::ItemClaimed {
                item_id: item.id.clone(),
                name: name.clone(),
            });
            self.dispatch(item, permit, throttled).await;
            return Ok(TickOutcome::Dispatched {
                item: name,
                throttled,
            });
        }
        drop(permit);

        let counts = self.store.status_counts()?;

        // 6. Waiting on the operator
        if counts.pending > 0 {
            debug!("{} pending item(s) waiting for links", counts.pending);
            return Ok(TickOutcome::AwaitingLinks {
                pending: counts.pending,
            });
        }

        // Ready rows that could not be claimed belong to running workers
        if self.in_flight() > 0 || counts.ready > 0 {
            return Ok(TickOutcome::Busy);
        }

        // 5. Queue is dry
        let count = self.discover().await?;
        Ok(TickOutcome::Discovered { count })
    }

    async fn discover(&self) -> Result<usize, OrchestratorError> {
        let seed = self.discovery.seed_topic.as_str();
        info!("Queue empty, running discovery for '{}'", seed);

        let discoverer = &self.executor.collaborators().discoverer;
        let candidates = tokio::time::timeout(self.config.stage_timeout(), discoverer.discover(seed))
            .await
            .map_err(|_| crate::stages::CollaboratorError::Timeout(self.config.stage_timeout()))??;

        let mut inserted = 0;
        for candidate in candidates {
            let name = candidate.name.trim();
            if name.is_empty() {
                debug!("Skipping discovery candidate with an empty name");
                continue;
            }
            let category = candidate
                .category
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .unwrap_or(&self.discovery.category);

            let new_item = DiscoveredItem::new(name, category, &candidate.source_url);
            if let Some(item) = self.store.insert_discovered(&new_item)? {
                info!("Discovered item '{}'", item.name);
                self.bus.publish(&PipelineEvent::ItemDiscovered {
                    item_id: item.id,
                    name: item.name,
                    category: item.category,
                });
                inserted += 1;
            }
        }

        info!("Discovery added {} new item(s)", inserted);
        Ok(inserted)
    }

    async fn dispatch(&self, item: Item, permit: OwnedSemaphorePermit, throttled: bool) {
        let pipeline = self.clone();
        self.tasks.lock().await.spawn(async move {
            pipeline.produce(item, throttled).await;
            drop(permit);
        });
    }

    /// Run every stage for one claimed item and record the outcome.
    async fn produce(&self, item: Item, throttled: bool) {
        match self.executor.run(&item).await {
            Err(failure) if failure.cause.is_config_error() => {
                self.on_rejected_credentials(&item, &failure).await;
            }
            result => {
                let outcome = match result {
                    Ok(report) => self.on_success(&item, report),
                    Err(failure) => self.on_failure(&item, failure),
                };
                self.state.write().await.credential_fault = None;
                self.record(&item, &outcome).await;
            }
        }

        self.start_cooldown(throttled).await;
    }

    /// Persist the outcome, retrying lock timeouts. If it still cannot be
    /// written the claim is dropped so the item is produced again later.
    async fn record(&self, item: &Item, outcome: &ItemOutcome) {
        let max_retries = self.config.max_retries;
        let recorded = self
            .retry_store_write("record outcome", || {
                self.store.record_outcome(&item.id, outcome, max_retries)
            })
            .await;

        match recorded {
            Ok(updated) => self.announce(&updated, outcome),
            Err(e) => {
                let message = format!("failed to record outcome: {}", e);
                error!("Item '{}': {}", item.name, message);
                self.log_error(&item.name, system_stage::MAIN_LOOP, &message);
                self.bus.publish(&PipelineEvent::LoopError { message });
                self.release(item).await;
            }
        }
    }

    /// A stage refused our credentials. Not the item's fault: hand it back
    /// untouched and let the loop idle until the configuration is fixed.
    async fn on_rejected_credentials(&self, item: &Item, failure: &StageFailure) {
        let reason = format!("{} rejected credentials: {}", failure.stage, failure.cause);

        let mut state = self.state.write().await;
        state.config_idle = true;
        let first = state.credential_fault.as_deref() != Some(reason.as_str());
        state.credential_fault = Some(reason.clone());
        drop(state);

        if first {
            warn!("Item '{}' stopped at {}, idling", item.name, reason);
            self.log_error(SYSTEM_ITEM, system_stage::CONFIG, &reason);
            self.bus.publish(&PipelineEvent::LoopError { message: reason });
        }
        self.release(item).await;
    }

    async fn release(&self, item: &Item) {
        match self
            .retry_store_write("release claim", || self.store.release_claim(&item.id))
            .await
        {
            Ok(_) => info!("Released claim on '{}'", item.name),
            Err(e) => error!("Failed to release claim on '{}': {}", item.name, e),
        }
    }

    /// Run a store write, retrying database errors with a doubling pause.
    async fn retry_store_write<T, F>(&self, what: &str, mut write: F) -> Result<T, ItemError>
    where
        F: FnMut() -> Result<T, ItemError>,
    {
        let mut delay = STORE_RETRY_DELAY;
        let mut attempt = 1;
        loop {
            match write() {
                Err(ItemError::Database(e)) if attempt < STORE_WRITE_ATTEMPTS => {
                    warn!(
                        "Failed to {} (attempt {}/{}): {}, retrying in {:?}",
                        what, attempt, STORE_WRITE_ATTEMPTS, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn start_cooldown(&self, throttled: bool) {
        let ms = if throttled {
            self.config.throttled_item_delay_ms
        } else {
            self.config.item_delay_ms
        };
        let until = Instant::now() + Duration::from_millis(ms);

        let mut state = self.state.write().await;
        state.not_before = Some(state.not_before.map_or(until, |t| t.max(until)));
    }

    async fn cooling_down(&self) -> bool {
        self.state
            .read()
            .await
            .not_before
            .is_some_and(|t| Instant::now() < t)
    }

    fn on_success(&self, item: &Item, report: ProductionReport) -> ItemOutcome {
        for issue in &report.media_issues {
            warn!("Item '{}' media degraded: {}", item.name, issue);
            self.log_error(&item.name, Stage::GenerateMedia.as_str(), issue);
            self.bus.publish(&PipelineEvent::MediaDegraded {
                item_name: item.name.clone(),
                reason: issue.clone(),
            });
        }

        let content_ref = match serde_json::to_string(&report.content) {
            Ok(json) => Some(json),
            Err(e) => {
                warn!("Could not serialize content for '{}': {}", item.name, e);
                None
            }
        };

        ItemOutcome::Published {
            artifacts: Artifacts {
                image_ref: report.media.image_path,
                video_ref: report.media.video_path,
                content_ref,
                publish_ref: report.receipt.reference,
            },
        }
    }

    fn on_failure(&self, item: &Item, failure: StageFailure) -> ItemOutcome {
        let stage = failure.stage.as_str().to_string();
        let reason = failure.cause.to_string();

        warn!("Item '{}' failed at {}: {}", item.name, stage, reason);
        self.log_error(&item.name, &stage, &reason);
        self.bus.publish(&PipelineEvent::StageFailed {
            item_name: item.name.clone(),
            stage: stage.clone(),
            reason: reason.clone(),
        });

        ItemOutcome::Failed { stage, reason }
    }

    fn announce(&self, item: &Item, outcome: &ItemOutcome) {
        let stage = match outcome {
            ItemOutcome::Failed { stage, .. } => stage.clone(),
            ItemOutcome::Published { .. } => String::new(),
        };

        let event = match item.status {
            ItemStatus::Published => {
                info!("Item '{}' published", item.name);
                PipelineEvent::ItemPublished {
                    item_id: item.id.clone(),
                    name: item.name.clone(),
                    publish_ref: item.artifacts.publish_ref.clone(),
                }
            }
            ItemStatus::Pending => {
                info!(
                    "Item '{}' returned to pending ({}/{} failures)",
                    item.name, item.fail_count, self.config.max_retries
                );
                PipelineEvent::ItemRetryScheduled {
                    item_id: item.id.clone(),
                    name: item.name.clone(),
                    stage,
                    fail_count: item.fail_count,
                }
            }
            ItemStatus::Failed => {
                warn!(
                    "Item '{}' failed permanently after {} attempts",
                    item.name, item.fail_count
                );
                PipelineEvent::ItemFailed {
                    item_id: item.id.clone(),
                    name: item.name.clone(),
                    stage,
                    fail_count: item.fail_count,
                }
            }
            ItemStatus::Ready => return,
        };
        self.bus.publish(&event);
    }

    /// Log governor transitions once rather than on every paused tick.
    async fn note_pressure(&self, reading: &GovernorReading) {
        let mut state = self.state.write().await;
        if state.pressure == reading.pressure {
            return;
        }
        state.pressure = reading.pressure;
        drop(state);

        let (cpu, ram) = reading
            .sample
            .map(|s| (s.cpu_percent, s.ram_percent))
            .unwrap_or_default();

        match reading.pressure {
            Pressure::Pause => {
                let message = format!("pausing: cpu {:.1}% ram {:.1}%", cpu, ram);
                warn!("Governor {}", message);
                self.log_error(SYSTEM_ITEM, system_stage::SYSTEM_LOAD, &message);
                self.bus.publish(&PipelineEvent::GovernorPause {
                    cpu_percent: cpu,
                    ram_percent: ram,
                });
            }
            Pressure::Throttle => {
                info!("Governor throttling: cpu {:.1}% ram {:.1}%", cpu, ram);
                self.bus.publish(&PipelineEvent::GovernorThrottle {
                    cpu_percent: cpu,
                    ram_percent: ram,
                });
            }
            Pressure::Ok => info!("Governor load back to normal"),
        }
    }

    /// Log a configuration problem when it first appears or changes.
    async fn note_misconfigured(&self, reason: &str) {
        let mut state = self.state.write().await;
        if state.config_fault.as_deref() == Some(reason) {
            return;
        }
        state.config_fault = Some(reason.to_string());
        drop(state);

        warn!("Idling: {}", reason);
        self.log_error(SYSTEM_ITEM, system_stage::CONFIG, reason);
    }

    async fn note_configured(&self) {
        if self.state.write().await.config_fault.take().is_some() {
            info!("Configuration valid again");
        }
    }

    async fn take_config_idle(&self) -> Option<String> {
        let mut state = self.state.write().await;
        if !std::mem::take(&mut state.config_idle) {
            return None;
        }
        Some(
            state
                .credential_fault
                .clone()
                .unwrap_or_else(|| "credentials rejected".to_string()),
        )
    }

    async fn note_budget(&self, exhausted: bool, budget: &BudgetStatus) {
        let mut state = self.state.write().await;
        if state.budget_exhausted == exhausted {
            return;
        }
        state.budget_exhausted = exhausted;
        drop(state);

        if exhausted {
            let message = format!(
                "daily limit reached: {}/{}",
                budget.completed_today, budget.daily_limit
            );
            info!("Budget {}", message);
            self.log_error(SYSTEM_ITEM, system_stage::BUDGET, &message);
            self.bus.publish(&PipelineEvent::BudgetExhausted {
                completed_today: budget.completed_today,
                daily_limit: budget.daily_limit,
            });
        } else {
            info!("Budget available again");
        }
    }

    fn in_flight(&self) -> usize {
        self.config
            .max_workers
            .max(1)
            .saturating_sub(self.workers.available_permits())
    }

    /// Collect finished workers so the join set does not grow unbounded.
    async fn reap_workers(&self) {
        let mut tasks = self.tasks.lock().await;
        while let Some(result) = tasks.try_join_next() {
            if let Err(e) = result {
                error!("Worker task ended abnormally: {}", e);
            }
        }
    }

    async fn wait_idle(&self) {
        let mut tasks = self.tasks.lock().await;
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!("Worker task ended abnormally: {}", e);
            }
        }
    }

    /// Append to the durable error log. Failing to do so is logged, not propagated.
    fn log_error(&self, item_name: &str, stage: &str, message: &str) {
        if let Err(e) = self.errors.record(item_name, stage, message) {
            error!("Failed to write error log ({} / {}): {}", item_name, stage, e);
        }
    }
}
