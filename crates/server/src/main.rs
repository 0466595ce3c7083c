use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use conveyor_core::settings::seed_defaults;
use conveyor_core::{
    load_config, metrics as core_metrics, validate_config, Collaborators, ErrorLog, EventBus,
    HttpCollaborator, ItemStore, PipelineOrchestrator, ResourceGovernor, SqliteErrorLog,
    SqliteItemStore, StageExecutor, StageExecutorConfig, SysinfoSampler,
};

use conveyor_server::api::{create_router, forward_events, WsBroadcaster};
use conveyor_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("CONVEYOR_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);

    // Both stores share one file, each with its own connection
    let busy_timeout = Duration::from_millis(config.database.busy_timeout_ms);
    let store: Arc<dyn ItemStore> = Arc::new(
        SqliteItemStore::new(&config.database.path, busy_timeout)
            .context("Failed to create item store")?,
    );
    let errors: Arc<dyn ErrorLog> = Arc::new(
        SqliteErrorLog::new(&config.database.path, busy_timeout)
            .context("Failed to create error log")?,
    );
    info!("Item store and error log initialized");

    let seeded = seed_defaults(store.as_ref(), &config.defaults.seed_values())
        .context("Failed to seed default settings")?;
    if seeded > 0 {
        info!("Seeded {} default settings", seeded);
    }

    // Event bus: metrics and WebSocket clients both listen to everything
    let bus = EventBus::new();
    core_metrics::attach(&bus);
    let ws_broadcaster = WsBroadcaster::default();
    forward_events(&bus, ws_broadcaster.clone());

    // Collaborators. A missing key or endpoint is reported every tick, not here.
    let http = HttpCollaborator::new(&config.collaborators)
        .context("Failed to create collaborator client")?;
    let collaborators = Collaborators::from_single(Arc::new(http));
    if let Err(e) = collaborators.validate() {
        warn!("Collaborators not fully configured: {}", e);
    }

    let sampler = SysinfoSampler::new(Duration::from_millis(config.governor.sample_window_ms));
    let governor = ResourceGovernor::new(Arc::new(sampler));

    let executor = StageExecutor::new(
        collaborators,
        StageExecutorConfig {
            stage_timeout: config.orchestrator.stage_timeout(),
            tracking_base_url: config.tracking.base_url.clone(),
        },
    );

    let orchestrator = Arc::new(
        PipelineOrchestrator::new(
            config.orchestrator.clone(),
            Arc::clone(&store),
            Arc::clone(&errors),
            governor,
            executor,
            bus.clone(),
        )
        .with_discovery(config.discovery.clone()),
    );

    if config.orchestrator.enabled {
        orchestrator
            .start()
            .await
            .context("Failed to start orchestrator")?;
        info!(
            "Pipeline orchestrator started ({} workers)",
            config.orchestrator.max_workers
        );
    } else {
        info!("Orchestrator disabled in config");
    }

    let state = Arc::new(AppState::new(
        config.clone(),
        store,
        errors,
        bus,
        Some(Arc::clone(&orchestrator)),
        ws_broadcaster,
    ));

    let app = create_router(state);

    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    if orchestrator.is_running() {
        info!("Stopping orchestrator...");
        if let Err(e) = orchestrator.stop().await {
            warn!("Orchestrator stop failed: {}", e);
        }
        info!("Orchestrator stopped");
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
