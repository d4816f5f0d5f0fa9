use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use adapters::action::file_listener::FileActionListener;
use adapters::action::log_listener::LogActionListener;
use adapters::definitions::memory_definitions::InMemoryDefinitions;
use adapters::fact_source::jsonl_source::{FactSourceStats, JsonLinesFactSource};
use adapters::storage::memory_alert_store::InMemoryAlertStore;
use anyhow::Context;
use application::action_dispatcher::ActionDispatcher;
use application::alert_engine::AlertEngine;
use application::retry::RetryConfig;
use infrastructure::config::{AlertForgeConfig, ListenerKind, PluginConfig};
use infrastructure::constants::GRACEFUL_SHUTDOWN_TIMEOUT;
use infrastructure::logging::init_logging;
use infrastructure::metrics::AgentMetrics;
use ports::secondary::action_listener::ActionListener;
use ports::secondary::alert_store::AlertStore;
use ports::secondary::metrics_port::MetricsPort;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::Cli;

/// What one run of the pipeline processed.
#[derive(Debug, Clone, Copy)]
pub struct RunReport {
    pub source: FactSourceStats,
    pub alerts_stored: usize,
}

/// Run the agent startup sequence and block until the fact stream ends
/// or a shutdown signal arrives.
pub async fn run(cli: &Cli, facts: &Path, metrics_file: Option<&Path>) -> anyhow::Result<()> {
    // ── 1. Load config ──────────────────────────────────────────────
    let config = AlertForgeConfig::load(Path::new(&cli.config))
        .with_context(|| format!("failed to load {}", cli.config))?;

    // ── 2. Initialize logging ───────────────────────────────────────
    // CLI flags take precedence over config file
    let log_level = cli.log_level.unwrap_or(config.agent.log_level);
    let log_format = cli.log_format.unwrap_or(config.agent.log_format);
    init_logging(log_level, log_format)?;

    // Service root span, its fields appear in every subsequent log entry
    let _root_span = tracing::span!(
        tracing::Level::INFO,
        "service",
        service.name = "alertforge",
        service.version = env!("CARGO_PKG_VERSION"),
    )
    .entered();

    info!(
        config_path = %cli.config,
        facts = %facts.display(),
        log_level = log_level.as_str(),
        log_format = log_format.as_str(),
        "AlertForge agent starting"
    );

    // ── 3. Run until EOF or signal ──────────────────────────────────
    let metrics = Arc::new(AgentMetrics::new());
    let cancel_token = crate::shutdown::create_shutdown_token();
    let result = run_pipeline(&config, facts, Arc::clone(&metrics), cancel_token).await;

    // ── 4. Export metrics, even after a failed run ──────────────────
    if let Some(path) = metrics_file {
        tokio::fs::write(path, metrics.encode())
            .await
            .with_context(|| format!("failed to write metrics to {}", path.display()))?;
        info!(path = %path.display(), "metrics written");
    }

    let report = result?;
    info!(
        ticks = report.source.ticks,
        facts = report.source.facts,
        skipped_lines = report.source.skipped_lines,
        alerts = report.alerts_stored,
        "AlertForge agent stopped"
    );
    Ok(())
}

/// Wire definitions, listeners, dispatcher, store and engine from `config`,
/// then stream `facts` through them.
///
/// Shutdown order: the engine stops (EOF or `cancel_token`), then listener
/// workers drain their queues, bounded by [`GRACEFUL_SHUTDOWN_TIMEOUT`].
pub async fn run_pipeline(
    config: &AlertForgeConfig,
    facts: &Path,
    metrics: Arc<AgentMetrics>,
    cancel_token: CancellationToken,
) -> anyhow::Result<RunReport> {
    let metrics_port = Arc::clone(&metrics) as Arc<dyn MetricsPort>;

    // ── Action definitions ──────────────────────────────────────────
    let definitions = Arc::new(build_definitions(config)?);
    info!(
        plugins = config.plugins.len(),
        actions = definitions.action_count(),
        "action definitions loaded"
    );

    // ── Dispatcher + listener workers ───────────────────────────────
    // Workers get their own token so they outlive the engine and drain
    // everything it enqueued before stopping.
    let dispatch_cancel = CancellationToken::new();
    let dispatch = &config.dispatch;
    let mut dispatcher = ActionDispatcher::new(definitions, Arc::clone(&metrics_port))
        .with_retry(RetryConfig::from_millis(
            dispatch.max_retries,
            &dispatch.backoff_ms,
            dispatch.timeout_ms,
        ))
        .with_queue_capacity(dispatch.queue_capacity);

    let workers: Vec<_> = config
        .plugins
        .iter()
        .map(|plugin| dispatcher.register(&plugin.name, build_listener(plugin), dispatch_cancel.clone()))
        .collect();

    // ── Engine ──────────────────────────────────────────────────────
    let store: Arc<dyn AlertStore> = Arc::new(InMemoryAlertStore::new());
    let mut engine =
        AlertEngine::new(Arc::clone(&store), metrics_port).with_dispatcher(dispatcher);
    for definition in config.trigger_definitions()? {
        engine.add_trigger(definition)?;
    }
    info!(triggers = engine.trigger_count(), "alert engine initialized");

    // ── Fact source ─────────────────────────────────────────────────
    let (facts_tx, facts_rx) = mpsc::channel(config.agent.fact_channel_capacity);
    // No command producer is wired in this binary; the sender keeps the
    // channel open for the engine's lifetime.
    let (_commands_tx, commands_rx) = mpsc::channel(config.agent.command_channel_capacity);

    let source = JsonLinesFactSource::new(facts_tx)
        .with_tick_interval(Duration::from_millis(config.agent.tick_interval_ms));
    let facts_path: PathBuf = facts.to_path_buf();
    let source_cancel = cancel_token.clone();
    let source_handle =
        tokio::spawn(async move { source.run_path(&facts_path, source_cancel).await });

    // ── Evaluate until EOF or shutdown signal ───────────────────────
    engine.run(facts_rx, commands_rx, cancel_token).await;

    let source_result = source_handle.await.context("fact source task panicked")?;

    // ── Ordered shutdown ────────────────────────────────────────────
    info!(workers = workers.len(), "draining action listeners");
    dispatch_cancel.cancel();
    for handle in workers {
        match tokio::time::timeout(GRACEFUL_SHUTDOWN_TIMEOUT, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "action listener worker panicked"),
            Err(_) => warn!("action listener worker did not drain in time"),
        }
    }

    let source = source_result?;
    let alerts_stored = store.alert_count()?;
    Ok(RunReport {
        source,
        alerts_stored,
    })
}

/// Plugin defaults and action definitions from config. The wildcard plugin
/// carries no defaults of its own.
fn build_definitions(config: &AlertForgeConfig) -> anyhow::Result<InMemoryDefinitions> {
    let definitions = InMemoryDefinitions::new();
    for plugin in config.plugins.iter().filter(|p| !p.is_wildcard()) {
        definitions.add_plugin(&plugin.name, plugin.default_properties())?;
    }
    for action in &config.actions {
        definitions.add_action(
            &action.tenant(),
            &action.plugin,
            &action.action_id,
            action.to_domain_properties(),
        )?;
    }
    Ok(definitions)
}

fn build_listener(plugin: &PluginConfig) -> Arc<dyn ActionListener> {
    match plugin.listener {
        ListenerKind::Log => Arc::new(LogActionListener),
        ListenerKind::File => Arc::new(FileActionListener::new(
            plugin.directory.clone().unwrap_or_default(),
        )),
    }
}
