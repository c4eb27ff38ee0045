use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use vigil_alert::evaluator::RuleEvaluator;
use vigil_notify::{ChannelRegistry, DispatchPolicy, Dispatcher};
use vigil_server::config::ServerConfig;
use vigil_server::scheduler::Scheduler;
use vigil_server::state::AppState;
use vigil_server::{app, seed};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("vigil=info".parse()?))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/server.toml".to_string());
    let config = ServerConfig::load(&config_path)?;

    tracing::info!(
        http_port = config.http_port,
        tick_secs = config.tick_secs,
        "vigil-server starting"
    );

    let registry = ChannelRegistry::default();

    // Seed files are validated up front; a bad rule or channel definition is
    // fatal rather than silently dropped.
    let rules = match &config.rules_seed {
        Some(path) => seed::load_rules(path)?,
        None => Vec::new(),
    };
    let channels = match &config.channels_seed {
        Some(path) => seed::load_channels(path, &registry)?,
        None => Vec::new(),
    };
    if rules.is_empty() {
        tracing::warn!("No alert rules configured, the evaluator will be idle");
    }
    if channels.is_empty() {
        tracing::warn!("No notification channels configured, alerts will not notify");
    }

    let evaluator = RuleEvaluator::new(rules)?;
    let policy: DispatchPolicy = config.dispatch.clone();
    let dispatcher = Dispatcher::from_configs(&registry, channels, policy)?;

    let state = AppState::new(config.clone(), evaluator, dispatcher, registry);

    let scheduler = Arc::new(Scheduler::new(state.clone(), config.tick_secs));
    scheduler.start();

    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let app = app::build_http_app(state);
    let listener = tokio::net::TcpListener::bind(http_addr).await?;
    tracing::info!(http = %http_addr, "Server started");

    let server = axum::serve(listener, app.into_make_service());
    tokio::select! {
        result = server.with_graceful_shutdown(async { signal::ctrl_c().await.ok(); }) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server error");
            }
        }
        _ = signal::ctrl_c() => {
            tracing::info!("Shutting down gracefully");
        }
    }

    scheduler.stop().await;
    tracing::info!("Server stopped");
    Ok(())
}
