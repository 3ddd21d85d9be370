use std::sync::Arc;
use tracing::{info, warn};

use campus_harvest::core::app_state::build_http_client;
use campus_harvest::core::config::load_harvest_config;
use campus_harvest::{api, AppState};

/// `--port N` or `--port=N`.
fn cli_port() -> Option<u16> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    args.iter().enumerate().find_map(|(i, a)| match a.strip_prefix("--port") {
        Some("") => args.get(i + 1).and_then(|v| v.parse().ok()),
        Some(rest) => rest.strip_prefix('=').and_then(|v| v.parse().ok()),
        None => None,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=warn"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    info!("Starting campus-harvest");

    let config = load_harvest_config();
    let http_client = build_http_client(&config)?;
    let state = AppState::new(http_client, config);
    if state.llm.is_some() {
        info!(
            "LLM extraction available ({} via {})",
            state.config.llm.resolve_model(),
            state.config.llm.resolve_base_url()
        );
    } else {
        warn!("No LLM credentials configured; crawls run literal and heuristic extraction only");
    }
    let state = Arc::new(state);

    let sweeper = state
        .jobs
        .spawn_sweeper(state.config.jobs.resolve_sweep_interval());

    let app = api::router(Arc::clone(&state));

    let cli_port = cli_port();
    let bind_addr = state.config.server.resolve_bind_addr(cli_port);
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            anyhow::bail!(
                "Address already in use: {}. Pass --port or set server.port in campus-harvest.json.",
                bind_addr
            )
        }
        Err(e) => return Err(e.into()),
    };
    info!("campus-harvest listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(Arc::clone(&state)))
        .await?;

    sweeper.abort();
    Ok(())
}

/// Wait for Ctrl-C or SIGTERM, then cancel running crawls so their streams close.
async fn shutdown_signal(state: Arc<AppState>) {
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(_) => futures::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = futures::future::pending::<()>();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = terminate => {},
    }

    let cancelled = state.jobs.cancel_all().await;
    info!(
        "Shutting down; cancelled {} running jobs ({} in registry)",
        cancelled,
        state.jobs.len()
    );
}
