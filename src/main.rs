//! Headline Sentinel service entrypoint.
//! Loads configuration, starts the archive reader API, then runs monitoring
//! cycles until Ctrl-C or SIGTERM.

use anyhow::{Context, Result};
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use headline_sentinel::api::{self, AppState};
use headline_sentinel::archive::JsonArchive;
use headline_sentinel::metrics::Metrics;
use headline_sentinel::{Monitor, NotifierMux, SentinelConfig};

// Log targets are per concern, not per module path.
const DEFAULT_LOG_FILTER: &str =
    "sentinel=info,monitor=info,source=info,notify=info,watchlist=info,state=info,api=info,warn";

/// `LOG_FORMAT=json` switches to structured output; `RUST_LOG` overrides the filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

async fn serve_api(cfg: &SentinelConfig, metrics: Option<&Metrics>) -> Result<()> {
    let state = AppState::new(JsonArchive::in_dir(&cfg.monitor.state_dir));
    let mut router = api::create_router(state);
    if let Some(m) = metrics {
        router = router.merge(m.router());
    }

    let listener = tokio::net::TcpListener::bind(&cfg.api.bind)
        .await
        .with_context(|| format!("binding API listener on {}", cfg.api.bind))?;
    tracing::info!(target: "api", bind = %cfg.api.bind, "archive reader listening");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(target: "api", error = %e, "API server stopped");
        }
    });
    Ok(())
}

/// Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!(target: "sentinel", error = %e, "SIGTERM handler unavailable");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = SentinelConfig::load()?;
    tracing::info!(
        target: "sentinel",
        sources = cfg.enabled_sources().count(),
        interval_secs = cfg.monitor.interval_secs,
        threshold = cfg.similarity.threshold,
        state_dir = %cfg.monitor.state_dir.display(),
        "configuration loaded"
    );

    let metrics = match Metrics::init() {
        Ok(m) => Some(m),
        Err(e) => {
            tracing::warn!(target: "sentinel", error = %format!("{e:#}"), "metrics disabled");
            None
        }
    };

    if cfg.api.enabled {
        serve_api(&cfg, metrics.as_ref()).await?;
    }

    let notifier =
        NotifierMux::from_env(Duration::from_secs(cfg.monitor.deliver_timeout_secs.max(1)));
    let monitor = Monitor::from_config(&cfg, notifier);

    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!(target: "sentinel", "shutdown requested");
        let _ = tx.send(true);
    });

    monitor.run(rx).await
}
