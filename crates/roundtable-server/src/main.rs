//! Process entry point: config, database, migrations, hub, HTTP server,
//! and graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use roundtable_ratelimit::SlidingWindow;
use roundtable_server::{build_router, AppState, Config};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

/// Requests per key per window at the bursty HTTP endpoints and chat.
const RATE_LIMIT: usize = 20;
const RATE_WINDOW: Duration = Duration::from_secs(60);

/// How long to wait for in-flight work after the shutdown signal.
const DRAIN_WINDOW: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::from_env()?;

    let pool = roundtable_store::connect(&config.database_url)
        .await
        .context("database connect")?;
    tracing::info!("connected to database");

    roundtable_store::migrate(&pool, &config.migrations_dir)
        .await
        .context("database migrate")?;

    let limiter = Arc::new(SlidingWindow::new(RATE_LIMIT, RATE_WINDOW));
    let state = AppState::new(pool, config.token_secret.clone(), limiter);
    let hub = state.hub.clone();
    let app = build_router(state);

    let listener = TcpListener::bind(&config.http_addr)
        .await
        .with_context(|| format!("bind {}", config.http_addr))?;
    tracing::info!(addr = %config.http_addr, "roundtable backend listening");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let mut serve_rx = shutdown_rx.clone();
    let server = tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = serve_rx.wait_for(|stop| *stop).await;
        })
        .await
    });

    // Wait for the signal, close every session, then give in-flight
    // work a bounded window before forcing teardown.
    let mut main_rx = shutdown_rx;
    let _ = main_rx.wait_for(|stop| *stop).await;
    hub.shutdown().await;

    match tokio::time::timeout(DRAIN_WINDOW, server).await {
        Ok(result) => result.context("server task")?.context("http server")?,
        Err(_) => {
            tracing::warn!("drain window elapsed, forcing shutdown");
        }
    }

    tracing::info!("shutdown complete");
    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
