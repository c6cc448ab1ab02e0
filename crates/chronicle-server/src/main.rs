mod config;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use chronicle_db::Database;
use chronicle_gateway::{Capture, open_feed};
use chronicle_queue::{Replayer, UpdateQueue};

use crate::config::Config;
use crate::routes::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "chronicle=debug,chronicle_queue=info,chronicle_gateway=info,chronicle_db=info,tower_http=info"
                    .into()
            }),
        )
        .init();

    let config = Config::from_env()?;

    let db = Arc::new(Database::open(&config.db_path)?);
    let queue = Arc::new(UpdateQueue::open(&config.queue_path).await?);
    info!(
        db = %config.db_path.display(),
        queue = %queue.path().display(),
        pending = queue.len().await,
        "Mirror opened"
    );

    let shutdown = CancellationToken::new();

    let replayer = Arc::new(Replayer::new(queue.clone(), db, config.replay.clone()));
    let replay_task = tokio::spawn(replayer.clone().run(shutdown.clone()));

    let events = open_feed(&config.events).await?;
    let capture = Capture::new(config.allow_list(), queue);
    let capture_shutdown = shutdown.clone();
    let capture_task = tokio::spawn(async move { capture.run(events, capture_shutdown).await });

    let app = routes::router(AppState { replayer }).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Chronicle status server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            server_shutdown.cancel();
        })
        .await?;

    // The server can also return on its own; make sure the workers stop.
    shutdown.cancel();
    if let Err(e) = capture_task.await {
        error!("Capture task panicked: {}", e);
    }
    if let Err(e) = replay_task.await {
        error!("Replay task panicked: {}", e);
    }

    info!("Chronicle stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    error!("Failed to install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    info!("Received Ctrl+C, shutting down...");
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
