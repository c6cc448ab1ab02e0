use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use chronicle_queue::{DrainReport, Replayer};
use chronicle_types::UpdateKind;

/// Shared state for the status routes.
#[derive(Clone)]
pub struct AppState {
    pub replayer: Arc<Replayer>,
}

// ── Response types ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct QueueEntry {
    pub id: Uuid,
    pub kind: UpdateKind,
    pub key: String,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub enqueued_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct QueueStatus {
    pub pending: usize,
    pub entries: Vec<QueueEntry>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/queue", get(queue_status))
        .route("/queue/drain", post(drain_now))
        .with_state(state)
}

// ── Handlers ────────────────────────────────────────────────────────────

/// GET /health
pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

/// GET /queue: pending entries in replay order.
pub async fn queue_status(State(state): State<AppState>) -> Json<QueueStatus> {
    let entries: Vec<QueueEntry> = state
        .replayer
        .queue()
        .snapshot_pending()
        .await
        .into_iter()
        .map(|entry| QueueEntry {
            id: entry.id,
            kind: entry.update.kind(),
            key: entry.update.key(),
            attempts: entry.attempts,
            last_error: entry.last_error,
            enqueued_at: entry.enqueued_at,
        })
        .collect();

    Json(QueueStatus {
        pending: entries.len(),
        entries,
    })
}

/// POST /queue/drain: run a cycle now. 409 if one is already running.
pub async fn drain_now(State(state): State<AppState>) -> Result<Json<DrainReport>, StatusCode> {
    match state.replayer.try_drain().await {
        Some(Ok(report)) => {
            info!(
                applied = report.applied,
                failed = report.failed,
                remaining = report.remaining,
                "Manual drain finished"
            );
            Ok(Json(report))
        }
        Some(Err(e)) => {
            error!(error = %e, "Manual drain aborted");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
        None => {
            warn!("Manual drain requested while a cycle is running");
            Err(StatusCode::CONFLICT)
        }
    }
}
