//! Liveness and storage status for the /health endpoint.

use std::time::Instant;

use axum::{extract::State, http::StatusCode, Json};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::warn;

use crate::api::routes::ApiState;

/// Process-level facts the health endpoint reports alongside the store.
pub struct HealthState {
    started_at: Instant,
}

impl HealthState {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: bool,
    pub snapshots: usize,
    pub latest_snapshot: Option<NaiveDate>,
    pub uptime_secs: u64,
}

/// 200 while the store answers, 503 otherwise.
pub async fn get_health(State(state): State<ApiState>) -> (StatusCode, Json<HealthResponse>) {
    let uptime_secs = state.health.uptime_secs();
    match state.loader.list().await {
        Ok(rows) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                database: true,
                snapshots: rows.len(),
                latest_snapshot: rows.first().map(|r| r.collection_date),
                uptime_secs,
            }),
        ),
        Err(e) => {
            warn!("[HEALTH] store check failed: {e}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded",
                    database: false,
                    snapshots: 0,
                    latest_snapshot: None,
                    uptime_secs,
                }),
            )
        }
    }
}
