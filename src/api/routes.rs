use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::api::health::{get_health, HealthState};
use crate::config::DEFAULT_THRESHOLD_PCT;
use crate::db::models::SnapshotRow;
use crate::db::{SnapshotLoader, SnapshotStore};
use crate::detector::compare_snapshots;
use crate::error::AppError;
use crate::types::{AlertEntry, OddsKey, OddsRecord};

const DEFAULT_MOVEMENTS_LIMIT: usize = 50;
const MAX_MOVEMENTS_LIMIT: usize = 500;

#[derive(Clone)]
pub struct ApiState {
    pub loader: SnapshotLoader,
    pub health: Arc<HealthState>,
}

impl ApiState {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self {
            loader: SnapshotLoader::new(pool),
            health: Arc::new(HealthState::new()),
        }
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/snapshots", get(get_snapshots))
        .route("/snapshots/:date", get(get_snapshot))
        .route("/movements", get(get_movements))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

/// Case-insensitive substring filters shared by the record and movement views.
#[derive(Debug, Default, Deserialize)]
pub struct KeyFilter {
    #[serde(rename = "match")]
    pub match_name: Option<String>,
    pub market: Option<String>,
}

impl KeyFilter {
    fn accepts(&self, key: &OddsKey) -> bool {
        fn contains(haystack: &str, needle: &Option<String>) -> bool {
            needle
                .as_deref()
                .map_or(true, |n| haystack.to_lowercase().contains(&n.to_lowercase()))
        }
        contains(&key.match_key.label(), &self.match_name) && contains(&key.market, &self.market)
    }
}

#[derive(Debug, Deserialize)]
pub struct MovementsQuery {
    pub baseline: Option<NaiveDate>,
    pub current: Option<NaiveDate>,
    pub min_change: Option<f64>,
    pub limit: Option<usize>,
    #[serde(rename = "match")]
    pub match_name: Option<String>,
    pub market: Option<String>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct SnapshotResponse {
    pub date: NaiveDate,
    pub count: usize,
    pub records: Vec<OddsRecord>,
}

#[derive(Serialize)]
pub struct MovementsResponse {
    pub baseline_date: NaiveDate,
    pub current_date: NaiveDate,
    pub min_change: f64,
    pub matched: usize,
    /// Movements over `min_change` after filtering, before `limit`.
    pub total: usize,
    pub added: usize,
    pub removed: usize,
    pub excluded: usize,
    pub movements: Vec<AlertEntry>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_snapshots(State(state): State<ApiState>) -> Result<Json<Vec<SnapshotRow>>, AppError> {
    Ok(Json(state.loader.list().await?))
}

async fn get_snapshot(
    State(state): State<ApiState>,
    Path(date): Path<NaiveDate>,
    Query(filter): Query<KeyFilter>,
) -> Result<Json<SnapshotResponse>, AppError> {
    let snapshot = state.loader.load(date).await?;
    let records: Vec<OddsRecord> = snapshot
        .records()
        .iter()
        .filter(|r| filter.accepts(&r.key()))
        .cloned()
        .collect();

    Ok(Json(SnapshotResponse {
        date,
        count: records.len(),
        records,
    }))
}

async fn get_movements(
    State(state): State<ApiState>,
    Query(params): Query<MovementsQuery>,
) -> Result<Json<MovementsResponse>, AppError> {
    let (baseline_date, current_date) = match (params.baseline, params.current) {
        (Some(b), Some(c)) => (b, c),
        (b, c) => {
            // Fill the gaps from the two most recent stored dates.
            let dates: Vec<NaiveDate> = state
                .loader
                .list()
                .await?
                .into_iter()
                .map(|r| r.collection_date)
                .collect();
            let current = match c {
                Some(c) => c,
                None => *dates
                    .first()
                    .ok_or_else(|| AppError::NotFound("no snapshots stored".into()))?,
            };
            let baseline = match b {
                Some(b) => b,
                None => dates.into_iter().find(|d| *d < current).ok_or_else(|| {
                    AppError::NotFound(format!("no snapshot stored before {current}"))
                })?,
            };
            (baseline, current)
        }
    };
    if baseline_date >= current_date {
        return Err(AppError::BadRequest(format!(
            "baseline {baseline_date} must be earlier than current {current_date}"
        )));
    }

    let min_change = params.min_change.unwrap_or(DEFAULT_THRESHOLD_PCT);
    if !min_change.is_finite() || min_change < 0.0 {
        return Err(AppError::BadRequest(format!("invalid min_change {min_change}")));
    }
    let limit = params
        .limit
        .unwrap_or(DEFAULT_MOVEMENTS_LIMIT)
        .clamp(1, MAX_MOVEMENTS_LIMIT);

    let baseline = state.loader.load(baseline_date).await?;
    let current = state.loader.load(current_date).await?;
    let report = compare_snapshots(&baseline, &current, min_change);

    let filter = KeyFilter {
        match_name: params.match_name,
        market: params.market,
    };
    let mut movements: Vec<AlertEntry> = report
        .alerts
        .into_iter()
        .filter(|a| filter.accepts(&a.key))
        .collect();
    let total = movements.len();
    movements.truncate(limit);

    Ok(Json(MovementsResponse {
        baseline_date,
        current_date,
        min_change,
        matched: report.matched,
        total,
        added: report.added.len(),
        removed: report.removed.len(),
        excluded: report.excluded.len(),
        movements,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SnapshotPolicy;
    use crate::db::{memory_pool, SqliteSink};
    use crate::sink::Sink;
    use crate::types::fixtures::{record, snapshot};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    async fn app_with_data() -> Router {
        let pool = memory_pool().await;
        let sink = SqliteSink::new(pool.clone(), SnapshotPolicy::Reject);
        sink.write(&snapshot(
            "2025-03-01",
            vec![
                record("Arsenal", "Chelsea", "1X2", "Home", 2.0),
                record("Arsenal", "Chelsea", "Over/Under 2.5", "Over", 1.9),
                record("Liverpool", "Everton", "1X2", "Away", 4.0),
            ],
        ))
        .await
        .unwrap();
        sink.write(&snapshot(
            "2025-03-02",
            vec![
                record("Arsenal", "Chelsea", "1X2", "Home", 2.5),
                record("Arsenal", "Chelsea", "Over/Under 2.5", "Over", 1.95),
                record("Liverpool", "Everton", "1X2", "Away", 2.8),
            ],
        ))
        .await
        .unwrap();
        router(ApiState::new(pool))
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::String(
            String::from_utf8_lossy(&bytes).into_owned(),
        ));
        (status, body)
    }

    #[tokio::test]
    async fn health_reports_latest_snapshot() {
        let (status, body) = get(app_with_data().await, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["snapshots"], 2);
        assert_eq!(body["latest_snapshot"], "2025-03-02");
    }

    #[tokio::test]
    async fn snapshots_are_listed_newest_first() {
        let (status, body) = get(app_with_data().await, "/snapshots").await;
        assert_eq!(status, StatusCode::OK);
        let list = body.as_array().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0]["collection_date"], "2025-03-02");
        assert_eq!(list[0]["record_count"], 3);
        assert_eq!(list[0]["match_count"], 2);
    }

    #[tokio::test]
    async fn snapshot_records_can_be_filtered() {
        let (status, body) = get(app_with_data().await, "/snapshots/2025-03-01?match=arsenal&market=1x2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["records"][0]["selection"], "Home");
        assert_eq!(body["records"][0]["match"]["home"], "Arsenal");
    }

    #[tokio::test]
    async fn unknown_snapshot_is_not_found() {
        let (status, _) = get(app_with_data().await, "/snapshots/2024-12-25").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn movements_default_to_latest_two_dates() {
        let (status, body) = get(app_with_data().await, "/movements").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["baseline_date"], "2025-03-01");
        assert_eq!(body["current_date"], "2025-03-02");
        assert_eq!(body["matched"], 3);
        // Over 1.90 -> 1.95 is +2.6%, below the default 10%.
        let moves = body["movements"].as_array().unwrap();
        assert_eq!(moves.len(), 2);
        assert_eq!(moves[0]["direction"], "shorten");
        assert_eq!(moves[1]["direction"], "drift");
    }

    #[tokio::test]
    async fn movements_honour_filters_and_limit() {
        let (_, body) = get(app_with_data().await, "/movements?min_change=1&limit=1").await;
        assert_eq!(body["total"], 3);
        assert_eq!(body["movements"].as_array().unwrap().len(), 1);

        let (_, body) = get(app_with_data().await, "/movements?min_change=1&market=over").await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["movements"][0]["key"]["selection"], "Over");
    }

    #[tokio::test]
    async fn movements_reject_reversed_window() {
        let (status, _) = get(
            app_with_data().await,
            "/movements?baseline=2025-03-02&current=2025-03-01",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
