use chrono::{DateTime, NaiveDate, Utc};
use odds_tracker::types::AlertEntry;
use serde::Deserialize;

// ---------------------------------------------------------------------------
// API response types (mirror api/routes.rs shapes)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotSummary {
    pub collection_date: NaiveDate,
    pub collected_at: DateTime<Utc>,
    pub record_count: i64,
    pub match_count: i64,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct HealthResponse {
    pub status: String,
    pub database: bool,
    pub snapshots: usize,
    pub latest_snapshot: Option<NaiveDate>,
    pub uptime_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MovementsResponse {
    pub baseline_date: NaiveDate,
    pub current_date: NaiveDate,
    pub min_change: f64,
    pub matched: usize,
    pub total: usize,
    pub added: usize,
    pub removed: usize,
    pub excluded: usize,
    pub movements: Vec<AlertEntry>,
}

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    Connected,
    Error(String),
    Connecting,
}

pub const THRESHOLD_STEP: f64 = 5.0;

#[derive(Debug, Clone)]
pub struct AppState {
    pub status: ConnectionStatus,
    pub health: HealthResponse,
    /// Newest first, as served.
    pub snapshots: Vec<SnapshotSummary>,
    /// Index into `snapshots` used as the current side of the comparison.
    pub selected: usize,
    pub movements: Option<MovementsResponse>,
    /// Why `movements` is empty, e.g. no earlier snapshot to compare with.
    pub movements_note: Option<String>,
    pub min_change: f64,
    pub last_refresh: std::time::Instant,
    pub base_url: String,
}

impl AppState {
    pub fn new(base_url: String, min_change: f64) -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            health: HealthResponse::default(),
            snapshots: Vec::new(),
            selected: 0,
            movements: None,
            movements_note: None,
            min_change,
            last_refresh: std::time::Instant::now(),
            base_url,
        }
    }

    pub fn selected_date(&self) -> Option<NaiveDate> {
        self.snapshots.get(self.selected).map(|s| s.collection_date)
    }

    pub fn select_next(&mut self) {
        let max = self.snapshots.len().saturating_sub(1);
        self.selected = (self.selected + 1).min(max);
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn raise_threshold(&mut self) {
        self.min_change += THRESHOLD_STEP;
    }

    pub fn lower_threshold(&mut self) {
        self.min_change = (self.min_change - THRESHOLD_STEP).max(0.0);
    }

    pub fn movements_url(&self) -> String {
        let mut url = format!("{}/movements?min_change={}&limit=200", self.base_url, self.min_change);
        if let Some(date) = self.selected_date() {
            url.push_str(&format!("&current={date}"));
        }
        url
    }

    pub async fn refresh(&mut self, client: &reqwest::Client) {
        let snapshots_url = format!("{}/snapshots", self.base_url);
        let health_url = format!("{}/health", self.base_url);

        let (snapshots_res, health_res) = tokio::join!(
            client.get(&snapshots_url).send(),
            client.get(&health_url).send(),
        );

        let snapshots = match snapshots_res {
            Ok(resp) => resp.json::<Vec<SnapshotSummary>>().await,
            Err(e) => {
                self.status = ConnectionStatus::Error(format!("{e}"));
                return;
            }
        };
        match snapshots {
            Ok(s) => {
                self.snapshots = s;
                self.selected = self.selected.min(self.snapshots.len().saturating_sub(1));
            }
            Err(e) => {
                self.status = ConnectionStatus::Error(format!("parse error: {e}"));
                return;
            }
        }
        if let Ok(h) = health_res {
            if let Ok(health) = h.json::<HealthResponse>().await {
                self.health = health;
            }
        }

        self.refresh_movements(client).await;
        self.status = ConnectionStatus::Connected;
        self.last_refresh = std::time::Instant::now();
    }

    pub async fn refresh_movements(&mut self, client: &reqwest::Client) {
        match client.get(self.movements_url()).send().await {
            Ok(resp) if resp.status().is_success() => match resp.json::<MovementsResponse>().await {
                Ok(m) => {
                    self.movements = Some(m);
                    self.movements_note = None;
                }
                Err(e) => {
                    self.movements = None;
                    self.movements_note = Some(format!("parse error: {e}"));
                }
            },
            Ok(resp) => {
                self.movements = None;
                self.movements_note = Some(resp.text().await.unwrap_or_default());
            }
            Err(e) => {
                self.movements = None;
                self.movements_note = Some(format!("{e}"));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

pub fn format_change(pct: f64) -> String {
    format!("{pct:+.2}%")
}

pub fn format_uptime(secs: u64) -> String {
    match secs {
        s if s >= 3600 => format!("{}h{:02}m", s / 3600, (s / 60) % 60),
        s if s >= 60 => format!("{}m{:02}s", s / 60, s % 60),
        s => format!("{s}s"),
    }
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(day: u32) -> SnapshotSummary {
        SnapshotSummary {
            collection_date: NaiveDate::from_ymd_opt(2025, 3, day).unwrap(),
            collected_at: Utc::now(),
            record_count: 10,
            match_count: 3,
        }
    }

    #[test]
    fn selection_stays_in_bounds() {
        let mut app = AppState::new("http://x".into(), 10.0);
        app.select_next();
        assert_eq!(app.selected, 0);
        app.snapshots = vec![summary(3), summary(2)];
        app.select_next();
        app.select_next();
        assert_eq!(app.selected, 1);
        app.select_prev();
        app.select_prev();
        assert_eq!(app.selected, 0);
    }

    #[test]
    fn movements_url_tracks_selection_and_threshold() {
        let mut app = AppState::new("http://x".into(), 10.0);
        assert_eq!(app.movements_url(), "http://x/movements?min_change=10&limit=200");
        app.snapshots = vec![summary(3), summary(2)];
        app.select_next();
        app.lower_threshold();
        app.lower_threshold();
        app.lower_threshold();
        assert_eq!(
            app.movements_url(),
            "http://x/movements?min_change=0&limit=200&current=2025-03-02"
        );
    }

    #[test]
    fn truncate_respects_multibyte_names() {
        assert_eq!(truncate("Beşiktaş vs Galatasaray", 9), "Beşiktaş…");
        assert_eq!(truncate("Arsenal", 10), "Arsenal");
        assert_eq!(format_uptime(3725), "1h02m");
    }
}
