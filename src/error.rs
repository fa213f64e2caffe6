use axum::{http::StatusCode, response::IntoResponse};
use chrono::NaiveDate;
use thiserror::Error;

use crate::types::OddsKey;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored snapshot is inconsistent: {0}")]
    Snapshot(#[from] SnapshotError),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("duplicate odds for {key} on {date}")]
    DuplicateKey { date: NaiveDate, key: OddsKey },
}

/// Failure to collect odds from the bookmaker. Any of these aborts the run
/// before anything is persisted.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    #[error("transport error for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("unexpected page structure at {url}: {reason}")]
    Structure { url: String, reason: String },

    #[error("parse error at {url}: {reason}")]
    Parse { url: String, reason: String },

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

impl FetchError {
    /// Classify a reqwest failure, keeping timeouts apart from other transport errors.
    pub fn from_reqwest(url: &str, timeout_secs: u64, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else if let Some(status) = e.status() {
            FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                source: e,
            }
        }
    }

    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout { .. } | FetchError::Transport { .. } => true,
            FetchError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// A sink failed to persist a snapshot.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("snapshot for {0} already exists")]
    SnapshotExists(NaiveDate),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("remote rejected write: HTTP {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("skipped: snapshot for {0} was already stored by another run")]
    Skipped(NaiveDate),
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no snapshot stored for {0}")]
    Missing(NaiveDate),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Corrupt(#[from] SnapshotError),
}

impl From<LoadError> for AppError {
    fn from(e: LoadError) -> Self {
        match e {
            LoadError::Missing(date) => AppError::NotFound(format!("no snapshot stored for {date}")),
            LoadError::Database(e) => AppError::Database(e),
            LoadError::Corrupt(e) => AppError::Snapshot(e),
        }
    }
}

#[derive(Debug, Error)]
pub enum CompareError {
    #[error("no baseline data: no snapshot stored for {0}")]
    NoBaselineData(NaiveDate),

    #[error("no current data: no snapshot stored for {0}")]
    NoCurrentData(NaiveDate),

    #[error("failed to load snapshot: {0}")]
    Load(LoadError),
}

impl CompareError {
    /// Missing data is an expected gap, not a failure of the run.
    pub fn is_missing_data(&self) -> bool {
        matches!(
            self,
            CompareError::NoBaselineData(_) | CompareError::NoCurrentData(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("channel rejected message: {0}")]
    Rejected(String),

    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}
