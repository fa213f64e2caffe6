//! Persistence fan-out. Every configured sink receives the same snapshot;
//! one failing sink never stops the others.

pub mod csv_file;
pub mod gsheet;
pub mod json_file;

pub use csv_file::CsvFileSink;
pub use gsheet::GSheetSink;
pub use json_file::JsonFileSink;

use std::io;
use std::path::Path;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::SqlitePool;
use tempfile::NamedTempFile;
use tracing::{error, info, warn};

use crate::config::{Config, SinkKind, SnapshotPolicy};
use crate::db::SqliteSink;
use crate::error::{Result, SinkError};
use crate::types::{OddsRecord, Snapshot};

/// Column layout shared by the CSV file and the cloud sheet.
pub const TABLE_HEADER: [&str; 9] = [
    "Date",
    "League",
    "Home",
    "Away",
    "Kickoff",
    "Market",
    "Selection",
    "Odds",
    "Collected At",
];

pub(crate) fn table_row(snapshot: &Snapshot, r: &OddsRecord) -> Vec<String> {
    vec![
        snapshot.date().to_string(),
        r.league.clone(),
        r.match_key.home.clone(),
        r.match_key.away.clone(),
        r.match_key.kickoff.clone(),
        r.market.clone(),
        r.selection.clone(),
        r.price.to_string(),
        r.collected_at.to_rfc3339(),
    ]
}

/// Temp file beside the target, so the final move stays on one filesystem.
pub(crate) fn temp_beside(path: &Path) -> io::Result<NamedTempFile> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    tempfile::Builder::new().prefix(".odds-").suffix(".tmp").tempfile_in(dir)
}

/// Move a finished temp file onto `path`. Under `Reject` an existing file is
/// never overwritten, even one created after the caller's own check.
pub(crate) fn persist(
    tmp: NamedTempFile,
    path: &Path,
    policy: SnapshotPolicy,
    date: NaiveDate,
) -> std::result::Result<(), SinkError> {
    let persisted = match policy {
        SnapshotPolicy::Reject => tmp.persist_noclobber(path),
        SnapshotPolicy::Replace => tmp.persist(path),
    };
    match persisted {
        Ok(_) => Ok(()),
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Err(SinkError::SnapshotExists(date)),
        Err(e) => Err(SinkError::Io(e.error)),
    }
}

#[async_trait]
pub trait Sink: Send + Sync {
    fn name(&self) -> &str;

    /// Persist the whole snapshot. Returns the number of rows written.
    async fn write(&self, snapshot: &Snapshot) -> std::result::Result<usize, SinkError>;
}

#[derive(Debug)]
pub struct SinkOutcome {
    pub sink: String,
    pub result: std::result::Result<usize, SinkError>,
}

impl SinkOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Write `snapshot` to every sink in order and report each outcome.
pub async fn fan_out(sinks: &[Box<dyn Sink>], snapshot: &Snapshot) -> Vec<SinkOutcome> {
    let mut outcomes = Vec::with_capacity(sinks.len());
    for sink in sinks {
        let result = sink.write(snapshot).await;
        match &result {
            Ok(rows) => info!(
                event = "SINK_WRITE",
                sink = sink.name(),
                rows = *rows,
                "[SINK] {}: wrote {rows} rows for {}",
                sink.name(),
                snapshot.date(),
            ),
            Err(e) => error!(
                event = "SINK_FAILED",
                sink = sink.name(),
                "[SINK] {}: failed for {}: {e}",
                sink.name(),
                snapshot.date(),
            ),
        }
        outcomes.push(SinkOutcome {
            sink: sink.name().to_string(),
            result,
        });
    }
    outcomes
}

/// Write `gate` first and the other sinks only if the gate took the snapshot.
/// When a gate sink already holds the date, every sink in `rest` is reported
/// as skipped and the returned flag is set.
pub async fn fan_out_gated(
    gate: &[Box<dyn Sink>],
    rest: &[Box<dyn Sink>],
    snapshot: &Snapshot,
) -> (bool, Vec<SinkOutcome>) {
    let mut outcomes = fan_out(gate, snapshot).await;
    let taken = outcomes
        .iter()
        .any(|o| matches!(o.result, Err(SinkError::SnapshotExists(_))));
    if taken {
        warn!(
            event = "ALREADY_COLLECTED",
            date = %snapshot.date(),
            "[SINK] {} stored by another run, skipping {} sinks",
            snapshot.date(),
            rest.len(),
        );
        outcomes.extend(rest.iter().map(|s| SinkOutcome {
            sink: s.name().to_string(),
            result: Err(SinkError::Skipped(snapshot.date())),
        }));
    } else {
        outcomes.extend(fan_out(rest, snapshot).await);
    }
    (taken, outcomes)
}

/// Build the enabled sinks in configuration order.
pub fn build_sinks(cfg: &Config, pool: &SqlitePool) -> Result<Vec<Box<dyn Sink>>> {
    let mut sinks: Vec<Box<dyn Sink>> = Vec::new();
    for kind in &cfg.sinks {
        match kind {
            SinkKind::Csv => sinks.push(Box::new(CsvFileSink::new(&cfg.data_dir, cfg.snapshot_policy))),
            SinkKind::Json => sinks.push(Box::new(JsonFileSink::new(&cfg.data_dir, cfg.snapshot_policy))),
            SinkKind::Sqlite => sinks.push(Box::new(SqliteSink::new(pool.clone(), cfg.snapshot_policy))),
            SinkKind::GSheet => match &cfg.gsheet {
                Some(gs) => sinks.push(Box::new(GSheetSink::new(gs.clone(), cfg.fetch.timeout_secs)?)),
                None => warn!(
                    "gsheet sink enabled but GSHEET_SPREADSHEET_ID or GSHEET_ACCESS_TOKEN not set, skipping"
                ),
            },
        }
    }
    Ok(sinks)
}
