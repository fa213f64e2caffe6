use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::config::{Config, SinkKind, SnapshotPolicy};
use crate::db::SnapshotLoader;
use crate::fetcher::{FetchStats, OddsFetcher};
use crate::jobs::{JobError, EXIT_OK, EXIT_SINK_FAILED};
use crate::sink::{build_sinks, fan_out_gated, Sink, SinkOutcome};

#[derive(Debug)]
pub struct CollectSummary {
    pub date: NaiveDate,
    /// The store already held this date, either before fetching or when
    /// this run tried to write it.
    pub already_collected: bool,
    pub stats: FetchStats,
    pub sinks: Vec<SinkOutcome>,
}

impl CollectSummary {
    pub fn failed_sinks(&self) -> Vec<&str> {
        self.sinks
            .iter()
            .filter(|o| !o.is_ok())
            .map(|o| o.sink.as_str())
            .collect()
    }

    pub fn exit_code(&self) -> i32 {
        if self.already_collected || self.failed_sinks().is_empty() {
            EXIT_OK
        } else {
            EXIT_SINK_FAILED
        }
    }

    pub fn log(&self) {
        if self.already_collected {
            info!("[SUMMARY] {}: already collected, nothing written", self.date);
            return;
        }
        let ok = self.sinks.iter().filter(|o| o.is_ok()).count();
        info!(
            event = "COLLECT_SUMMARY",
            date = %self.date,
            records = self.stats.records,
            matches = self.stats.matches,
            sinks_ok = ok,
            sinks_failed = self.sinks.len() - ok,
            "[SUMMARY] {}: {} odds across {} matches from {} pages | sinks ok {}/{}",
            self.date,
            self.stats.records,
            self.stats.matches,
            self.stats.pages,
            ok,
            self.sinks.len(),
        );
        for name in self.failed_sinks() {
            warn!("[SUMMARY] sink {name} did not store {}", self.date);
        }
    }
}

/// Fetch today's odds and hand the snapshot to every configured sink.
/// Nothing is written unless every source page was fetched and parsed.
/// Under `Reject` the SQLite sink is written first and decides whether the
/// date is new; an overlapping run that loses there writes nothing else.
pub async fn run_collection(
    cfg: &Config,
    pool: &SqlitePool,
    date: NaiveDate,
    now: DateTime<Utc>,
) -> Result<CollectSummary, JobError> {
    if cfg.snapshot_policy == SnapshotPolicy::Reject
        && cfg.sink_enabled(SinkKind::Sqlite)
        && SnapshotLoader::new(pool.clone()).exists(date).await?
    {
        warn!(
            event = "ALREADY_COLLECTED",
            date = %date,
            "[COLLECT] snapshot for {date} already stored; set SNAPSHOT_POLICY=replace to overwrite"
        );
        return Ok(CollectSummary {
            date,
            already_collected: true,
            stats: FetchStats::default(),
            sinks: Vec::new(),
        });
    }

    let sinks = build_sinks(cfg, pool)?;
    let fetcher = OddsFetcher::new(&cfg.fetch)?;
    info!(
        "[COLLECT] {date}: {} source pages, sinks [{}]",
        cfg.fetch.source_urls.len(),
        sinks.iter().map(|s| s.name()).collect::<Vec<_>>().join(", ")
    );

    let (gate, rest): (Vec<Box<dyn Sink>>, Vec<Box<dyn Sink>>) = match cfg.snapshot_policy {
        SnapshotPolicy::Reject => {
            let sqlite = SinkKind::Sqlite.to_string();
            sinks.into_iter().partition(|s| s.name() == sqlite)
        }
        SnapshotPolicy::Replace => (Vec::new(), sinks),
    };

    let (snapshot, stats) = fetcher.collect(date, now).await?;
    let (already_collected, outcomes) = fan_out_gated(&gate, &rest, &snapshot).await;

    Ok(CollectSummary {
        date,
        already_collected,
        stats,
        sinks: outcomes,
    })
}
