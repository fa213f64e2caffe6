use chrono::NaiveDate;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::SnapshotStore;
use crate::detector::Comparator;
use crate::error::CompareError;
use crate::jobs::JobError;
use crate::notify::{AlertMessage, DeliveryOutcome, NotifierRegistry};
use crate::types::ComparisonReport;

#[derive(Debug)]
pub struct CompareSummary {
    pub baseline_date: NaiveDate,
    pub current_date: NaiveDate,
    /// None when one side of the window had no snapshot.
    pub report: Option<ComparisonReport>,
    pub missing: Option<NaiveDate>,
    pub deliveries: Vec<DeliveryOutcome>,
}

impl CompareSummary {
    pub fn log(&self) {
        let sent = self.deliveries.iter().filter(|d| d.is_ok()).count();
        let failed = self.deliveries.len() - sent;
        match (&self.report, self.missing) {
            (Some(report), _) => info!(
                event = "COMPARE_SUMMARY",
                baseline = %self.baseline_date,
                current = %self.current_date,
                alerts = report.alerts.len(),
                sent,
                failed,
                "[SUMMARY] {} -> {}: {} matched, {} alerts, {} excluded, {} added, {} removed | notifications sent {sent}, failed {failed}",
                self.baseline_date,
                self.current_date,
                report.matched,
                report.alerts.len(),
                report.excluded.len(),
                report.added.len(),
                report.removed.len(),
            ),
            (None, Some(missing)) => warn!(
                event = "COMPARE_SUMMARY",
                baseline = %self.baseline_date,
                current = %self.current_date,
                "[SUMMARY] {} -> {}: no snapshot for {missing}, comparison skipped | notifications sent {sent}, failed {failed}",
                self.baseline_date,
                self.current_date,
            ),
            (None, None) => {}
        }
    }
}

/// Compare the configured window and notify every channel when anything
/// crossed the threshold. A missing snapshot is reported, not fatal.
pub async fn run_comparison(
    cfg: &Config,
    store: &dyn SnapshotStore,
    notifiers: &NotifierRegistry,
    today: NaiveDate,
) -> Result<CompareSummary, JobError> {
    let (baseline_date, current_date) = cfg.comparison_window(today)?;
    let comparator = Comparator::new(cfg.threshold_pct);

    let mut summary = CompareSummary {
        baseline_date,
        current_date,
        report: None,
        missing: None,
        deliveries: Vec::new(),
    };

    match comparator.run(store, baseline_date, current_date).await {
        Ok(report) => {
            if report.has_alerts() {
                let message = AlertMessage::Alerts(report.clone());
                summary.deliveries = notifiers.deliver(&message).await;
            } else {
                info!("[COMPARE] no odds moved by {}% or more", cfg.threshold_pct);
            }
            summary.report = Some(report);
        }
        Err(e) if e.is_missing_data() => {
            let missing = match &e {
                CompareError::NoBaselineData(d) | CompareError::NoCurrentData(d) => *d,
                _ => current_date,
            };
            warn!(event = "SNAPSHOT_MISSING", date = %missing, "[COMPARE] {e}");
            if cfg.alert_on_missing_snapshot {
                let message = AlertMessage::MissingSnapshot {
                    baseline_date,
                    current_date,
                    missing,
                };
                summary.deliveries = notifiers.deliver(&message).await;
            }
            summary.missing = Some(missing);
        }
        Err(e) => return Err(e.into()),
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AlertFormat, SnapshotPolicy};
    use crate::db::{memory_pool, SnapshotLoader, SqliteSink};
    use crate::error::{LoadError, NotifyError};
    use crate::jobs::EXIT_FAILURE;
    use crate::types::Snapshot;
    use crate::notify::Notifier;
    use crate::sink::Sink;
    use crate::types::fixtures::{date, record, snapshot};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<AlertMessage>>>);

    #[async_trait]
    impl Notifier for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn format(&self) -> AlertFormat {
            AlertFormat::Text
        }

        async fn send(&self, message: &AlertMessage) -> Result<(), NotifyError> {
            self.0.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    fn config(extra: &[(&str, &str)]) -> Config {
        let vars: Vec<(String, String)> = extra.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|k| vars.iter().find(|(n, _)| n == k).map(|(_, v)| v.clone())).unwrap()
    }

    async fn store(days: &[(&str, f64)]) -> SnapshotLoader {
        let pool = memory_pool().await;
        let sink = SqliteSink::new(pool.clone(), SnapshotPolicy::Reject);
        for (day, price) in days {
            sink.write(&snapshot(day, vec![record("Arsenal", "Chelsea", "1X2", "Home", *price)]))
                .await
                .unwrap();
        }
        SnapshotLoader::new(pool)
    }

    fn registry() -> (NotifierRegistry, Recorder) {
        let recorder = Recorder::default();
        let mut registry = NotifierRegistry::new();
        registry.register(Box::new(recorder.clone()));
        (registry, recorder)
    }

    #[tokio::test]
    async fn alerts_are_delivered_for_yesterday_vs_today() {
        let loader = store(&[("2025-03-01", 2.0), ("2025-03-02", 2.5)]).await;
        let (registry, recorder) = registry();

        let summary = run_comparison(&config(&[]), &loader, &registry, date("2025-03-02"))
            .await
            .unwrap();

        assert_eq!(summary.baseline_date, date("2025-03-01"));
        assert_eq!(summary.deliveries.len(), 1);
        let sent = recorder.0.lock().unwrap();
        assert!(matches!(&sent[0], AlertMessage::Alerts(r) if r.alerts.len() == 1));
    }

    #[tokio::test]
    async fn quiet_day_sends_nothing() {
        let loader = store(&[("2025-03-01", 2.0), ("2025-03-02", 2.1)]).await;
        let (registry, recorder) = registry();

        let summary = run_comparison(&config(&[]), &loader, &registry, date("2025-03-02"))
            .await
            .unwrap();

        assert!(summary.report.is_some());
        assert!(summary.deliveries.is_empty());
        assert!(recorder.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_baseline_is_reported_without_notifying_by_default() {
        let loader = store(&[("2025-03-02", 2.0)]).await;
        let (registry, recorder) = registry();

        let summary = run_comparison(&config(&[]), &loader, &registry, date("2025-03-02"))
            .await
            .unwrap();

        assert_eq!(summary.missing, Some(date("2025-03-01")));
        assert!(summary.report.is_none());
        assert!(recorder.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_snapshot_notice_when_enabled() {
        let loader = store(&[("2025-03-01", 2.0)]).await;
        let (registry, recorder) = registry();
        let cfg = config(&[("ALERT_ON_MISSING_SNAPSHOT", "true")]);

        let summary = run_comparison(&cfg, &loader, &registry, date("2025-03-02")).await.unwrap();

        assert_eq!(summary.missing, Some(date("2025-03-02")));
        let sent = recorder.0.lock().unwrap();
        assert!(matches!(
            &sent[0],
            AlertMessage::MissingSnapshot { missing, .. } if *missing == date("2025-03-02")
        ));
    }

    #[tokio::test]
    async fn explicit_window_overrides_today() {
        let loader = store(&[("2025-02-20", 2.0), ("2025-02-27", 3.0)]).await;
        let (registry, _) = registry();
        let cfg = config(&[("BASELINE_DATE", "2025-02-20"), ("CURRENT_DATE", "2025-02-27")]);

        let summary = run_comparison(&cfg, &loader, &registry, date("2025-03-02")).await.unwrap();
        assert_eq!(summary.current_date, date("2025-02-27"));
        assert_eq!(summary.report.unwrap().alerts[0].direction, crate::types::Direction::Drift);
    }

    struct UnreachableStore;

    #[async_trait]
    impl SnapshotStore for UnreachableStore {
        async fn load(&self, _date: NaiveDate) -> Result<Snapshot, LoadError> {
            Err(LoadError::Database(sqlx::Error::PoolTimedOut))
        }
    }

    #[tokio::test]
    async fn store_failure_fails_the_job_without_notifying() {
        let (registry, recorder) = registry();

        let err = run_comparison(&config(&[]), &UnreachableStore, &registry, date("2025-03-02"))
            .await
            .unwrap_err();

        assert!(matches!(err, JobError::Compare(CompareError::Load(_))));
        assert_eq!(err.exit_code(), EXIT_FAILURE);
        assert!(recorder.0.lock().unwrap().is_empty());
    }
}
