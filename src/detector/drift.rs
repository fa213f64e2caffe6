use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::info;

use crate::db::SnapshotStore;
use crate::detector::classifier::{classify, PairClass};
use crate::error::{CompareError, LoadError};
use crate::types::{AlertEntry, ComparisonReport, ExcludedPair, OddsKey, OddsRecord, Snapshot};

/// Align two snapshots by outcome key and report every matched pair whose
/// price moved by at least `threshold_pct` percent.
///
/// Alerts are ordered by descending absolute change, ties by ascending key,
/// so the same inputs always produce the same report. Keys present on only
/// one side are listed in `added` / `removed` and never compared.
pub fn compare_snapshots(baseline: &Snapshot, current: &Snapshot, threshold_pct: f64) -> ComparisonReport {
    let base: BTreeMap<OddsKey, &OddsRecord> = baseline.records().iter().map(|r| (r.key(), r)).collect();
    let cur: BTreeMap<OddsKey, &OddsRecord> = current.records().iter().map(|r| (r.key(), r)).collect();

    let mut matched = 0;
    let mut alerts = Vec::new();
    let mut excluded = Vec::new();
    let mut added = Vec::new();

    for (key, now) in &cur {
        let Some(before) = base.get(key) else {
            added.push(key.clone());
            continue;
        };
        matched += 1;
        match classify(before.price, now.price, threshold_pct) {
            PairClass::Alert { change_pct, direction } => alerts.push(AlertEntry {
                key: key.clone(),
                previous_price: before.price,
                current_price: now.price,
                change_pct,
                direction,
            }),
            PairClass::Excluded(reason) => excluded.push(ExcludedPair {
                key: key.clone(),
                previous_price: before.price,
                current_price: now.price,
                reason,
            }),
            PairClass::Below { .. } => {}
        }
    }

    let removed: Vec<OddsKey> = base.keys().filter(|k| !cur.contains_key(*k)).cloned().collect();

    alerts.sort_by(|a, b| {
        b.change_pct
            .abs()
            .total_cmp(&a.change_pct.abs())
            .then_with(|| a.key.cmp(&b.key))
    });

    ComparisonReport {
        baseline_date: baseline.date(),
        current_date: current.date(),
        threshold_pct,
        matched,
        alerts,
        excluded,
        added,
        removed,
    }
}

/// Loads a pair of snapshots from a store and compares them.
#[derive(Debug, Clone, Copy)]
pub struct Comparator {
    threshold_pct: f64,
}

impl Comparator {
    pub fn new(threshold_pct: f64) -> Self {
        Self { threshold_pct }
    }

    pub async fn run(
        &self,
        store: &dyn SnapshotStore,
        baseline_date: NaiveDate,
        current_date: NaiveDate,
    ) -> Result<ComparisonReport, CompareError> {
        let baseline = store.load(baseline_date).await.map_err(|e| match e {
            LoadError::Missing(d) => CompareError::NoBaselineData(d),
            other => CompareError::Load(other),
        })?;
        let current = store.load(current_date).await.map_err(|e| match e {
            LoadError::Missing(d) => CompareError::NoCurrentData(d),
            other => CompareError::Load(other),
        })?;

        let report = compare_snapshots(&baseline, &current, self.threshold_pct);
        info!(
            event = "COMPARE_DONE",
            baseline = %baseline_date,
            current = %current_date,
            matched = report.matched,
            alerts = report.alerts.len(),
            excluded = report.excluded.len(),
            added = report.added.len(),
            removed = report.removed.len(),
            "[COMPARE] {baseline_date} -> {current_date}: {} matched, {} alerts at {}%",
            report.matched,
            report.alerts.len(),
            self.threshold_pct,
        );
        Ok(report)
    }
}
