use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;

// ---------------------------------------------------------------------------
// Odds records
// ---------------------------------------------------------------------------

/// Identifies a fixture. Kickoff is kept as the text the page shows.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MatchKey {
    pub home: String,
    pub away: String,
    pub kickoff: String,
}

impl MatchKey {
    pub fn new(home: impl Into<String>, away: impl Into<String>, kickoff: impl Into<String>) -> Self {
        Self {
            home: home.into(),
            away: away.into(),
            kickoff: kickoff.into(),
        }
    }

    /// "Home vs Away", the label used in alerts and on the dashboard.
    pub fn label(&self) -> String {
        format!("{} vs {}", self.home, self.away)
    }
}

impl std::fmt::Display for MatchKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.kickoff.is_empty() {
            write!(f, "{} vs {}", self.home, self.away)
        } else {
            write!(f, "{} vs {} ({})", self.home, self.away, self.kickoff)
        }
    }
}

/// Comparison key: one outcome of one market of one match.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OddsKey {
    #[serde(rename = "match")]
    pub match_key: MatchKey,
    pub market: String,
    pub selection: String,
}

impl std::fmt::Display for OddsKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} | {} | {}", self.match_key, self.market, self.selection)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsRecord {
    pub league: String,
    #[serde(rename = "match")]
    pub match_key: MatchKey,
    pub market: String,
    pub selection: String,
    /// Decimal odds as quoted.
    pub price: f64,
    pub collected_at: DateTime<Utc>,
}

impl OddsRecord {
    pub fn key(&self) -> OddsKey {
        OddsKey {
            match_key: self.match_key.clone(),
            market: self.market.clone(),
            selection: self.selection.clone(),
        }
    }
}

/// Decimal odds at or below 1.0 pay nothing back (suspended or placeholder
/// quotes); those and non-finite values are not comparable.
pub fn is_valid_price(price: f64) -> bool {
    price.is_finite() && price > 1.0
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Every record collected on one date. Keys are unique and records are kept
/// in key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSnapshot")]
pub struct Snapshot {
    date: NaiveDate,
    records: Vec<OddsRecord>,
}

/// Wire form of a snapshot; decoded input is checked by `Snapshot::new`.
#[derive(Deserialize)]
struct RawSnapshot {
    date: NaiveDate,
    records: Vec<OddsRecord>,
}

impl TryFrom<RawSnapshot> for Snapshot {
    type Error = SnapshotError;

    fn try_from(raw: RawSnapshot) -> Result<Self, Self::Error> {
        Snapshot::new(raw.date, raw.records)
    }
}

impl Snapshot {
    pub fn new(date: NaiveDate, mut records: Vec<OddsRecord>) -> Result<Self, SnapshotError> {
        let mut seen = BTreeSet::new();
        for record in &records {
            let key = record.key();
            if !seen.insert(key.clone()) {
                return Err(SnapshotError::DuplicateKey { date, key });
            }
        }
        records.sort_by(|a, b| a.key().cmp(&b.key()));
        Ok(Self { date, records })
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn records(&self) -> &[OddsRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of distinct fixtures in the snapshot.
    pub fn match_count(&self) -> usize {
        self.records
            .iter()
            .map(|r| &r.match_key)
            .collect::<BTreeSet<_>>()
            .len()
    }
}

// ---------------------------------------------------------------------------
// Comparison output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Price went up: the outcome is judged less likely.
    Drift,
    /// Price went down: the outcome is judged more likely.
    Shorten,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Drift => write!(f, "drift"),
            Direction::Shorten => write!(f, "shorten"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEntry {
    pub key: OddsKey,
    pub previous_price: f64,
    pub current_price: f64,
    /// Signed: positive when the price lengthened.
    pub change_pct: f64,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    InvalidBaselinePrice,
    InvalidCurrentPrice,
}

impl std::fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExclusionReason::InvalidBaselinePrice => write!(f, "invalid_baseline_price"),
            ExclusionReason::InvalidCurrentPrice => write!(f, "invalid_current_price"),
        }
    }
}

/// A key present on both dates whose percentage change is undefined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedPair {
    pub key: OddsKey,
    pub previous_price: f64,
    pub current_price: f64,
    pub reason: ExclusionReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub baseline_date: NaiveDate,
    pub current_date: NaiveDate,
    pub threshold_pct: f64,
    /// Keys present in both snapshots, including excluded ones.
    pub matched: usize,
    /// Ordered by descending absolute change.
    pub alerts: Vec<AlertEntry>,
    pub excluded: Vec<ExcludedPair>,
    pub added: Vec<OddsKey>,
    pub removed: Vec<OddsKey>,
}

impl ComparisonReport {
    pub fn has_alerts(&self) -> bool {
        !self.alerts.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::TimeZone;

    pub fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    pub fn record(home: &str, away: &str, market: &str, selection: &str, price: f64) -> OddsRecord {
        OddsRecord {
            league: "Premier League".to_string(),
            match_key: MatchKey::new(home, away, "18:00"),
            market: market.to_string(),
            selection: selection.to_string(),
            price,
            collected_at: Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap(),
        }
    }

    pub fn snapshot(day: &str, records: Vec<OddsRecord>) -> Snapshot {
        Snapshot::new(date(day), records).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn snapshot_rejects_duplicate_key() {
        let err = Snapshot::new(
            date("2025-03-01"),
            vec![
                record("Arsenal", "Chelsea", "1X2", "Home", 2.1),
                record("Arsenal", "Chelsea", "1X2", "Home", 2.2),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, SnapshotError::DuplicateKey { .. }));
    }

    #[test]
    fn snapshot_sorts_records_by_key() {
        let snap = snapshot(
            "2025-03-01",
            vec![
                record("Liverpool", "Everton", "1X2", "Home", 1.5),
                record("Arsenal", "Chelsea", "1X2", "Draw", 3.4),
                record("Arsenal", "Chelsea", "1X2", "Away", 3.2),
            ],
        );
        let selections: Vec<_> = snap.records().iter().map(|r| r.selection.as_str()).collect();
        assert_eq!(selections, vec!["Away", "Draw", "Home"]);
        assert_eq!(snap.match_count(), 2);
    }

    #[test]
    fn decoding_enforces_unique_sorted_keys() {
        let dup = snapshot("2025-03-01", vec![record("Arsenal", "Chelsea", "1X2", "Home", 2.1)]);
        let mut value = serde_json::to_value(&dup).unwrap();
        let first = value["records"][0].clone();
        value["records"].as_array_mut().unwrap().push(first);
        let err = serde_json::from_value::<Snapshot>(value).unwrap_err();
        assert!(err.to_string().contains("duplicate odds"));

        let unsorted = serde_json::json!({
            "date": "2025-03-01",
            "records": [
                serde_json::to_value(record("Liverpool", "Everton", "1X2", "Home", 1.5)).unwrap(),
                serde_json::to_value(record("Arsenal", "Chelsea", "1X2", "Draw", 3.4)).unwrap(),
            ],
        });
        let snap: Snapshot = serde_json::from_value(unsorted).unwrap();
        assert_eq!(snap.records()[0].match_key.home, "Arsenal");
    }

    #[test]
    fn price_validity() {
        assert!(is_valid_price(1.01));
        assert!(!is_valid_price(1.0));
        assert!(!is_valid_price(0.0));
        assert!(!is_valid_price(f64::NAN));
        assert!(!is_valid_price(f64::INFINITY));
    }
}
