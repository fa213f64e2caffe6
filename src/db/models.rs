/// Database row types matching migrations/0001_init.sql.
/// Used by sqlx for typed queries.
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::types::{MatchKey, OddsRecord};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SnapshotRow {
    pub collection_date: NaiveDate,
    pub collected_at: DateTime<Utc>,
    pub record_count: i64,
    pub match_count: i64,
}

#[derive(Debug, sqlx::FromRow)]
pub struct OddsRow {
    pub league: String,
    pub home_team: String,
    pub away_team: String,
    pub kickoff: String,
    pub market: String,
    pub selection: String,
    pub price: f64,
    pub collected_at: DateTime<Utc>,
}

impl From<OddsRow> for OddsRecord {
    fn from(row: OddsRow) -> Self {
        OddsRecord {
            league: row.league,
            match_key: MatchKey {
                home: row.home_team,
                away: row.away_team,
                kickoff: row.kickoff,
            },
            market: row.market,
            selection: row.selection,
            price: row.price,
            collected_at: row.collected_at,
        }
    }
}
