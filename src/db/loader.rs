use async_trait::async_trait;
use chrono::NaiveDate;

use crate::db::models::{OddsRow, SnapshotRow};
use crate::error::LoadError;
use crate::types::{OddsRecord, Snapshot};

/// Read access to stored snapshots, as needed by the comparator.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// The snapshot collected on `date`, or `LoadError::Missing`.
    async fn load(&self, date: NaiveDate) -> Result<Snapshot, LoadError>;
}

/// Read-only queries over the SQLite snapshot tables.
#[derive(Clone)]
pub struct SnapshotLoader {
    pool: sqlx::SqlitePool,
}

impl SnapshotLoader {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn exists(&self, date: NaiveDate) -> Result<bool, LoadError> {
        Ok(self.summary(date).await?.is_some())
    }

    pub async fn summary(&self, date: NaiveDate) -> Result<Option<SnapshotRow>, LoadError> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT collection_date, collected_at, record_count, match_count
            FROM snapshots
            WHERE collection_date = ?
            "#,
        )
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// All stored snapshots, newest first.
    pub async fn list(&self) -> Result<Vec<SnapshotRow>, LoadError> {
        let rows = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT collection_date, collected_at, record_count, match_count
            FROM snapshots
            ORDER BY collection_date DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl SnapshotStore for SnapshotLoader {
    async fn load(&self, date: NaiveDate) -> Result<Snapshot, LoadError> {
        if !self.exists(date).await? {
            return Err(LoadError::Missing(date));
        }

        let rows = sqlx::query_as::<_, OddsRow>(
            r#"
            SELECT league, home_team, away_team, kickoff,
                   market, selection, price, collected_at
            FROM odds
            WHERE collection_date = ?
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        let records: Vec<OddsRecord> = rows.into_iter().map(OddsRecord::from).collect();
        Ok(Snapshot::new(date, records)?)
    }
}
