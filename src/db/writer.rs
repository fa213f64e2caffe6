use async_trait::async_trait;
use chrono::Utc;
use tracing::warn;

use crate::config::SnapshotPolicy;
use crate::error::SinkError;
use crate::sink::Sink;
use crate::types::Snapshot;

/// Persists snapshots to SQLite. The whole snapshot goes in one transaction,
/// so a date is either fully stored or absent.
pub struct SqliteSink {
    pool: sqlx::SqlitePool,
    policy: SnapshotPolicy,
}

impl SqliteSink {
    pub fn new(pool: sqlx::SqlitePool, policy: SnapshotPolicy) -> Self {
        Self { pool, policy }
    }
}

#[async_trait]
impl Sink for SqliteSink {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn write(&self, snapshot: &Snapshot) -> Result<usize, SinkError> {
        let date = snapshot.date();
        let mut tx = self.pool.begin().await?;

        let existing: Option<i64> =
            sqlx::query_scalar("SELECT record_count FROM snapshots WHERE collection_date = ?")
                .bind(date)
                .fetch_optional(&mut *tx)
                .await?;

        if let Some(count) = existing {
            match self.policy {
                SnapshotPolicy::Reject => return Err(SinkError::SnapshotExists(date)),
                SnapshotPolicy::Replace => {
                    warn!("[DB] replacing snapshot for {date} ({count} rows)");
                    sqlx::query("DELETE FROM odds WHERE collection_date = ?")
                        .bind(date)
                        .execute(&mut *tx)
                        .await?;
                    sqlx::query("DELETE FROM snapshots WHERE collection_date = ?")
                        .bind(date)
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        let collected_at = snapshot
            .records()
            .iter()
            .map(|r| r.collected_at)
            .max()
            .unwrap_or_else(Utc::now);

        sqlx::query(
            r#"
            INSERT INTO snapshots (collection_date, collected_at, record_count, match_count)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(date)
        .bind(collected_at)
        .bind(snapshot.len() as i64)
        .bind(snapshot.match_count() as i64)
        .execute(&mut *tx)
        .await?;

        for r in snapshot.records() {
            sqlx::query(
                r#"
                INSERT INTO odds (
                    collection_date, league, home_team, away_team, kickoff,
                    market, selection, price, collected_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(date)
            .bind(&r.league)
            .bind(&r.match_key.home)
            .bind(&r.match_key.away)
            .bind(&r.match_key.kickoff)
            .bind(&r.market)
            .bind(&r.selection)
            .bind(r.price)
            .bind(r.collected_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(snapshot.len())
    }
}
