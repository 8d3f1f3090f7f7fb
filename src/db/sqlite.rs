use super::{OptionStore, StoreError};
use crate::models::{OptionName, ParticipantId, PollOption, PollSnapshot};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use sqlx::{migrate::MigrateDatabase, sqlite::{SqlitePool, SqlitePoolOptions}, Row, Sqlite};
use std::collections::BTreeSet;
use tokio::sync::{watch, Mutex};

/// Option store backed by a SQLite file that several client processes can share.
///
/// SQLite has no push notifications, so the change feed is fed by
/// [`SqliteStore::refresh`], called after local writes and on an interval by
/// the refresh task.
pub struct SqliteStore {
    pool: SqlitePool,
    changes: watch::Sender<PollSnapshot>,
    // Serializes load-then-publish so an older read never replaces a newer one
    refreshing: Mutex<()>,
}

impl SqliteStore {
    pub async fn connect(db_url: &str) -> Result<Self, StoreError> {
        let in_memory = db_url.contains(":memory:");

        // Create database if it doesn't exist
        if !in_memory && !Sqlite::database_exists(db_url).await.unwrap_or(false) {
            Sqlite::create_database(db_url).await?;
        }

        // An in-memory database lives only as long as its single connection
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options.connect(db_url).await?;

        Self::init_schema(&pool).await?;

        let initial = Self::load_snapshot(&pool).await?;
        let (changes, _) = watch::channel(initial);
        Ok(Self {
            pool,
            changes,
            refreshing: Mutex::new(()),
        })
    }

    #[cfg(test)]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn init_schema(pool: &SqlitePool) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS options (
                position INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                vote_count INTEGER NOT NULL DEFAULT 0 CHECK (vote_count >= 0),
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS voters (
                option_name TEXT NOT NULL,
                participant_id TEXT NOT NULL,
                PRIMARY KEY (option_name, participant_id),
                FOREIGN KEY (option_name) REFERENCES options(name) ON DELETE CASCADE
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    // Both tables are read inside one transaction so a snapshot never mixes two states
    async fn load_snapshot(pool: &SqlitePool) -> Result<PollSnapshot, StoreError> {
        let mut tx = pool.begin().await?;

        let option_rows = sqlx::query(
            r#"
            SELECT name, vote_count, created_at
            FROM options
            ORDER BY position
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;

        let voter_rows = sqlx::query("SELECT option_name, participant_id FROM voters")
            .fetch_all(&mut *tx)
            .await?;

        tx.commit().await?;

        let mut options = option_rows
            .into_iter()
            .map(|row| {
                parse_option(
                    row.get::<String, _>("name"),
                    row.get::<i64, _>("vote_count"),
                    row.get::<String, _>("created_at"),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        for row in voter_rows {
            let option_name = row.get::<String, _>("option_name");
            let participant = ParticipantId::new(row.get::<String, _>("participant_id"));
            if let Some(option) = options.iter_mut().find(|o| o.name.as_str() == option_name) {
                option.voters.insert(participant);
            }
        }

        Ok(PollSnapshot::new(options))
    }

    /// Re-reads the database and publishes the snapshot if it changed.
    pub async fn refresh(&self) -> Result<bool, StoreError> {
        let _refreshing = self.refreshing.lock().await;
        let snapshot = Self::load_snapshot(&self.pool).await?;
        if *self.changes.borrow() == snapshot {
            return Ok(false);
        }
        self.changes.send_replace(snapshot);
        Ok(true)
    }

    // A failed refresh after a successful write is not the write's failure
    async fn publish(&self) {
        if let Err(e) = self.refresh().await {
            warn!("Failed to refresh poll snapshot after write: {}", e);
        }
    }
}

fn parse_option(name: String, vote_count: i64, created_at: String) -> Result<PollOption, StoreError> {
    let corrupt = |reason: String| StoreError::Corrupt {
        name: name.clone(),
        reason,
    };

    let parsed_name = OptionName::parse(&name).map_err(|e| corrupt(e.to_string()))?;
    let vote_count = u64::try_from(vote_count)
        .map_err(|_| corrupt(format!("negative vote count {}", vote_count)))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| corrupt(format!("Failed to parse created_at: {}", e)))?
        .with_timezone(&Utc);

    Ok(PollOption {
        name: parsed_name,
        vote_count,
        voters: BTreeSet::new(),
        created_at,
    })
}

#[async_trait]
impl OptionStore for SqliteStore {
    async fn snapshot(&self) -> Result<PollSnapshot, StoreError> {
        Self::load_snapshot(&self.pool).await
    }

    async fn get_option(&self, name: &OptionName) -> Result<Option<PollOption>, StoreError> {
        let row = sqlx::query("SELECT name, vote_count, created_at FROM options WHERE name = ?")
            .bind(name.as_str())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut option = parse_option(
            row.get::<String, _>("name"),
            row.get::<i64, _>("vote_count"),
            row.get::<String, _>("created_at"),
        )?;

        option.voters = sqlx::query("SELECT participant_id FROM voters WHERE option_name = ?")
            .bind(name.as_str())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|row| ParticipantId::new(row.get::<String, _>("participant_id")))
            .collect();

        Ok(Some(option))
    }

    async fn insert_option(&self, option: &PollOption) -> Result<bool, StoreError> {
        let vote_count = i64::try_from(option.vote_count).map_err(|_| StoreError::Corrupt {
            name: option.name.to_string(),
            reason: format!("vote count {} out of range", option.vote_count),
        })?;

        let mut tx = self.pool.begin().await?;

        // A name another client already took keeps its row and its votes
        let inserted = sqlx::query(
            r#"
            INSERT INTO options (name, vote_count, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(name) DO NOTHING
            "#,
        )
        .bind(option.name.as_str())
        .bind(vote_count)
        .bind(option.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        for participant in &option.voters {
            sqlx::query("INSERT INTO voters (option_name, participant_id) VALUES (?, ?)")
                .bind(option.name.as_str())
                .bind(participant.as_str())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        self.publish().await;
        Ok(true)
    }

    async fn adjust_votes(&self, name: &OptionName, delta: i64) -> Result<Option<u64>, StoreError> {
        // Single statement, so concurrent adjustments from other clients never get lost
        let new_count: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE options
            SET vote_count = MAX(vote_count + ?, 0)
            WHERE name = ?
            RETURNING vote_count
            "#,
        )
        .bind(delta)
        .bind(name.as_str())
        .fetch_optional(&self.pool)
        .await?;

        debug!("Adjusted votes for \"{}\" by {}: {:?}", name, delta, new_count);
        self.publish().await;

        new_count
            .map(|count| {
                u64::try_from(count).map_err(|_| StoreError::Corrupt {
                    name: name.to_string(),
                    reason: format!("negative vote count {}", count),
                })
            })
            .transpose()
    }

    async fn add_voter(&self, name: &OptionName, participant: &ParticipantId) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO voters (option_name, participant_id)
            SELECT ?, ?
            WHERE EXISTS (SELECT 1 FROM options WHERE name = ?)
            "#,
        )
        .bind(name.as_str())
        .bind(participant.as_str())
        .bind(name.as_str())
        .execute(&self.pool)
        .await?;

        self.publish().await;
        Ok(())
    }

    async fn remove_voter(&self, name: &OptionName, participant: &ParticipantId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM voters WHERE option_name = ? AND participant_id = ?")
            .bind(name.as_str())
            .bind(participant.as_str())
            .execute(&self.pool)
            .await?;

        self.publish().await;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM voters").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM options").execute(&mut *tx).await?;
        tx.commit().await?;

        self.publish().await;
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<PollSnapshot> {
        self.changes.subscribe()
    }
}
