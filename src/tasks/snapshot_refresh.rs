use crate::db::SqliteStore;
use log::{debug, error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

// Other clients write to the same database; pick their changes up on a timer.
pub async fn refresh_snapshots_task(store: Arc<SqliteStore>, every: Duration) {
    info!("Starting background task to refresh the poll every {:?}...", every);
    let mut interval = interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        match store.refresh().await {
            Ok(true) => debug!("Poll changed; published new snapshot"),
            Ok(false) => {}
            Err(e) => error!("Failed to refresh poll snapshot: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::OptionStore;
    use crate::models::{OptionName, PollOption};

    #[tokio::test]
    async fn picks_up_writes_made_behind_the_stores_back() {
        let store = Arc::new(SqliteStore::connect("sqlite::memory:").await.unwrap());
        let mut changes = store.subscribe();

        // Simulates another process writing to the shared database
        sqlx::query("INSERT INTO options (name, vote_count, created_at) VALUES (?, 0, ?)")
            .bind("Oslo")
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(store.pool())
            .await
            .unwrap();

        let task = tokio::spawn(refresh_snapshots_task(Arc::clone(&store), Duration::from_millis(10)));
        changes.changed().await.unwrap();
        task.abort();

        let snapshot = changes.borrow_and_update().clone();
        assert_eq!(
            snapshot.options,
            vec![PollOption {
                created_at: snapshot.options[0].created_at,
                ..PollOption::new(OptionName::parse("Oslo").unwrap())
            }]
        );
    }
}
