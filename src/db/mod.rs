pub mod memory;
pub mod sqlite;

use crate::models::{OptionName, ParticipantId, PollOption, PollSnapshot};
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt record for option \"{name}\": {reason}")]
    Corrupt { name: String, reason: String },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// The shared option store every client reads and mutates.
///
/// Implementations only promise per-call atomicity. Counts must be changed
/// through [`OptionStore::adjust_votes`], never by writing a value computed
/// from an earlier snapshot.
#[async_trait]
pub trait OptionStore: Send + Sync {
    /// One-shot read of the whole poll.
    async fn snapshot(&self) -> Result<PollSnapshot, StoreError>;

    async fn get_option(&self, name: &OptionName) -> Result<Option<PollOption>, StoreError>;

    /// Creates the option unless one with the same name already exists.
    /// Returns `false`, leaving the existing option and its votes untouched,
    /// when the name is taken.
    async fn insert_option(&self, option: &PollOption) -> Result<bool, StoreError>;

    /// Atomically adds `delta` to the option's vote count, clamping at zero.
    /// Returns the new count, or `None` when the option does not exist.
    async fn adjust_votes(&self, name: &OptionName, delta: i64) -> Result<Option<u64>, StoreError>;

    /// Adds the participant to the option's voter set. No-op if the option is gone.
    async fn add_voter(&self, name: &OptionName, participant: &ParticipantId) -> Result<(), StoreError>;

    async fn remove_voter(&self, name: &OptionName, participant: &ParticipantId) -> Result<(), StoreError>;

    /// Deletes every option and all vote data.
    async fn clear(&self) -> Result<(), StoreError>;

    /// Change feed. The receiver always holds the newest snapshot.
    fn subscribe(&self) -> watch::Receiver<PollSnapshot>;
}
