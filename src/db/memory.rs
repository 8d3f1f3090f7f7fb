use super::{OptionStore, StoreError};
use crate::models::{OptionName, ParticipantId, PollOption, PollSnapshot};
use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::watch;

/// In-process store. Every write publishes the new snapshot to subscribers.
pub struct MemoryStore {
    poll: Mutex<PollSnapshot>,
    changes: watch::Sender<PollSnapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_snapshot(PollSnapshot::default())
    }

    pub fn with_snapshot(snapshot: PollSnapshot) -> Self {
        let (changes, _) = watch::channel(snapshot.clone());
        Self {
            poll: Mutex::new(snapshot),
            changes,
        }
    }

    fn read<R>(&self, f: impl FnOnce(&PollSnapshot) -> R) -> Result<R, StoreError> {
        let poll = self
            .poll
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))?;
        Ok(f(&poll))
    }

    fn write<R>(&self, f: impl FnOnce(&mut PollSnapshot) -> R) -> Result<R, StoreError> {
        let mut poll = self
            .poll
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))?;
        let result = f(&mut poll);
        self.changes.send_replace(poll.clone());
        Ok(result)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OptionStore for MemoryStore {
    async fn snapshot(&self) -> Result<PollSnapshot, StoreError> {
        self.read(|poll| poll.clone())
    }

    async fn get_option(&self, name: &OptionName) -> Result<Option<PollOption>, StoreError> {
        self.read(|poll| poll.get(name).cloned())
    }

    async fn insert_option(&self, option: &PollOption) -> Result<bool, StoreError> {
        self.write(|poll| {
            if poll.contains(&option.name) {
                return false;
            }
            poll.options.push(option.clone());
            true
        })
    }

    async fn adjust_votes(&self, name: &OptionName, delta: i64) -> Result<Option<u64>, StoreError> {
        self.write(|poll| {
            poll.options
                .iter_mut()
                .find(|option| option.name == *name)
                .map(|option| {
                    option.vote_count = option.vote_count.saturating_add_signed(delta);
                    option.vote_count
                })
        })
    }

    async fn add_voter(&self, name: &OptionName, participant: &ParticipantId) -> Result<(), StoreError> {
        self.write(|poll| {
            if let Some(option) = poll.options.iter_mut().find(|option| option.name == *name) {
                option.voters.insert(participant.clone());
            }
        })
    }

    async fn remove_voter(&self, name: &OptionName, participant: &ParticipantId) -> Result<(), StoreError> {
        self.write(|poll| {
            if let Some(option) = poll.options.iter_mut().find(|option| option.name == *name) {
                option.voters.remove(participant);
            }
        })
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.write(|poll| poll.options.clear())
    }

    fn subscribe(&self) -> watch::Receiver<PollSnapshot> {
        self.changes.subscribe()
    }
}
