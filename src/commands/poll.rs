use crate::db::{OptionStore, StoreError};
use crate::models::{InvalidName, OptionName, PollOption};
use log::{info, warn};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AddError {
    #[error("{0}")]
    InvalidName(#[from] InvalidName),
    #[error("\"{0}\" already exists!")]
    AlreadyExists(OptionName),
    #[error("Failed to add the place. Try again. ({0})")]
    StoreUnavailable(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum ResetError {
    #[error("Failed to delete the poll. Try again. ({0})")]
    StoreUnavailable(#[from] StoreError),
}

/// Creates options and wipes the poll.
pub struct PollLifecycle {
    store: Arc<dyn OptionStore>,
}

impl PollLifecycle {
    pub fn new(store: Arc<dyn OptionStore>) -> Self {
        Self { store }
    }

    /// Adds an option with no votes.
    ///
    /// The store only creates the option if the name is still free, so when
    /// two clients add the same name at the same moment the later one gets
    /// `AlreadyExists` and the first option keeps any votes it collected.
    pub async fn add_option(&self, raw_name: &str) -> Result<OptionName, AddError> {
        let name = OptionName::parse(raw_name)?;

        if self.store.get_option(&name).await?.is_some() {
            info!("Option \"{}\" already exists", name);
            return Err(AddError::AlreadyExists(name));
        }

        if !self.store.insert_option(&PollOption::new(name.clone())).await? {
            info!("Option \"{}\" was added by another client first", name);
            return Err(AddError::AlreadyExists(name));
        }
        info!("Added option \"{}\"", name);
        Ok(name)
    }

    /// Deletes every option and all votes. Irreversible.
    pub async fn reset_poll(&self) -> Result<(), ResetError> {
        if let Err(e) = self.store.clear().await {
            warn!("Error deleting poll: {}", e);
            return Err(e.into());
        }
        info!("Poll deleted successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::{ParticipantId, PollSnapshot};
    use crate::voting::{project, VoteCoordinator};
    use async_trait::async_trait;
    use tokio::sync::watch;

    fn lifecycle() -> (Arc<MemoryStore>, PollLifecycle) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), PollLifecycle::new(store))
    }

    /// Reports every name as free, like a read that ran just before another
    /// client's add landed.
    struct StaleReads {
        inner: MemoryStore,
    }

    #[async_trait]
    impl OptionStore for StaleReads {
        async fn snapshot(&self) -> Result<PollSnapshot, StoreError> {
            self.inner.snapshot().await
        }

        async fn get_option(&self, _name: &OptionName) -> Result<Option<PollOption>, StoreError> {
            Ok(None)
        }

        async fn insert_option(&self, option: &PollOption) -> Result<bool, StoreError> {
            self.inner.insert_option(option).await
        }

        async fn adjust_votes(&self, name: &OptionName, delta: i64) -> Result<Option<u64>, StoreError> {
            self.inner.adjust_votes(name, delta).await
        }

        async fn add_voter(&self, name: &OptionName, participant: &ParticipantId) -> Result<(), StoreError> {
            self.inner.add_voter(name, participant).await
        }

        async fn remove_voter(&self, name: &OptionName, participant: &ParticipantId) -> Result<(), StoreError> {
            self.inner.remove_voter(name, participant).await
        }

        async fn clear(&self) -> Result<(), StoreError> {
            self.inner.clear().await
        }

        fn subscribe(&self) -> watch::Receiver<PollSnapshot> {
            self.inner.subscribe()
        }
    }

    #[tokio::test]
    async fn adding_a_name_twice_fails_and_keeps_one_entry() {
        let (store, lifecycle) = lifecycle();

        lifecycle.add_option("Paris").await.unwrap();
        let err = lifecycle.add_option("Paris").await.unwrap_err();

        assert!(matches!(err, AddError::AlreadyExists(ref n) if n.as_str() == "Paris"));
        assert_eq!(err.to_string(), "\"Paris\" already exists!");
        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.options[0].vote_count, 0);
        assert!(snapshot.options[0].voters.is_empty());
    }

    #[tokio::test]
    async fn names_are_trimmed_before_the_duplicate_check() {
        let (store, lifecycle) = lifecycle();

        let added = lifecycle.add_option("  Paris  ").await.unwrap();
        assert_eq!(added.as_str(), "Paris");
        assert!(matches!(
            lifecycle.add_option("Paris").await,
            Err(AddError::AlreadyExists(_))
        ));
        // Case-sensitive
        lifecycle.add_option("paris").await.unwrap();
        assert_eq!(store.snapshot().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn blank_names_are_rejected() {
        let (store, lifecycle) = lifecycle();

        let err = lifecycle.add_option("   ").await.unwrap_err();

        assert!(matches!(err, AddError::InvalidName(InvalidName::Empty)));
        assert!(store.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reset_empties_the_projection() {
        let (store, lifecycle) = lifecycle();
        let coordinator = VoteCoordinator::new(store.clone());
        let alice = ParticipantId::new("user-alice");

        lifecycle.add_option("Paris").await.unwrap();
        lifecycle.add_option("Rome").await.unwrap();
        coordinator
            .cast_vote(&alice, &OptionName::parse("Rome").unwrap())
            .await
            .unwrap();
        assert!(!project(&store.snapshot().await.unwrap(), &alice).is_empty);

        lifecycle.reset_poll().await.unwrap();

        let view = project(&store.snapshot().await.unwrap(), &alice);
        assert!(view.is_empty);
        assert_eq!(view.leading, None);
    }

    #[tokio::test]
    async fn reset_of_an_empty_poll_is_harmless() {
        let (store, lifecycle) = lifecycle();

        lifecycle.reset_poll().await.unwrap();

        assert!(store.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn a_racing_add_keeps_the_first_options_votes() {
        let store = Arc::new(StaleReads {
            inner: MemoryStore::new(),
        });
        let lifecycle = PollLifecycle::new(store.clone());
        let coordinator = VoteCoordinator::new(store.clone());
        let alice = ParticipantId::new("user-alice");
        let paris = OptionName::parse("Paris").unwrap();

        lifecycle.add_option("Paris").await.unwrap();
        coordinator.cast_vote(&alice, &paris).await.unwrap();

        let err = lifecycle.add_option("Paris").await.unwrap_err();

        assert!(matches!(err, AddError::AlreadyExists(ref n) if *n == paris));
        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.options[0].vote_count, 1);
        assert!(snapshot.options[0].has_voter(&alice));
    }
}
