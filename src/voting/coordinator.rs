use crate::db::{OptionStore, StoreError};
use crate::models::{OptionName, ParticipantId, PollSnapshot};
use log::{error, info, warn};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    NewVote { to: OptionName },
    Switched { from: OptionName, to: OptionName },
    AlreadyVotedSameOption,
}

#[derive(Debug, Error)]
pub enum VoteError {
    #[error("Store unavailable, try again: {0}")]
    StoreUnavailable(#[from] StoreError),
    #[error("\"{0}\" is not an option in this poll")]
    UnknownOption(OptionName),
    #[error("A vote from {0} is already being recorded")]
    VoteInFlight(ParticipantId),
}

/// Moves a participant's single vote between options.
///
/// Every count change goes through the store's atomic delta. A vote is retracted
/// before the new one is committed, and each half of the protocol undoes its own
/// partial writes on failure, so a failed call can leave a participant with no
/// vote but never with two.
pub struct VoteCoordinator {
    store: Arc<dyn OptionStore>,
    in_flight: Mutex<HashSet<ParticipantId>>,
}

impl VoteCoordinator {
    pub fn new(store: Arc<dyn OptionStore>) -> Self {
        Self {
            store,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub async fn cast_vote(
        &self,
        participant: &ParticipantId,
        target: &OptionName,
    ) -> Result<VoteOutcome, VoteError> {
        let _guard = InFlightGuard::acquire(&self.in_flight, participant)
            .ok_or_else(|| VoteError::VoteInFlight(participant.clone()))?;

        let snapshot = self.store.snapshot().await?;
        if !snapshot.contains(target) {
            return Err(VoteError::UnknownOption(target.clone()));
        }

        match self.current_vote(participant, target, &snapshot).await? {
            Some(previous) if previous == *target => {
                info!("{} already voted for \"{}\"", participant, target);
                Ok(VoteOutcome::AlreadyVotedSameOption)
            }
            Some(previous) => {
                self.retract(&previous, participant).await?;
                if let Err(e) = self.commit(target, participant).await {
                    warn!(
                        "{} withdrew from \"{}\" but the vote for \"{}\" failed; no active vote remains",
                        participant, previous, target
                    );
                    return Err(e);
                }
                info!("{} switched vote from \"{}\" to \"{}\"", participant, previous, target);
                Ok(VoteOutcome::Switched {
                    from: previous,
                    to: target.clone(),
                })
            }
            None => {
                self.commit(target, participant).await?;
                info!("{} voted for \"{}\"", participant, target);
                Ok(VoteOutcome::NewVote { to: target.clone() })
            }
        }
    }

    // Finds the option holding the participant's vote. Several hits mean the
    // single-vote invariant was broken elsewhere; one is kept (the target if it
    // is among them, else the smallest name) and the rest are withdrawn.
    async fn current_vote(
        &self,
        participant: &ParticipantId,
        target: &OptionName,
        snapshot: &PollSnapshot,
    ) -> Result<Option<OptionName>, VoteError> {
        let mut held: Vec<OptionName> = snapshot
            .options_voted_by(participant)
            .into_iter()
            .cloned()
            .collect();
        if held.len() <= 1 {
            return Ok(held.pop());
        }

        held.sort();
        let kept = if held.contains(target) {
            target.clone()
        } else {
            held[0].clone()
        };
        warn!(
            "Invariant violation: {} holds votes on {:?}; keeping \"{}\" and withdrawing the rest",
            participant, held, kept
        );

        for name in held.iter().filter(|name| **name != kept) {
            self.retract(name, participant).await?;
        }
        Ok(Some(kept))
    }

    async fn retract(&self, name: &OptionName, participant: &ParticipantId) -> Result<(), VoteError> {
        let (count, removal) = tokio::join!(
            self.store.adjust_votes(name, -1),
            self.store.remove_voter(name, participant),
        );

        match (count, removal) {
            (Ok(_), Ok(())) => Ok(()),
            (Ok(Some(_)), Err(e)) => {
                error!("Failed to remove {} from \"{}\": {}", participant, name, e);
                self.restore_count(name, 1).await;
                Err(e.into())
            }
            (Ok(None), Err(e)) | (Err(_), Err(e)) => {
                error!("Failed to withdraw vote of {} from \"{}\": {}", participant, name, e);
                Err(e.into())
            }
            (Err(e), Ok(())) => {
                error!("Failed to decrement \"{}\" for {}: {}", name, participant, e);
                if let Err(undo) = self.store.add_voter(name, participant).await {
                    error!(
                        "Could not restore {} on \"{}\" ({}); it now over-counts by one",
                        participant, name, undo
                    );
                }
                Err(e.into())
            }
        }
    }

    async fn commit(&self, name: &OptionName, participant: &ParticipantId) -> Result<(), VoteError> {
        let (count, addition) = tokio::join!(
            self.store.adjust_votes(name, 1),
            self.store.add_voter(name, participant),
        );

        match (count, addition) {
            (Ok(Some(_)), Ok(())) => Ok(()),
            // Removed by a concurrent reset; add_voter was a no-op
            (Ok(None), Ok(())) => Err(VoteError::UnknownOption(name.clone())),
            (Ok(Some(_)), Err(e)) => {
                error!("Failed to add {} to \"{}\": {}", participant, name, e);
                self.restore_count(name, -1).await;
                Err(e.into())
            }
            (Ok(None), Err(e)) | (Err(_), Err(e)) => {
                error!("Failed to record vote of {} for \"{}\": {}", participant, name, e);
                Err(e.into())
            }
            (Err(e), Ok(())) => {
                error!("Failed to increment \"{}\" for {}: {}", name, participant, e);
                if let Err(undo) = self.store.remove_voter(name, participant).await {
                    error!(
                        "Could not withdraw uncounted vote of {} on \"{}\": {}",
                        participant, name, undo
                    );
                }
                Err(e.into())
            }
        }
    }

    async fn restore_count(&self, name: &OptionName, delta: i64) {
        if let Err(e) = self.store.adjust_votes(name, delta).await {
            error!("Failed to restore vote count of \"{}\" ({:+}): {}", name, delta, e);
        }
    }
}

// Rejects a second cast_vote for the same participant while one is running.
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<HashSet<ParticipantId>>,
    participant: ParticipantId,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(in_flight: &'a Mutex<HashSet<ParticipantId>>, participant: &ParticipantId) -> Option<Self> {
        let mut set = in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !set.insert(participant.clone()) {
            return None;
        }
        Some(Self {
            in_flight,
            participant: participant.clone(),
        })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut set = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        set.remove(&self.participant);
    }
}
