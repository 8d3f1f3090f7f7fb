use super::{Client, Notice};
use crate::models::OptionName;
use crate::voting::{PollView, VoteError, VoteOutcome};
use log::{info, warn};

pub async fn handle_vote(client: &Client, raw_name: &str, view: &PollView) -> Notice {
    let name = match OptionName::parse(raw_name) {
        Ok(name) => name,
        Err(e) => return Notice::Error(e.to_string()),
    };

    // An option already holding our vote is not clickable
    if view.options.iter().any(|row| row.name == name && !row.can_vote()) {
        info!("Ignoring vote for \"{}\": already voted there", name);
        return Notice::Info(format!("You have already voted for \"{}\".", name));
    }

    match client.coordinator.cast_vote(&client.participant, &name).await {
        Ok(VoteOutcome::NewVote { to }) => Notice::Success(format!("You voted for \"{}\".", to)),
        Ok(VoteOutcome::Switched { from, to }) => {
            Notice::Success(format!("You voted for \"{}\" (moved from \"{}\").", to, from))
        }
        Ok(VoteOutcome::AlreadyVotedSameOption) => {
            Notice::Info(format!("You have already voted for \"{}\".", name))
        }
        Err(VoteError::VoteInFlight(_)) => {
            Notice::Info("Your previous vote is still being recorded.".to_string())
        }
        Err(e) => {
            warn!("Vote for \"{}\" failed: {}", name, e);
            Notice::Error(e.to_string())
        }
    }
}
