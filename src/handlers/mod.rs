mod session;
mod vote;

use crate::commands::{AddError, Command, PollLifecycle, HELP};
use crate::db::OptionStore;
use crate::models::ParticipantId;
use crate::voting::{PollView, VoteCoordinator};
use log::{error, info};
use std::fmt;
use std::sync::Arc;

pub use session::run_session;

/// User-facing message for one handled command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Info(String),
    Error(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Success(message) => write!(f, "[ok] {}", message),
            Notice::Info(message) => write!(f, "[info] {}", message),
            Notice::Error(message) => write!(f, "[error] {}", message),
        }
    }
}

/// Everything one participant's session needs to act on the poll.
pub struct Client {
    participant: ParticipantId,
    coordinator: VoteCoordinator,
    lifecycle: PollLifecycle,
}

impl Client {
    pub fn new(participant: ParticipantId, store: Arc<dyn OptionStore>) -> Self {
        Self {
            participant,
            coordinator: VoteCoordinator::new(Arc::clone(&store)),
            lifecycle: PollLifecycle::new(store),
        }
    }

    pub fn participant(&self) -> &ParticipantId {
        &self.participant
    }
}

// `view` is the newest projection the session has rendered; it decides which
// actions are offered, the store decides what actually happens.
pub async fn handle_command(client: &Client, command: Command, view: &PollView) -> Notice {
    info!("Received command: {:?}", command);
    match command {
        Command::Add(name) => match client.lifecycle.add_option(&name).await {
            Ok(added) => Notice::Success(format!("\"{}\" added successfully!", added)),
            Err(AddError::AlreadyExists(name)) => {
                Notice::Info(format!("\"{}\" already exists!", name))
            }
            Err(e) => {
                error!("Error adding place: {}", e);
                Notice::Error(e.to_string())
            }
        },
        Command::Vote(name) => vote::handle_vote(client, &name, view).await,
        Command::Reset => {
            if !view.can_reset() {
                return Notice::Info("There is no poll to delete.".to_string());
            }
            match client.lifecycle.reset_poll().await {
                Ok(()) => Notice::Success("Poll deleted successfully!".to_string()),
                Err(e) => Notice::Error(e.to_string()),
            }
        }
        Command::Show => Notice::Info(view.to_string()),
        Command::WhoAmI => Notice::Info(format!("You are {}", client.participant)),
        Command::Help => Notice::Info(HELP.to_string()),
        Command::Quit => Notice::Info("Bye.".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::voting::project;

    async fn session() -> (Arc<MemoryStore>, Client) {
        let store = Arc::new(MemoryStore::new());
        let client = Client::new(ParticipantId::new("user-me"), store.clone());
        (store, client)
    }

    async fn view(store: &MemoryStore, client: &Client) -> PollView {
        project(&store.snapshot().await.unwrap(), client.participant())
    }

    #[tokio::test]
    async fn add_reports_success_then_duplicate() {
        let (store, client) = session().await;

        let first = handle_command(&client, Command::Add("Paris".into()), &view(&store, &client).await).await;
        let second = handle_command(&client, Command::Add("Paris".into()), &view(&store, &client).await).await;

        assert_eq!(first, Notice::Success("\"Paris\" added successfully!".to_string()));
        assert_eq!(second, Notice::Info("\"Paris\" already exists!".to_string()));
    }

    #[tokio::test]
    async fn reset_is_only_offered_for_a_non_empty_poll() {
        let (store, client) = session().await;

        let notice = handle_command(&client, Command::Reset, &view(&store, &client).await).await;
        assert_eq!(notice, Notice::Info("There is no poll to delete.".to_string()));

        handle_command(&client, Command::Add("Paris".into()), &view(&store, &client).await).await;
        let notice = handle_command(&client, Command::Reset, &view(&store, &client).await).await;
        assert_eq!(notice, Notice::Success("Poll deleted successfully!".to_string()));
        assert!(view(&store, &client).await.is_empty);
    }
}
