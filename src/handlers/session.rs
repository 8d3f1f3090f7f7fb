use super::{handle_command, Client};
use crate::commands::{Command, HELP};
use crate::models::PollSnapshot;
use crate::voting::project;
use log::{error, info, warn};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{mpsc, watch};

const QUEUED_COMMANDS: usize = 64;

/// Reads commands from `input` until EOF or `quit`, rendering every new
/// snapshot as it arrives.
///
/// Commands run one at a time, in the order they were typed, on a single
/// worker task. Returns once every queued command has finished.
pub async fn run_session<R>(client: Arc<Client>, mut snapshots: watch::Receiver<PollSnapshot>, input: R)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let (commands, mut queue) = mpsc::channel::<Command>(QUEUED_COMMANDS);

    let worker = {
        let client = Arc::clone(&client);
        let snapshots = snapshots.clone();
        tokio::spawn(async move {
            while let Some(command) = queue.recv().await {
                // Projected here, so the command sees what the ones before it did
                let view = project(&snapshots.borrow(), client.participant());
                let notice = handle_command(&client, command, &view).await;
                println!("{}", notice);
            }
        })
    };

    println!("{}", HELP);
    println!("{}", project(&snapshots.borrow_and_update(), client.participant()));

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    warn!("Poll subscription closed");
                    break;
                }
                // Only the newest snapshot is ever rendered
                println!("{}", project(&snapshots.borrow_and_update(), client.participant()));
            }
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        error!("Failed to read input: {}", e);
                        break;
                    }
                };

                let command = match Command::parse(&line) {
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(command)) => command,
                    Ok(None) => continue,
                    Err(e) => {
                        println!("{}", e);
                        continue;
                    }
                };

                if commands.send(command).await.is_err() {
                    error!("Command worker stopped");
                    break;
                }
            }
        }
    }

    drop(commands);
    if let Err(e) = worker.await {
        error!("Command worker failed: {}", e);
    }
    info!("Session finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, OptionStore};
    use crate::models::{OptionName, ParticipantId};

    fn client() -> (Arc<MemoryStore>, Arc<Client>) {
        let store = Arc::new(MemoryStore::new());
        let client = Arc::new(Client::new(ParticipantId::new("user-me"), store.clone()));
        (store, client)
    }

    #[tokio::test]
    async fn commands_run_in_the_order_they_were_typed() {
        let (store, client) = client();

        run_session(client, store.subscribe(), "add Paris\nvote Paris\n".as_bytes()).await;

        let paris = store
            .get_option(&OptionName::parse("Paris").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(paris.vote_count, 1);
        assert!(paris.has_voter(&ParticipantId::new("user-me")));
    }

    #[tokio::test]
    async fn quit_stops_reading_but_finishes_queued_commands() {
        let (store, client) = client();

        run_session(client, store.subscribe(), "add Paris\nadd Lima\nquit\nadd Rome\n".as_bytes()).await;

        let snapshot = store.snapshot().await.unwrap();
        let names: Vec<&str> = snapshot.options.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["Paris", "Lima"]);
    }

    #[tokio::test]
    async fn unreadable_lines_do_not_end_the_session() {
        let (store, client) = client();

        run_session(client, store.subscribe(), "\nfrobnicate\nadd Paris\n".as_bytes()).await;

        assert_eq!(store.snapshot().await.unwrap().len(), 1);
    }
}
