mod commands;
mod config;
mod db;
mod handlers;
mod identity;
mod models;
mod tasks;
mod voting;

use config::{Config, StoreKind};
use db::{MemoryStore, OptionStore, SqliteStore};
use handlers::Client;
use log::{error, info};
use std::sync::Arc;
use tokio::io::BufReader;

#[tokio::main]
async fn main() {
    // Initialize logging
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return;
        }
    };

    let participant = match identity::load_or_create(&config.identity_file) {
        Ok(participant) => participant,
        Err(e) => {
            error!("Failed to load participant identity: {}", e);
            return;
        }
    };
    info!("Voting as {}", participant);

    let store: Arc<dyn OptionStore> = match config.store {
        StoreKind::Memory => Arc::new(MemoryStore::new()),
        StoreKind::Sqlite => match SqliteStore::connect(&config.database_url).await {
            Ok(store) => {
                let store = Arc::new(store);

                // --- Start Background Task for Picking Up Other Clients' Writes ---
                let refresher = Arc::clone(&store);
                let every = config.refresh_interval;
                tokio::spawn(async move {
                    tasks::snapshot_refresh::refresh_snapshots_task(refresher, every).await;
                });

                store
            }
            Err(e) => {
                error!("Failed to initialize database: {}", e);
                return;
            }
        },
    };

    let snapshots = store.subscribe();
    let client = Arc::new(Client::new(participant, store));

    handlers::run_session(client, snapshots, BufReader::new(tokio::io::stdin())).await;

    info!("Leaving the poll");
}
