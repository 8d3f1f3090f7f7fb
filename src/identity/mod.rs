use crate::models::ParticipantId;
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("failed to access identity file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("identity file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredIdentity {
    participant_id: ParticipantId,
    created_at: DateTime<Utc>,
}

pub fn generate() -> ParticipantId {
    ParticipantId::new(format!("user-{}", Uuid::new_v4().simple()))
}

/// Returns the participant id persisted at `path`, creating it on first run.
/// An unreadable file is an error rather than a reason to mint a new identity.
pub fn load_or_create(path: &Path) -> Result<ParticipantId, IdentityError> {
    match fs::read_to_string(path) {
        Ok(contents) => {
            let stored: StoredIdentity =
                serde_json::from_str(&contents).map_err(|source| IdentityError::Corrupt {
                    path: path.to_path_buf(),
                    source,
                })?;
            Ok(stored.participant_id)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let stored = StoredIdentity {
                participant_id: generate(),
                created_at: Utc::now(),
            };
            let contents = serde_json::to_string_pretty(&stored).map_err(|source| {
                IdentityError::Corrupt {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
            fs::write(path, contents).map_err(|source| IdentityError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            info!("Created participant id {} in {}", stored.participant_id, path.display());
            Ok(stored.participant_id)
        }
        Err(source) => Err(IdentityError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
