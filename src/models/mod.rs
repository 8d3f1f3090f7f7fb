use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

pub const MAX_NAME_CHARS: usize = 128;

lazy_static! {
    // Characters the store cannot use inside a key.
    static ref FORBIDDEN_NAME_CHARS: Regex = Regex::new(r"[/.#$\[\]\p{Cc}]").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidName {
    #[error("Please enter a valid place name.")]
    Empty,
    #[error("\"{0}\" contains a character that cannot be used in a name (/ . # $ [ ])")]
    ForbiddenCharacter(String),
    #[error("name is longer than {MAX_NAME_CHARS} characters")]
    TooLong,
}

/// Name of a poll option. Always trimmed and non-empty; comparison is case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionName(String);

impl OptionName {
    pub fn parse(raw: &str) -> Result<Self, InvalidName> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(InvalidName::Empty);
        }
        if FORBIDDEN_NAME_CHARS.is_match(trimmed) {
            return Err(InvalidName::ForbiddenCharacter(trimmed.to_string()));
        }
        if trimmed.chars().count() > MAX_NAME_CHARS {
            return Err(InvalidName::TooLong);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OptionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque participant token. Treated as unique and stable per device.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub name: OptionName,
    pub vote_count: u64,
    pub voters: BTreeSet<ParticipantId>,
    pub created_at: DateTime<Utc>,
}

impl PollOption {
    pub fn new(name: OptionName) -> Self {
        Self {
            name,
            vote_count: 0,
            voters: BTreeSet::new(),
            created_at: Utc::now(),
        }
    }

    pub fn has_voter(&self, participant: &ParticipantId) -> bool {
        self.voters.contains(participant)
    }
}

/// Full point-in-time copy of the poll, in option insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSnapshot {
    pub options: Vec<PollOption>,
}

impl PollSnapshot {
    pub fn new(options: Vec<PollOption>) -> Self {
        Self { options }
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn get(&self, name: &OptionName) -> Option<&PollOption> {
        self.options.iter().find(|option| option.name == *name)
    }

    pub fn contains(&self, name: &OptionName) -> bool {
        self.get(name).is_some()
    }

    // Linear in the number of options; there is no participant -> option index.
    pub fn options_voted_by(&self, participant: &ParticipantId) -> Vec<&OptionName> {
        self.options
            .iter()
            .filter(|option| option.has_voter(participant))
            .map(|option| &option.name)
            .collect()
    }
}
