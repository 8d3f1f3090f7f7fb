pub mod poll;

pub use poll::{AddError, PollLifecycle};

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

lazy_static! {
    static ref COMMAND_LINE: Regex = Regex::new(r"^\s*(\S+)(?:\s+(.*?))?\s*$").unwrap();
}

pub const HELP: &str = "\
Commands:
  add <name>    add an option to the poll
  vote <name>   vote for an option (switches an earlier vote)
  reset         delete every option and vote
  show          print the current tally
  whoami        print your participant id
  help          print this message
  quit          leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add(String),
    Vote(String),
    Reset,
    Show,
    WhoAmI,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Unknown command \"{0}\". Type `help` for a list of commands.")]
    Unknown(String),
    #[error("Usage: {0}")]
    MissingArgument(&'static str),
}

impl Command {
    /// Parses one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, ParseError> {
        let Some(captures) = COMMAND_LINE.captures(line) else {
            return Ok(None);
        };
        let verb = captures.get(1).map_or("", |m| m.as_str());
        let argument = captures.get(2).map(|m| m.as_str()).filter(|arg| !arg.is_empty());

        let command = match (verb.to_ascii_lowercase().as_str(), argument) {
            ("add", Some(name)) => Command::Add(name.to_string()),
            ("add", None) => return Err(ParseError::MissingArgument("add <name>")),
            ("vote", Some(name)) => Command::Vote(name.to_string()),
            ("vote", None) => return Err(ParseError::MissingArgument("vote <name>")),
            ("reset", _) => Command::Reset,
            ("show", _) => Command::Show,
            ("whoami", _) => Command::WhoAmI,
            ("help", _) => Command::Help,
            ("quit" | "exit", _) => Command::Quit,
            _ => return Err(ParseError::Unknown(verb.to_string())),
        };
        Ok(Some(command))
    }
}
