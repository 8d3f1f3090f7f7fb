pub mod coordinator;
pub mod tally;

pub use coordinator::{VoteCoordinator, VoteError, VoteOutcome};
pub use tally::{project, PollView};
