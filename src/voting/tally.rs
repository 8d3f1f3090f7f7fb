use crate::models::{OptionName, ParticipantId, PollSnapshot};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionRow {
    pub name: OptionName,
    pub vote_count: u64,
    pub voted_by_me: bool,
}

impl OptionRow {
    // An option already holding this participant's vote can't be voted for again
    pub fn can_vote(&self) -> bool {
        !self.voted_by_me
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leader {
    pub name: OptionName,
    pub votes: u64,
}

/// What one participant sees of the poll at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollView {
    pub options: Vec<OptionRow>,
    pub leading: Option<Leader>,
    pub is_empty: bool,
}

impl PollView {
    pub fn can_reset(&self) -> bool {
        !self.is_empty
    }

    pub fn leading_label(&self) -> String {
        match &self.leading {
            Some(leader) => format!("Leading Place: {} with {} votes", leader.name, leader.votes),
            None => "Leading Place: None".to_string(),
        }
    }
}

impl fmt::Display for PollView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.options {
            write!(f, "{} - Votes: {}", row.name, row.vote_count)?;
            if row.voted_by_me {
                write!(f, " (your vote)")?;
            }
            writeln!(f)?;
        }
        write!(f, "{}", self.leading_label())
    }
}

/// Projects a snapshot into the view for `participant`.
///
/// The leader is the first option, in snapshot order, whose count beats every
/// earlier one. The running maximum starts at zero and only a strictly greater
/// count replaces it, so equal counts keep the earlier option and a poll where
/// nobody has voted yet has no leader at all.
pub fn project(snapshot: &PollSnapshot, participant: &ParticipantId) -> PollView {
    let mut max_votes = 0;
    let mut leading = None;
    let mut options = Vec::with_capacity(snapshot.len());

    for option in &snapshot.options {
        options.push(OptionRow {
            name: option.name.clone(),
            vote_count: option.vote_count,
            voted_by_me: option.has_voter(participant),
        });

        if option.vote_count > max_votes {
            max_votes = option.vote_count;
            leading = Some(Leader {
                name: option.name.clone(),
                votes: option.vote_count,
            });
        }
    }

    PollView {
        options,
        leading,
        is_empty: snapshot.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PollOption;

    fn option(name: &str, votes: u64) -> PollOption {
        let mut option = PollOption::new(OptionName::parse(name).unwrap());
        option.vote_count = votes;
        option
    }

    fn me() -> ParticipantId {
        ParticipantId::new("user-me")
    }

    #[test]
    fn empty_poll_has_no_rows_and_no_leader() {
        let view = project(&PollSnapshot::default(), &me());

        assert!(view.is_empty);
        assert!(view.options.is_empty());
        assert_eq!(view.leading, None);
        assert!(!view.can_reset());
        assert_eq!(view.leading_label(), "Leading Place: None");
    }

    #[test]
    fn first_seen_option_wins_a_tie() {
        let snapshot = PollSnapshot::new(vec![option("A", 3), option("B", 5), option("C", 5)]);
        let view = project(&snapshot, &me());

        assert_eq!(
            view.leading,
            Some(Leader {
                name: OptionName::parse("B").unwrap(),
                votes: 5,
            })
        );
        assert!(!view.is_empty);
        assert!(view.can_reset());
    }

    #[test]
    fn tie_break_follows_snapshot_order_not_name_order() {
        let snapshot = PollSnapshot::new(vec![option("Zurich", 2), option("Amsterdam", 2)]);
        let view = project(&snapshot, &me());

        assert_eq!(view.leading.unwrap().name.as_str(), "Zurich");
    }

    // Options exist but nobody has voted: still no leader, not "tied at zero".
    #[test]
    fn all_zero_counts_report_no_leader() {
        let snapshot = PollSnapshot::new(vec![option("A", 0), option("B", 0)]);
        let view = project(&snapshot, &me());

        assert_eq!(view.leading, None);
        assert!(!view.is_empty);
        assert_eq!(view.options.len(), 2);
        assert_eq!(view.leading_label(), "Leading Place: None");
    }

    #[test]
    fn later_strictly_greater_count_takes_the_lead() {
        let snapshot = PollSnapshot::new(vec![option("A", 0), option("B", 1), option("C", 4)]);
        let view = project(&snapshot, &me());

        assert_eq!(view.leading_label(), "Leading Place: C with 4 votes");
    }

    #[test]
    fn rows_mark_the_participants_own_vote() {
        let mut voted = option("Kyoto", 1);
        voted.voters.insert(me());
        let snapshot = PollSnapshot::new(vec![voted, option("Osaka", 0)]);
        let view = project(&snapshot, &me());

        assert!(view.options[0].voted_by_me);
        assert!(!view.options[0].can_vote());
        assert!(view.options[1].can_vote());
        assert_eq!(
            view.to_string(),
            "Kyoto - Votes: 1 (your vote)\nOsaka - Votes: 0\nLeading Place: Kyoto with 1 votes"
        );
    }
}
