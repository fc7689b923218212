use serde::{Deserialize, Serialize};

/// Result of casting a vote: the (user, poll) pair either had no vote yet
/// or its existing vote was pointed at a different option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteOutcome {
    Created,
    Updated,
}

impl VoteOutcome {
    pub fn message(self) -> &'static str {
        match self {
            VoteOutcome::Created => "Vote recorded",
            VoteOutcome::Updated => "Vote updated",
        }
    }
}

/// Share of `total` held by `count`, rounded to the nearest whole percent.
/// A poll with no votes reports 0 for every option.
pub fn vote_percentage(count: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    ((count as f64 / total as f64) * 100.0).round() as u32
}
