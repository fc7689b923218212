//! Database row types. These map directly to SQLite rows.
//! Distinct from ballot-types API models to keep the DB layer independent.

use ballot_types::models::VoteOutcome;
use chrono::{DateTime, Utc};

/// Credential state of a user. A guest has no password hash; a registered
/// user always has one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Account {
    Guest,
    Registered { password_hash: String },
}

impl Account {
    /// Rebuild from the `is_guest` / `password` column pair, rejecting
    /// combinations that break the guest/registered invariant.
    pub fn from_columns(is_guest: bool, password: Option<String>) -> Option<Self> {
        match (is_guest, password) {
            (true, None) => Some(Account::Guest),
            (false, Some(password_hash)) => Some(Account::Registered { password_hash }),
            _ => None,
        }
    }

    pub fn is_guest(&self) -> bool {
        matches!(self, Account::Guest)
    }

    pub fn password_hash(&self) -> Option<&str> {
        match self {
            Account::Guest => None,
            Account::Registered { password_hash } => Some(password_hash),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub account: Account,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRow {
    pub fn is_guest(&self) -> bool {
        self.account.is_guest()
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub account: Account,
}

#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PollRow {
    pub id: i64,
    pub question: String,
    pub author_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AuthorRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub is_guest: bool,
}

/// One option of a poll together with the number of votes pointing at it.
#[derive(Debug, Clone)]
pub struct OptionTally {
    pub id: i64,
    pub poll_id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub votes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteRow {
    pub id: i64,
    pub user_id: i64,
    pub poll_id: i64,
    pub option_id: i64,
    pub created_at: DateTime<Utc>,
}

/// A poll with its derived results. `options` keep insertion order and
/// `viewer_vote` is only filled when a viewer was supplied.
#[derive(Debug, Clone)]
pub struct PollTally {
    pub poll: PollRow,
    pub author: AuthorRow,
    pub options: Vec<OptionTally>,
    pub total_votes: u64,
    pub viewer_vote: Option<VoteRow>,
}

#[derive(Debug, Clone)]
pub struct CastVote {
    pub vote: VoteRow,
    pub outcome: VoteOutcome,
}

#[derive(Debug, Clone)]
pub struct TaskRow {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
}

/// Partial task update. `description: Some(None)` clears the description.
#[derive(Debug, Clone, Default)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub completed: Option<bool>,
}
