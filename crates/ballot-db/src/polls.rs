use std::collections::HashMap;

use ballot_types::models::VoteOutcome;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{debug, info};

use crate::Database;
use crate::error::{Result, StoreError};
use crate::models::{AuthorRow, CastVote, OptionTally, PollRow, PollTally, VoteRow};
use crate::users::{query_user, user_not_found};

/// Minimum number of options a poll must carry.
pub const MIN_OPTIONS: usize = 2;

impl Database {
    // -- Polls --

    /// Create a poll and its options in one transaction. Nothing is written
    /// unless the whole poll is valid.
    pub fn create_poll(&self, author_id: i64, question: &str, options: &[String]) -> Result<PollTally> {
        if options.len() < MIN_OPTIONS {
            return Err(StoreError::Invalid(
                "Question and at least 2 options are required".into(),
            ));
        }

        self.with_tx(|conn| {
            query_user(conn, author_id)?.ok_or_else(user_not_found)?;

            let now = Utc::now();
            conn.execute(
                "INSERT INTO polls (question, author_id, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
                params![question, author_id, now],
            )?;
            let poll_id = conn.last_insert_rowid();
            insert_options(conn, poll_id, options)?;

            info!("Poll {} created by user {} with {} options", poll_id, author_id, options.len());
            load_poll(conn, poll_id, None)
        })
    }

    pub fn get_poll(&self, id: i64, viewer: Option<i64>) -> Result<Option<PollTally>> {
        self.with_conn(|conn| Ok(load_polls(conn, Some(id), viewer)?.into_iter().next()))
    }

    /// All polls, newest first, each annotated with the viewer's own vote.
    pub fn list_polls(&self, viewer: Option<i64>) -> Result<Vec<PollTally>> {
        self.with_conn(|conn| load_polls(conn, None, viewer))
    }

    /// Edit a poll as its author. A new options list replaces every existing
    /// option, and the votes cast on them are dropped with them.
    pub fn update_poll(
        &self,
        poll_id: i64,
        editor_id: i64,
        question: Option<&str>,
        options: Option<&[String]>,
    ) -> Result<PollTally> {
        if let Some(options) = options {
            if options.len() < MIN_OPTIONS {
                return Err(StoreError::Invalid("A poll needs at least 2 options".into()));
            }
        }

        self.with_tx(|conn| {
            ensure_author(conn, poll_id, editor_id, "Only poll author can update it")?;

            conn.execute(
                "UPDATE polls SET question = COALESCE(?2, question), updated_at = ?3 WHERE id = ?1",
                params![poll_id, question, Utc::now()],
            )?;

            if let Some(options) = options {
                let dropped = conn.execute("DELETE FROM poll_options WHERE poll_id = ?1", [poll_id])?;
                insert_options(conn, poll_id, options)?;
                info!(
                    "Poll {}: replaced {} options with {}",
                    poll_id,
                    dropped,
                    options.len()
                );
            }

            load_poll(conn, poll_id, None)
        })
    }

    pub fn delete_poll(&self, poll_id: i64, requester_id: i64) -> Result<()> {
        self.with_tx(|conn| {
            ensure_author(conn, poll_id, requester_id, "Only poll author can delete it")?;
            conn.execute("DELETE FROM polls WHERE id = ?1", [poll_id])?;
            info!("Poll {} deleted by user {}", poll_id, requester_id);
            Ok(())
        })
    }

    // -- Votes --

    /// Cast or move a user's vote on a poll.
    ///
    /// At most one vote exists per (user, poll). The unique index on that
    /// pair turns the insert into an upsert, so a repeat call re-points the
    /// existing row instead of adding another one.
    pub fn cast_vote(&self, user_id: i64, poll_id: i64, option_id: i64) -> Result<CastVote> {
        self.with_tx(|conn| {
            if !poll_exists(conn, poll_id)? {
                return Err(poll_not_found());
            }

            let option_in_poll = conn
                .query_row(
                    "SELECT 1 FROM poll_options WHERE id = ?1 AND poll_id = ?2",
                    params![option_id, poll_id],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            if !option_in_poll {
                return Err(StoreError::NotFound("Option not found".into()));
            }

            query_user(conn, user_id)?.ok_or_else(user_not_found)?;

            let existing: Option<i64> = conn
                .query_row(
                    "SELECT id FROM votes WHERE user_id = ?1 AND poll_id = ?2",
                    params![user_id, poll_id],
                    |row| row.get(0),
                )
                .optional()?;

            let vote = conn.query_row(
                "INSERT INTO votes (user_id, poll_id, option_id, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (user_id, poll_id) DO UPDATE SET option_id = excluded.option_id
                 RETURNING id, user_id, poll_id, option_id, created_at",
                params![user_id, poll_id, option_id, Utc::now()],
                vote_from_row,
            )?;

            let outcome = if existing.is_some() {
                VoteOutcome::Updated
            } else {
                VoteOutcome::Created
            };
            debug!("User {} vote on poll {} -> option {} ({:?})", user_id, poll_id, option_id, outcome);

            Ok(CastVote { vote, outcome })
        })
    }

    pub fn get_vote(&self, user_id: i64, poll_id: i64) -> Result<Option<VoteRow>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, user_id, poll_id, option_id, created_at
                     FROM votes WHERE user_id = ?1 AND poll_id = ?2",
                    params![user_id, poll_id],
                    vote_from_row,
                )
                .optional()?)
        })
    }
}

fn poll_not_found() -> StoreError {
    StoreError::NotFound("Poll not found".into())
}

fn poll_exists(conn: &Connection, poll_id: i64) -> Result<bool> {
    Ok(conn
        .query_row("SELECT 1 FROM polls WHERE id = ?1", [poll_id], |_| Ok(()))
        .optional()?
        .is_some())
}

fn ensure_author(conn: &Connection, poll_id: i64, user_id: i64, denied: &'static str) -> Result<()> {
    let author_id: i64 = conn
        .query_row("SELECT author_id FROM polls WHERE id = ?1", [poll_id], |row| row.get(0))
        .optional()?
        .ok_or_else(poll_not_found)?;

    if author_id != user_id {
        return Err(StoreError::Forbidden(denied));
    }
    Ok(())
}

fn insert_options(conn: &Connection, poll_id: i64, options: &[String]) -> Result<()> {
    let now = Utc::now();
    let mut stmt =
        conn.prepare("INSERT INTO poll_options (poll_id, text, created_at) VALUES (?1, ?2, ?3)")?;
    for text in options {
        stmt.execute(params![poll_id, text, now])?;
    }
    Ok(())
}

fn load_poll(conn: &Connection, poll_id: i64, viewer: Option<i64>) -> Result<PollTally> {
    load_polls(conn, Some(poll_id), viewer)?
        .into_iter()
        .next()
        .ok_or_else(poll_not_found)
}

/// Load polls with their tallies. `only` narrows to a single poll; `viewer`
/// attaches that user's vote to each poll without touching the counts.
fn load_polls(conn: &Connection, only: Option<i64>, viewer: Option<i64>) -> Result<Vec<PollTally>> {
    let mut stmt = conn.prepare(
        "SELECT p.id, p.question, p.author_id, p.created_at, p.updated_at,
                u.name, u.email, u.is_guest
         FROM polls p
         JOIN users u ON u.id = p.author_id
         WHERE (?1 IS NULL OR p.id = ?1)
         ORDER BY p.created_at DESC, p.id DESC",
    )?;
    let polls = stmt
        .query_map([only], |row| {
            let poll = PollRow {
                id: row.get(0)?,
                question: row.get(1)?,
                author_id: row.get(2)?,
                created_at: row.get(3)?,
                updated_at: row.get(4)?,
            };
            let author = AuthorRow {
                id: poll.author_id,
                name: row.get(5)?,
                email: row.get(6)?,
                is_guest: row.get(7)?,
            };
            Ok((poll, author))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if polls.is_empty() {
        return Ok(vec![]);
    }

    // Options in insertion order, with the number of votes on each.
    let mut stmt = conn.prepare(
        "SELECT o.id, o.poll_id, o.text, o.created_at, COUNT(v.id)
         FROM poll_options o
         LEFT JOIN votes v ON v.option_id = o.id
         WHERE (?1 IS NULL OR o.poll_id = ?1)
         GROUP BY o.id
         ORDER BY o.id",
    )?;
    let mut options_by_poll: HashMap<i64, Vec<OptionTally>> = HashMap::new();
    let option_rows = stmt.query_map([only], |row| {
        Ok(OptionTally {
            id: row.get(0)?,
            poll_id: row.get(1)?,
            text: row.get(2)?,
            created_at: row.get(3)?,
            votes: row.get::<_, i64>(4)? as u64,
        })
    })?;
    for option in option_rows {
        let option = option?;
        options_by_poll.entry(option.poll_id).or_default().push(option);
    }

    let mut stmt = conn.prepare(
        "SELECT poll_id, COUNT(*) FROM votes
         WHERE (?1 IS NULL OR poll_id = ?1)
         GROUP BY poll_id",
    )?;
    let totals: HashMap<i64, u64> = stmt
        .query_map([only], |row| Ok((row.get(0)?, row.get::<_, i64>(1)? as u64)))?
        .collect::<std::result::Result<_, _>>()?;

    let mut viewer_votes: HashMap<i64, VoteRow> = HashMap::new();
    if let Some(viewer_id) = viewer {
        let mut stmt = conn.prepare(
            "SELECT id, user_id, poll_id, option_id, created_at
             FROM votes
             WHERE user_id = ?1 AND (?2 IS NULL OR poll_id = ?2)",
        )?;
        for vote in stmt.query_map(params![viewer_id, only], vote_from_row)? {
            let vote = vote?;
            viewer_votes.insert(vote.poll_id, vote);
        }
    }

    Ok(polls
        .into_iter()
        .map(|(poll, author)| PollTally {
            options: options_by_poll.remove(&poll.id).unwrap_or_default(),
            total_votes: totals.get(&poll.id).copied().unwrap_or(0),
            viewer_vote: viewer_votes.remove(&poll.id),
            poll,
            author,
        })
        .collect())
}

fn vote_from_row(row: &Row<'_>) -> rusqlite::Result<VoteRow> {
    Ok(VoteRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        poll_id: row.get(2)?,
        option_id: row.get(3)?,
        created_at: row.get(4)?,
    })
}
