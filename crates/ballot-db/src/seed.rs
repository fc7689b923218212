use chrono::Utc;
use rusqlite::params;
use tracing::info;

use crate::Database;
use crate::Result;
use crate::models::{Account, NewTask, NewUser};
use crate::tasks::insert_task;
use crate::users::insert_user;

const DEMO_USERS: &[(&str, &str)] = &[
    ("Alice Johnson", "alice@example.com"),
    ("Bob Smith", "bob@example.com"),
    ("Charlie Brown", "charlie@example.com"),
];

impl Database {
    /// Populate an empty database with demo users, a poll and a few tasks.
    /// All demo users share `password_hash`. Returns `false` and writes
    /// nothing when any user already exists.
    pub fn seed_demo(&self, password_hash: &str) -> Result<bool> {
        self.with_tx(|conn| {
            let users: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
            if users > 0 {
                info!("Skipping demo seed: {} users already present", users);
                return Ok(false);
            }

            let mut ids = Vec::with_capacity(DEMO_USERS.len());
            for (name, email) in DEMO_USERS {
                let user = insert_user(
                    conn,
                    &NewUser {
                        name: (*name).into(),
                        email: (*email).into(),
                        account: Account::Registered {
                            password_hash: password_hash.into(),
                        },
                    },
                )?;
                ids.push(user.id);
            }

            let now = Utc::now();
            conn.execute(
                "INSERT INTO polls (question, author_id, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
                params!["Which language should the next workshop cover?", ids[0], now],
            )?;
            let poll_id = conn.last_insert_rowid();
            for text in ["Rust", "Go", "TypeScript"] {
                conn.execute(
                    "INSERT INTO poll_options (poll_id, text, created_at) VALUES (?1, ?2, ?3)",
                    params![poll_id, text, now],
                )?;
            }

            for (title, description) in [
                ("Review pull requests", Some("Go through the open review queue")),
                ("Update dependencies", None),
            ] {
                insert_task(
                    conn,
                    &NewTask {
                        title: title.into(),
                        description: description.map(Into::into),
                        completed: false,
                    },
                )?;
            }

            info!("Database seeded with {} demo users", ids.len());
            Ok(true)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_only_runs_on_empty_database() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.seed_demo("hash").unwrap());
        assert_eq!(db.count_users().unwrap(), 3);
        assert_eq!(db.list_polls(None).unwrap()[0].options.len(), 3);
        assert_eq!(db.list_tasks().unwrap().len(), 2);

        assert!(!db.seed_demo("hash").unwrap());
        assert_eq!(db.count_users().unwrap(), 3);
    }
}
