use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                name        TEXT NOT NULL,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT,
                is_guest    INTEGER NOT NULL DEFAULT 0 CHECK (is_guest IN (0, 1)),
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL,
                -- guests never carry a password hash, registered users always do
                CHECK ((is_guest = 1 AND password IS NULL)
                    OR (is_guest = 0 AND password IS NOT NULL))
            );

            CREATE TABLE polls (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                question    TEXT NOT NULL,
                author_id   INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE INDEX idx_polls_author ON polls(author_id);

            CREATE TABLE poll_options (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                poll_id     INTEGER NOT NULL REFERENCES polls(id) ON DELETE CASCADE,
                text        TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                UNIQUE (id, poll_id)
            );

            CREATE INDEX idx_poll_options_poll ON poll_options(poll_id);

            CREATE TABLE votes (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                poll_id     INTEGER NOT NULL REFERENCES polls(id) ON DELETE CASCADE,
                option_id   INTEGER NOT NULL,
                created_at  TEXT NOT NULL,
                UNIQUE (user_id, poll_id),
                FOREIGN KEY (option_id, poll_id)
                    REFERENCES poll_options(id, poll_id) ON DELETE CASCADE
            );

            CREATE INDEX idx_votes_poll ON votes(poll_id);
            CREATE INDEX idx_votes_option ON votes(option_id);

            CREATE TABLE tasks (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                title       TEXT NOT NULL,
                description TEXT,
                completed   INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }

    #[test]
    fn test_guest_with_password_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO users (name, email, password, is_guest, created_at, updated_at)
             VALUES ('g', 'g@guest.local', 'hash', 1, 'now', 'now')",
            [],
        );
        assert!(result.is_err());

        let result = conn.execute(
            "INSERT INTO users (name, email, password, is_guest, created_at, updated_at)
             VALUES ('r', 'r@example.com', NULL, 0, 'now', 'now')",
            [],
        );
        assert!(result.is_err());
    }

    fn schema_with_two_polls() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", "ON").unwrap();
        run(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO users (id, name, email, password, is_guest, created_at, updated_at)
                 VALUES (1, 'a', 'a@example.com', 'hash', 0, 'now', 'now');
             INSERT INTO polls (id, question, author_id, created_at, updated_at)
                 VALUES (1, 'first', 1, 'now', 'now'), (2, 'second', 1, 'now', 'now');
             INSERT INTO poll_options (id, poll_id, text, created_at)
                 VALUES (10, 1, 'A', 'now'), (11, 1, 'B', 'now'), (20, 2, 'C', 'now');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_second_vote_row_for_same_poll_is_rejected() {
        let conn = schema_with_two_polls();
        conn.execute(
            "INSERT INTO votes (user_id, poll_id, option_id, created_at) VALUES (1, 1, 10, 'now')",
            [],
        )
        .unwrap();

        let err = conn
            .execute(
                "INSERT INTO votes (user_id, poll_id, option_id, created_at) VALUES (1, 1, 11, 'now')",
                [],
            )
            .unwrap_err();
        assert!(crate::error::is_unique_violation(&err));

        // Same user, different poll is fine.
        conn.execute(
            "INSERT INTO votes (user_id, poll_id, option_id, created_at) VALUES (1, 2, 20, 'now')",
            [],
        )
        .unwrap();
    }

    #[test]
    fn test_vote_for_option_of_another_poll_is_rejected() {
        let conn = schema_with_two_polls();
        let result = conn.execute(
            "INSERT INTO votes (user_id, poll_id, option_id, created_at) VALUES (1, 1, 20, 'now')",
            [],
        );
        assert!(result.is_err());

        let votes: i64 = conn
            .query_row("SELECT COUNT(*) FROM votes", [], |r| r.get(0))
            .unwrap();
        assert_eq!(votes, 0);
    }
}
