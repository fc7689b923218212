use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::info;

use crate::Database;
use crate::error::{Result, StoreError, conflict_on_unique};
use crate::models::{Account, NewUser, UserChanges, UserRow};

const USER_COLUMNS: &str = "id, name, email, password, is_guest, created_at, updated_at";

impl Database {
    pub fn create_user(&self, user: &NewUser) -> Result<UserRow> {
        self.with_conn(|conn| insert_user(conn, user))
    }

    pub fn get_user(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, id))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1");
            Ok(conn.query_row(&sql, [email], user_from_row).optional()?)
        })
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_users(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
            Ok(count as u64)
        })
    }

    /// Apply a profile edit. Fields left as `None` keep their value.
    pub fn update_user(&self, id: i64, changes: &UserChanges) -> Result<UserRow> {
        self.with_tx(|conn| {
            let updated = conn
                .execute(
                    "UPDATE users
                     SET name = COALESCE(?2, name),
                         email = COALESCE(?3, email),
                         updated_at = ?4
                     WHERE id = ?1",
                    params![id, changes.name, changes.email, Utc::now()],
                )
                .map_err(conflict_on_unique("Email already in use"))?;
            if updated == 0 {
                return Err(user_not_found());
            }
            query_user(conn, id)?.ok_or_else(user_not_found)
        })
    }

    /// Delete a user; their polls and votes go with them.
    pub fn delete_user(&self, id: i64) -> Result<()> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
            if deleted == 0 {
                return Err(user_not_found());
            }
            info!("User {} deleted", id);
            Ok(())
        })
    }

    /// Turn a guest into a registered user.
    ///
    /// The guest state is read from storage, not from the caller's token, so
    /// a second conversion with a stale guest token is refused. The email
    /// must not belong to any other user; on conflict the row is untouched.
    pub fn convert_guest(&self, id: i64, email: &str, password_hash: &str) -> Result<UserRow> {
        self.with_tx(|conn| {
            let user = query_user(conn, id)?.ok_or_else(user_not_found)?;
            if !user.is_guest() {
                return Err(StoreError::Conflict("User is already registered"));
            }

            conn.execute(
                "UPDATE users
                 SET email = ?2, password = ?3, is_guest = 0, updated_at = ?4
                 WHERE id = ?1 AND is_guest = 1",
                params![id, email, password_hash, Utc::now()],
            )
            .map_err(conflict_on_unique("Email already in use"))?;

            info!("Guest {} converted to registered user", id);
            query_user(conn, id)?.ok_or_else(user_not_found)
        })
    }
}

pub(crate) fn insert_user(conn: &Connection, user: &NewUser) -> Result<UserRow> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO users (name, email, password, is_guest, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![
            user.name,
            user.email,
            user.account.password_hash(),
            user.account.is_guest(),
            now
        ],
    )
    .map_err(conflict_on_unique("User already exists with this email"))?;

    let id = conn.last_insert_rowid();
    query_user(conn, id)?.ok_or_else(user_not_found)
}

pub(crate) fn query_user(conn: &Connection, id: i64) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], user_from_row).optional()?)
}

pub(crate) fn user_not_found() -> StoreError {
    StoreError::NotFound("User not found".into())
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    let account = Account::from_columns(row.get(4)?, row.get(3)?).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            Type::Text,
            "guest flag and password hash disagree".into(),
        )
    })?;

    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        account,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered(name: &str, email: &str) -> NewUser {
        NewUser {
            name: name.into(),
            email: email.into(),
            account: Account::Registered {
                password_hash: "hash".into(),
            },
        }
    }

    fn guest(name: &str, email: &str) -> NewUser {
        NewUser {
            name: name.into(),
            email: email.into(),
            account: Account::Guest,
        }
    }

    #[test]
    fn test_create_and_fetch_user() {
        let db = Database::open_in_memory().unwrap();
        let created = db.create_user(&registered("Alice", "alice@example.com")).unwrap();

        let fetched = db.get_user(created.id).unwrap().unwrap();
        assert_eq!(fetched.email, "alice@example.com");
        assert_eq!(fetched.account.password_hash(), Some("hash"));
        assert!(!fetched.is_guest());

        let by_email = db.get_user_by_email("alice@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, created.id);
        assert!(db.get_user_by_email("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_email_is_conflict() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&registered("Alice", "alice@example.com")).unwrap();

        let err = db.create_user(&registered("Other", "alice@example.com")).unwrap_err();
        assert!(matches!(err, StoreError::Conflict("User already exists with this email")));
        assert_eq!(db.count_users().unwrap(), 1);
    }

    #[test]
    fn test_update_user_partial() {
        let db = Database::open_in_memory().unwrap();
        let alice = db.create_user(&registered("Alice", "alice@example.com")).unwrap();
        db.create_user(&registered("Bob", "bob@example.com")).unwrap();

        let updated = db
            .update_user(alice.id, &UserChanges { name: Some("Alicia".into()), email: None })
            .unwrap();
        assert_eq!(updated.name, "Alicia");
        assert_eq!(updated.email, "alice@example.com");

        let err = db
            .update_user(alice.id, &UserChanges { name: None, email: Some("bob@example.com".into()) })
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let err = db.update_user(999, &UserChanges::default()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_delete_missing_user() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(db.delete_user(42).unwrap_err(), StoreError::NotFound(_)));
    }

    #[test]
    fn test_convert_guest_once() {
        let db = Database::open_in_memory().unwrap();
        let g = db.create_user(&guest("Guest", "guest_1_abc@guest.local")).unwrap();
        assert!(g.is_guest());

        let converted = db.convert_guest(g.id, "real@example.com", "newhash").unwrap();
        assert!(!converted.is_guest());
        assert_eq!(converted.email, "real@example.com");
        assert_eq!(converted.account.password_hash(), Some("newhash"));

        let err = db.convert_guest(g.id, "again@example.com", "otherhash").unwrap_err();
        assert!(matches!(err, StoreError::Conflict("User is already registered")));

        let after = db.get_user(g.id).unwrap().unwrap();
        assert_eq!(after.email, "real@example.com");
    }

    #[test]
    fn test_convert_guest_with_taken_email_leaves_guest_unchanged() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&registered("Alice", "alice@example.com")).unwrap();
        let g = db.create_user(&guest("Guest", "guest_2_xyz@guest.local")).unwrap();

        let err = db.convert_guest(g.id, "alice@example.com", "hash").unwrap_err();
        assert!(matches!(err, StoreError::Conflict("Email already in use")));

        let after = db.get_user(g.id).unwrap().unwrap();
        assert!(after.is_guest());
        assert_eq!(after.email, "guest_2_xyz@guest.local");
        assert_eq!(after.account, Account::Guest);
    }

    #[test]
    fn test_list_users_newest_first() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&registered("Alice", "alice@example.com")).unwrap();
        db.create_user(&registered("Bob", "bob@example.com")).unwrap();

        let names: Vec<String> = db.list_users().unwrap().into_iter().map(|u| u.name).collect();
        assert_eq!(names, vec!["Bob", "Alice"]);
    }
}
