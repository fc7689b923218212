use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::Database;
use crate::error::{Result, StoreError};
use crate::models::{NewTask, TaskChanges, TaskRow};

const TASK_COLUMNS: &str = "id, title, description, completed, created_at, updated_at";

impl Database {
    pub fn list_tasks(&self) -> Result<Vec<TaskRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY created_at DESC, id DESC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], task_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_task(&self, id: i64) -> Result<Option<TaskRow>> {
        self.with_conn(|conn| query_task(conn, id))
    }

    pub fn create_task(&self, task: &NewTask) -> Result<TaskRow> {
        self.with_conn(|conn| insert_task(conn, task))
    }

    pub fn update_task(&self, id: i64, changes: &TaskChanges) -> Result<TaskRow> {
        self.with_tx(|conn| {
            let (set_description, description) = match &changes.description {
                Some(description) => (true, description.as_deref()),
                None => (false, None),
            };

            let updated = conn.execute(
                "UPDATE tasks
                 SET title = COALESCE(?2, title),
                     description = CASE WHEN ?3 THEN ?4 ELSE description END,
                     completed = COALESCE(?5, completed),
                     updated_at = ?6
                 WHERE id = ?1",
                params![
                    id,
                    changes.title,
                    set_description,
                    description,
                    changes.completed,
                    Utc::now()
                ],
            )?;
            if updated == 0 {
                return Err(task_not_found(id));
            }
            query_task(conn, id)?.ok_or_else(|| task_not_found(id))
        })
    }

    pub fn delete_task(&self, id: i64) -> Result<()> {
        self.with_conn(|conn| {
            if conn.execute("DELETE FROM tasks WHERE id = ?1", [id])? == 0 {
                return Err(task_not_found(id));
            }
            Ok(())
        })
    }
}

pub(crate) fn insert_task(conn: &Connection, task: &NewTask) -> Result<TaskRow> {
    conn.execute(
        "INSERT INTO tasks (title, description, completed, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        params![task.title, task.description, task.completed, Utc::now()],
    )?;
    let id = conn.last_insert_rowid();
    query_task(conn, id)?.ok_or_else(|| task_not_found(id))
}

fn query_task(conn: &Connection, id: i64) -> Result<Option<TaskRow>> {
    let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], task_from_row).optional()?)
}

fn task_not_found(id: i64) -> StoreError {
    StoreError::NotFound(format!("Task with ID {id} not found"))
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<TaskRow> {
    Ok(TaskRow {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        completed: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_task(title: &str) -> NewTask {
        NewTask {
            title: title.into(),
            description: Some("details".into()),
            completed: false,
        }
    }

    #[test]
    fn test_task_lifecycle() {
        let db = Database::open_in_memory().unwrap();
        let task = db.create_task(&new_task("Write report")).unwrap();
        assert!(!task.completed);
        assert_eq!(task.description.as_deref(), Some("details"));

        let done = db
            .update_task(task.id, &TaskChanges { completed: Some(true), ..Default::default() })
            .unwrap();
        assert!(done.completed);
        assert_eq!(done.title, "Write report");
        assert_eq!(done.description.as_deref(), Some("details"));

        let cleared = db
            .update_task(task.id, &TaskChanges { description: Some(None), ..Default::default() })
            .unwrap();
        assert!(cleared.description.is_none());
        assert!(cleared.completed);

        db.delete_task(task.id).unwrap();
        assert!(db.get_task(task.id).unwrap().is_none());
    }

    #[test]
    fn test_missing_task_message() {
        let db = Database::open_in_memory().unwrap();
        let err = db.delete_task(7).unwrap_err();
        assert_eq!(err.to_string(), "Task with ID 7 not found");

        let err = db.update_task(7, &TaskChanges::default()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_list_tasks_newest_first() {
        let db = Database::open_in_memory().unwrap();
        db.create_task(&new_task("first")).unwrap();
        db.create_task(&new_task("second")).unwrap();

        let titles: Vec<String> = db.list_tasks().unwrap().into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["second", "first"]);
    }
}
