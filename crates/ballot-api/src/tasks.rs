use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;

use ballot_db::models::{NewTask, TaskChanges, TaskRow};
use ballot_types::api::{ApiResponse, CreateTaskRequest, TaskResponse, UpdateTaskRequest};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::validate::{MAX_TITLE_LEN, max_len};
use crate::with_db;

fn task_response(row: &TaskRow) -> TaskResponse {
    TaskResponse {
        id: row.id,
        title: row.title.clone(),
        description: row.description.clone(),
        completed: row.completed,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

/// Blank descriptions are stored as NULL.
fn clean_description(description: String) -> Option<String> {
    let trimmed = description.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn check_title(title: &str) -> Result<(), ApiError> {
    max_len("Task title", title, MAX_TITLE_LEN)
}

pub async fn list_tasks(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let tasks = with_db(&state, |db| db.list_tasks()).await?;
    let count = tasks.len();
    Ok(Json(ApiResponse::with_message(
        tasks.iter().map(task_response).collect::<Vec<_>>(),
        format!("Retrieved {count} tasks"),
    )))
}

pub async fn get_task(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let task = with_db(&state, move |db| db.get_task(id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Task with ID {id} not found")))?;
    Ok(Json(ApiResponse::data(task_response(&task))))
}

pub async fn create_task(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<CreateTaskRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::validation("Task title is required"));
    }
    check_title(&title)?;

    let task = NewTask {
        title,
        description: req.description.and_then(clean_description),
        completed: req.completed.unwrap_or(false),
    };
    let task = with_db(&state, move |db| db.create_task(&task)).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            task_response(&task),
            "Task created successfully",
        )),
    ))
}

pub async fn update_task(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateTaskRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let title = match req.title {
        Some(title) => {
            let title = title.trim().to_string();
            if title.is_empty() {
                return Err(ApiError::validation("Task title cannot be empty"));
            }
            check_title(&title)?;
            Some(title)
        }
        None => None,
    };

    let changes = TaskChanges {
        title,
        description: req.description.map(|d| d.and_then(clean_description)),
        completed: req.completed,
    };
    let task = with_db(&state, move |db| db.update_task(id, &changes)).await?;

    Ok(Json(ApiResponse::with_message(
        task_response(&task),
        "Task updated successfully",
    )))
}

pub async fn delete_task(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    with_db(&state, move |db| db.delete_task(id)).await?;
    Ok(Json(ApiResponse::message_only("Task deleted successfully")))
}
