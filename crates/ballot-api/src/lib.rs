pub mod auth;
pub mod error;
pub mod identity;
pub mod password;
pub mod polls;
pub mod routes;
pub mod tasks;
pub mod token;
pub mod users;
mod validate;

use anyhow::anyhow;
use tracing::error;

use ballot_db::Database;

pub use auth::{AppState, AppStateInner};
pub use error::ApiError;
pub use routes::router;

/// Run blocking work (storage, password hashing) off the async runtime.
pub(crate) async fn run_blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(anyhow!("blocking task failed: {e}"))
    })?
}

/// Run a blocking storage call off the async runtime.
pub(crate) async fn with_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> ballot_db::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    run_blocking(move || f(&state.db).map_err(ApiError::from)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_blocking_passes_results_through() {
        assert_eq!(run_blocking(|| Ok(2 + 2)).await.unwrap(), 4);

        let err = run_blocking(|| Err::<(), _>(ApiError::validation("nope")))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "nope");
    }

    #[tokio::test]
    async fn test_run_blocking_reports_panics_as_internal() {
        let err = run_blocking(|| -> Result<(), ApiError> { panic!("boom") })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Internal(_)));
    }
}
