use axum::{extract::State, routing::get, Json, Router};
use tracing::instrument;

use super::{repo, repo_types::UserListing};
use crate::{error::ApiError, state::AppState};

pub fn read_routes() -> Router<AppState> {
    Router::new().route("/api/users", get(list_users))
}

#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserListing>>, ApiError> {
    let users = repo::list_users(&state.db)
        .await
        .map_err(|e| ApiError::internal("database error", e))?;
    Ok(Json(users))
}
