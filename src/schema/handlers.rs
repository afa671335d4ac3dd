use axum::{
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use subtle::ConstantTimeEq;
use tracing::{instrument, warn};

use super::repo;
use crate::{error::ApiError, state::AppState};

pub const RESET_TOKEN_HEADER: &str = "x-reset-token";

#[derive(Debug, Serialize)]
pub struct SchemaMessage {
    pub message: String,
}

pub fn schema_routes() -> Router<AppState> {
    Router::new()
        .route("/init-db", get(init_db))
        .route("/admin/reset-db", post(reset_db))
}

#[instrument(skip(state))]
pub async fn init_db(State(state): State<AppState>) -> Result<Json<SchemaMessage>, ApiError> {
    match apply_schema(&state).await {
        Ok(()) => Ok(Json(SchemaMessage {
            message: "database tables are ready".into(),
        })),
        Err(e) => Err(ApiError::internal(format!("{e:#}"), e)),
    }
}

/// Operator-only. Disabled unless `RESET_DB_TOKEN` is configured.
#[instrument(skip(state, headers))]
pub async fn reset_db(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SchemaMessage>, ApiError> {
    let Some(expected) = state.config.reset_token.as_deref() else {
        return Err(ApiError::NotFound("not found".into()));
    };
    let supplied = headers
        .get(RESET_TOKEN_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();
    if !token_matches(supplied, expected) {
        warn!("reset-db rejected: bad token");
        return Err(ApiError::Forbidden("invalid reset token".into()));
    }

    match reset_and_seed(&state).await {
        Ok(seeded) => {
            warn!(seeded, "database reset by operator");
            Ok(Json(SchemaMessage {
                message: format!("database reset; {seeded} seed users created"),
            }))
        }
        Err(e) => Err(ApiError::internal(format!("{e:#}"), e)),
    }
}

/// Constant-time for equal-length tokens; a length mismatch fails early.
fn token_matches(supplied: &str, expected: &str) -> bool {
    supplied.as_bytes().ct_eq(expected.as_bytes()).into()
}

pub async fn apply_schema(state: &AppState) -> anyhow::Result<()> {
    let script = repo::load_script(&state.config.schema_path).await?;
    repo::ensure_schema(&state.db, &script).await
}

async fn reset_and_seed(state: &AppState) -> anyhow::Result<usize> {
    let script = repo::load_script(&state.config.schema_path).await?;
    repo::reset_schema(&state.db, &script, &state.config.seed_users).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_must_match_exactly() {
        assert!(token_matches("s3cret", "s3cret"));
        assert!(!token_matches("s3creT", "s3cret"));
        assert!(!token_matches("s3cret ", "s3cret"));
        assert!(!token_matches("", "s3cret"));
        assert!(!token_matches("s3c", "s3cret"));
    }
}
