use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse, RegisteredUser, SessionUser},
        password::{hash_password_blocking, verify_password_blocking},
    },
    error::{is_unique_violation, ApiError},
    state::AppState,
    users::repo_types::{NewUser, User},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/login", post(login))
        .route("/api/register", post(register))
}

/// Login failures, rendered as `{"success": false, "message": "..."}`.
#[derive(Debug, Error)]
pub enum LoginError {
    #[error("{0}")]
    BadRequest(String),
    #[error("user not found")]
    UnknownUser,
    #[error("wrong password")]
    WrongPassword,
    #[error("server error")]
    Storage(#[source] anyhow::Error),
}

impl IntoResponse for LoginError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::UnknownUser => StatusCode::NOT_FOUND,
            Self::WrongPassword => StatusCode::UNAUTHORIZED,
            Self::Storage(e) => {
                error!(error = %format!("{e:#}"), "login failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = json!({ "success": false, "message": self.to_string() });
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("username, password and full_name are required")]
    MissingFields,
    #[error("username already exists")]
    DuplicateUsername,
    #[error("registration failed")]
    Storage(#[source] anyhow::Error),
}

impl From<RegisterError> for ApiError {
    fn from(e: RegisterError) -> Self {
        match e {
            RegisterError::MissingFields => ApiError::BadRequest(e.to_string()),
            RegisterError::DuplicateUsername => ApiError::Conflict(e.to_string()),
            RegisterError::Storage(source) => ApiError::internal("registration failed", source),
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, LoginError> {
    let Json(payload) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "login body rejected");
        LoginError::BadRequest(rejection.body_text())
    })?;

    let user = match User::find_by_username(&state.db, &payload.username).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(username = %payload.username, "login unknown username");
            return Err(LoginError::UnknownUser);
        }
        Err(e) => return Err(LoginError::Storage(e)),
    };

    let ok = verify_password_blocking(payload.password, user.password_hash)
        .await
        .map_err(LoginError::Storage)?;
    if !ok {
        warn!(user_id = user.id, username = %user.username, "login invalid password");
        return Err(LoginError::WrongPassword);
    }

    info!(user_id = user.id, username = %user.username, "user logged in");
    Ok(Json(LoginResponse {
        success: true,
        user: SessionUser {
            id: user.id,
            full_name: user.full_name,
            is_admin: user.is_admin,
        },
    }))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let Json(payload) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let (username, password, full_name) = required_fields(&payload)?;

    let hash = hash_password_blocking(password.to_string())
        .await
        .map_err(RegisterError::Storage)?;
    let new_user = NewUser {
        username,
        password_hash: &hash,
        full_name,
        is_admin: payload.is_admin.unwrap_or(false),
    };

    let (id, username) = match User::create(&state.db, &new_user).await {
        Ok(row) => row,
        Err(e) if is_unique_violation(&e) => {
            warn!(username = %new_user.username, "username already registered");
            return Err(RegisterError::DuplicateUsername.into());
        }
        Err(e) => return Err(RegisterError::Storage(e).into()),
    };

    info!(user_id = id, %username, "user registered");
    Ok(Json(RegisterResponse {
        message: "user created".into(),
        user: RegisteredUser { id, username },
    }))
}

fn required_fields(payload: &RegisterRequest) -> Result<(&str, &str, &str), RegisterError> {
    fn present(v: &Option<String>) -> Option<&str> {
        v.as_deref().filter(|s| !s.trim().is_empty())
    }
    match (
        present(&payload.username),
        present(&payload.password),
        present(&payload.full_name),
    ) {
        (Some(u), Some(p), Some(f)) => Ok((u.trim(), p, f.trim())),
        _ => Err(RegisterError::MissingFields),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    fn request(username: Option<&str>, password: Option<&str>, full_name: Option<&str>) -> RegisterRequest {
        RegisterRequest {
            username: username.map(Into::into),
            password: password.map(Into::into),
            full_name: full_name.map(Into::into),
            is_admin: None,
        }
    }

    #[test]
    fn required_fields_accepts_complete_payload() {
        let req = request(Some(" agent7 "), Some("pw"), Some("Agent Seven"));
        assert_eq!(required_fields(&req).unwrap(), ("agent7", "pw", "Agent Seven"));
    }

    #[test]
    fn required_fields_rejects_missing_or_blank() {
        for req in [
            request(None, Some("pw"), Some("A")),
            request(Some("a"), None, Some("A")),
            request(Some("a"), Some("pw"), None),
            request(Some("  "), Some("pw"), Some("A")),
            request(Some("a"), Some(""), Some("A")),
        ] {
            assert!(matches!(required_fields(&req), Err(RegisterError::MissingFields)));
        }
    }

    #[test]
    fn register_errors_map_to_statuses() {
        assert_eq!(ApiError::from(RegisterError::MissingFields).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::from(RegisterError::DuplicateUsername).status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::from(RegisterError::Storage(anyhow::anyhow!("boom"))).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn login_errors_use_success_false_shape() {
        let resp = LoginError::WrongPassword.into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({ "success": false, "message": "wrong password" }));

        assert_eq!(LoginError::UnknownUser.into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(
            LoginError::BadRequest("bad body".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }

    async fn send_form(uri: &str) -> (StatusCode, serde_json::Value) {
        use axum::{body::Body, http::Request};
        use tower::ServiceExt;

        let req = Request::post(uri)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("username=admin&password=123456"))
            .unwrap();
        let resp = auth_routes()
            .with_state(AppState::fake())
            .oneshot(req)
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).expect("body should be JSON");
        (status, body)
    }

    #[tokio::test]
    async fn form_encoded_login_gets_the_login_error_shape() {
        let (status, body) = send_form("/api/login").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["message"].as_str().unwrap().contains("application/json"));
    }

    #[tokio::test]
    async fn form_encoded_register_gets_the_error_shape() {
        let (status, body) = send_form("/api/register").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("application/json"));
        assert!(body.get("success").is_none());
    }

    #[test]
    fn login_response_has_no_password() {
        let resp = LoginResponse {
            success: true,
            user: SessionUser { id: 1, full_name: Some("Field Agent".into()), is_admin: false },
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("password"));
        assert!(json.contains("\"full_name\":\"Field Agent\""));
    }

    mod db {
        use std::sync::Arc;

        use sqlx::PgPool;

        use super::*;
        use crate::{config::AppConfig, schema::repo::reset_schema, storage::LocalStorage};

        const SCHEMA: &str = include_str!("../../schema/init.sql");

        async fn seeded_state(pool: PgPool) -> (AppState, tempfile::TempDir) {
            let config = AppConfig::for_tests();
            reset_schema(&pool, SCHEMA, &config.seed_users).await.unwrap();
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path().join("uploads");
            let storage = LocalStorage::new(&root, dir.path().join("staging")).await.unwrap();
            (AppState::from_parts(pool, Arc::new(config), Arc::new(storage)), dir)
        }

        fn login_req(username: &str, password: &str) -> Result<Json<LoginRequest>, JsonRejection> {
            Ok(Json(LoginRequest {
                username: username.into(),
                password: password.into(),
            }))
        }

        #[sqlx::test(migrations = false)]
        #[ignore = "requires DATABASE_URL"]
        async fn login_paths(pool: PgPool) {
            let (state, _dir) = seeded_state(pool).await;

            let admin = User::find_by_username(&state.db, "admin").await.unwrap().unwrap();
            assert_eq!(admin.username, "admin");

            let ok = login(State(state.clone()), login_req("admin", "123456")).await.unwrap();
            assert!(ok.0.success);
            assert!(ok.0.user.is_admin);
            assert!(!serde_json::to_string(&ok.0).unwrap().contains("password"));

            let wrong = login(State(state.clone()), login_req("admin", "nope")).await.unwrap_err();
            assert!(matches!(wrong, LoginError::WrongPassword));

            let unknown = login(State(state), login_req("ghost", "123456")).await.unwrap_err();
            assert!(matches!(unknown, LoginError::UnknownUser));
        }

        #[sqlx::test(migrations = false)]
        #[ignore = "requires DATABASE_URL"]
        async fn duplicate_registration_is_409_and_stores_nothing(pool: PgPool) {
            let (state, _dir) = seeded_state(pool).await;
            let req = || -> Result<Json<RegisterRequest>, JsonRejection> {
                Ok(Json(RegisterRequest {
                    username: Some("agent7".into()),
                    password: Some("pw".into()),
                    full_name: Some("Agent Seven".into()),
                    is_admin: None,
                }))
            };

            let created = register(State(state.clone()), req()).await.unwrap();
            assert_eq!(created.0.user.username, "agent7");

            let err = register(State(state.clone()), req()).await.unwrap_err();
            assert_eq!(err.status(), StatusCode::CONFLICT);

            let users = crate::users::repo::list_users(&state.db).await.unwrap();
            assert_eq!(users.iter().filter(|u| u.username == "agent7").count(), 1);
            assert_eq!(users.len(), 3);
        }
    }
}
