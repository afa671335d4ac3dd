use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Errors rendered as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
    /// Logged in full; the client only sees `public`.
    #[error("{public}: {source:#}")]
    Internal {
        public: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ApiError {
    pub fn internal(public: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Internal {
            public: public.into(),
            source: source.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::Internal { public, source } => {
                error!(error = %format!("{source:#}"), "{public}");
                public
            }
            Self::BadRequest(m) | Self::NotFound(m) | Self::Forbidden(m) | Self::Conflict(m) => m,
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// SQLSTATE 23505.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<sqlx::Error>()
            .and_then(|e| e.as_database_error())
            .and_then(|db| db.code())
            .is_some_and(|code| code == "23505")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn bad_request_is_400_with_message() {
        let resp = ApiError::BadRequest("missing fields".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"], "missing fields");
    }

    #[tokio::test]
    async fn internal_hides_source() {
        let err = ApiError::internal("database error", anyhow::anyhow!("relation \"users\" does not exist"));
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(resp).await;
        assert_eq!(body["error"], "database error");
        assert!(!body.to_string().contains("relation"));
    }

    #[test]
    fn plain_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(&anyhow::anyhow!("23505")));
        assert!(!is_unique_violation(&anyhow::Error::new(sqlx::Error::RowNotFound)));
    }
}
