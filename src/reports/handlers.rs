use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tracing::{error, instrument, warn};

use super::{
    dto::{CreatedReportResponse, ReportForm},
    repo,
    repo_types::ReportListing,
    services::{discard_all, submit_report, SubmitError},
    MAX_RECEIPTS,
};
use crate::{
    error::ApiError,
    receipts::{repo::list_by_report, repo_types::ReceiptImage},
    state::AppState,
    storage::ReceiptStore,
};

const RECEIPTS_FIELD: &str = "receipts";
const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/api/reports", get(list_reports))
        .route("/api/reports/:id/receipts", get(list_receipts))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/api/reports", axum::routing::post(create_report))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}

impl IntoResponse for SubmitError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::TooManyReceipts | Self::Multipart(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = if status.is_server_error() {
            error!(error = %self, detail = ?self, "report submission failed");
            "server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}

/// POST /api/reports (multipart)
/// Scalar fields by name plus up to five `receipts` file parts.
#[instrument(skip(state, mp))]
pub async fn create_report(
    State(state): State<AppState>,
    mut mp: Multipart,
) -> Result<(StatusCode, Json<CreatedReportResponse>), SubmitError> {
    let mut form = ReportForm::default();
    let mut staged: Vec<String> = Vec::new();

    if let Err(e) = read_form(state.storage.as_ref(), &mut mp, &mut form, &mut staged).await {
        discard_all(state.storage.as_ref(), &staged).await;
        return Err(e);
    }

    let report_id = submit_report(&state.db, state.storage.as_ref(), form, &staged).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedReportResponse {
            success: true,
            report_id,
            message: "report saved".into(),
        }),
    ))
}

/// Drains the multipart body, staging each receipt as it arrives.
async fn read_form(
    store: &dyn ReceiptStore,
    mp: &mut Multipart,
    form: &mut ReportForm,
    staged: &mut Vec<String>,
) -> Result<(), SubmitError> {
    while let Some(field) = mp.next_field().await.map_err(SubmitError::Multipart)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if name == RECEIPTS_FIELD {
            if staged.len() == MAX_RECEIPTS {
                warn!("too many receipts in submission");
                return Err(SubmitError::TooManyReceipts);
            }
            let original = field.file_name().unwrap_or("receipt").to_string();
            let body = field.bytes().await.map_err(SubmitError::Multipart)?;
            let stored = store.stage(&original, body).await.map_err(SubmitError::Upload)?;
            staged.push(stored);
        } else {
            let value = field.text().await.map_err(SubmitError::Multipart)?;
            if !form.set(&name, value) {
                warn!(field = %name, "ignoring unknown report field");
            }
        }
    }
    Ok(())
}

#[instrument(skip(state))]
pub async fn list_reports(State(state): State<AppState>) -> Result<Json<Vec<ReportListing>>, ApiError> {
    let reports = repo::list_reports(&state.db)
        .await
        .map_err(|e| ApiError::internal("database error", e))?;
    Ok(Json(reports))
}

#[instrument(skip(state))]
pub async fn list_receipts(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Vec<ReceiptImage>>, ApiError> {
    let exists = repo::report_exists(&state.db, id)
        .await
        .map_err(|e| ApiError::internal("database error", e))?;
    if !exists {
        return Err(ApiError::NotFound(format!("report {id} not found")));
    }
    let rows = list_by_report(&state.db, id)
        .await
        .map_err(|e| ApiError::internal("database error", e))?;
    Ok(Json(rows))
}
