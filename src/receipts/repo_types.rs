use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

/// Type tag written by the submission path; callers never supply another.
pub const GENERAL_IMAGE_TYPE: &str = "general";

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ReceiptImage {
    pub id: i32,
    pub report_id: i32,
    pub image_path: String,
    pub image_type: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub uploaded_at: OffsetDateTime,
}
