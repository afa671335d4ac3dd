use anyhow::Context;
use sqlx::{PgPool, Postgres, Transaction};

use super::repo_types::ReceiptImage;

/// Insert one attachment row within the submission transaction.
pub async fn insert_receipt_tx(
    tx: &mut Transaction<'_, Postgres>,
    report_id: i32,
    image_path: &str,
    image_type: &str,
) -> anyhow::Result<i32> {
    let id = sqlx::query_scalar::<_, i32>(
        r#"
        INSERT INTO receipt_images (report_id, image_path, image_type)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(report_id)
    .bind(image_path)
    .bind(image_type)
    .fetch_one(&mut **tx)
    .await
    .with_context(|| format!("insert receipt {image_path}"))?;
    Ok(id)
}

/// All attachments of a report, in upload order.
pub async fn list_by_report(db: &PgPool, report_id: i32) -> anyhow::Result<Vec<ReceiptImage>> {
    let rows = sqlx::query_as::<_, ReceiptImage>(
        r#"
        SELECT id, report_id, image_path, image_type, uploaded_at
          FROM receipt_images
         WHERE report_id = $1
         ORDER BY id ASC
        "#,
    )
    .bind(report_id)
    .fetch_all(db)
    .await
    .context("list receipts by report")?;
    Ok(rows)
}
