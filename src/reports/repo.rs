use anyhow::Context;
use sqlx::{PgPool, Postgres, Transaction};

use super::repo_types::{NewReport, ReportListing};

/// Insert the report row and return its id.
pub async fn insert_report_tx(
    tx: &mut Transaction<'_, Postgres>,
    report: &NewReport,
) -> anyhow::Result<i32> {
    let id = sqlx::query_scalar::<_, i32>(
        r#"
        INSERT INTO reports (
            user_id, report_date, plate, km_start, km_end,
            cost_fuel, cost_toll, cost_other, cost_description,
            collection_cash, collection_cc, collection_check, collection_eft,
            cash_delivered, notes
        ) VALUES ($1, COALESCE($2, CURRENT_DATE), $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        RETURNING id
        "#,
    )
    .bind(report.user_id)
    .bind(report.report_date)
    .bind(&report.plate)
    .bind(report.km_start)
    .bind(report.km_end)
    .bind(report.cost_fuel)
    .bind(report.cost_toll)
    .bind(report.cost_other)
    .bind(&report.cost_description)
    .bind(report.collection_cash)
    .bind(report.collection_cc)
    .bind(report.collection_check)
    .bind(report.collection_eft)
    .bind(report.cash_delivered)
    .bind(&report.notes)
    .fetch_one(&mut **tx)
    .await
    .context("insert report")?;
    Ok(id)
}

/// Newest date first; same-day reports newest id first. Orphaned reports stay in.
pub async fn list_reports(db: &PgPool) -> anyhow::Result<Vec<ReportListing>> {
    let rows = sqlx::query_as::<_, ReportListing>(
        r#"
        SELECT r.id, r.user_id, r.report_date, r.plate, r.km_start, r.km_end,
               r.cost_fuel, r.cost_toll, r.cost_other, r.cost_description,
               r.collection_cash, r.collection_cc, r.collection_check, r.collection_eft,
               r.cash_delivered, r.notes, u.full_name
          FROM reports r
          LEFT JOIN users u ON r.user_id = u.id
         ORDER BY r.report_date DESC, r.id DESC
        "#,
    )
    .fetch_all(db)
    .await
    .context("list reports")?;
    Ok(rows)
}

pub async fn report_exists(db: &PgPool, report_id: i32) -> anyhow::Result<bool> {
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM reports WHERE id = $1)")
        .bind(report_id)
        .fetch_one(db)
        .await
        .context("check report exists")?;
    Ok(exists)
}
