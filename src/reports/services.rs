use std::str::FromStr;

use anyhow::Context;
use rust_decimal::Decimal;
use sqlx::PgPool;
use thiserror::Error;
use time::{macros::format_description, Date};
use tracing::{info, warn};

use super::{dto::ReportForm, repo, repo_types::NewReport};
use crate::{
    receipts::{repo::insert_receipt_tx, repo_types::GENERAL_IMAGE_TYPE},
    storage::ReceiptStore,
};

/// A submitted field that could not be coerced to its column type.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid value for {field}: {value:?}")]
pub struct FieldError {
    pub field: &'static str,
    pub value: String,
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Missing or blank becomes zero; stored with two decimal places.
fn money(field: &'static str, value: Option<String>) -> Result<Decimal, FieldError> {
    match blank_to_none(value) {
        None => Ok(Decimal::ZERO),
        Some(v) => Decimal::from_str(&v)
            .map(|d| d.round_dp(2))
            .map_err(|_| FieldError { field, value: v }),
    }
}

fn integer(field: &'static str, value: Option<String>) -> Result<Option<i32>, FieldError> {
    blank_to_none(value)
        .map(|v| v.parse::<i32>().map_err(|_| FieldError { field, value: v }))
        .transpose()
}

fn date(field: &'static str, value: Option<String>) -> Result<Option<Date>, FieldError> {
    let fmt = format_description!("[year]-[month]-[day]");
    blank_to_none(value)
        .map(|v| Date::parse(&v, &fmt).map_err(|_| FieldError { field, value: v }))
        .transpose()
}

impl TryFrom<ReportForm> for NewReport {
    type Error = FieldError;

    fn try_from(f: ReportForm) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: integer("user_id", f.user_id)?,
            report_date: date("report_date", f.report_date)?,
            plate: blank_to_none(f.plate),
            km_start: integer("km_start", f.km_start)?,
            km_end: integer("km_end", f.km_end)?,
            cost_fuel: money("cost_fuel", f.cost_fuel)?,
            cost_toll: money("cost_toll", f.cost_toll)?,
            cost_other: money("cost_other", f.cost_other)?,
            cost_description: blank_to_none(f.cost_description),
            collection_cash: money("collection_cash", f.collection_cash)?,
            collection_cc: money("collection_cc", f.collection_cc)?,
            collection_check: money("collection_check", f.collection_check)?,
            collection_eft: money("collection_eft", f.collection_eft)?,
            cash_delivered: money("cash_delivered", f.cash_delivered)?,
            notes: blank_to_none(f.notes),
        })
    }
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("at most {} receipts per report", super::MAX_RECEIPTS)]
    TooManyReceipts,
    #[error("malformed multipart body")]
    Multipart(#[source] axum::extract::multipart::MultipartError),
    #[error(transparent)]
    InvalidField(#[from] FieldError),
    #[error("receipt storage failed")]
    Upload(#[source] anyhow::Error),
    #[error("database error")]
    Storage(#[source] anyhow::Error),
}

/// Stores a report and its already-staged receipts as one unit.
///
/// The report row, every attachment row and the promotion of every staged
/// file happen before commit. Any failure rolls the transaction back and
/// removes the files of this submission, staged or promoted.
pub async fn submit_report(
    db: &PgPool,
    store: &dyn ReceiptStore,
    form: ReportForm,
    receipts: &[String],
) -> Result<i32, SubmitError> {
    let outcome = match NewReport::try_from(form) {
        Ok(report) => persist(db, store, &report, receipts).await,
        Err(e) => Err(e.into()),
    };
    if outcome.is_err() {
        discard_all(store, receipts).await;
    }
    outcome
}

async fn persist(
    db: &PgPool,
    store: &dyn ReceiptStore,
    report: &NewReport,
    receipts: &[String],
) -> Result<i32, SubmitError> {
    let mut tx = db
        .begin()
        .await
        .context("begin tx")
        .map_err(SubmitError::Storage)?;

    let inserted = async {
        let report_id = repo::insert_report_tx(&mut tx, report)
            .await
            .map_err(SubmitError::Storage)?;
        for name in receipts {
            insert_receipt_tx(&mut tx, report_id, name, GENERAL_IMAGE_TYPE)
                .await
                .map_err(SubmitError::Storage)?;
        }
        for name in receipts {
            store.promote(name).await.map_err(SubmitError::Upload)?;
        }
        Ok::<_, SubmitError>(report_id)
    }
    .await;

    match inserted {
        Ok(report_id) => {
            tx.commit()
                .await
                .context("commit tx")
                .map_err(SubmitError::Storage)?;
            info!(report_id, receipts = receipts.len(), "report stored");
            Ok(report_id)
        }
        Err(e) => {
            if let Err(rb) = tx.rollback().await {
                warn!(error = %rb, "rollback failed");
            }
            Err(e)
        }
    }
}

/// Best-effort removal; failures are logged and otherwise ignored.
pub async fn discard_all(store: &dyn ReceiptStore, receipts: &[String]) {
    for name in receipts {
        if let Err(e) = store.discard(name).await {
            warn!(error = %format!("{e:#}"), stored_name = %name, "orphaned receipt left on disk");
        }
    }
}
