use axum::extract::State;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use super::messages::{self, NextAction};
use crate::db::{AppState, queries};
use crate::enrollment;
use crate::error::{AppError, Result, code};
use crate::extractors::{Json, Query};
use crate::models::{PaymentStatus, Program, PurchaseRecord, SubscriptionStatus};
use crate::reconcile::reconcile;

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "orderId", alias = "order_id")]
    pub order_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    /// True only for terminal success
    pub success: bool,
    pub status: PaymentStatus,
    pub order_id: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<VerifyDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyDetails {
    /// "package" or "program"
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program: Option<ProgramSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_period: Option<String>,
    /// Minor units (cents)
    pub amount: i64,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<i64>,
    /// Program enrollment exists, or for packages, the subscription is active
    pub enrolled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_action: Option<NextAction>,
}

#[derive(Debug, Serialize)]
pub struct ProgramSummary {
    pub id: i64,
    pub slug: String,
    pub name: String,
}

impl From<&Program> for ProgramSummary {
    fn from(p: &Program) -> Self {
        Self {
            id: p.id,
            slug: p.slug.clone(),
            name: p.name.clone(),
        }
    }
}

/// Client-pollable payment status.
///
/// Unresolved records are reconciled against the gateway before answering, so
/// polling this endpoint can write.
pub async fn verify_payment(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Result<Json<VerifyResponse>> {
    let order_id = query
        .order_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::bad_request(messages::MSG_MISSING_ORDER_ID, code::MISSING_ORDER_ID))?;

    let record = {
        let conn = state.db.get()?;
        queries::find_purchase(&conn, &order_id)?
    }
    .ok_or_else(|| AppError::not_found(messages::MSG_ORDER_NOT_FOUND, code::ORDER_NOT_FOUND))?;

    let (record, fulfilled) = if record.status().is_terminal() {
        (record, false)
    } else {
        let result = reconcile(&state, record).await?;
        let fulfilled = result.fulfillment.is_some();
        (result.record, fulfilled)
    };

    let mut conn = state.db.get()?;

    // A program purchase settled by someone else may still miss its
    // enrollment or progress rows
    if !fulfilled && record.status().is_success() && matches!(record, PurchaseRecord::Program(_)) {
        enrollment::fulfill(&mut conn, &state.fulfillment_context(), &record);
    }

    let details = build_details(&conn, &state, &record)?;
    let status = record.status();

    Ok(Json(VerifyResponse {
        success: status.is_success(),
        status,
        order_id,
        message: messages::status_message(status).to_string(),
        details: Some(details),
        error_code: messages::failure_code(status),
    }))
}

fn build_details(
    conn: &Connection,
    state: &AppState,
    record: &PurchaseRecord,
) -> Result<VerifyDetails> {
    let succeeded = record.status().is_success();

    let (program, package_type, billing_period, enrolled) = match record {
        PurchaseRecord::Program(tx) => {
            let program = queries::get_program_by_id(conn, tx.program_id)?;
            let enrolled = queries::get_enrollment(conn, tx.user_id, tx.program_id, &tx.id)?.is_some();
            (program, None, None, enrolled)
        }
        PurchaseRecord::Package(order) => {
            let enrolled = queries::get_subscription(conn, order.user_id)?
                .is_some_and(|s| s.status == SubscriptionStatus::Active);
            (
                None,
                Some(order.package_type.clone()),
                Some(order.billing_period.clone()),
                enrolled,
            )
        }
    };

    let next_action =
        succeeded.then(|| messages::next_action(program.as_ref(), &state.default_next_action));

    Ok(VerifyDetails {
        kind: record.kind_str(),
        program: program.as_ref().map(ProgramSummary::from),
        package_type,
        billing_period,
        amount: record.amount_cents(),
        currency: record.currency().to_string(),
        paid_at: record.paid_at(),
        enrolled,
        next_action,
    })
}
