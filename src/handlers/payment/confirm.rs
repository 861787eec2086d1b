use axum::extract::State;
use serde::{Deserialize, Serialize};

use super::messages;
use crate::db::{AppState, queries};
use crate::enrollment;
use crate::error::{AppError, Result, code};
use crate::extractors::Json;
use crate::models::{PaymentStatus, PurchaseRecord, StatusPhase, Subscription};
use crate::reconcile::{commit_transition, reconcile};

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    #[serde(rename = "orderId", alias = "order_id")]
    pub order_id: Option<String>,
    /// Client claims this is a sandbox order
    #[serde(default)]
    pub mock: bool,
}

#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
    pub success: bool,
    pub order: PurchaseRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<ConfirmedUser>,
}

#[derive(Debug, Serialize)]
pub struct ConfirmedUser {
    pub id: i64,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<Subscription>,
}

/// Finalize an order the client already holds proof of payment for.
///
/// Only three things can make an order confirmable: it is already settled as
/// a success (zero-amount checkout, webhook), the gateway confirms it now, or
/// it is a test order outside production. Nothing else force-completes.
pub async fn confirm_payment(
    State(state): State<AppState>,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<ConfirmResponse>> {
    let order_id = req
        .order_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::bad_request(messages::MSG_MISSING_ORDER_ID, code::MISSING_ORDER_ID))?;

    let is_test = state.is_test_order(&order_id);
    if (is_test && state.production) || (req.mock && !is_test) {
        tracing::warn!(
            "Rejected confirmation of order {} (test={}, mock={}, production={})",
            order_id,
            is_test,
            req.mock,
            state.production
        );
        return Err(AppError::forbidden(
            messages::MSG_TEST_ORDER_REJECTED,
            code::TEST_ORDER_REJECTED,
        ));
    }

    let record = {
        let conn = state.db.get()?;
        queries::find_purchase(&conn, &order_id)?
    }
    .ok_or_else(|| AppError::not_found(messages::MSG_ORDER_NOT_FOUND, code::ORDER_NOT_FOUND))?;

    // Whether this request already ran the post-payment effects
    let mut fulfilled = false;

    let record = match record.status().phase() {
        StatusPhase::Succeeded => record,
        StatusPhase::Failed => {
            return Err(AppError::bad_request(
                messages::MSG_NOT_COMPLETED,
                code::PAYMENT_NOT_COMPLETED,
            ));
        }
        StatusPhase::Unresolved if is_test => {
            tracing::info!("Force-completing test order {}", order_id);
            let mut conn = state.db.get()?;
            let result = commit_transition(&state, &mut conn, &record, PaymentStatus::Completed, None)?;
            fulfilled = result.fulfillment.is_some();
            result.record
        }
        StatusPhase::Unresolved => {
            let result = reconcile(&state, record).await?;
            fulfilled = result.fulfillment.is_some();
            result.record
        }
    };

    if !record.status().is_success() {
        return Err(AppError::bad_request(
            messages::MSG_NOT_COMPLETED,
            code::PAYMENT_NOT_COMPLETED,
        ));
    }

    let mut conn = state.db.get()?;

    // Settled elsewhere (webhook, zero-amount checkout, an interrupted
    // request): apply whatever effects are still missing
    if !fulfilled {
        enrollment::fulfill(&mut conn, &state.fulfillment_context(), &record);
    }

    let user = match queries::get_user_by_id(&conn, record.user_id())? {
        Some(u) => Some(ConfirmedUser {
            subscription: queries::get_subscription(&conn, u.id)?,
            id: u.id,
            email: u.email,
            name: u.name,
        }),
        None => {
            tracing::warn!("Order {} references missing user {}", order_id, record.user_id());
            None
        }
    };

    Ok(Json(ConfirmResponse {
        success: true,
        order: record,
        user,
    }))
}
