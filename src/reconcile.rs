//! Converges a stored purchase record with the gateway's view of it.
//!
//! The conditional status write in [`queries::try_transition_status`] is the
//! only synchronization point: whoever flips the row from unresolved to
//! terminal runs the post-payment effects, everyone else just reloads.

use rusqlite::Connection;

use crate::db::queries::{self, PurchaseTable};
use crate::db::AppState;
use crate::enrollment::{self, FulfillmentReport};
use crate::error::{AppError, Result};
use crate::models::{GatewayVerdict, PaymentStatus, PurchaseRecord};
use crate::payments::{GatewayStatus, UnavailableReason};

/// What to do with a record given a gateway report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Leave the record alone
    Keep,
    /// Record the gateway's raw status, canonical status unchanged
    MirrorOnly(String),
    Transition { to: PaymentStatus, gateway: String },
}

/// Pure decision table.
///
/// Terminal records are never touched. Unavailable gateways never change
/// anything (fail-open). Only success or a definitive failure moves the
/// canonical status; anything else is mirrored.
pub fn decide(current: PaymentStatus, report: &GatewayStatus) -> Decision {
    if current.is_terminal() {
        return Decision::Keep;
    }
    let GatewayStatus::Reported { status } = report else {
        return Decision::Keep;
    };
    match PaymentStatus::from_gateway(status) {
        GatewayVerdict::Succeeded => Decision::Transition {
            to: PaymentStatus::Completed,
            gateway: status.clone(),
        },
        GatewayVerdict::DefinitiveFailure(to) => Decision::Transition {
            to,
            gateway: status.clone(),
        },
        GatewayVerdict::Unresolved | GatewayVerdict::Other => Decision::MirrorOnly(status.clone()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    AlreadyTerminal,
    GatewayUnavailable(UnavailableReason),
    /// Gateway answered but the payment is not settled yet
    StillUnresolved,
    /// This call committed the transition
    Transitioned(PaymentStatus),
    /// Another writer committed first; no effects were run here
    LostRace,
}

#[derive(Debug, Clone)]
pub struct Reconciliation {
    /// Record as stored after reconciliation
    pub record: PurchaseRecord,
    pub outcome: ReconcileOutcome,
    /// Present only when this call won a success transition
    pub fulfillment: Option<FulfillmentReport>,
}

/// Ask the gateway about an unresolved record and apply the answer.
///
/// Errors only when the canonical status write itself fails.
pub async fn reconcile(state: &AppState, record: PurchaseRecord) -> Result<Reconciliation> {
    if record.status().is_terminal() {
        return Ok(Reconciliation {
            record,
            outcome: ReconcileOutcome::AlreadyTerminal,
            fulfillment: None,
        });
    }

    let report = state.gateway.fetch_status(record.id()).await;

    match decide(record.status(), &report) {
        Decision::Keep => {
            let outcome = match report {
                GatewayStatus::Unavailable(reason) => {
                    tracing::info!(
                        "Gateway {} unavailable for order {} ({:?}), keeping status '{}'",
                        state.gateway.provider_name(),
                        record.id(),
                        reason,
                        record.status()
                    );
                    ReconcileOutcome::GatewayUnavailable(reason)
                }
                GatewayStatus::Reported { .. } => ReconcileOutcome::StillUnresolved,
            };
            Ok(Reconciliation {
                record,
                outcome,
                fulfillment: None,
            })
        }
        Decision::MirrorOnly(gateway_status) => {
            let conn = state.db.get()?;
            let table = PurchaseTable::of(&record);
            // Mirror is informational; a failed write must not fail the poll
            if let Err(e) = queries::update_gateway_status(&conn, table, record.id(), &gateway_status)
            {
                tracing::warn!(
                    "Failed to mirror gateway status '{}' for order {}: {}",
                    gateway_status,
                    record.id(),
                    e
                );
                return Ok(Reconciliation {
                    record,
                    outcome: ReconcileOutcome::StillUnresolved,
                    fulfillment: None,
                });
            }
            // A webhook may have resolved the record meanwhile
            let record = reload(&conn, table, record.id())?;
            let outcome = if record.status().is_terminal() {
                ReconcileOutcome::LostRace
            } else {
                ReconcileOutcome::StillUnresolved
            };
            Ok(Reconciliation {
                record,
                outcome,
                fulfillment: None,
            })
        }
        Decision::Transition { to, gateway } => {
            let mut conn = state.db.get()?;
            commit_transition(state, &mut conn, &record, to, Some(&gateway))
        }
    }
}

/// Conditionally move `record` to terminal status `to` and, when this call won
/// a success transition, run the post-payment effects.
///
/// Also used by the confirmation endpoint to force-complete test orders.
pub fn commit_transition(
    state: &AppState,
    conn: &mut Connection,
    record: &PurchaseRecord,
    to: PaymentStatus,
    gateway_status: Option<&str>,
) -> Result<Reconciliation> {
    record
        .status()
        .check_transition(to)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let table = PurchaseTable::of(record);
    let won = queries::try_transition_status(conn, table, record.id(), to, gateway_status)?;
    let stored = reload(conn, table, record.id())?;

    if !won {
        tracing::debug!(
            "Order {} already resolved to '{}' by another writer",
            record.id(),
            stored.status()
        );
        return Ok(Reconciliation {
            record: stored,
            outcome: ReconcileOutcome::LostRace,
            fulfillment: None,
        });
    }

    tracing::info!(
        "Order {} transitioned {} -> {}",
        record.id(),
        record.status(),
        to
    );

    let fulfillment = to
        .is_success()
        .then(|| enrollment::fulfill(conn, &state.fulfillment_context(), &stored));

    Ok(Reconciliation {
        record: stored,
        outcome: ReconcileOutcome::Transitioned(to),
        fulfillment,
    })
}

fn reload(conn: &Connection, table: PurchaseTable, id: &str) -> Result<PurchaseRecord> {
    let record = match table {
        PurchaseTable::Orders => queries::get_order_by_id(conn, id)?.map(PurchaseRecord::Package),
        PurchaseTable::Transactions => {
            queries::get_transaction_by_id(conn, id)?.map(PurchaseRecord::Program)
        }
    };
    record.ok_or_else(|| AppError::Internal(format!("order {} vanished during reconciliation", id)))
}
