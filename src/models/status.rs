//! Canonical payment status and the single transition rule every write goes through.
//!
//! Orders and transactions share one status vocabulary. Two labels mean
//! "succeeded": `paid` (zero-amount package orders, written at checkout) and
//! `completed` (everything the gateway confirms). Code never branches on the
//! label, only on [`StatusPhase`].

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use thiserror::Error;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Initialized,
    Completed,
    Paid,
    Cancelled,
    Failed,
    Expired,
}

/// Coarse position of a status in the monotonic ordering
/// `unresolved -> succeeded | failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StatusPhase {
    Unresolved,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal status transition {} -> {}", from.as_ref(), to.as_ref())]
pub struct InvalidTransition {
    pub from: PaymentStatus,
    pub to: PaymentStatus,
}

/// How a raw gateway status string relates to the canonical status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayVerdict {
    /// Gateway has not settled the payment yet
    Unresolved,
    Succeeded,
    /// Gateway settled the payment negatively for good
    DefinitiveFailure(PaymentStatus),
    /// Known to the gateway but not actionable here (refunds, chargebacks, ...)
    Other,
}

impl PaymentStatus {
    pub const UNRESOLVED: [PaymentStatus; 2] = [PaymentStatus::Pending, PaymentStatus::Initialized];

    pub fn phase(self) -> StatusPhase {
        match self {
            PaymentStatus::Pending | PaymentStatus::Initialized => StatusPhase::Unresolved,
            PaymentStatus::Completed | PaymentStatus::Paid => StatusPhase::Succeeded,
            PaymentStatus::Cancelled | PaymentStatus::Failed | PaymentStatus::Expired => {
                StatusPhase::Failed
            }
        }
    }

    pub fn is_terminal(self) -> bool {
        self.phase() != StatusPhase::Unresolved
    }

    pub fn is_success(self) -> bool {
        self.phase() == StatusPhase::Succeeded
    }

    /// Validate a status change. Unresolved records may move anywhere;
    /// terminal records are frozen.
    pub fn check_transition(self, to: PaymentStatus) -> Result<(), InvalidTransition> {
        if self == to || self.phase() == StatusPhase::Unresolved {
            Ok(())
        } else {
            Err(InvalidTransition { from: self, to })
        }
    }

    /// Map a gateway-reported status string onto the canonical vocabulary.
    pub fn from_gateway(raw: &str) -> GatewayVerdict {
        match raw.trim().to_lowercase().as_str() {
            "completed" => GatewayVerdict::Succeeded,
            "initialized" | "pending" | "uncleared" | "reserved" => GatewayVerdict::Unresolved,
            "cancelled" | "canceled" | "void" => {
                GatewayVerdict::DefinitiveFailure(PaymentStatus::Cancelled)
            }
            "declined" | "failed" | "error" => {
                GatewayVerdict::DefinitiveFailure(PaymentStatus::Failed)
            }
            "expired" => GatewayVerdict::DefinitiveFailure(PaymentStatus::Expired),
            _ => GatewayVerdict::Other,
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}
