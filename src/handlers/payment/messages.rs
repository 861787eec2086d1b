//! Client-facing payment messages. The product speaks Dutch.

use serde::Serialize;

use crate::error::code;
use crate::models::{PaymentStatus, Program};

pub const MSG_MISSING_ORDER_ID: &str = "Order ID ontbreekt.";
pub const MSG_ORDER_NOT_FOUND: &str = "Bestelling niet gevonden.";
pub const MSG_NOT_COMPLETED: &str = "Betaling is nog niet voltooid.";
pub const MSG_TEST_ORDER_REJECTED: &str = "Testbestellingen kunnen niet worden bevestigd.";

const DEFAULT_NEXT_ACTION_LABEL: &str = "Naar je dashboard";

/// Human-readable message for a canonical status.
pub fn status_message(status: PaymentStatus) -> &'static str {
    match status {
        PaymentStatus::Pending | PaymentStatus::Initialized => {
            "Je betaling wordt nog verwerkt. Even geduld alsjeblieft."
        }
        PaymentStatus::Completed | PaymentStatus::Paid => {
            "Betaling geslaagd! Je hebt nu toegang tot je aankoop."
        }
        PaymentStatus::Cancelled => "Je betaling is geannuleerd.",
        PaymentStatus::Failed => {
            "Je betaling is mislukt. Probeer het opnieuw of neem contact op met support."
        }
        PaymentStatus::Expired => "Je betaling is verlopen. Start een nieuwe bestelling.",
    }
}

/// Error code for terminal failures, none otherwise.
pub fn failure_code(status: PaymentStatus) -> Option<&'static str> {
    match status {
        PaymentStatus::Cancelled => Some(code::PAYMENT_CANCELLED),
        PaymentStatus::Failed => Some(code::PAYMENT_FAILED),
        PaymentStatus::Expired => Some(code::PAYMENT_EXPIRED),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NextAction {
    pub url: String,
    pub label: String,
}

/// Where to send the client after a successful purchase.
pub fn next_action(program: Option<&Program>, default_url: &str) -> NextAction {
    match program {
        Some(p) => NextAction {
            url: p
                .post_purchase_path
                .clone()
                .unwrap_or_else(|| default_url.to_string()),
            label: format!("Start met {}", p.name),
        },
        None => NextAction {
            url: default_url.to_string(),
            label: DEFAULT_NEXT_ACTION_LABEL.to_string(),
        },
    }
}
