use serde::{Deserialize, Serialize};

use super::PaymentStatus;

/// Program purchase, one per gateway order.
///
/// `status` is canonical and only moves forward. `gateway_status` mirrors
/// whatever the gateway (or its webhook) last reported, including values that
/// do not map onto the canonical vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub user_id: i64,
    pub program_id: i64,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub gateway_status: Option<String>,
    pub paid_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTransaction {
    pub id: String,
    pub user_id: i64,
    pub program_id: i64,
    pub amount_cents: i64,
    #[serde(default = "super::order::default_currency")]
    pub currency: String,
    pub status: PaymentStatus,
}
