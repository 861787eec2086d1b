use serde::{Deserialize, Serialize};

use super::PaymentStatus;

/// Package purchase. Created at checkout, settled by the reconciler or the
/// confirmation endpoint, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Gateway-assigned order identifier
    pub id: String,
    pub user_id: i64,
    /// Subscription tier being bought (e.g. "core", "pro")
    pub package_type: String,
    pub billing_period: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    /// Last raw status reported by the gateway
    pub gateway_status: Option<String>,
    pub payment_provider: String,
    pub paid_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Order {
    pub fn is_free(&self) -> bool {
        self.amount_cents == 0
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrder {
    pub id: String,
    pub user_id: i64,
    pub package_type: String,
    pub billing_period: String,
    pub amount_cents: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub status: PaymentStatus,
}

pub(crate) fn default_currency() -> String {
    "EUR".to_string()
}
