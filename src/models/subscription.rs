use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
    Expired,
}

/// One row per user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub user_id: i64,
    pub tier: String,
    pub billing_period: String,
    pub status: SubscriptionStatus,
    pub start_date: i64,
    /// None for lifetime access
    pub end_date: Option<i64>,
    /// Order that activated this subscription
    pub order_id: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct ActivateSubscription {
    pub user_id: i64,
    pub tier: String,
    pub billing_period: String,
    pub order_id: String,
    pub start_date: i64,
    pub end_date: Option<i64>,
}

/// End of the first billing period starting at `start` (unix seconds).
/// Unknown periods fall back to monthly.
pub fn period_end(billing_period: &str, start: i64) -> Option<i64> {
    let months = match billing_period.to_lowercase().as_str() {
        "lifetime" => return None,
        "quarterly" => 3,
        "yearly" | "annual" | "annually" => 12,
        _ => 1,
    };
    DateTime::<Utc>::from_timestamp(start, 0)
        .and_then(|dt| dt.checked_add_months(Months::new(months)))
        .map(|dt| dt.timestamp())
}
