mod multisafepay;

pub use multisafepay::*;

use async_trait::async_trait;
use strum::EnumString;

/// Which gateway deployment credentials belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum GatewayEnvironment {
    #[strum(serialize = "test", serialize = "sandbox")]
    Test,
    #[strum(serialize = "live", serialize = "production")]
    Live,
}

/// Why the gateway could not give an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnavailableReason {
    MissingCredential,
    Timeout,
    HttpStatus(u16),
    Transport(String),
    Malformed(String),
    /// Gateway answered but flagged the lookup as unsuccessful
    Rejected,
}

/// Result of asking the gateway about an order.
///
/// There is no error variant: every failure collapses into
/// `Unavailable`, which callers treat as "no new information".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayStatus {
    /// Raw gateway status string, e.g. `completed` or `uncleared`
    Reported { status: String },
    Unavailable(UnavailableReason),
}

/// Read-only source of authoritative payment status.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Provider name for logging (e.g., "multisafepay")
    fn provider_name(&self) -> &'static str;

    /// Query the current status of an order. Never mutates anything.
    async fn fetch_status(&self, order_id: &str) -> GatewayStatus;
}
