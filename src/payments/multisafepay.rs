use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{GatewayEnvironment, GatewayStatus, PaymentGateway, UnavailableReason};

const SANDBOX_BASE_URL: &str = "https://testapi.multisafepay.com/v1/json";
const LIVE_BASE_URL: &str = "https://api.multisafepay.com/v1/json";

#[derive(Debug, Deserialize)]
struct OrderStatusResponse {
    success: bool,
    #[serde(default)]
    data: Option<OrderStatusData>,
}

#[derive(Debug, Deserialize)]
struct OrderStatusData {
    status: String,
}

/// Status-only MultiSafepay client.
#[derive(Debug, Clone)]
pub struct MultiSafepayClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl MultiSafepayClient {
    pub fn new(
        api_key: Option<String>,
        environment: GatewayEnvironment,
        timeout: Duration,
    ) -> Self {
        let base_url = match environment {
            GatewayEnvironment::Test => SANDBOX_BASE_URL,
            GatewayEnvironment::Live => LIVE_BASE_URL,
        };
        Self::with_base_url(api_key, base_url, timeout)
    }

    pub fn with_base_url(api_key: Option<String>, base_url: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build gateway HTTP client, using defaults: {}", e);
                Client::new()
            });
        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn order_url(&self, order_id: &str) -> String {
        format!("{}/orders/{}", self.base_url, urlencoding::encode(order_id))
    }
}

#[async_trait]
impl PaymentGateway for MultiSafepayClient {
    fn provider_name(&self) -> &'static str {
        "multisafepay"
    }

    async fn fetch_status(&self, order_id: &str) -> GatewayStatus {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::debug!("No gateway credential configured, skipping status check for {}", order_id);
            return GatewayStatus::Unavailable(UnavailableReason::MissingCredential);
        };

        let response = match self
            .client
            .get(self.order_url(order_id))
            .header("api_key", api_key)
            .header("Accept", "application/json")
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                tracing::warn!("Gateway status check timed out for order {}", order_id);
                return GatewayStatus::Unavailable(UnavailableReason::Timeout);
            }
            Err(e) => {
                tracing::warn!("Gateway status check failed for order {}: {}", order_id, e);
                return GatewayStatus::Unavailable(UnavailableReason::Transport(e.to_string()));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                "Gateway returned {} for order {}: {}",
                status,
                order_id,
                body
            );
            return GatewayStatus::Unavailable(UnavailableReason::HttpStatus(status.as_u16()));
        }

        let parsed: OrderStatusResponse = match response.json().await {
            Ok(p) => p,
            Err(e) if e.is_timeout() => {
                tracing::warn!("Gateway response body timed out for order {}", order_id);
                return GatewayStatus::Unavailable(UnavailableReason::Timeout);
            }
            Err(e) => {
                tracing::warn!("Unparseable gateway response for order {}: {}", order_id, e);
                return GatewayStatus::Unavailable(UnavailableReason::Malformed(e.to_string()));
            }
        };

        match parsed {
            OrderStatusResponse {
                success: true,
                data: Some(data),
            } => GatewayStatus::Reported {
                status: data.status,
            },
            OrderStatusResponse { success, .. } => {
                tracing::warn!(
                    "Gateway lookup unsuccessful for order {} (success={})",
                    order_id,
                    success
                );
                GatewayStatus::Unavailable(UnavailableReason::Rejected)
            }
        }
    }
}
