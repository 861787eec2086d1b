use std::env;
use std::time::Duration;

use crate::payments::GatewayEnvironment;

/// Clients poll the verify endpoint at this interval.
pub const CLIENT_POLL_INTERVAL: Duration = Duration::from_secs(5);

const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_millis(4000);

/// Slugs identifying the two program tiers that carry upsell behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramTiers {
    /// Day-based entry program; buying it schedules the upgrade sequence
    pub starter_slug: String,
    /// Buying this program cancels any pending starter upsell
    pub upgrade_slug: String,
}

impl Default for ProgramTiers {
    fn default() -> Self {
        Self {
            starter_slug: "kickstart".to_string(),
            upgrade_slug: "transformatie".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    /// Anything other than production allows force-confirming test orders
    pub production: bool,
    pub gateway_api_key: Option<String>,
    pub gateway_environment: GatewayEnvironment,
    /// Overrides the environment-derived gateway base URL
    pub gateway_base_url: Option<String>,
    /// Must stay below the client polling interval
    pub gateway_timeout: Duration,
    pub test_order_prefix: String,
    pub tiers: ProgramTiers,
    pub default_next_action: String,
    pub upsell_webhook_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let production = env::var("PAYVERIFY_ENV")
            .map(|v| is_production_env(&v))
            .unwrap_or(true);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let gateway_environment = env::var("MULTISAFEPAY_ENV")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(GatewayEnvironment::Test);

        let gateway_timeout = parse_gateway_timeout(env::var("GATEWAY_TIMEOUT_MS").ok().as_deref());

        let defaults = ProgramTiers::default();

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "payverify.db".to_string()),
            production,
            gateway_api_key: env::var("MULTISAFEPAY_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            gateway_environment,
            gateway_base_url: env::var("MULTISAFEPAY_BASE_URL").ok(),
            gateway_timeout,
            test_order_prefix: env::var("TEST_ORDER_PREFIX")
                .unwrap_or_else(|_| "test_".to_string()),
            tiers: ProgramTiers {
                starter_slug: env::var("STARTER_PROGRAM_SLUG")
                    .unwrap_or(defaults.starter_slug),
                upgrade_slug: env::var("UPGRADE_PROGRAM_SLUG")
                    .unwrap_or(defaults.upgrade_slug),
            },
            default_next_action: env::var("DEFAULT_NEXT_ACTION")
                .unwrap_or_else(|_| "/dashboard".to_string()),
            upsell_webhook_url: env::var("UPSELL_WEBHOOK_URL").ok(),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Only explicitly non-production names unlock test-order handling.
fn is_production_env(value: &str) -> bool {
    !matches!(
        value.to_lowercase().as_str(),
        "dev" | "development" | "test" | "staging" | "local"
    )
}

/// Gateway timeout from `GATEWAY_TIMEOUT_MS`. Values not strictly below the
/// client polling interval fall back to the default.
fn parse_gateway_timeout(raw: Option<&str>) -> Duration {
    let Some(raw) = raw else {
        return DEFAULT_GATEWAY_TIMEOUT;
    };
    match raw.trim().parse::<u64>() {
        Ok(ms) if ms > 0 && Duration::from_millis(ms) < CLIENT_POLL_INTERVAL => {
            Duration::from_millis(ms)
        }
        Ok(ms) => {
            tracing::warn!(
                "GATEWAY_TIMEOUT_MS={} must be between 1 and {} ms, using {} ms",
                ms,
                CLIENT_POLL_INTERVAL.as_millis() - 1,
                DEFAULT_GATEWAY_TIMEOUT.as_millis()
            );
            DEFAULT_GATEWAY_TIMEOUT
        }
        Err(_) => {
            tracing::warn!(
                "GATEWAY_TIMEOUT_MS='{}' is not a number, using {} ms",
                raw,
                DEFAULT_GATEWAY_TIMEOUT.as_millis()
            );
            DEFAULT_GATEWAY_TIMEOUT
        }
    }
}
