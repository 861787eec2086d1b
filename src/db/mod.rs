mod from_row;
mod schema;
pub mod queries;

pub use schema::init_db;

use std::sync::Arc;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::ProgramTiers;
use crate::enrollment::FulfillmentContext;
use crate::payments::PaymentGateway;
use crate::upsell::UpsellSequencer;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state shared by all request handlers.
///
/// Holds no per-request mutable state; the database is the only
/// coordination point between concurrent requests.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Authoritative payment status source
    pub gateway: Arc<dyn PaymentGateway>,
    /// Upsell email sequence collaborator
    pub upsell: Arc<dyn UpsellSequencer>,
    /// Production refuses to force-confirm test orders
    pub production: bool,
    pub test_order_prefix: String,
    pub tiers: ProgramTiers,
    /// Post-purchase destination for programs without their own
    pub default_next_action: String,
}

impl AppState {
    /// Test orders are recognised purely by identifier shape.
    pub fn is_test_order(&self, order_id: &str) -> bool {
        !self.test_order_prefix.is_empty() && order_id.starts_with(&self.test_order_prefix)
    }

    pub fn fulfillment_context(&self) -> FulfillmentContext<'_> {
        FulfillmentContext {
            upsell: self.upsell.as_ref(),
            tiers: &self.tiers,
        }
    }
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path).with_init(|conn| {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update(None, "foreign_keys", "ON")
    });
    Pool::builder().max_size(10).build(manager)
}
