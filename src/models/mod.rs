mod enrollment;
mod order;
mod program;
mod status;
mod subscription;
mod transaction;
mod user;

pub use enrollment::*;
pub use order::*;
pub use program::*;
pub use status::*;
pub use subscription::*;
pub use transaction::*;
pub use user::*;

use serde::Serialize;

/// Either kind of purchase record, as looked up by order identifier.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PurchaseRecord {
    Package(Order),
    Program(Transaction),
}

impl PurchaseRecord {
    pub fn id(&self) -> &str {
        match self {
            PurchaseRecord::Package(o) => &o.id,
            PurchaseRecord::Program(t) => &t.id,
        }
    }

    pub fn user_id(&self) -> i64 {
        match self {
            PurchaseRecord::Package(o) => o.user_id,
            PurchaseRecord::Program(t) => t.user_id,
        }
    }

    pub fn status(&self) -> PaymentStatus {
        match self {
            PurchaseRecord::Package(o) => o.status,
            PurchaseRecord::Program(t) => t.status,
        }
    }

    pub fn amount_cents(&self) -> i64 {
        match self {
            PurchaseRecord::Package(o) => o.amount_cents,
            PurchaseRecord::Program(t) => t.amount_cents,
        }
    }

    pub fn currency(&self) -> &str {
        match self {
            PurchaseRecord::Package(o) => &o.currency,
            PurchaseRecord::Program(t) => &t.currency,
        }
    }

    pub fn paid_at(&self) -> Option<i64> {
        match self {
            PurchaseRecord::Package(o) => o.paid_at,
            PurchaseRecord::Program(t) => t.paid_at,
        }
    }

    pub fn kind_str(&self) -> &'static str {
        match self {
            PurchaseRecord::Package(_) => "package",
            PurchaseRecord::Program(_) => "program",
        }
    }
}
