//! Payverify - payment verification and enrollment reconciliation
//!
//! Decides whether a purchase succeeded by reconciling stored orders with the
//! payment gateway, and drives enrollment, progress seeding, subscription
//! activation and upsell sequencing exactly once per successful purchase.

pub mod config;
pub mod db;
pub mod enrollment;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod models;
pub mod payments;
pub mod reconcile;
pub mod upsell;
