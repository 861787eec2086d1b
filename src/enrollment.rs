//! Post-payment side effects.
//!
//! Runs once per purchase that has just become successful. The status write
//! that made it successful is already committed; everything here is
//! best-effort on top of it. Each effect runs in its own isolation boundary
//! and produces an [`EffectReport`]; a failing (or panicking) effect never
//! stops the ones after it and never rolls anything back.

use std::panic::{catch_unwind, AssertUnwindSafe};

use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;

use crate::config::ProgramTiers;
use crate::db::queries::{self, DaySeed};
use crate::models::{
    period_end, ActivateSubscription, Order, Program, ProgramKind, PurchaseRecord, Transaction,
};
use crate::upsell::{UpsellCommand, UpsellSequencer};

/// Collaborators the orchestrator needs besides the database.
pub struct FulfillmentContext<'a> {
    pub upsell: &'a dyn UpsellSequencer,
    pub tiers: &'a ProgramTiers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// Catalog lookup of the purchased program
    LoadProgram,
    Enrollment,
    DayProgress,
    ModuleProgress,
    UpsellSchedule,
    UpsellCancel,
    Subscription,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum EffectOutcome {
    Applied,
    /// Nothing to do, usually because an earlier run already did it
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectReport {
    pub effect: Effect,
    #[serde(flatten)]
    pub outcome: EffectOutcome,
}

/// Diagnostics for one fulfillment run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FulfillmentReport {
    pub effects: Vec<EffectReport>,
}

impl FulfillmentReport {
    pub fn outcome(&self, effect: Effect) -> Option<&EffectOutcome> {
        self.effects
            .iter()
            .find(|r| r.effect == effect)
            .map(|r| &r.outcome)
    }

    pub fn failures(&self) -> impl Iterator<Item = &EffectReport> {
        self.effects
            .iter()
            .filter(|r| matches!(r.outcome, EffectOutcome::Failed(_)))
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    pub fn applied_any(&self) -> bool {
        self.effects
            .iter()
            .any(|r| r.outcome == EffectOutcome::Applied)
    }
}

/// Effects a program purchase triggers, in execution order.
///
/// Progress shape follows the program's content type; upsell handling follows
/// its tier.
pub fn plan_program_effects(program: &Program, tiers: &ProgramTiers) -> Vec<Effect> {
    let mut effects = vec![Effect::Enrollment];
    effects.push(match program.kind {
        ProgramKind::Days => Effect::DayProgress,
        ProgramKind::Modules => Effect::ModuleProgress,
    });
    if program.slug == tiers.starter_slug {
        effects.push(Effect::UpsellSchedule);
    } else if program.slug == tiers.upgrade_slug {
        effects.push(Effect::UpsellCancel);
    }
    effects
}

/// Run every side effect for a successful purchase.
///
/// Safe to repeat for a purchase that was settled elsewhere (webhook, or a
/// request that died after its status write): every write is insert-once, and
/// upsell commands are only sent alongside a newly created enrollment.
pub fn fulfill(
    conn: &mut Connection,
    ctx: &FulfillmentContext<'_>,
    purchase: &PurchaseRecord,
) -> FulfillmentReport {
    let report = match purchase {
        PurchaseRecord::Program(tx) => fulfill_program(conn, ctx, tx),
        PurchaseRecord::Package(order) => FulfillmentReport {
            effects: vec![activate_subscription_for(conn, order)],
        },
    };

    if report.has_failures() {
        tracing::warn!(
            "Fulfillment for order {} finished with {} failed effect(s)",
            purchase.id(),
            report.failures().count()
        );
    } else if report.applied_any() {
        tracing::info!("Fulfillment for order {} finished", purchase.id());
    } else {
        tracing::debug!("Fulfillment for order {} had nothing left to do", purchase.id());
    }
    report
}

fn fulfill_program(
    conn: &mut Connection,
    ctx: &FulfillmentContext<'_>,
    tx: &Transaction,
) -> FulfillmentReport {
    let mut effects = Vec::new();

    let program = match queries::get_program_by_id(conn, tx.program_id) {
        Ok(Some(p)) => p,
        lookup => {
            let reason = match lookup {
                Err(e) => format!("program lookup failed: {}", e),
                _ => format!("program {} not in catalog", tx.program_id),
            };
            effects.push(report(
                Effect::LoadProgram,
                &tx.id,
                tx.user_id,
                EffectOutcome::Failed(reason),
            ));
            // Enrollment needs only ids; progress and upsell need the program
            effects.push(run_effect(Effect::Enrollment, &tx.id, tx.user_id, || {
                enroll(conn, tx)
            }));
            return FulfillmentReport { effects };
        }
    };

    // Set once this run created the enrollment row
    let mut enrolled_now = false;

    for effect in plan_program_effects(&program, ctx.tiers) {
        let result = match effect {
            Effect::Enrollment => {
                let result = run_effect(effect, &tx.id, tx.user_id, || enroll(conn, tx));
                enrolled_now = result.outcome == EffectOutcome::Applied;
                result
            }
            Effect::UpsellSchedule | Effect::UpsellCancel if !enrolled_now => report(
                effect,
                &tx.id,
                tx.user_id,
                EffectOutcome::Skipped("no new enrollment for this order".to_string()),
            ),
            Effect::DayProgress => run_effect(effect, &tx.id, tx.user_id, || {
                seed_days(conn, tx)
            }),
            Effect::ModuleProgress => run_effect(effect, &tx.id, tx.user_id, || {
                seed_modules(conn, tx)
            }),
            Effect::UpsellSchedule => run_effect(effect, &tx.id, tx.user_id, || {
                dispatch_upsell(
                    ctx.upsell,
                    UpsellCommand::schedule_starter_upgrade(
                        tx.user_id,
                        &tx.id,
                        &ctx.tiers.upgrade_slug,
                    ),
                )
            }),
            Effect::UpsellCancel => run_effect(effect, &tx.id, tx.user_id, || {
                dispatch_upsell(ctx.upsell, UpsellCommand::cancel_starter_upgrade(tx.user_id))
            }),
            Effect::LoadProgram | Effect::Subscription => continue,
        };
        effects.push(result);
    }

    FulfillmentReport { effects }
}

/// Activate the package's subscription tier unless the user already has an
/// active one.
fn activate_subscription_for(conn: &Connection, order: &Order) -> EffectReport {
    run_effect(Effect::Subscription, &order.id, order.user_id, || {
        let start = order.paid_at.unwrap_or_else(|| Utc::now().timestamp());
        let input = ActivateSubscription {
            user_id: order.user_id,
            tier: order.package_type.clone(),
            billing_period: order.billing_period.clone(),
            order_id: order.id.clone(),
            start_date: start,
            end_date: period_end(&order.billing_period, start),
        };
        match queries::activate_subscription(conn, &input) {
            Ok(true) => Ok(EffectOutcome::Applied),
            Ok(false) => Ok(EffectOutcome::Skipped(
                "subscription already active".to_string(),
            )),
            Err(e) => Err(e.to_string()),
        }
    })
}

fn enroll(conn: &Connection, tx: &Transaction) -> Result<EffectOutcome, String> {
    match queries::create_enrollment(conn, tx.user_id, tx.program_id, &tx.id) {
        Ok(true) => Ok(EffectOutcome::Applied),
        Ok(false) => Ok(EffectOutcome::Skipped("already enrolled".to_string())),
        Err(e) => Err(e.to_string()),
    }
}

fn seed_days(conn: &mut Connection, tx: &Transaction) -> Result<EffectOutcome, String> {
    match queries::seed_day_progress(conn, tx.user_id, tx.program_id) {
        Ok(DaySeed::Seeded(_)) => Ok(EffectOutcome::Applied),
        Ok(DaySeed::AlreadySeeded) => Ok(EffectOutcome::Skipped(
            "day progress already seeded".to_string(),
        )),
        Ok(DaySeed::NoDays) => Ok(EffectOutcome::Skipped(
            "program has no days in catalog".to_string(),
        )),
        Err(e) => Err(e.to_string()),
    }
}

fn seed_modules(conn: &Connection, tx: &Transaction) -> Result<EffectOutcome, String> {
    let outline = queries::get_program_outline(conn, tx.program_id).map_err(|e| e.to_string())?;
    match queries::create_program_progress(conn, tx.user_id, tx.program_id, &outline) {
        Ok(true) => Ok(EffectOutcome::Applied),
        Ok(false) => Ok(EffectOutcome::Skipped(
            "program progress already seeded".to_string(),
        )),
        Err(e) => Err(e.to_string()),
    }
}

fn dispatch_upsell(
    sequencer: &dyn UpsellSequencer,
    command: UpsellCommand,
) -> Result<EffectOutcome, String> {
    sequencer
        .dispatch(command)
        .map(|_| EffectOutcome::Applied)
        .map_err(|e| e.to_string())
}

/// Isolation boundary for one effect: errors and panics become a `Failed`
/// outcome and are logged with context.
fn run_effect<F>(effect: Effect, order_id: &str, user_id: i64, f: F) -> EffectReport
where
    F: FnOnce() -> Result<EffectOutcome, String>,
{
    let outcome = match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(reason)) => EffectOutcome::Failed(reason),
        Err(panic) => {
            let msg = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            EffectOutcome::Failed(format!("panicked: {}", msg))
        }
    };
    report(effect, order_id, user_id, outcome)
}

fn report(effect: Effect, order_id: &str, user_id: i64, outcome: EffectOutcome) -> EffectReport {
    match &outcome {
        EffectOutcome::Applied => {
            tracing::info!("{:?} applied for order {} (user {})", effect, order_id, user_id);
        }
        EffectOutcome::Skipped(reason) => {
            tracing::debug!(
                "{:?} skipped for order {} (user {}): {}",
                effect,
                order_id,
                user_id,
                reason
            );
        }
        EffectOutcome::Failed(reason) => {
            tracing::error!(
                "{:?} failed for order {} (user {}): {}",
                effect,
                order_id,
                user_id,
                reason
            );
        }
    }
    EffectReport { effect, outcome }
}
