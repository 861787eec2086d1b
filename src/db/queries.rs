use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::*;

use super::from_row::{
    query_all, query_one, DAY_PROGRESS_COLS, ENROLLMENT_COLS, ORDER_COLS, PROGRAM_COLS,
    PROGRAM_DAY_COLS, PROGRAM_PROGRESS_COLS, SUBSCRIPTION_COLS, TRANSACTION_COLS, USER_COLS,
};

fn now() -> i64 {
    Utc::now().timestamp()
}

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

// ============ Users ============

pub fn create_user(conn: &Connection, input: &CreateUser) -> Result<User> {
    let now = now();
    conn.execute(
        "INSERT INTO users (email, name, created_at) VALUES (?1, ?2, ?3)",
        params![&input.email, &input.name, now],
    )?;
    Ok(User {
        id: conn.last_insert_rowid(),
        email: input.email.clone(),
        name: input.name.clone(),
        created_at: now,
    })
}

pub fn get_user_by_id(conn: &Connection, id: i64) -> Result<Option<User>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLS),
        &[&id],
    )
}

// ============ Programs & Content Catalog ============

pub fn create_program(conn: &Connection, input: &CreateProgram) -> Result<Program> {
    let now = now();
    conn.execute(
        "INSERT INTO programs (slug, name, program_type, price_cents, post_purchase_path, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            &input.slug,
            &input.name,
            input.kind.as_ref(),
            input.price_cents,
            &input.post_purchase_path,
            now
        ],
    )?;
    Ok(Program {
        id: conn.last_insert_rowid(),
        slug: input.slug.clone(),
        name: input.name.clone(),
        kind: input.kind,
        price_cents: input.price_cents,
        post_purchase_path: input.post_purchase_path.clone(),
        created_at: now,
    })
}

pub fn get_program_by_id(conn: &Connection, id: i64) -> Result<Option<Program>> {
    query_one(
        conn,
        &format!("SELECT {} FROM programs WHERE id = ?1", PROGRAM_COLS),
        &[&id],
    )
}

pub fn add_program_module(
    conn: &Connection,
    program_id: i64,
    position: i32,
    title: &str,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO program_modules (program_id, position, title) VALUES (?1, ?2, ?3)",
        params![program_id, position, title],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn add_program_lesson(
    conn: &Connection,
    module_id: i64,
    position: i32,
    title: &str,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO program_lessons (module_id, position, title) VALUES (?1, ?2, ?3)",
        params![module_id, position, title],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn add_program_day(
    conn: &Connection,
    program_id: i64,
    day_number: i32,
    title: &str,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO program_days (program_id, day_number, title) VALUES (?1, ?2, ?3)",
        params![program_id, day_number, title],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_program_days(conn: &Connection, program_id: i64) -> Result<Vec<ProgramDay>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM program_days WHERE program_id = ?1 ORDER BY day_number",
            PROGRAM_DAY_COLS
        ),
        &[&program_id],
    )
}

/// Module/lesson totals plus the first lesson in reading order.
pub fn get_program_outline(conn: &Connection, program_id: i64) -> Result<ProgramOutline> {
    let (total_modules, total_lessons): (i64, i64) = conn.query_row(
        "SELECT
            (SELECT COUNT(*) FROM program_modules WHERE program_id = ?1),
            (SELECT COUNT(*) FROM program_lessons l
                JOIN program_modules m ON m.id = l.module_id
                WHERE m.program_id = ?1)",
        params![program_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let first_module_id: Option<i64> = conn
        .query_row(
            "SELECT id FROM program_modules WHERE program_id = ?1
             ORDER BY position, id LIMIT 1",
            params![program_id],
            |row| row.get(0),
        )
        .optional()?;

    let first_lesson: Option<(i64, i64)> = conn
        .query_row(
            "SELECT l.id, m.id FROM program_lessons l
             JOIN program_modules m ON m.id = l.module_id
             WHERE m.program_id = ?1
             ORDER BY m.position, m.id, l.position, l.id LIMIT 1",
            params![program_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    Ok(ProgramOutline {
        total_modules,
        total_lessons,
        // The module holding the first lesson wins over an empty leading module
        first_module_id: first_lesson.map(|(_, m)| m).or(first_module_id),
        first_lesson_id: first_lesson.map(|(l, _)| l),
    })
}

// ============ Orders ============

pub fn create_order(conn: &Connection, input: &CreateOrder) -> Result<Order> {
    let now = now();
    let paid_at = input.status.is_success().then_some(now);
    conn.execute(
        "INSERT INTO orders (id, user_id, package_type, billing_period, amount_cents, currency, status, payment_provider, paid_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'multisafepay', ?8, ?9, ?9)",
        params![
            &input.id,
            input.user_id,
            &input.package_type,
            &input.billing_period,
            input.amount_cents,
            &input.currency,
            input.status.as_ref(),
            paid_at,
            now
        ],
    )?;
    get_order_by_id(conn, &input.id)?
        .ok_or_else(|| AppError::Internal("Order vanished after insert".into()))
}

pub fn get_order_by_id(conn: &Connection, id: &str) -> Result<Option<Order>> {
    query_one(
        conn,
        &format!("SELECT {} FROM orders WHERE id = ?1", ORDER_COLS),
        &[&id],
    )
}

// ============ Transactions ============

pub fn create_transaction(conn: &Connection, input: &CreateTransaction) -> Result<Transaction> {
    let now = now();
    let paid_at = input.status.is_success().then_some(now);
    conn.execute(
        "INSERT INTO transactions (id, user_id, program_id, amount_cents, currency, status, paid_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        params![
            &input.id,
            input.user_id,
            input.program_id,
            input.amount_cents,
            &input.currency,
            input.status.as_ref(),
            paid_at,
            now
        ],
    )?;
    get_transaction_by_id(conn, &input.id)?
        .ok_or_else(|| AppError::Internal("Transaction vanished after insert".into()))
}

pub fn get_transaction_by_id(conn: &Connection, id: &str) -> Result<Option<Transaction>> {
    query_one(
        conn,
        &format!("SELECT {} FROM transactions WHERE id = ?1", TRANSACTION_COLS),
        &[&id],
    )
}

/// Look up a purchase by order identifier: package orders first, then
/// program transactions.
pub fn find_purchase(conn: &Connection, id: &str) -> Result<Option<PurchaseRecord>> {
    if let Some(order) = get_order_by_id(conn, id)? {
        return Ok(Some(PurchaseRecord::Package(order)));
    }
    Ok(get_transaction_by_id(conn, id)?.map(PurchaseRecord::Program))
}

// ============ Status Transitions ============

/// Tables that carry the shared payment status columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseTable {
    Orders,
    Transactions,
}

impl PurchaseTable {
    fn name(self) -> &'static str {
        match self {
            PurchaseTable::Orders => "orders",
            PurchaseTable::Transactions => "transactions",
        }
    }

    pub fn of(record: &PurchaseRecord) -> Self {
        match record {
            PurchaseRecord::Package(_) => PurchaseTable::Orders,
            PurchaseRecord::Program(_) => PurchaseTable::Transactions,
        }
    }
}

/// Atomically move an unresolved record to a terminal status (compare-and-swap).
///
/// Returns true only for the single caller whose write flipped the row; that
/// caller owns the downstream side effects. Rows that are already terminal are
/// never touched, so no call can move a status backward.
pub fn try_transition_status(
    conn: &Connection,
    table: PurchaseTable,
    id: &str,
    to: PaymentStatus,
    gateway_status: Option<&str>,
) -> Result<bool> {
    if !to.is_terminal() {
        return Err(AppError::Internal(format!(
            "refusing non-terminal transition target '{}' for {}",
            to,
            id
        )));
    }
    let now = now();
    let paid_at = to.is_success().then_some(now);
    let sql = format!(
        "UPDATE {} SET status = ?1,
            gateway_status = COALESCE(?2, gateway_status),
            paid_at = COALESCE(paid_at, ?3),
            updated_at = ?4
         WHERE id = ?5 AND status IN ('pending', 'initialized')",
        table.name()
    );
    let affected = conn.execute(&sql, params![to.as_ref(), gateway_status, paid_at, now, id])?;
    Ok(affected > 0)
}

/// Record the raw gateway status without touching the canonical status.
pub fn update_gateway_status(
    conn: &Connection,
    table: PurchaseTable,
    id: &str,
    gateway_status: &str,
) -> Result<bool> {
    let sql = format!(
        "UPDATE {} SET gateway_status = ?1, updated_at = ?2
         WHERE id = ?3 AND (gateway_status IS NULL OR gateway_status <> ?1)",
        table.name()
    );
    let affected = conn.execute(&sql, params![gateway_status, now(), id])?;
    Ok(affected > 0)
}

// ============ Enrollments ============

/// Idempotent by (user, program, order): returns false when the row already existed.
pub fn create_enrollment(
    conn: &Connection,
    user_id: i64,
    program_id: i64,
    order_id: &str,
) -> Result<bool> {
    let affected = conn.execute(
        "INSERT INTO program_enrollments (id, user_id, program_id, order_id, status, enrolled_at)
         VALUES (?1, ?2, ?3, ?4, 'active', ?5)
         ON CONFLICT(user_id, program_id, order_id) DO NOTHING",
        params![gen_id(), user_id, program_id, order_id, now()],
    )?;
    Ok(affected > 0)
}

pub fn get_enrollment(
    conn: &Connection,
    user_id: i64,
    program_id: i64,
    order_id: &str,
) -> Result<Option<Enrollment>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM program_enrollments
             WHERE user_id = ?1 AND program_id = ?2 AND order_id = ?3",
            ENROLLMENT_COLS
        ),
        &[&user_id, &program_id, &order_id],
    )
}

pub fn list_enrollments_for_user(conn: &Connection, user_id: i64) -> Result<Vec<Enrollment>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM program_enrollments WHERE user_id = ?1 ORDER BY enrolled_at",
            ENROLLMENT_COLS
        ),
        &[&user_id],
    )
}

// ============ Progress ============

/// Seed aggregate module/lesson progress. Returns false when a row already existed.
pub fn create_program_progress(
    conn: &Connection,
    user_id: i64,
    program_id: i64,
    outline: &ProgramOutline,
) -> Result<bool> {
    let affected = conn.execute(
        "INSERT INTO user_program_progress
            (user_id, program_id, total_modules, completed_modules, total_lessons, completed_lessons,
             progress_percentage, current_module_id, current_lesson_id, started_at)
         VALUES (?1, ?2, ?3, 0, ?4, 0, 0, ?5, ?6, ?7)
         ON CONFLICT(user_id, program_id) DO NOTHING",
        params![
            user_id,
            program_id,
            outline.total_modules,
            outline.total_lessons,
            outline.first_module_id,
            outline.first_lesson_id,
            now()
        ],
    )?;
    Ok(affected > 0)
}

pub fn get_program_progress(
    conn: &Connection,
    user_id: i64,
    program_id: i64,
) -> Result<Option<ProgramProgress>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM user_program_progress WHERE user_id = ?1 AND program_id = ?2",
            PROGRAM_PROGRESS_COLS
        ),
        &[&user_id, &program_id],
    )
}

/// Outcome of seeding day-based progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaySeed {
    /// Rows were written for this many days
    Seeded(usize),
    /// The user already has day rows for this program
    AlreadySeeded,
    /// The catalog lists no days for this program
    NoDays,
}

/// Seed one progress row per program day: the first day `available`, the rest
/// `locked`. Runs in an immediate transaction so two seeders for the same
/// (user, program) cannot interleave; the second one sees the rows and skips.
pub fn seed_day_progress(conn: &mut Connection, user_id: i64, program_id: i64) -> Result<DaySeed> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let existing: i64 = tx.query_row(
        "SELECT COUNT(*) FROM user_day_progress WHERE user_id = ?1 AND program_id = ?2",
        params![user_id, program_id],
        |row| row.get(0),
    )?;
    if existing > 0 {
        return Ok(DaySeed::AlreadySeeded);
    }

    let days = list_program_days(&tx, program_id)?;
    let Some(first_day) = days.first().map(|d| d.day_number) else {
        return Ok(DaySeed::NoDays);
    };

    let now = now();
    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO user_day_progress (user_id, program_id, day_id, day_number, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for day in &days {
            let status = if day.day_number == first_day {
                DayStatus::Available
            } else {
                DayStatus::Locked
            };
            stmt.execute(params![
                user_id,
                program_id,
                day.id,
                day.day_number,
                status.as_ref(),
                now
            ])?;
        }
    }

    tx.commit()?;
    Ok(DaySeed::Seeded(days.len()))
}

pub fn list_day_progress(
    conn: &Connection,
    user_id: i64,
    program_id: i64,
) -> Result<Vec<DayProgress>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM user_day_progress WHERE user_id = ?1 AND program_id = ?2
             ORDER BY day_number",
            DAY_PROGRESS_COLS
        ),
        &[&user_id, &program_id],
    )
}

// ============ Subscriptions ============

/// Activate (or refresh) a subscription unless one is already active.
///
/// The `WHERE` on the upsert makes the "already active" check part of the
/// write itself. Returns false when an active subscription was left alone.
pub fn activate_subscription(conn: &Connection, input: &ActivateSubscription) -> Result<bool> {
    let now = now();
    let affected = conn.execute(
        "INSERT INTO subscriptions (user_id, tier, billing_period, status, start_date, end_date, order_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, 'active', ?4, ?5, ?6, ?7, ?7)
         ON CONFLICT(user_id) DO UPDATE SET
            tier = excluded.tier,
            billing_period = excluded.billing_period,
            status = 'active',
            start_date = excluded.start_date,
            end_date = excluded.end_date,
            order_id = excluded.order_id,
            updated_at = excluded.updated_at
         WHERE subscriptions.status <> 'active'",
        params![
            input.user_id,
            &input.tier,
            &input.billing_period,
            input.start_date,
            input.end_date,
            &input.order_id,
            now
        ],
    )?;
    Ok(affected > 0)
}

pub fn get_subscription(conn: &Connection, user_id: i64) -> Result<Option<Subscription>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM subscriptions WHERE user_id = ?1",
            SUBSCRIPTION_COLS
        ),
        &[&user_id],
    )
}

/// Used by tests and operators to model a lapsed subscription.
pub fn set_subscription_status(
    conn: &Connection,
    user_id: i64,
    status: SubscriptionStatus,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE subscriptions SET status = ?1, updated_at = ?2 WHERE user_id = ?3",
        params![status.as_ref(), now(), user_id],
    )?;
    Ok(affected > 0)
}
