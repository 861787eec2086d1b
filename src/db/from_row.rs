//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to rusqlite errors.
///
/// A corrupted status column surfaces as a query error instead of a panic.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const USER_COLS: &str = "id, email, name, created_at";

pub const PROGRAM_COLS: &str =
    "id, slug, name, program_type, price_cents, post_purchase_path, created_at";

pub const PROGRAM_DAY_COLS: &str = "id, program_id, day_number";

pub const ORDER_COLS: &str = "id, user_id, package_type, billing_period, amount_cents, currency, status, gateway_status, payment_provider, paid_at, created_at, updated_at";

pub const TRANSACTION_COLS: &str = "id, user_id, program_id, amount_cents, currency, status, gateway_status, paid_at, created_at, updated_at";

pub const ENROLLMENT_COLS: &str = "id, user_id, program_id, order_id, status, enrolled_at";

pub const PROGRAM_PROGRESS_COLS: &str = "user_id, program_id, total_modules, completed_modules, total_lessons, completed_lessons, progress_percentage, current_module_id, current_lesson_id, started_at";

pub const DAY_PROGRESS_COLS: &str = "user_id, program_id, day_id, day_number, status, created_at";

pub const SUBSCRIPTION_COLS: &str = "user_id, tier, billing_period, status, start_date, end_date, order_id, created_at, updated_at";

// ============ FromRow Implementations ============

impl FromRow for User {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}

impl FromRow for Program {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Program {
            id: row.get(0)?,
            slug: row.get(1)?,
            name: row.get(2)?,
            kind: parse_enum(row, 3, "program_type")?,
            price_cents: row.get(4)?,
            post_purchase_path: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

impl FromRow for ProgramDay {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(ProgramDay {
            id: row.get(0)?,
            program_id: row.get(1)?,
            day_number: row.get(2)?,
        })
    }
}

impl FromRow for Order {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Order {
            id: row.get(0)?,
            user_id: row.get(1)?,
            package_type: row.get(2)?,
            billing_period: row.get(3)?,
            amount_cents: row.get(4)?,
            currency: row.get(5)?,
            status: parse_enum(row, 6, "status")?,
            gateway_status: row.get(7)?,
            payment_provider: row.get(8)?,
            paid_at: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }
}

impl FromRow for Transaction {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Transaction {
            id: row.get(0)?,
            user_id: row.get(1)?,
            program_id: row.get(2)?,
            amount_cents: row.get(3)?,
            currency: row.get(4)?,
            status: parse_enum(row, 5, "status")?,
            gateway_status: row.get(6)?,
            paid_at: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}

impl FromRow for Enrollment {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Enrollment {
            id: row.get(0)?,
            user_id: row.get(1)?,
            program_id: row.get(2)?,
            order_id: row.get(3)?,
            status: row.get(4)?,
            enrolled_at: row.get(5)?,
        })
    }
}

impl FromRow for ProgramProgress {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(ProgramProgress {
            user_id: row.get(0)?,
            program_id: row.get(1)?,
            total_modules: row.get(2)?,
            completed_modules: row.get(3)?,
            total_lessons: row.get(4)?,
            completed_lessons: row.get(5)?,
            progress_percentage: row.get(6)?,
            current_module_id: row.get(7)?,
            current_lesson_id: row.get(8)?,
            started_at: row.get(9)?,
        })
    }
}

impl FromRow for DayProgress {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(DayProgress {
            user_id: row.get(0)?,
            program_id: row.get(1)?,
            day_id: row.get(2)?,
            day_number: row.get(3)?,
            status: parse_enum(row, 4, "status")?,
            created_at: row.get(5)?,
        })
    }
}

impl FromRow for Subscription {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Subscription {
            user_id: row.get(0)?,
            tier: row.get(1)?,
            billing_period: row.get(2)?,
            status: parse_enum(row, 3, "status")?,
            start_date: row.get(4)?,
            end_date: row.get(5)?,
            order_id: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}
