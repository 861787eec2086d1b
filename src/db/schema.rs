use rusqlite::Connection;

/// Initialize the database schema. Safe to run on every startup.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Users (identity lives in the auth subsystem; mirrored here for responses)
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );

        -- Programs (purchasable courses)
        CREATE TABLE IF NOT EXISTS programs (
            id INTEGER PRIMARY KEY,
            slug TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            program_type TEXT NOT NULL CHECK (program_type IN ('days', 'modules')),
            price_cents INTEGER NOT NULL DEFAULT 0,
            post_purchase_path TEXT,
            created_at INTEGER NOT NULL
        );

        -- Content catalog (owned by course delivery, read here to seed progress)
        CREATE TABLE IF NOT EXISTS program_modules (
            id INTEGER PRIMARY KEY,
            program_id INTEGER NOT NULL REFERENCES programs(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            title TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_program_modules_program ON program_modules(program_id, position);

        CREATE TABLE IF NOT EXISTS program_lessons (
            id INTEGER PRIMARY KEY,
            module_id INTEGER NOT NULL REFERENCES program_modules(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            title TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_program_lessons_module ON program_lessons(module_id, position);

        CREATE TABLE IF NOT EXISTS program_days (
            id INTEGER PRIMARY KEY,
            program_id INTEGER NOT NULL REFERENCES programs(id) ON DELETE CASCADE,
            day_number INTEGER NOT NULL,
            title TEXT NOT NULL,
            UNIQUE(program_id, day_number)
        );

        -- Package orders (subscription purchases)
        -- status: canonical, monotonic; gateway_status: raw gateway mirror
        CREATE TABLE IF NOT EXISTS orders (
            id TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id),
            package_type TEXT NOT NULL,
            billing_period TEXT NOT NULL,
            amount_cents INTEGER NOT NULL,
            currency TEXT NOT NULL DEFAULT 'EUR',
            status TEXT NOT NULL CHECK (status IN ('pending', 'initialized', 'completed', 'paid', 'cancelled', 'failed', 'expired')),
            gateway_status TEXT,
            payment_provider TEXT NOT NULL DEFAULT 'multisafepay',
            paid_at INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_orders_user ON orders(user_id);

        -- Program purchase transactions (1:1 with a gateway order)
        CREATE TABLE IF NOT EXISTS transactions (
            id TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id),
            program_id INTEGER NOT NULL REFERENCES programs(id),
            amount_cents INTEGER NOT NULL,
            currency TEXT NOT NULL DEFAULT 'EUR',
            status TEXT NOT NULL CHECK (status IN ('pending', 'initialized', 'completed', 'paid', 'cancelled', 'failed', 'expired')),
            gateway_status TEXT,
            paid_at INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_transactions_user ON transactions(user_id);

        -- Enrollments (natural key makes creation idempotent)
        CREATE TABLE IF NOT EXISTS program_enrollments (
            id TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id),
            program_id INTEGER NOT NULL REFERENCES programs(id),
            order_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active',
            enrolled_at INTEGER NOT NULL,
            UNIQUE(user_id, program_id, order_id)
        );
        CREATE INDEX IF NOT EXISTS idx_program_enrollments_user ON program_enrollments(user_id, program_id);

        -- Aggregate progress for module/lesson programs
        CREATE TABLE IF NOT EXISTS user_program_progress (
            user_id INTEGER NOT NULL REFERENCES users(id),
            program_id INTEGER NOT NULL REFERENCES programs(id),
            total_modules INTEGER NOT NULL DEFAULT 0,
            completed_modules INTEGER NOT NULL DEFAULT 0,
            total_lessons INTEGER NOT NULL DEFAULT 0,
            completed_lessons INTEGER NOT NULL DEFAULT 0,
            progress_percentage INTEGER NOT NULL DEFAULT 0,
            current_module_id INTEGER,
            current_lesson_id INTEGER,
            started_at INTEGER NOT NULL,
            UNIQUE(user_id, program_id)
        );

        -- Per-day progress for day-based programs
        CREATE TABLE IF NOT EXISTS user_day_progress (
            user_id INTEGER NOT NULL REFERENCES users(id),
            program_id INTEGER NOT NULL REFERENCES programs(id),
            day_id INTEGER NOT NULL REFERENCES program_days(id),
            day_number INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'locked' CHECK (status IN ('locked', 'available', 'in_progress', 'completed')),
            created_at INTEGER NOT NULL,
            UNIQUE(user_id, day_id)
        );
        CREATE INDEX IF NOT EXISTS idx_user_day_progress_program ON user_day_progress(user_id, program_id);

        -- Subscriptions (one row per user)
        CREATE TABLE IF NOT EXISTS subscriptions (
            user_id INTEGER PRIMARY KEY REFERENCES users(id),
            tier TEXT NOT NULL,
            billing_period TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('active', 'cancelled', 'expired')),
            start_date INTEGER NOT NULL,
            end_date INTEGER,
            order_id TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        "#,
    )
}
