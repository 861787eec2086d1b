//! Test utilities and fixtures for payverify integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use rusqlite::Connection;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub use payverify::config::ProgramTiers;
pub use payverify::db::{AppState, DbPool, create_pool, init_db, queries};
pub use payverify::handlers;
pub use payverify::models::*;
pub use payverify::payments::{GatewayStatus, PaymentGateway, UnavailableReason};
pub use payverify::upsell::{UpsellCommand, UpsellError, UpsellSequencer};

pub const STARTER_SLUG: &str = "kickstart";
pub const UPGRADE_SLUG: &str = "transformatie";

// ============================================================================
// Collaborator stubs
// ============================================================================

/// Scripted gateway: pops queued answers first, then repeats the fallback.
pub struct StubGateway {
    queued: Mutex<VecDeque<GatewayStatus>>,
    fallback: GatewayStatus,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StubGateway {
    pub fn reporting(status: &str) -> Self {
        Self::with_fallback(GatewayStatus::Reported {
            status: status.to_string(),
        })
    }

    pub fn unavailable() -> Self {
        Self::with_fallback(GatewayStatus::Unavailable(UnavailableReason::Timeout))
    }

    fn with_fallback(fallback: GatewayStatus) -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            fallback,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Answer `status` for the next call only.
    pub fn then_reporting(self, status: &str) -> Self {
        self.queued.lock().unwrap().push_back(GatewayStatus::Reported {
            status: status.to_string(),
        });
        self
    }

    /// Slow every answer down to widen race windows.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    fn provider_name(&self) -> &'static str {
        "stub"
    }

    async fn fetch_status(&self, _order_id: &str) -> GatewayStatus {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let queued = self.queued.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| self.fallback.clone())
    }
}

#[derive(Default)]
pub struct RecordingSequencer {
    commands: Mutex<Vec<UpsellCommand>>,
}

impl RecordingSequencer {
    pub fn commands(&self) -> Vec<UpsellCommand> {
        self.commands.lock().unwrap().clone()
    }
}

impl UpsellSequencer for RecordingSequencer {
    fn dispatch(&self, command: UpsellCommand) -> Result<(), UpsellError> {
        self.commands.lock().unwrap().push(command);
        Ok(())
    }
}

pub struct FailingSequencer;

impl UpsellSequencer for FailingSequencer {
    fn dispatch(&self, _command: UpsellCommand) -> Result<(), UpsellError> {
        Err(UpsellError::Rejected("sequence service down".to_string()))
    }
}

pub struct PanickingSequencer;

impl UpsellSequencer for PanickingSequencer {
    fn dispatch(&self, _command: UpsellCommand) -> Result<(), UpsellError> {
        panic!("sequencer bug")
    }
}

// ============================================================================
// App state
// ============================================================================

/// Everything a test needs; the temp dir keeps the database file alive.
pub struct TestEnv {
    pub state: AppState,
    pub gateway: Arc<StubGateway>,
    pub upsell: Arc<RecordingSequencer>,
    _dir: TempDir,
}

impl TestEnv {
    /// Non-production environment with a recording upsell sequencer.
    pub fn new(gateway: StubGateway) -> Self {
        Self::build(gateway, false, None)
    }

    pub fn production(gateway: StubGateway) -> Self {
        Self::build(gateway, true, None)
    }

    /// Non-production environment whose upsell collaborator misbehaves.
    pub fn with_sequencer(gateway: StubGateway, sequencer: Arc<dyn UpsellSequencer>) -> Self {
        Self::build(gateway, false, Some(sequencer))
    }

    fn build(
        gateway: StubGateway,
        production: bool,
        sequencer: Option<Arc<dyn UpsellSequencer>>,
    ) -> Self {
        // File-backed so every pooled connection sees the same database
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("payverify.db");
        let pool = create_pool(path.to_str().unwrap()).expect("Failed to create pool");
        {
            let conn = pool.get().unwrap();
            init_db(&conn).expect("Failed to initialize schema");
        }

        let gateway = Arc::new(gateway);
        let upsell = Arc::new(RecordingSequencer::default());
        let sequencer: Arc<dyn UpsellSequencer> =
            sequencer.unwrap_or_else(|| upsell.clone() as Arc<dyn UpsellSequencer>);

        let state = AppState {
            db: pool,
            gateway: gateway.clone(),
            upsell: sequencer,
            production,
            test_order_prefix: "test_".to_string(),
            tiers: ProgramTiers {
                starter_slug: STARTER_SLUG.to_string(),
                upgrade_slug: UPGRADE_SLUG.to_string(),
            },
            default_next_action: "/dashboard".to_string(),
        };

        Self {
            state,
            gateway,
            upsell,
            _dir: dir,
        }
    }

    pub fn conn(&self) -> r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager> {
        self.state.db.get().unwrap()
    }

    pub fn app(&self) -> Router {
        handlers::payment::router().with_state(self.state.clone())
    }
}

// ============================================================================
// Catalog and purchase fixtures
// ============================================================================

pub fn create_test_user(conn: &Connection, email: &str) -> User {
    queries::create_user(
        conn,
        &CreateUser {
            email: email.to_string(),
            name: format!("Test User {}", email),
        },
    )
    .expect("Failed to create test user")
}

/// Day-based program with days `1..=days`.
pub fn create_days_program(conn: &Connection, slug: &str, days: i32) -> Program {
    let program = queries::create_program(
        conn,
        &CreateProgram {
            slug: slug.to_string(),
            name: format!("Program {}", slug),
            kind: ProgramKind::Days,
            price_cents: 4700,
            post_purchase_path: Some(format!("/{}/dag/1", slug)),
        },
    )
    .expect("Failed to create days program");
    for day in 1..=days {
        queries::add_program_day(conn, program.id, day, &format!("Dag {}", day))
            .expect("Failed to add day");
    }
    program
}

/// Module-based program; `lessons_per_module[i]` lessons in module `i + 1`.
pub fn create_modules_program(conn: &Connection, slug: &str, lessons_per_module: &[i32]) -> Program {
    let program = queries::create_program(
        conn,
        &CreateProgram {
            slug: slug.to_string(),
            name: format!("Program {}", slug),
            kind: ProgramKind::Modules,
            price_cents: 29700,
            post_purchase_path: None,
        },
    )
    .expect("Failed to create modules program");
    for (i, lessons) in lessons_per_module.iter().enumerate() {
        let position = i as i32 + 1;
        let module_id =
            queries::add_program_module(conn, program.id, position, &format!("Module {}", position))
                .expect("Failed to add module");
        for lesson in 1..=*lessons {
            queries::add_program_lesson(conn, module_id, lesson, &format!("Les {}", lesson))
                .expect("Failed to add lesson");
        }
    }
    program
}

pub fn create_test_transaction(
    conn: &Connection,
    id: &str,
    user: &User,
    program: &Program,
    status: PaymentStatus,
) -> Transaction {
    queries::create_transaction(
        conn,
        &CreateTransaction {
            id: id.to_string(),
            user_id: user.id,
            program_id: program.id,
            amount_cents: program.price_cents,
            currency: "EUR".to_string(),
            status,
        },
    )
    .expect("Failed to create test transaction")
}

pub fn create_test_order(
    conn: &Connection,
    id: &str,
    user: &User,
    amount_cents: i64,
    status: PaymentStatus,
) -> Order {
    queries::create_order(
        conn,
        &CreateOrder {
            id: id.to_string(),
            user_id: user.id,
            package_type: "pro".to_string(),
            billing_period: "monthly".to_string(),
            amount_cents,
            currency: "EUR".to_string(),
            status,
        },
    )
    .expect("Failed to create test order")
}

pub fn transaction_status(conn: &Connection, id: &str) -> PaymentStatus {
    queries::get_transaction_by_id(conn, id)
        .unwrap()
        .expect("transaction should exist")
        .status
}

pub fn order_status(conn: &Connection, id: &str) -> PaymentStatus {
    queries::get_order_by_id(conn, id)
        .unwrap()
        .expect("order should exist")
        .status
}

// ============================================================================
// HTTP helpers
// ============================================================================

pub async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    read_json(response).await
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    read_json(response).await
}

async fn read_json(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    (status, json)
}
