use std::sync::Arc;

use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use payverify::config::Config;
use payverify::db::{AppState, create_pool, init_db, queries};
use payverify::handlers;
use payverify::models::{
    CreateOrder, CreateProgram, CreateTransaction, CreateUser, PaymentStatus, ProgramKind,
};
use payverify::payments::{MultiSafepayClient, PaymentGateway};
use payverify::upsell::{LoggingUpsellSequencer, UpsellSequencer, WebhookUpsellSequencer};

#[derive(Parser, Debug)]
#[command(name = "payverify")]
#[command(about = "Payment verification and enrollment reconciliation service")]
struct Cli {
    /// Seed the database with a demo catalog and pending orders (non-production only)
    #[arg(long)]
    seed: bool,
}

/// Seeds a demo user, the two tier programs and a few orders to poll.
/// Skipped when the demo user already exists.
fn seed_dev_data(state: &AppState) {
    let mut conn = state.db.get().expect("Failed to get db connection for seeding");

    if queries::get_user_by_id(&conn, 1)
        .expect("Failed to look up users")
        .is_some()
    {
        tracing::info!("Database already has data, skipping seed");
        return;
    }

    let tx = conn.transaction().expect("Failed to start seed transaction");

    let user = queries::create_user(
        &tx,
        &CreateUser {
            email: "dev@payverify.local".to_string(),
            name: "Dev User".to_string(),
        },
    )
    .expect("Failed to create dev user");

    let starter = queries::create_program(
        &tx,
        &CreateProgram {
            slug: state.tiers.starter_slug.clone(),
            name: "Kickstart".to_string(),
            kind: ProgramKind::Days,
            price_cents: 4700,
            post_purchase_path: Some("/kickstart/dag/1".to_string()),
        },
    )
    .expect("Failed to create starter program");
    for day in 1..=21 {
        queries::add_program_day(&tx, starter.id, day, &format!("Dag {}", day))
            .expect("Failed to add program day");
    }

    let upgrade = queries::create_program(
        &tx,
        &CreateProgram {
            slug: state.tiers.upgrade_slug.clone(),
            name: "Transformatie".to_string(),
            kind: ProgramKind::Modules,
            price_cents: 29700,
            post_purchase_path: None,
        },
    )
    .expect("Failed to create upgrade program");
    for module in 1..=3 {
        let module_id =
            queries::add_program_module(&tx, upgrade.id, module, &format!("Module {}", module))
                .expect("Failed to add program module");
        for lesson in 1..=4 {
            queries::add_program_lesson(&tx, module_id, lesson, &format!("Les {}", lesson))
                .expect("Failed to add program lesson");
        }
    }

    let prefix = &state.test_order_prefix;
    queries::create_transaction(
        &tx,
        &CreateTransaction {
            id: format!("{}kickstart_1", prefix),
            user_id: user.id,
            program_id: starter.id,
            amount_cents: starter.price_cents,
            currency: "EUR".to_string(),
            status: PaymentStatus::Pending,
        },
    )
    .expect("Failed to create test transaction");
    queries::create_order(
        &tx,
        &CreateOrder {
            id: format!("{}package_1", prefix),
            user_id: user.id,
            package_type: "pro".to_string(),
            billing_period: "monthly".to_string(),
            amount_cents: 1900,
            currency: "EUR".to_string(),
            status: PaymentStatus::Pending,
        },
    )
    .expect("Failed to create test order");
    queries::create_order(
        &tx,
        &CreateOrder {
            id: "free_package_1".to_string(),
            user_id: user.id,
            package_type: "core".to_string(),
            billing_period: "lifetime".to_string(),
            amount_cents: 0,
            currency: "EUR".to_string(),
            status: PaymentStatus::Paid,
        },
    )
    .expect("Failed to create free order");

    tx.commit().expect("Failed to commit seed data");

    tracing::info!("============================================");
    tracing::info!("SEEDED DEV DATA");
    tracing::info!("User: {} ({})", user.email, user.id);
    tracing::info!("Programs: {} (days), {} (modules)", starter.slug, upgrade.slug);
    tracing::info!("Poll: GET /api/payment/verify?orderId={}kickstart_1", prefix);
    tracing::info!("============================================");
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "payverify=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if !config.production {
        tracing::info!("Running in NON-PRODUCTION mode: test orders can be force-confirmed");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let gateway_client = match &config.gateway_base_url {
        Some(url) => MultiSafepayClient::with_base_url(
            config.gateway_api_key.clone(),
            url,
            config.gateway_timeout,
        ),
        None => MultiSafepayClient::new(
            config.gateway_api_key.clone(),
            config.gateway_environment,
            config.gateway_timeout,
        ),
    };
    if config.gateway_api_key.is_none() {
        tracing::warn!("MULTISAFEPAY_API_KEY not set: pending orders will stay pending");
    }
    tracing::info!("Gateway status endpoint: {}", gateway_client.base_url());
    let gateway: Arc<dyn PaymentGateway> = Arc::new(gateway_client);

    let upsell: Arc<dyn UpsellSequencer> = match &config.upsell_webhook_url {
        Some(url) => Arc::new(WebhookUpsellSequencer::new(url.clone())),
        None => {
            tracing::info!("UPSELL_WEBHOOK_URL not set: upsell commands will only be logged");
            Arc::new(LoggingUpsellSequencer)
        }
    };

    let state = AppState {
        db: db_pool,
        gateway,
        upsell,
        production: config.production,
        test_order_prefix: config.test_order_prefix.clone(),
        tiers: config.tiers.clone(),
        default_next_action: config.default_next_action.clone(),
    };

    if cli.seed {
        if config.production {
            tracing::warn!("--seed flag ignored in production (set PAYVERIFY_ENV=dev)");
        } else {
            seed_dev_data(&state);
        }
    }

    let app = Router::new()
        .merge(handlers::payment::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Payverify listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
