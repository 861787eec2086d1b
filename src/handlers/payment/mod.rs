mod confirm;
pub mod messages;
mod verify;

pub use confirm::*;
pub use verify::*;

use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::db::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        // GET polls (and may reconcile), POST confirms
        .route(
            "/api/payment/verify",
            get(verify_payment).post(confirm_payment),
        )
}
