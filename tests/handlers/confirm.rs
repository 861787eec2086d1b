//! POST /api/payment/verify

use axum::http::StatusCode;
use serde_json::json;

#[path = "../common/mod.rs"]
mod common;
use common::*;

const URI: &str = "/api/payment/verify";

#[tokio::test]
async fn test_zero_amount_order_activates_subscription() {
    let env = TestEnv::new(StubGateway::unavailable());
    let user = {
        let conn = env.conn();
        let user = create_test_user(&conn, "free@example.com");
        create_test_order(&conn, "free_1", &user, 0, PaymentStatus::Paid);
        user
    };

    let (status, body) = post_json(env.app(), URI, json!({ "orderId": "free_1" })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["order"]["id"], "free_1");
    assert_eq!(body["order"]["status"], "paid");
    assert_eq!(body["order"]["amountCents"], 0);
    assert_eq!(body["order"]["packageType"], "pro");
    assert!(body["order"]["paidAt"].is_i64());
    assert!(body["order"].get("amount_cents").is_none());
    assert_eq!(body["user"]["id"], user.id);
    assert_eq!(body["user"]["email"], "free@example.com");
    assert_eq!(body["user"]["subscription"]["status"], "active");
    assert_eq!(body["user"]["subscription"]["tier"], "pro");
    assert_eq!(body["user"]["subscription"]["orderId"], "free_1");
    assert_eq!(env.gateway.calls(), 0);

    let subscription = queries::get_subscription(&env.conn(), user.id).unwrap().unwrap();
    assert_eq!(subscription.status, SubscriptionStatus::Active);
    assert_eq!(subscription.order_id, "free_1");
    assert!(subscription.end_date.is_some());
}

#[tokio::test]
async fn test_active_subscription_is_not_clobbered() {
    let env = TestEnv::new(StubGateway::unavailable());
    let user = {
        let conn = env.conn();
        let user = create_test_user(&conn, "free@example.com");
        create_test_order(&conn, "free_1", &user, 0, PaymentStatus::Paid);
        create_test_order(&conn, "free_2", &user, 0, PaymentStatus::Paid);
        user
    };

    post_json(env.app(), URI, json!({ "orderId": "free_1" })).await;
    let before = queries::get_subscription(&env.conn(), user.id).unwrap().unwrap();

    let (status, body) = post_json(env.app(), URI, json!({ "orderId": "free_2" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["subscription"]["orderId"], "free_1");

    let after = queries::get_subscription(&env.conn(), user.id).unwrap().unwrap();
    assert_eq!(after.order_id, before.order_id);
    assert_eq!(after.start_date, before.start_date);

    // A lapsed subscription may be refreshed
    queries::set_subscription_status(&env.conn(), user.id, SubscriptionStatus::Expired).unwrap();
    post_json(env.app(), URI, json!({ "orderId": "free_2" })).await;
    let refreshed = queries::get_subscription(&env.conn(), user.id).unwrap().unwrap();
    assert_eq!(refreshed.status, SubscriptionStatus::Active);
    assert_eq!(refreshed.order_id, "free_2");
}

#[tokio::test]
async fn test_test_order_completes_outside_production() {
    let env = TestEnv::new(StubGateway::unavailable());
    let (user, program) = {
        let conn = env.conn();
        let user = create_test_user(&conn, "tester@example.com");
        let program = create_days_program(&conn, STARTER_SLUG, 3);
        create_test_transaction(&conn, "test_ord_1", &user, &program, PaymentStatus::Pending);
        (user, program)
    };

    let (status, body) = post_json(
        env.app(),
        URI,
        json!({ "orderId": "test_ord_1", "mock": true }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["order"]["status"], "completed");
    assert_eq!(env.gateway.calls(), 0);

    let conn = env.conn();
    assert_eq!(transaction_status(&conn, "test_ord_1"), PaymentStatus::Completed);
    assert!(
        queries::get_enrollment(&conn, user.id, program.id, "test_ord_1")
            .unwrap()
            .is_some()
    );
    assert_eq!(queries::list_day_progress(&conn, user.id, program.id).unwrap().len(), 3);
}

#[tokio::test]
async fn test_test_package_order_activates_once() {
    let env = TestEnv::new(StubGateway::unavailable());
    let user = {
        let conn = env.conn();
        let user = create_test_user(&conn, "tester@example.com");
        create_test_order(&conn, "test_pkg_1", &user, 1900, PaymentStatus::Pending);
        user
    };

    let (status, body) = post_json(env.app(), URI, json!({ "orderId": "test_pkg_1" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["status"], "completed");
    assert_eq!(body["user"]["subscription"]["status"], "active");

    // Confirming again finds a settled order and leaves the subscription alone
    let first = queries::get_subscription(&env.conn(), user.id).unwrap().unwrap();
    let (status, _) = post_json(env.app(), URI, json!({ "orderId": "test_pkg_1" })).await;
    assert_eq!(status, StatusCode::OK);
    let second = queries::get_subscription(&env.conn(), user.id).unwrap().unwrap();
    assert_eq!(first.updated_at, second.updated_at);
}

#[tokio::test]
async fn test_externally_completed_purchase_is_enrolled_on_confirm() {
    let env = TestEnv::new(StubGateway::unavailable());
    let (user, program) = {
        let conn = env.conn();
        let user = create_test_user(&conn, "buyer@example.com");
        let program = create_modules_program(&conn, STARTER_SLUG, &[2, 3]);
        create_test_transaction(&conn, "ord_wh", &user, &program, PaymentStatus::Completed);
        (user, program)
    };

    let (status, body) = post_json(env.app(), URI, json!({ "orderId": "ord_wh" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["status"], "completed");
    assert_eq!(body["order"]["programId"], program.id);

    // A later poll finds everything in place and sends nothing new
    let (_, body) = get_json(env.app(), "/api/payment/verify?orderId=ord_wh").await;
    assert_eq!(body["details"]["enrolled"], true);

    let conn = env.conn();
    assert_eq!(queries::list_enrollments_for_user(&conn, user.id).unwrap().len(), 1);
    let progress = queries::get_program_progress(&conn, user.id, program.id)
        .unwrap()
        .unwrap();
    assert_eq!(progress.total_lessons, 5);
    assert_eq!(env.upsell.commands().len(), 1);
    assert_eq!(env.gateway.calls(), 0);
}

#[tokio::test]
async fn test_test_order_rejected_in_production() {
    let env = TestEnv::production(StubGateway::reporting("completed"));
    {
        let conn = env.conn();
        let user = create_test_user(&conn, "tester@example.com");
        let program = create_days_program(&conn, STARTER_SLUG, 3);
        create_test_transaction(&conn, "test_ord_1", &user, &program, PaymentStatus::Pending);
    }

    let (status, body) = post_json(env.app(), URI, json!({ "orderId": "test_ord_1" })).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);
    assert_eq!(body["errorCode"], "TEST_ORDER_REJECTED");
    assert_eq!(transaction_status(&env.conn(), "test_ord_1"), PaymentStatus::Pending);
    assert_eq!(env.gateway.calls(), 0);
}

#[tokio::test]
async fn test_mock_flag_cannot_force_real_orders() {
    let env = TestEnv::new(StubGateway::unavailable());
    {
        let conn = env.conn();
        let user = create_test_user(&conn, "buyer@example.com");
        create_test_order(&conn, "ord_1", &user, 1900, PaymentStatus::Pending);
    }

    let (status, body) =
        post_json(env.app(), URI, json!({ "orderId": "ord_1", "mock": true })).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["errorCode"], "TEST_ORDER_REJECTED");
    assert_eq!(order_status(&env.conn(), "ord_1"), PaymentStatus::Pending);
}

#[tokio::test]
async fn test_pending_real_order_needs_gateway_confirmation() {
    let env = TestEnv::new(StubGateway::unavailable());
    {
        let conn = env.conn();
        let user = create_test_user(&conn, "buyer@example.com");
        create_test_order(&conn, "ord_1", &user, 1900, PaymentStatus::Pending);
    }

    let (status, body) = post_json(env.app(), URI, json!({ "orderId": "ord_1" })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorCode"], "PAYMENT_NOT_COMPLETED");
    assert_eq!(env.gateway.calls(), 1);
    assert_eq!(order_status(&env.conn(), "ord_1"), PaymentStatus::Pending);
}

#[tokio::test]
async fn test_gateway_confirmed_order_is_accepted() {
    let env = TestEnv::new(StubGateway::reporting("completed"));
    let user = {
        let conn = env.conn();
        let user = create_test_user(&conn, "buyer@example.com");
        create_test_order(&conn, "ord_1", &user, 1900, PaymentStatus::Initialized);
        user
    };

    let (status, body) = post_json(env.app(), URI, json!({ "orderId": "ord_1" })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["status"], "completed");
    let subscription = queries::get_subscription(&env.conn(), user.id).unwrap().unwrap();
    assert_eq!(subscription.order_id, "ord_1");
}

#[tokio::test]
async fn test_failed_order_is_rejected() {
    let env = TestEnv::new(StubGateway::reporting("completed"));
    {
        let conn = env.conn();
        let user = create_test_user(&conn, "buyer@example.com");
        create_test_order(&conn, "test_ord_9", &user, 1900, PaymentStatus::Cancelled);
    }

    let (status, body) = post_json(env.app(), URI, json!({ "orderId": "test_ord_9" })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorCode"], "PAYMENT_NOT_COMPLETED");
    assert_eq!(order_status(&env.conn(), "test_ord_9"), PaymentStatus::Cancelled);
}

#[tokio::test]
async fn test_confirm_input_errors() {
    let env = TestEnv::new(StubGateway::unavailable());

    let (status, body) = post_json(env.app(), URI, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorCode"], "MISSING_ORDER_ID");

    let (status, body) = post_json(env.app(), URI, json!({ "orderId": "missing" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["errorCode"], "ORDER_NOT_FOUND");

    let (status, body) = post_json(env.app(), URI, json!({ "orderId": 42 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorCode"], "INVALID_REQUEST");
}
