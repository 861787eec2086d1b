//! Status columns: compare-and-swap transitions and the gateway mirror.

#[path = "../common/mod.rs"]
mod common;
use common::*;

use payverify::db::queries::PurchaseTable;

#[test]
fn test_success_transition_stamps_paid_at() {
    let env = TestEnv::new(StubGateway::unavailable());
    let conn = env.conn();
    let user = create_test_user(&conn, "buyer@example.com");
    let order = create_test_order(&conn, "ord_1", &user, 1900, PaymentStatus::Pending);
    assert!(order.paid_at.is_none());

    let won = queries::try_transition_status(
        &conn,
        PurchaseTable::Orders,
        "ord_1",
        PaymentStatus::Completed,
        Some("completed"),
    )
    .unwrap();
    assert!(won);

    let order = queries::get_order_by_id(&conn, "ord_1").unwrap().unwrap();
    assert_eq!(order.status, PaymentStatus::Completed);
    assert_eq!(order.gateway_status.as_deref(), Some("completed"));
    assert!(order.paid_at.is_some());
}

#[test]
fn test_failure_transition_leaves_paid_at_empty() {
    let env = TestEnv::new(StubGateway::unavailable());
    let conn = env.conn();
    let user = create_test_user(&conn, "buyer@example.com");
    let program = create_days_program(&conn, STARTER_SLUG, 1);
    create_test_transaction(&conn, "ord_2", &user, &program, PaymentStatus::Initialized);

    assert!(
        queries::try_transition_status(
            &conn,
            PurchaseTable::Transactions,
            "ord_2",
            PaymentStatus::Expired,
            None,
        )
        .unwrap()
    );

    let tx = queries::get_transaction_by_id(&conn, "ord_2").unwrap().unwrap();
    assert_eq!(tx.status, PaymentStatus::Expired);
    assert!(tx.paid_at.is_none());
    assert!(tx.gateway_status.is_none());
}

#[test]
fn test_only_first_writer_wins() {
    let env = TestEnv::new(StubGateway::unavailable());
    let conn = env.conn();
    let user = create_test_user(&conn, "buyer@example.com");
    create_test_order(&conn, "ord_3", &user, 1900, PaymentStatus::Pending);

    let first = queries::try_transition_status(
        &conn,
        PurchaseTable::Orders,
        "ord_3",
        PaymentStatus::Completed,
        None,
    )
    .unwrap();
    let second = queries::try_transition_status(
        &conn,
        PurchaseTable::Orders,
        "ord_3",
        PaymentStatus::Completed,
        None,
    )
    .unwrap();

    assert!(first);
    assert!(!second);
}

#[test]
fn test_non_terminal_target_is_refused() {
    let env = TestEnv::new(StubGateway::unavailable());
    let conn = env.conn();
    let user = create_test_user(&conn, "buyer@example.com");
    create_test_order(&conn, "ord_4", &user, 1900, PaymentStatus::Pending);

    let result = queries::try_transition_status(
        &conn,
        PurchaseTable::Orders,
        "ord_4",
        PaymentStatus::Initialized,
        None,
    );

    assert!(result.is_err());
    assert_eq!(order_status(&conn, "ord_4"), PaymentStatus::Pending);
}

#[test]
fn test_gateway_mirror_never_touches_status() {
    let env = TestEnv::new(StubGateway::unavailable());
    let conn = env.conn();
    let user = create_test_user(&conn, "buyer@example.com");
    create_test_order(&conn, "ord_5", &user, 1900, PaymentStatus::Completed);

    assert!(queries::update_gateway_status(&conn, PurchaseTable::Orders, "ord_5", "refunded").unwrap());
    // Same value again is not a change
    assert!(!queries::update_gateway_status(&conn, PurchaseTable::Orders, "ord_5", "refunded").unwrap());

    let order = queries::get_order_by_id(&conn, "ord_5").unwrap().unwrap();
    assert_eq!(order.status, PaymentStatus::Completed);
    assert_eq!(order.gateway_status.as_deref(), Some("refunded"));
}

#[test]
fn test_find_purchase_prefers_orders() {
    let env = TestEnv::new(StubGateway::unavailable());
    let conn = env.conn();
    let user = create_test_user(&conn, "buyer@example.com");
    let program = create_days_program(&conn, STARTER_SLUG, 1);
    create_test_order(&conn, "shared_id", &user, 1900, PaymentStatus::Pending);
    create_test_transaction(&conn, "shared_id", &user, &program, PaymentStatus::Completed);
    create_test_transaction(&conn, "tx_only", &user, &program, PaymentStatus::Pending);

    let shared = queries::find_purchase(&conn, "shared_id").unwrap().unwrap();
    assert!(matches!(shared, PurchaseRecord::Package(_)));
    let tx_only = queries::find_purchase(&conn, "tx_only").unwrap().unwrap();
    assert!(matches!(tx_only, PurchaseRecord::Program(_)));
    assert!(queries::find_purchase(&conn, "missing").unwrap().is_none());
}

#[test]
fn test_schema_rejects_unknown_status_strings() {
    let env = TestEnv::new(StubGateway::unavailable());
    let conn = env.conn();
    let user = create_test_user(&conn, "buyer@example.com");
    create_test_order(&conn, "ord_6", &user, 1900, PaymentStatus::Pending);

    let result = conn.execute("UPDATE orders SET status = 'refunded' WHERE id = 'ord_6'", []);
    assert!(result.is_err());
}
