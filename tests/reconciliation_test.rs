mod common;

use std::time::Duration;

use bigdecimal::BigDecimal;
use chrono::Utc;

use common::{customer, Harness, Notification, ScriptedGateway, SOFA_ID, TABLE_ID};
use storefront_core::domain::{
    LineRequest, OrderStatus, PaymentMethod, Product, PurchaseSelection, Verification, DIRECT_VERIFICATION_SENTINEL,
};
use storefront_core::ports::{GatewayError, GatewayPaymentStatus, Repository};
use storefront_core::services::{
    CheckoutRequest, EngineError, EngineSettings, IntentOutcome, PaymentCallback, SettlementContext,
    VerificationOutcome,
};

fn sofas(quantity: i32) -> PurchaseSelection {
    PurchaseSelection::Cart {
        items: vec![LineRequest {
            product_id: SOFA_ID.to_string(),
            quantity,
        }],
    }
}

fn checkout(method: PaymentMethod, selection: PurchaseSelection) -> CheckoutRequest {
    CheckoutRequest {
        customer: customer(),
        selection,
        payment_method: method,
    }
}

fn signed_callback(gateway_order_id: &str, payment_id: &str) -> PaymentCallback {
    PaymentCallback {
        gateway_order_id: Some(gateway_order_id.to_string()),
        gateway_payment_id: Some(payment_id.to_string()),
        signature: Some(ScriptedGateway::sign(gateway_order_id, payment_id)),
    }
}

async fn issued_intent(h: &Harness, selection: &PurchaseSelection) -> String {
    match h.engine.create_intent(selection, None).await.unwrap() {
        IntentOutcome::Created { intent, .. } => intent.gateway_order_id,
        other => panic!("expected an intent, got {:?}", other),
    }
}

fn table() -> PurchaseSelection {
    PurchaseSelection::Single {
        product_id: TABLE_ID.to_string(),
        quantity: 1,
    }
}

fn new_order_context(selection: PurchaseSelection) -> SettlementContext {
    SettlementContext {
        customer: Some(customer()),
        selection: Some(selection),
        ..Default::default()
    }
}

#[tokio::test]
async fn cart_total_uses_catalog_price() {
    let h = Harness::new().await;

    let outcome = h
        .engine
        .checkout(checkout(PaymentMethod::Cod, sofas(2)), None)
        .await
        .unwrap();

    assert_eq!(outcome.order.total, BigDecimal::from(2000));
    assert_eq!(outcome.order.status, OrderStatus::CodPending);
}

#[tokio::test]
async fn active_deal_prices_the_cart() {
    let h = Harness::new().await;
    h.store
        .insert_product(
            Product::new(SOFA_ID, "Three seater sofa", BigDecimal::from(1000))
                .with_deal(BigDecimal::from(800), Some(Utc::now() + chrono::Duration::hours(1))),
        )
        .await;

    let outcome = h
        .engine
        .checkout(checkout(PaymentMethod::Cod, sofas(2)), None)
        .await
        .unwrap();

    assert_eq!(outcome.order.total, BigDecimal::from(1600));
}

#[tokio::test]
async fn expired_deal_falls_back_to_regular_price() {
    let h = Harness::new().await;
    h.store
        .insert_product(
            Product::new(SOFA_ID, "Three seater sofa", BigDecimal::from(1000))
                .with_deal(BigDecimal::from(500), Some(Utc::now() - chrono::Duration::minutes(1))),
        )
        .await;

    let quote = h.engine.quote(&sofas(1)).await.unwrap();
    assert_eq!(quote.total, BigDecimal::from(1000));
}

#[tokio::test]
async fn unknown_product_is_rejected() {
    let h = Harness::new().await;
    let selection = PurchaseSelection::Single {
        product_id: "NOPE".to_string(),
        quantity: 1,
    };

    let err = h
        .engine
        .checkout(checkout(PaymentMethod::Cod, selection), None)
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::ProductNotFound(id) if id == "NOPE"));
    assert_eq!(h.store.order_count().await, 0);
}

#[tokio::test]
async fn guests_cannot_pay_online() {
    let h = Harness::new().await;

    let err = h
        .engine
        .checkout(checkout(PaymentMethod::Razorpay, sofas(1)), None)
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::AuthRequired));
}

#[tokio::test]
async fn same_payment_id_confirms_exactly_one_order() {
    let h = Harness::new().await;
    let user = h.user("Ravi", "ravi@example.com", "tok_ravi").await;

    let outcome = h
        .engine
        .checkout(checkout(PaymentMethod::Razorpay, sofas(1)), Some(&user))
        .await
        .unwrap();
    let intent = outcome.intent.expect("intent created");
    assert_eq!(outcome.order.status, OrderStatus::Pending);
    assert_eq!(intent.amount_minor, 100_000);

    h.gateway.pay(&intent.gateway_order_id, "pay_001");

    let context = SettlementContext {
        order_id: Some(outcome.order.id),
        user: Some(user.clone()),
        ..Default::default()
    };

    let first = h
        .engine
        .verify_and_confirm(signed_callback(&intent.gateway_order_id, "pay_001"), context.clone())
        .await
        .unwrap();
    let confirmed = match first {
        VerificationOutcome::Confirmed { order } => order,
        other => panic!("expected confirmation, got {:?}", other),
    };
    assert_eq!(confirmed.id, outcome.order.id);
    assert_eq!(confirmed.status, OrderStatus::Confirmed);
    assert_eq!(confirmed.verification, Verification::Signature);

    let second = h
        .engine
        .verify_and_confirm(signed_callback(&intent.gateway_order_id, "pay_001"), context)
        .await
        .unwrap();
    match second {
        VerificationOutcome::AlreadyProcessed { order } => assert_eq!(order.id, confirmed.id),
        other => panic!("expected replay, got {:?}", other),
    }

    assert_eq!(h.store.payment_count().await, 1);
    assert_eq!(h.store.order_count().await, 1);
}

#[tokio::test]
async fn replayed_callback_without_order_id_does_not_duplicate() {
    let h = Harness::new().await;
    let gateway_order_id = issued_intent(&h, &sofas(1)).await;
    h.gateway.pay(&gateway_order_id, "pay_777");

    for _ in 0..2 {
        h.engine
            .verify_and_confirm(signed_callback(&gateway_order_id, "pay_777"), new_order_context(sofas(1)))
            .await
            .unwrap();
    }

    assert_eq!(h.store.order_count().await, 1);
    let order = h.repo.find_order_by_payment_id("pay_777").await.unwrap().unwrap();
    assert_eq!(order.total, BigDecimal::from(1000));
}

#[tokio::test]
async fn payment_for_a_cheaper_intent_cannot_confirm_a_larger_order() {
    let h = Harness::new().await;
    let gateway_order_id = issued_intent(&h, &table()).await;
    h.gateway.pay(&gateway_order_id, "pay_cheap");

    let err = h
        .engine
        .verify_and_confirm(signed_callback(&gateway_order_id, "pay_cheap"), new_order_context(sofas(10)))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::PaymentVerificationFailed {
            charge_possible: true,
            ..
        }
    ));
    assert_eq!(h.store.order_count().await, 0);
    assert_eq!(h.store.payment_count().await, 0);
}

#[tokio::test]
async fn signed_payment_must_belong_to_the_signed_gateway_order() {
    let h = Harness::new().await;
    let paid_intent = issued_intent(&h, &sofas(1)).await;
    let other_intent = issued_intent(&h, &sofas(1)).await;
    h.gateway.pay(&paid_intent, "pay_moved");

    let err = h
        .engine
        .verify_and_confirm(signed_callback(&other_intent, "pay_moved"), new_order_context(sofas(1)))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::PaymentVerificationFailed { .. }));
    assert_eq!(h.store.order_count().await, 0);
}

#[tokio::test]
async fn signed_payment_unknown_to_the_gateway_is_refused() {
    let h = Harness::new().await;

    let err = h
        .engine
        .verify_and_confirm(signed_callback("order_never_issued", "pay_ghost"), new_order_context(sofas(1)))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::PaymentVerificationFailed {
            charge_possible: true,
            ..
        }
    ));
    assert_eq!(h.store.order_count().await, 0);
}

#[tokio::test]
async fn stored_payment_amount_is_what_the_gateway_captured() {
    let h = Harness::new().await;
    let gateway_order_id = issued_intent(&h, &table()).await;
    h.gateway.pay_amount(&gateway_order_id, "pay_tip", 50_000);

    h.engine
        .verify_and_confirm(signed_callback(&gateway_order_id, "pay_tip"), new_order_context(table()))
        .await
        .unwrap();

    let record = h.store.payment("pay_tip").await.expect("payment recorded");
    assert_eq!(record.amount, BigDecimal::from(500));
    let order = h.repo.find_order_by_payment_id("pay_tip").await.unwrap().unwrap();
    assert_eq!(order.total, BigDecimal::from(450));
}

#[tokio::test]
async fn verified_payment_without_order_details_is_reported_as_captured() {
    let h = Harness::new().await;
    let gateway_order_id = issued_intent(&h, &sofas(1)).await;
    h.gateway.pay(&gateway_order_id, "pay_bare");

    let outcome = h
        .engine
        .verify_and_confirm(signed_callback(&gateway_order_id, "pay_bare"), SettlementContext::default())
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        VerificationOutcome::PaymentCapturedOrderFailed { ref gateway_payment_id, .. } if gateway_payment_id == "pay_bare"
    ));
    assert_eq!(h.store.order_count().await, 0);
}

#[tokio::test]
async fn verified_payment_with_unusable_details_is_reported_as_captured() {
    let h = Harness::new().await;
    let gateway_order_id = issued_intent(&h, &sofas(1)).await;
    h.gateway.pay(&gateway_order_id, "pay_typo");

    let context = SettlementContext {
        selection: Some(sofas(1)),
        invalid_details: Some("phone: must be a 10 digit number".to_string()),
        ..Default::default()
    };
    let outcome = h
        .engine
        .verify_and_confirm(signed_callback(&gateway_order_id, "pay_typo"), context)
        .await
        .unwrap();

    assert!(matches!(outcome, VerificationOutcome::PaymentCapturedOrderFailed { .. }));
}

#[tokio::test]
async fn captured_direct_payment_without_order_details_is_reported_as_captured() {
    let h = Harness::new().await;
    h.gateway.record_payment("pay_direct_bare", GatewayPaymentStatus::Captured, 100_000);

    let outcome = h
        .engine
        .verify_direct("pay_direct_bare".to_string(), SettlementContext::default())
        .await
        .unwrap();

    assert!(matches!(outcome, VerificationOutcome::PaymentCapturedOrderFailed { .. }));
}

#[tokio::test]
async fn duplicate_payment_at_storage_resolves_to_the_existing_order() {
    let h = Harness::new().await;
    let gateway_order_id = issued_intent(&h, &sofas(1)).await;
    h.gateway.pay(&gateway_order_id, "pay_race");

    let first = h
        .engine
        .verify_and_confirm(signed_callback(&gateway_order_id, "pay_race"), new_order_context(sofas(1)))
        .await
        .unwrap();
    let first_id = match first {
        VerificationOutcome::Confirmed { order } => order.id,
        other => panic!("expected confirmation, got {:?}", other),
    };

    // The pre-check misses the first order, so the unique payment id at the
    // store is what stops a second one.
    h.repo.miss_payment_lookups(1);
    let second = h
        .engine
        .verify_and_confirm(signed_callback(&gateway_order_id, "pay_race"), new_order_context(sofas(1)))
        .await
        .unwrap();

    match second {
        VerificationOutcome::AlreadyProcessed { order } => assert_eq!(order.id, first_id),
        other => panic!("expected the existing order, got {:?}", other),
    }
    assert_eq!(h.store.order_count().await, 1);
    assert_eq!(h.store.payment_count().await, 1);
}

#[tokio::test]
async fn tampered_signature_is_rejected_as_no_charge() {
    let h = Harness::new().await;
    let mut callback = signed_callback("order_abc", "pay_002");
    callback.gateway_payment_id = Some("pay_003".to_string());

    let err = h
        .engine
        .verify_and_confirm(callback, new_order_context(sofas(1)))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::PaymentVerificationFailed {
            charge_possible: false,
            ..
        }
    ));
    assert_eq!(h.store.order_count().await, 0);
}

#[tokio::test]
async fn missing_payment_id_is_reported_as_possible_charge() {
    let h = Harness::new().await;

    let err = h
        .engine
        .verify_and_confirm(PaymentCallback::default(), new_order_context(sofas(1)))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::PaymentDataMissing));
}

#[tokio::test]
async fn direct_verification_is_flagged_in_storage() {
    let h = Harness::new().await;
    h.gateway.record_payment("pay_direct", GatewayPaymentStatus::Captured, 145_000);

    let selection = PurchaseSelection::Cart {
        items: vec![
            LineRequest {
                product_id: SOFA_ID.to_string(),
                quantity: 1,
            },
            LineRequest {
                product_id: TABLE_ID.to_string(),
                quantity: 1,
            },
        ],
    };

    let outcome = h
        .engine
        .verify_direct("pay_direct".to_string(), new_order_context(selection))
        .await
        .unwrap();

    let order = match outcome {
        VerificationOutcome::Confirmed { order } => order,
        other => panic!("expected confirmation, got {:?}", other),
    };
    assert_eq!(order.verification, Verification::Direct);
    assert_eq!(order.signature.as_deref(), Some(DIRECT_VERIFICATION_SENTINEL));
    assert_eq!(order.gateway_order_id.as_deref(), Some(DIRECT_VERIFICATION_SENTINEL));

    let stored = h.repo.get_order(order.id).await.unwrap();
    assert_eq!(stored.verification, Verification::Direct);
}

#[tokio::test]
async fn callback_without_signature_falls_back_to_direct_lookup() {
    let h = Harness::new().await;
    h.gateway.record_payment("pay_nosig", GatewayPaymentStatus::Captured, 100_000);

    let callback = PaymentCallback {
        gateway_payment_id: Some("pay_nosig".to_string()),
        ..Default::default()
    };

    let outcome = h
        .engine
        .verify_and_confirm(callback, new_order_context(sofas(1)))
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        VerificationOutcome::Confirmed { ref order } if order.verification == Verification::Direct
    ));
}

#[tokio::test]
async fn direct_verification_refuses_underpayment() {
    let h = Harness::new().await;
    h.gateway.record_payment("pay_short", GatewayPaymentStatus::Captured, 50_000);

    let err = h
        .engine
        .verify_direct("pay_short".to_string(), new_order_context(sofas(1)))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::PaymentVerificationFailed {
            charge_possible: true,
            ..
        }
    ));
    assert_eq!(h.store.order_count().await, 0);
}

#[tokio::test]
async fn direct_verification_refuses_uncaptured_payment() {
    let h = Harness::new().await;
    h.gateway.record_payment("pay_pending", GatewayPaymentStatus::Pending, 100_000);

    let err = h
        .engine
        .verify_direct("pay_pending".to_string(), new_order_context(sofas(1)))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::PaymentVerificationFailed { .. }));
}

#[tokio::test]
async fn storage_failure_after_verification_reports_captured_payment() {
    let h = Harness::new().await;
    let gateway_order_id = issued_intent(&h, &sofas(1)).await;
    h.gateway.pay(&gateway_order_id, "pay_lost");
    h.repo.fail_writes(true);

    let outcome = h
        .engine
        .verify_and_confirm(signed_callback(&gateway_order_id, "pay_lost"), new_order_context(sofas(1)))
        .await
        .unwrap();

    match outcome {
        VerificationOutcome::PaymentCapturedOrderFailed { gateway_payment_id, .. } => {
            assert_eq!(gateway_payment_id, "pay_lost")
        }
        other => panic!("expected captured-but-unrecorded, got {:?}", other),
    }
}

#[tokio::test]
async fn gateway_auth_failure_offers_cod() {
    let h = Harness::new().await;
    let user = h.user("Ravi", "ravi@example.com", "tok_ravi").await;
    h.gateway
        .fail_intents_with(GatewayError::Auth("bad key".to_string()));

    let intent = h.engine.create_intent(&sofas(1), Some(&user)).await.unwrap();
    assert!(matches!(intent, IntentOutcome::CodFallback { .. }));

    let outcome = h
        .engine
        .checkout(checkout(PaymentMethod::Razorpay, sofas(1)), Some(&user))
        .await
        .unwrap();
    assert!(outcome.intent.is_none());
    assert!(outcome.cod_fallback.is_some());
    assert_eq!(outcome.order.status, OrderStatus::Pending);
}

#[tokio::test]
async fn gateway_timeout_leaves_order_pending_for_later_callback() {
    let h = Harness::with_settings(EngineSettings {
        gateway_timeout: Duration::from_millis(50),
        ..Default::default()
    })
    .await;
    let user = h.user("Ravi", "ravi@example.com", "tok_ravi").await;
    h.gateway.delay_intents(Duration::from_millis(500));

    let outcome = h
        .engine
        .checkout(checkout(PaymentMethod::Razorpay, sofas(1)), Some(&user))
        .await
        .unwrap();
    assert!(outcome.cod_fallback.is_some());
    assert_eq!(outcome.order.status, OrderStatus::Pending);

    // The intent reached the gateway even though the reply was too late.
    h.gateway.pay_amount("order_late", "pay_late", 100_000);

    let context = SettlementContext {
        order_id: Some(outcome.order.id),
        user: Some(user),
        ..Default::default()
    };
    let verified = h
        .engine
        .verify_and_confirm(signed_callback("order_late", "pay_late"), context)
        .await
        .unwrap();

    assert!(matches!(verified, VerificationOutcome::Confirmed { .. }));
}

#[tokio::test]
async fn only_the_owner_can_cancel() {
    let h = Harness::new().await;
    let owner = h.user("Ravi", "ravi@example.com", "tok_ravi").await;
    let stranger = h.user("Meera", "meera@example.com", "tok_meera").await;

    let order = h
        .engine
        .checkout(checkout(PaymentMethod::Cod, sofas(1)), Some(&owner))
        .await
        .unwrap()
        .order;

    let err = h.engine.cancel(order.id, &stranger, "changed mind", None).await.unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(id) if id == order.id));

    let unchanged = h.repo.get_order(order.id).await.unwrap();
    assert_eq!(unchanged.status, OrderStatus::CodPending);
}

#[tokio::test]
async fn terminal_orders_cannot_be_cancelled() {
    let h = Harness::new().await;
    let owner = h.user("Ravi", "ravi@example.com", "tok_ravi").await;

    let delivered = h
        .engine
        .checkout(checkout(PaymentMethod::Cod, sofas(1)), Some(&owner))
        .await
        .unwrap()
        .order;
    h.engine.update_status(delivered.id, OrderStatus::Fulfilled).await.unwrap();

    let err = h.engine.cancel(delivered.id, &owner, "too late", None).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidTransition {
            from: OrderStatus::Fulfilled,
            to: OrderStatus::Cancelled
        }
    ));

    let cancelled = h
        .engine
        .checkout(checkout(PaymentMethod::Cod, sofas(1)), Some(&owner))
        .await
        .unwrap()
        .order;
    h.engine.cancel(cancelled.id, &owner, "changed mind", None).await.unwrap();

    let err = h.engine.cancel(cancelled.id, &owner, "again", None).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { .. }));
}

#[tokio::test]
async fn cancellation_notice_goes_to_session_user() {
    let mut h = Harness::new().await;
    let owner = h.user("Ravi", "ravi@example.com", "tok_ravi").await;

    let order = h
        .engine
        .checkout(checkout(PaymentMethod::Cod, sofas(1)), Some(&owner))
        .await
        .unwrap()
        .order;
    assert_eq!(h.next_notification().await, Notification::Created { order_id: order.id });

    h.engine
        .cancel(order.id, &owner, "changed mind", Some("found a smaller sofa"))
        .await
        .unwrap();

    match h.next_notification().await {
        Notification::Cancelled {
            order_id,
            recipient,
            reason,
        } => {
            assert_eq!(order_id, order.id);
            assert_eq!(recipient.email.as_deref(), Some("ravi@example.com"));
            assert_eq!(recipient.name, "Ravi");
            assert_eq!(reason, "changed mind: found a smaller sofa");
        }
        other => panic!("expected cancellation notice, got {:?}", other),
    }
}

#[tokio::test]
async fn cod_cart_checkout_clears_the_cart() {
    let h = Harness::new().await;
    let user = h.user("Ravi", "ravi@example.com", "tok_ravi").await;
    h.engine.add_to_cart(&user, SOFA_ID, 1).await.unwrap();
    assert_eq!(h.engine.cart(&user).await.unwrap().len(), 1);

    h.engine
        .checkout(checkout(PaymentMethod::Cod, sofas(1)), Some(&user))
        .await
        .unwrap();

    assert!(h.engine.cart(&user).await.unwrap().is_empty());
}

#[tokio::test]
async fn online_cart_is_kept_until_payment_confirms() {
    let h = Harness::new().await;
    let user = h.user("Ravi", "ravi@example.com", "tok_ravi").await;
    h.engine.add_to_cart(&user, SOFA_ID, 1).await.unwrap();

    let outcome = h
        .engine
        .checkout(checkout(PaymentMethod::Razorpay, sofas(1)), Some(&user))
        .await
        .unwrap();
    assert_eq!(h.engine.cart(&user).await.unwrap().len(), 1);

    let intent = outcome.intent.unwrap();
    h.gateway.pay(&intent.gateway_order_id, "pay_cart");
    let context = SettlementContext {
        order_id: Some(outcome.order.id),
        selection: Some(sofas(1)),
        user: Some(user.clone()),
        ..Default::default()
    };
    h.engine
        .verify_and_confirm(signed_callback(&intent.gateway_order_id, "pay_cart"), context)
        .await
        .unwrap();

    assert!(h.engine.cart(&user).await.unwrap().is_empty());
}

#[tokio::test]
async fn admin_status_updates_follow_the_state_machine() {
    let h = Harness::new().await;

    let order = h
        .engine
        .checkout(checkout(PaymentMethod::Cod, sofas(1)), None)
        .await
        .unwrap()
        .order;

    let processing = h.engine.update_status(order.id, OrderStatus::Processing).await.unwrap();
    assert_eq!(processing.status, OrderStatus::Processing);

    let err = h.engine.update_status(order.id, OrderStatus::Pending).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { .. }));
}
