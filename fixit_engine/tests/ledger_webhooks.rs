use chrono::{Duration, Utc};
use fixit_engine::{
    db_types::{
        AppointmentStatus,
        NewTransaction,
        OrderStatus,
        PaymentMethod,
        TransactionKind,
        TransactionStatus,
        UserId,
        Vnd,
    },
    events::{EventProducers, MarketEvent},
    helpers::{Descriptor, DescriptorKind},
    market_api::{GatewayConfig, ReconciliationFailure, TransactionPeriod, WebhookOutcome, WebhookPayload},
    traits::{AppointmentManagement, LedgerManagement, OrderManagement, TransactionQueryFilter},
    LedgerApi,
    MarketError,
    SqliteDatabase,
};
use futures_util::future::join_all;
use serde_json::json;

use crate::support::{
    fixtures::{advance_to_payment, appointment_for, bank_memo, online_partner, EventLog},
    prepare_env::{new_db, tear_down},
};

mod support;

fn api(db: &SqliteDatabase, producers: EventProducers) -> LedgerApi<SqliteDatabase> {
    LedgerApi::new(db.clone(), GatewayConfig::default(), producers)
}

fn failed(reason: ReconciliationFailure) -> WebhookOutcome {
    WebhookOutcome::failed(reason)
}

#[tokio::test]
async fn top_up_is_credited_exactly_once() {
    let db = new_db().await;
    let log = EventLog::default();
    let api = api(&db, log.start().await);
    let partner = online_partner(&db, "electricity").await;
    let intent = api.create_top_up_intent(&partner, Vnd::from(200_000)).await.unwrap();
    let descriptor = intent.descriptor.clone().unwrap();
    assert!(descriptor.starts_with(&format!("TOPUP{partner}_")));
    let qr = intent.qr_url.expect("A deep link should be generated");
    assert!(qr.contains("amount=200000"), "{qr}");

    let parsed = Descriptor::parse(DescriptorKind::TopUp, &descriptor).unwrap();
    let payload = WebhookPayload::new(bank_memo(&parsed), 200_000);
    let outcome = api.handle_webhook(payload.clone()).await.unwrap();
    assert_eq!(outcome, WebhookOutcome::top_up(Vnd::from(200_000)));
    assert_eq!(api.balance(&partner).await.unwrap(), Vnd::from(200_000));

    // The gateway delivers the same notification again
    let replay = api.handle_webhook(payload).await.unwrap();
    assert_eq!(replay, failed(ReconciliationFailure::NotFound));
    assert_eq!(api.balance(&partner).await.unwrap(), Vnd::from(200_000));

    let history = api.transactions_for_user(&partner, TransactionPeriod::default()).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, TransactionStatus::Success);
    assert_eq!(history[0].balance_after, Some(Vnd::from(200_000)));

    log.wait_for(1).await;
    match log.events().as_slice() {
        [MarketEvent::TopUpSucceeded { transaction, new_balance }] => {
            assert_eq!(transaction.user_id, partner);
            assert_eq!(*new_balance, Vnd::from(200_000));
        },
        events => panic!("Expected one TopUpSucceeded event, got {events:?}"),
    }
    tear_down(db).await;
}

#[tokio::test]
async fn top_up_amount_must_match_exactly() {
    let db = new_db().await;
    let api = api(&db, EventProducers::default());
    let partner = online_partner(&db, "electricity").await;
    let intent = api.create_top_up_intent(&partner, Vnd::from(200_000)).await.unwrap();
    let memo = intent.descriptor.unwrap();

    let outcome = api.handle_webhook(WebhookPayload::new(memo.as_str(), 199_999)).await.unwrap();
    assert_eq!(outcome, failed(ReconciliationFailure::AmountMismatch));
    assert_eq!(api.balance(&partner).await.unwrap(), Vnd::from(0));

    // The intent is still there for the correct payment
    let payload = WebhookPayload { transfer_amount: Some(json!("200000")), ..WebhookPayload::new(memo, 0) };
    let outcome = api.handle_webhook(payload).await.unwrap();
    assert!(outcome.ok, "{outcome:?}");
    assert_eq!(api.balance(&partner).await.unwrap(), Vnd::from(200_000));
    tear_down(db).await;
}

#[tokio::test]
async fn a_descriptor_without_its_timestamp_matches_the_latest_intent() {
    let db = new_db().await;
    let api = api(&db, EventProducers::default());
    let partner = online_partner(&db, "electricity").await;
    let old = NewTransaction::pending(partner.clone(), TransactionKind::TopUp, Vnd::from(50_000))
        .with_descriptor(format!("TOPUP{partner}_1700000000000"))
        .with_created_at(Utc::now() - Duration::minutes(30));
    db.insert_transaction(old).await.unwrap();
    api.create_top_up_intent(&partner, Vnd::from(80_000)).await.unwrap();

    let memo = format!("IBFT TOPUP{} chuyen tien", partner.as_str().to_uppercase());
    let outcome = api.handle_webhook(WebhookPayload::new(memo, 80_000)).await.unwrap();
    assert_eq!(outcome, WebhookOutcome::top_up(Vnd::from(80_000)));
    tear_down(db).await;
}

#[tokio::test]
async fn unreadable_webhooks_are_reported_not_raised() {
    let db = new_db().await;
    let api = api(&db, EventProducers::default());
    let cases = [
        (WebhookPayload::new("Payment for dinner", 10_000), ReconciliationFailure::UnknownTransactionType),
        (WebhookPayload::default(), ReconciliationFailure::UnknownTransactionType),
        (WebhookPayload::new("TOPUP12345", 10_000), ReconciliationFailure::InvalidFormat),
        (WebhookPayload::new("PAIDxyz", 10_000), ReconciliationFailure::InvalidFormat),
        (
            WebhookPayload::new(format!("TOPUP{}_1700000000000", UserId::new_random()), 10_000),
            ReconciliationFailure::NotFound,
        ),
    ];
    for (payload, reason) in cases {
        let outcome = api.handle_webhook(payload.clone()).await.unwrap();
        assert_eq!(outcome, failed(reason), "Unexpected outcome for {payload:?}");
    }
    tear_down(db).await;
}

#[tokio::test]
async fn top_ups_for_partners_without_a_balance_stay_pending() {
    let db = new_db().await;
    let api = api(&db, EventProducers::default());
    let stranger = UserId::new_random();
    let intent = api.create_top_up_intent(&stranger, Vnd::from(10_000)).await.unwrap();
    let outcome = api.handle_webhook(WebhookPayload::new(intent.descriptor.unwrap(), 10_000)).await.unwrap();
    assert_eq!(outcome, failed(ReconciliationFailure::UpdateBalanceFailed));
    let pending = db.fetch_transactions(TransactionQueryFilter::for_user(stranger)).await.unwrap();
    assert_eq!(pending[0].status, TransactionStatus::Pending);
    tear_down(db).await;
}

#[tokio::test]
async fn intents_are_validated() {
    let db = new_db().await;
    let api = api(&db, EventProducers::default());
    let partner = online_partner(&db, "electricity").await;
    let err = api.create_top_up_intent(&partner, Vnd::from(0)).await.unwrap_err();
    assert!(matches!(err, MarketError::ValidationError(_)));
    let err = api.create_top_up_intent(&UserId::from("not-an-id"), Vnd::from(10)).await.unwrap_err();
    assert!(matches!(err, MarketError::ValidationError(_)));

    let withdrawal = api.create_withdraw_intent(&partner, Vnd::from(10_000)).await.unwrap();
    assert!(withdrawal.descriptor.is_none());
    assert!(withdrawal.qr_url.is_none());

    let client = UserId::new_random();
    let appointment = appointment_for(&db, &client, &partner, 100_000).await;
    let stranger = UserId::new_random();
    let err = api.create_job_payment_intent(&stranger, &partner, &appointment.id, Vnd::from(100_000)).await.unwrap_err();
    assert!(matches!(err, MarketError::ValidationError(_)));
    tear_down(db).await;
}

#[tokio::test]
async fn job_payment_completes_the_appointment() {
    let db = new_db().await;
    let log = EventLog::default();
    let api = api(&db, log.start().await);
    let client = UserId::new_random();
    let partner = online_partner(&db, "plumbing").await;
    let appointment = appointment_for(&db, &client, &partner, 450_000).await;
    advance_to_payment(&db, &appointment).await;

    let intent = api.create_job_payment_intent(&client, &partner, &appointment.id, Vnd::from(450_000)).await.unwrap();
    let descriptor = intent.descriptor.unwrap();
    assert!(descriptor.starts_with(&format!("PAID{}_", appointment.id)));

    // Off by one dong is tolerated
    let outcome = api.handle_webhook(WebhookPayload::new(format!("MBVCB {descriptor}"), 450_001)).await.unwrap();
    assert_eq!(outcome, WebhookOutcome::job_payment(appointment.id.clone(), Vnd::from(450_000)));

    let settled = db.fetch_appointment(&appointment.id).await.unwrap().unwrap();
    assert_eq!(settled.status, AppointmentStatus::Completed);
    assert_eq!(settled.payment_method, Some(PaymentMethod::Qr));
    assert_eq!(settled.settlement_ref.as_deref(), Some(intent.transaction_id.as_str()));
    assert_eq!(api.balance(&partner).await.unwrap(), Vnd::from(405_000));
    let order = db.fetch_order(&appointment.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Completed);

    let replay = api.handle_webhook(WebhookPayload::new(descriptor, 450_000)).await.unwrap();
    assert_eq!(replay, failed(ReconciliationFailure::NotFound));
    assert_eq!(api.balance(&partner).await.unwrap(), Vnd::from(405_000));

    log.wait_for(2).await;
    let topics = log.topics();
    assert!(topics.contains(&"appointment-completed"));
    assert!(topics.contains(&"job-payment-succeeded"));
    tear_down(db).await;
}

#[tokio::test]
async fn job_payment_outside_the_tolerance_is_refused() {
    let db = new_db().await;
    let api = api(&db, EventProducers::default());
    let client = UserId::new_random();
    let partner = online_partner(&db, "plumbing").await;
    let appointment = appointment_for(&db, &client, &partner, 450_000).await;
    let intent = api.create_job_payment_intent(&client, &partner, &appointment.id, Vnd::from(450_000)).await.unwrap();
    let outcome = api.handle_webhook(WebhookPayload::new(intent.descriptor.unwrap(), 449_998)).await.unwrap();
    assert_eq!(outcome, failed(ReconciliationFailure::AmountMismatch));
    let appointment = db.fetch_appointment(&appointment.id).await.unwrap().unwrap();
    assert_eq!(appointment.status, AppointmentStatus::Navigation);
    tear_down(db).await;
}

#[tokio::test]
async fn job_payment_for_a_cancelled_appointment_needs_follow_up() {
    let db = new_db().await;
    let api = api(&db, EventProducers::default());
    let client = UserId::new_random();
    let partner = online_partner(&db, "plumbing").await;
    let appointment = appointment_for(&db, &client, &partner, 120_000).await;
    let intent = api.create_job_payment_intent(&client, &partner, &appointment.id, Vnd::from(120_000)).await.unwrap();
    db.cancel_appointment(&appointment.id, "Client cancelled after paying").await.unwrap();
    let outcome = api.handle_webhook(WebhookPayload::new(intent.descriptor.unwrap(), 120_000)).await.unwrap();
    assert_eq!(outcome, failed(ReconciliationFailure::SettlementFailed));
    assert_eq!(api.balance(&partner).await.unwrap(), Vnd::from(0));
    tear_down(db).await;
}

#[tokio::test]
async fn cleanup_removes_stale_intents_only() {
    let db = new_db().await;
    let api = api(&db, EventProducers::default());
    let partner = online_partner(&db, "plumbing").await;
    let long_ago = Utc::now() - Duration::hours(48);
    let stale = NewTransaction::pending(partner.clone(), TransactionKind::TopUp, Vnd::from(10_000))
        .with_descriptor(format!("TOPUP{partner}_1700000000000"))
        .with_created_at(long_ago);
    db.insert_transaction(stale).await.unwrap();
    let old_withdrawal =
        NewTransaction::pending(partner.clone(), TransactionKind::Withdraw, Vnd::from(5_000)).with_created_at(long_ago);
    db.insert_transaction(old_withdrawal).await.unwrap();
    api.create_top_up_intent(&partner, Vnd::from(20_000)).await.unwrap();

    let result = api.cleanup_expired_transactions(24).await.unwrap();
    assert_eq!(result.transactions, 1);
    assert_eq!(result.paid_transactions, 0);
    let remaining = db.fetch_transactions(TransactionQueryFilter::for_user(partner.clone())).await.unwrap();
    assert_eq!(remaining.len(), 2);
    assert!(remaining.iter().all(|t| t.created_at > long_ago || t.kind == TransactionKind::Withdraw));

    let again = api.cleanup_expired_transactions(24).await.unwrap();
    assert_eq!(again.total(), 0);
    tear_down(db).await;
}

#[tokio::test]
async fn history_can_be_filtered_by_type_and_period() {
    let db = new_db().await;
    let api = api(&db, EventProducers::default());
    let partner = online_partner(&db, "plumbing").await;
    api.create_top_up_intent(&partner, Vnd::from(20_000)).await.unwrap();
    api.create_withdraw_intent(&partner, Vnd::from(5_000)).await.unwrap();

    let period = TransactionPeriod { kind: Some(TransactionKind::Withdraw), ..Default::default() };
    let withdrawals = api.transactions_for_user(&partner, period).await.unwrap();
    assert_eq!(withdrawals.len(), 1);
    assert_eq!(withdrawals[0].kind, TransactionKind::Withdraw);

    let period = TransactionPeriod { year: Some(2001), month: Some(3), ..Default::default() };
    assert!(api.transactions_for_user(&partner, period).await.unwrap().is_empty());
    let period = TransactionPeriod { month: Some(3), ..Default::default() };
    let err = api.transactions_for_user(&partner, period).await.unwrap_err();
    assert!(matches!(err, MarketError::ValidationError(_)));
    tear_down(db).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn simultaneous_duplicate_webhooks_credit_once() {
    let db = new_db().await;
    let api = api(&db, EventProducers::default());
    let partner = online_partner(&db, "electricity").await;
    let intent = api.create_top_up_intent(&partner, Vnd::from(150_000)).await.unwrap();
    let descriptor = Descriptor::parse(DescriptorKind::TopUp, &intent.descriptor.unwrap()).unwrap();
    let payload = WebhookPayload::new(bank_memo(&descriptor), 150_000);

    let deliveries = (0..8)
        .map(|_| {
            let db = db.clone();
            let payload = payload.clone();
            tokio::spawn(async move {
                let ledger = LedgerApi::new(db, GatewayConfig::default(), EventProducers::default());
                ledger.handle_webhook(payload).await
            })
        })
        .collect::<Vec<_>>();
    let outcomes = join_all(deliveries)
        .await
        .into_iter()
        .map(|r| r.expect("Webhook task panicked").expect("Webhooks never raise for a known intent"))
        .collect::<Vec<_>>();
    let credited = outcomes.iter().filter(|o| o.ok).count();
    assert_eq!(credited, 1, "{outcomes:?}");
    assert!(outcomes.contains(&WebhookOutcome::top_up(Vnd::from(150_000))));
    assert!(outcomes.iter().filter(|o| !o.ok).all(|o| *o == failed(ReconciliationFailure::NotFound)));

    assert_eq!(api.balance(&partner).await.unwrap(), Vnd::from(150_000));
    let history = api.transactions_for_user(&partner, TransactionPeriod::default()).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, TransactionStatus::Success);
    tear_down(db).await;
}
