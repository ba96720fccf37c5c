use std::{collections::HashSet, time::Duration};

use cucumber::{then, when};
use fixit_engine::{
    db_types::{
        Actor,
        AppointmentStatus,
        AppointmentUpdate,
        NewApplicant,
        NewOrder,
        OrderStatus,
        TransactionKind,
        TransactionStatus,
        Vnd,
    },
    events::MarketEvent,
    market_api::{AppointmentPatch, CompletionRequest, TransactionPeriod, WebhookPayload},
    traits::OrderManagement,
};

use crate::cucumber::MarketWorld;

#[when(expr = "client {word} posts a(n) {word} order")]
async fn post_order(world: &mut MarketWorld, name: String, category: String) {
    let system = world.system_mut();
    let client = system.user(&name);
    let order = NewOrder::new(client, format!("{category} repair"), category);
    let order = system.orders.create_order(order).await.expect("Error creating order");
    system.current_order = Some(order.id);
}

#[then(expr = "partners {word} and {word} are notified about the order")]
async fn partners_notified(world: &mut MarketWorld, first: String, second: String) {
    let system = world.system_mut();
    let expected = HashSet::from([system.user(&first), system.user(&second)]);
    let order_id = system.order_id();
    system.events.wait_for(1).await;
    let notified = system
        .events
        .events()
        .into_iter()
        .find_map(|e| match e {
            MarketEvent::OrderCreated { order, eligible_partners } if order.id == order_id => Some(eligible_partners),
            _ => None,
        })
        .expect("No OrderCreated event was published");
    assert_eq!(notified.into_iter().collect::<HashSet<_>>(), expected);
}

#[when(expr = "{word} bids {int} on the order")]
async fn bid(world: &mut MarketWorld, name: String, price: i64) {
    let system = world.system_mut();
    let partner = system.user(&name);
    let order_id = system.order_id();
    let bid = NewApplicant::new(partner, Vnd::from(price)).with_name(name);
    system.orders.add_applicant(&order_id, bid).await.expect("Error placing bid");
}

#[when(expr = "{word} selects {word}")]
async fn select(world: &mut MarketWorld, _client: String, partner: String) {
    let system = world.system_mut();
    let partner = system.user(&partner);
    let order_id = system.order_id();
    let selection = system.orders.select_applicant(&order_id, &partner).await.expect("Error selecting applicant");
    system.current_appointment = Some(selection.appointment);
}

#[then(expr = "the order is processing with only {word} as applicant")]
async fn order_collapsed(world: &mut MarketWorld, name: String) {
    let system = world.system_mut();
    let partner = system.user(&name);
    let details = system.orders.get_order(&system.order_id()).await.expect("Error fetching order");
    assert_eq!(details.order.status, OrderStatus::Processing);
    assert_eq!(details.applicants.len(), 1);
    assert_eq!(details.applicants[0].partner_id, partner);
}

#[then(expr = "the order is {word}")]
async fn order_status(world: &mut MarketWorld, status: String) {
    let system = world.system();
    let order = system.db.fetch_order(&system.order_id()).await.expect("Error fetching order").expect("Order is gone");
    assert_eq!(order.status.to_string(), status);
}

#[then(expr = "the appointment is at {word} with agreed price {int}")]
async fn appointment_state(world: &mut MarketWorld, status: String, price: i64) {
    let system = world.system();
    let appointment = system.appointments.get(&system.appointment().id).await.expect("Error fetching appointment");
    assert_eq!(appointment.status, status.parse::<AppointmentStatus>().expect("Not a status"));
    assert_eq!(appointment.agreed_price, Vnd::from(price));
}

#[when(expr = "{word} moves the appointment to {word} with agreed price {int}")]
async fn progress(world: &mut MarketWorld, _partner: String, status: String, price: i64) {
    let system = world.system_mut();
    let status = status.parse::<AppointmentStatus>().expect("Not a status");
    let fields = AppointmentUpdate::default().with_status(status).with_agreed_price(Vnd::from(price));
    let id = system.appointment().id.clone();
    let appointment =
        system.appointments.update(&id, AppointmentPatch::new(fields), Actor::Partner).await.expect("Error updating");
    system.current_appointment = Some(appointment);
}

#[when(expr = "{word} applies the promotion {word}")]
async fn apply_promotion(world: &mut MarketWorld, name: String, code: String) {
    let system = world.system_mut();
    let client = system.user(&name);
    let id = system.appointment().id.clone();
    let applied = system.promotions.apply(&id, &code, &client).await.expect("Error applying promotion");
    system.current_appointment = Some(applied.appointment);
}

#[then(expr = "the appointment discount is {int} and the final amount is {int}")]
async fn discount(world: &mut MarketWorld, expected_discount: i64, final_amount: i64) {
    let appointment = world.system().appointment();
    assert_eq!(appointment.promotion_discount, Vnd::from(expected_discount));
    assert_eq!(appointment.final_amount, Vnd::from(final_amount));
}

#[when(expr = "{word} completes the appointment with {word} for {int}")]
async fn complete(world: &mut MarketWorld, name: String, method: String, amount: i64) {
    let system = world.system_mut();
    let partner = system.user(&name);
    let id = system.appointment().id.clone();
    let request = CompletionRequest::new(method, partner, Vnd::from(amount));
    let completed = system.appointments.update_to_complete(&id, request, None).await.expect("Error completing");
    system.current_appointment = Some(completed.appointment);
}

#[when(expr = "{word} requests a top-up of {int}")]
async fn request_top_up(world: &mut MarketWorld, name: String, amount: i64) {
    let system = world.system_mut();
    let partner = system.user(&name);
    let intent = system.ledger.create_top_up_intent(&partner, Vnd::from(amount)).await.expect("Error creating intent");
    system.intents.insert(name, intent);
}

#[when(expr = "the gateway confirms the top-up of {word} for {int}")]
async fn confirm_top_up(world: &mut MarketWorld, name: String, amount: i64) {
    let system = world.system_mut();
    let descriptor = system.intents.get(&name).and_then(|i| i.descriptor.clone()).expect("No top-up was requested");
    let payload = WebhookPayload::new(format!("MBVCB.3312.{descriptor}.CT tu 0123456789"), amount);
    let outcome = system.ledger.handle_webhook(payload).await.expect("Error handling webhook");
    system.last_webhook = Some(outcome);
}

#[then(expr = "the last webhook was rejected with {word}")]
async fn webhook_rejected(world: &mut MarketWorld, reason: String) {
    let outcome = world.system().last_webhook.clone().expect("No webhook was delivered");
    assert!(!outcome.ok);
    assert_eq!(outcome.reason.map(|r| r.to_string()), Some(reason));
}

#[then(expr = "the balance of {word} is {int}")]
async fn balance(world: &mut MarketWorld, name: String, expected: i64) {
    let system = world.system_mut();
    let partner = system.user(&name);
    let balance = system.ledger.balance(&partner).await.expect("Error fetching balance");
    assert_eq!(balance, Vnd::from(expected));
}

#[then(expr = "{word} has {int} {word} transaction(s) of kind {word}")]
async fn transactions(world: &mut MarketWorld, name: String, count: usize, status: String, kind: String) {
    let system = world.system_mut();
    let user = system.user(&name);
    let kind = kind.parse::<TransactionKind>().expect("Not a transaction kind");
    let period = TransactionPeriod { kind: Some(kind), ..Default::default() };
    let history = system.ledger.transactions_for_user(&user, period).await.expect("Error fetching transactions");
    let matching = history.iter().filter(|t| t.status.to_string() == status).count();
    assert_eq!(matching, count, "Transactions: {history:?}");
    if status == TransactionStatus::Success.to_string() {
        assert!(history.iter().all(|t| t.balance_after.is_some()));
    }
}

#[when(expr = "I pause for {int}ms")]
async fn pause(_world: &mut MarketWorld, ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
