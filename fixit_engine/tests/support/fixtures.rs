use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use fixit_engine::{
    db_types::{
        Actor,
        Appointment,
        AppointmentStatus,
        AppointmentUpdate,
        NewApplicant,
        NewOrder,
        NewPartnerProfile,
        UserId,
        Vnd,
    },
    events::{EventHandlers, EventHooks, EventProducers, MarketEvent},
    helpers::Descriptor,
    market_api::{AppointmentPatch, GatewayConfig, WebhookPayload},
    traits::PartnerDirectory,
    AppointmentApi,
    LedgerApi,
    OrderMatchingApi,
    SqliteDatabase,
};

/// Registers an online partner approved for `category`.
pub async fn online_partner(db: &SqliteDatabase, category: &str) -> UserId {
    let partner = UserId::new_random();
    let profile = NewPartnerProfile::new(partner.clone()).with_category(category).online();
    db.upsert_partner_profile(profile).await.expect("Error registering partner");
    partner
}

/// Credits the partner through a top-up intent and its webhook, the same way real money arrives.
pub async fn fund_partner(db: &SqliteDatabase, partner: &UserId, amount: i64) -> Vnd {
    let ledger = LedgerApi::new(db.clone(), GatewayConfig::default(), EventProducers::default());
    let intent = ledger.create_top_up_intent(partner, Vnd::from(amount)).await.expect("Error creating top-up");
    let memo = intent.descriptor.expect("Top-ups carry a descriptor");
    let outcome = ledger.handle_webhook(WebhookPayload::new(memo, amount)).await.expect("Error handling webhook");
    assert!(outcome.ok, "Funding webhook failed: {outcome:?}");
    outcome.new_balance.expect("Top-ups report the new balance")
}

/// Posts an order, takes one bid from `partner` and selects it. Returns the new appointment.
pub async fn appointment_for(db: &SqliteDatabase, client: &UserId, partner: &UserId, price: i64) -> Appointment {
    let api = OrderMatchingApi::new(db.clone(), db.clone(), EventProducers::default());
    let order = api.create_order(NewOrder::new(client.clone(), "Fix a leaking tap", "plumbing")).await.unwrap();
    api.add_applicant(&order.id, NewApplicant::new(partner.clone(), Vnd::from(price))).await.unwrap();
    api.select_applicant(&order.id, partner).await.unwrap().appointment
}

/// Walks the appointment forward to `payment`, the last non-terminal state.
pub async fn advance_to_payment(db: &SqliteDatabase, appointment: &Appointment) -> Appointment {
    let api = AppointmentApi::new(db.clone(), EventProducers::default());
    let patch = AppointmentPatch::new(AppointmentUpdate::default().with_status(AppointmentStatus::Payment));
    api.update(&appointment.id, patch, Actor::Partner).await.unwrap()
}

/// The memo a bank would deliver for `descriptor`, wrapped in the bank's own text.
pub fn bank_memo(descriptor: &Descriptor) -> String {
    format!("MBVCB.3312.{descriptor}.CT tu 0123456789")
}

/// Collects every published event so that tests can assert on them.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<MarketEvent>>>,
}

impl EventLog {
    /// Starts an event handler that records into this log, and returns the producers to hand to the APIs.
    pub async fn start(&self) -> EventProducers {
        let events = self.events.clone();
        let mut hooks = EventHooks::default();
        hooks.on_market_event(move |ev| {
            let events = events.clone();
            Box::pin(async move {
                events.lock().unwrap().push(ev);
            })
        });
        let handlers = EventHandlers::new(64, hooks);
        let producers = handlers.producers();
        handlers.start_handlers().await;
        producers
    }

    pub fn topics(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.topic()).collect()
    }

    pub fn events(&self) -> Vec<MarketEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Waits (up to a second) for at least `count` events to arrive.
    pub async fn wait_for(&self, count: usize) {
        for _ in 0..100 {
            if self.events.lock().unwrap().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
