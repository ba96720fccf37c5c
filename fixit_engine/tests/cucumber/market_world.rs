use std::{collections::HashMap, fmt::Debug};

use cucumber::World;
use fixit_engine::{
    db_types::{Appointment, OrderId, UserId},
    market_api::{GatewayConfig, PaymentIntent, WebhookOutcome},
    AppointmentApi,
    LedgerApi,
    OrderMatchingApi,
    PromotionApi,
    SqliteDatabase,
};
use log::*;

use crate::support::{
    fixtures::EventLog,
    prepare_env::{prepare_test_env, random_db_path},
};

#[derive(Default, Debug, World)]
pub struct MarketWorld {
    pub system: Option<MarketSystem>,
}

impl MarketWorld {
    pub fn system(&self) -> &MarketSystem {
        self.system.as_ref().expect("Marketplace not initialised. Start the scenario with 'a fresh marketplace'")
    }

    pub fn system_mut(&mut self) -> &mut MarketSystem {
        self.system.as_mut().expect("Marketplace not initialised. Start the scenario with 'a fresh marketplace'")
    }
}

/// Everything a scenario drives, plus the names the feature files use for people and things.
pub struct MarketSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub orders: OrderMatchingApi<SqliteDatabase, SqliteDatabase>,
    pub appointments: AppointmentApi<SqliteDatabase>,
    pub ledger: LedgerApi<SqliteDatabase>,
    pub promotions: PromotionApi<SqliteDatabase>,
    pub events: EventLog,
    pub users: HashMap<String, UserId>,
    pub current_order: Option<OrderId>,
    pub current_appointment: Option<Appointment>,
    pub intents: HashMap<String, PaymentIntent>,
    pub last_webhook: Option<WebhookOutcome>,
}

impl Debug for MarketSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MarketSystem ({})", self.db_path)
    }
}

impl MarketSystem {
    pub async fn new() -> Self {
        let db_path = random_db_path();
        let db = prepare_test_env(&db_path).await;
        debug!("🚀️ Created database: {db_path}");
        let events = EventLog::default();
        let producers = events.start().await;
        let orders = OrderMatchingApi::new(db.clone(), db.clone(), producers.clone());
        let appointments = AppointmentApi::new(db.clone(), producers.clone());
        let ledger = LedgerApi::new(db.clone(), GatewayConfig::default(), producers);
        let promotions = PromotionApi::new(db.clone());
        Self {
            db_path,
            db,
            orders,
            appointments,
            ledger,
            promotions,
            events,
            users: HashMap::new(),
            current_order: None,
            current_appointment: None,
            intents: HashMap::new(),
            last_webhook: None,
        }
    }

    /// The id behind a name used in a feature file. New names get a fresh id.
    pub fn user(&mut self, name: &str) -> UserId {
        self.users.entry(name.to_string()).or_insert_with(UserId::new_random).clone()
    }

    pub fn order_id(&self) -> OrderId {
        self.current_order.clone().expect("No order has been posted in this scenario")
    }

    pub fn appointment(&self) -> &Appointment {
        self.current_appointment.as_ref().expect("No appointment has been created in this scenario")
    }
}
