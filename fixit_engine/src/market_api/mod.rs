//! # Marketplace public API
//!
//! The `market_api` module exposes the programmatic API of the order-to-settlement core. Each API is generic over the
//! backend traits it needs, so that clients can pick the functionality they want.
//!
//! * [`OrderMatchingApi`] posts orders, collects bids and turns the chosen bid into an appointment.
//! * [`AppointmentApi`] moves an appointment through the work flow and settles it on completion.
//! * [`LedgerApi`] creates payment intents and reconciles payment gateway webhooks against them.
//! * [`PromotionApi`] decides who may use which discount code, and redeems codes against appointments.
//! * [`RatingApi`] takes one rating per appointment from its client, and summarises a partner's ratings.
//!
//! The APIs layer on one another: the ledger API completes appointments when job payments come in, and the
//! appointment API redeems promotions.
//!
//! # API usage
//!
//! ```rust,ignore
//! use fixit_engine::{events::EventProducers, LedgerApi, SqliteDatabase, market_api::GatewayConfig};
//! let db = SqliteDatabase::new_with_url("sqlite://data/fixit.db", 5).await?;
//! let api = LedgerApi::new(db, GatewayConfig::default(), EventProducers::default());
//! let intent = api.create_top_up_intent(&partner_id, Vnd::from(200_000)).await?;
//! ```
mod appointment_api;
mod appointment_objects;
mod ledger_api;
mod ledger_objects;
mod order_matching_api;
mod promotion_api;
mod rating_api;

pub use appointment_api::AppointmentApi;
pub use appointment_objects::{AppointmentPartition, AppointmentPatch, CompletionRequest};
pub use ledger_api::{LedgerApi, JOB_PAYMENT_TOLERANCE};
pub use ledger_objects::{
    GatewayConfig,
    PaymentIntent,
    ReconciliationFailure,
    TransactionPeriod,
    WebhookOutcome,
    WebhookPayload,
    DEFAULT_MERCHANT_ACCOUNT,
    DEFAULT_MERCHANT_BANK,
    DEFAULT_QR_BASE_URL,
};
pub use order_matching_api::{OrderMatchingApi, Selection};
pub use promotion_api::{is_offered_to, PromotionApi, PromotionApplied};
pub use rating_api::{PartnerRatings, RatingApi};
