//! # Backend contracts
//!
//! This module defines the behaviour that storage backends, and the external collaborators of the marketplace, need to
//! expose so that the public API in [`crate::market_api`] can run on top of them.
//!
//! ## Storage
//! * [`OrderManagement`] stores orders and their applicants (bids), and performs the atomic applicant selection.
//! * [`AppointmentManagement`] stores appointments and performs the atomic completion/cancellation transitions.
//! * [`LedgerManagement`] stores ledger transactions and job payments and owns every mutation of a partner balance.
//! * [`PromotionManagement`] stores promotions and performs capped, atomic redemptions.
//! * [`RatingManagement`] stores the one rating a client may leave on an appointment.
//! * [`PartnerDirectory`] answers "which partners can take this job right now?".
//! * [`MarketplaceDatabase`] ties all of the above together for a single backend.
//!
//! ## Collaborators
//! Chat rooms, real-time fan-out, push delivery and device registration are owned by other services. The engine only
//! talks to them through [`ChatRooms`], [`RealtimeNotifier`], [`PushSender`] and [`DeviceRegistry`]. Failures there are
//! always logged and swallowed; they never undo a state change.
mod appointment_management;
mod collaborators;
mod data_objects;
mod errors;
mod ledger_management;
mod marketplace_database;
mod order_management;
mod partner_directory;
mod promotion_management;
mod rating_management;

pub use appointment_management::AppointmentManagement;
pub use collaborators::{ChatRooms, DeviceRegistry, PushSender, RealtimeNotifier};
pub use data_objects::{
    AppointmentQueryFilter,
    CleanupResult,
    CompletedAppointment,
    DescriptorMatch,
    OrderQueryFilter,
    TopUpSettlement,
    TransactionQueryFilter,
};
pub use errors::{CollaboratorError, MarketError};
pub use ledger_management::LedgerManagement;
pub use marketplace_database::MarketplaceDatabase;
pub use order_management::OrderManagement;
pub use partner_directory::PartnerDirectory;
pub use promotion_management::PromotionManagement;
pub use rating_management::RatingManagement;
