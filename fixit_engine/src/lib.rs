//! Fixit marketplace engine
//!
//! The engine is the order-to-settlement core of a home-service marketplace: clients post repair jobs, technician
//! partners bid on them, the client picks a bid, the partner does the work and gets paid. It is provider-agnostic.
//!
//! The library is divided into these sections:
//! 1. Backend contracts ([`traits`]). Storage backends implement these traits so that the public API can run on top of
//!    them. The data types stored by a backend live in [`db_types`].
//! 2. The SQLite backend ([`SqliteDatabase`]).
//! 3. The public API ([`market_api`]): order matching, the appointment lifecycle, the transaction ledger with its
//!    webhook reconciler, the promotion engine, and partner ratings.
//!
//! The engine also publishes events whenever something happens that another party needs to hear about. For example,
//! when a new order is posted, an `OrderCreated` event is published. The [`events`] module provides a simple
//! pub-sub framework for hooking into these, and a [`events::NotificationDispatcher`] that forwards them to the
//! real-time gateway and to users' devices.
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod market_api;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use market_api::{AppointmentApi, LedgerApi, OrderMatchingApi, PromotionApi, RatingApi};
#[cfg(feature = "sqlite")]
pub use sqlite::{db::db_url, SqliteDatabase};
pub use traits::{
    AppointmentManagement,
    ChatRooms,
    LedgerManagement,
    MarketError,
    MarketplaceDatabase,
    OrderManagement,
    PartnerDirectory,
    PromotionManagement,
    RatingManagement,
};
