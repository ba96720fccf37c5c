//! SQLite backend for the marketplace engine.
//!
//! [`SqliteDatabase`] implements every storage trait in [`crate::traits`], and also doubles as the [`ChatRooms`] and
//! [`DeviceRegistry`] collaborators when no external service is configured.
//!
//! [`ChatRooms`]: crate::traits::ChatRooms
//! [`DeviceRegistry`]: crate::traits::DeviceRegistry
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
