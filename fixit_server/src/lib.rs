//! # Fixit marketplace server
//! This crate hosts the HTTP front end of the Fixit marketplace. It is responsible for:
//! * Exposing the order matching, appointment, payment and promotion APIs of [`fixit_engine`] as JSON routes.
//! * Receiving transfer notifications from the payment gateway and handing them to the webhook reconciler.
//! * Relaying marketplace events to the real-time and push relays.
//! * Periodically removing payment intents that were never paid.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! See [routes](routes/index.html) for the full list. `/health` returns a 200 OK response.

pub mod cleanup_worker;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod notifier;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
