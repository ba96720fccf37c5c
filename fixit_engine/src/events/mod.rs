//! Publish/subscribe plumbing for marketplace events, and the dispatcher that turns them into real-time and push
//! notifications.
mod channel;
mod dispatch;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler, HandlerReport};
pub use dispatch::NotificationDispatcher;
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
