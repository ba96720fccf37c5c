use std::{future::Future, pin::Pin, sync::Arc};

use log::*;

use crate::events::{EventHandler, EventProducer, Handler, MarketEvent};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub market_event_producer: Vec<EventProducer<MarketEvent>>,
}

impl EventProducers {
    /// Sends the event to every subscribed handler.
    pub async fn publish(&self, event: MarketEvent) {
        for producer in &self.market_event_producer {
            producer.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_market_event: Option<EventHandler<MarketEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_market_event = hooks.on_market_event.map(|f| EventHandler::new(buffer_size, f));
        Self { on_market_event }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_market_event {
            result.market_event_producer.push(handler.subscribe());
        }
        result
    }

    /// Spawns the handler loops. They run until every producer handed out by [`Self::producers`] is dropped.
    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_market_event {
            tokio::spawn(async move {
                let report = handler.start_handler().await;
                info!("📬️ Market event handler stopped. {} events handled, {} failed", report.handled, report.failed);
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_market_event: Option<Handler<MarketEvent>>,
}

impl EventHooks {
    pub fn on_market_event<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(MarketEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_market_event = Some(Arc::new(f));
        self
    }
}
