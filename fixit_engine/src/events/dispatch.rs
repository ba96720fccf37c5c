use log::*;

use crate::{
    events::MarketEvent,
    traits::{DeviceRegistry, PushSender, RealtimeNotifier},
};

/// Delivers [`MarketEvent`]s to the real-time gateway and, where the event calls for it, to the recipients' devices.
///
/// Delivery is best effort. Every collaborator failure is logged and dropped.
#[derive(Debug, Clone)]
pub struct NotificationDispatcher<R, P, D> {
    realtime: R,
    push: P,
    devices: D,
}

impl<R, P, D> NotificationDispatcher<R, P, D>
where
    R: RealtimeNotifier,
    P: PushSender,
    D: DeviceRegistry,
{
    pub fn new(realtime: R, push: P, devices: D) -> Self {
        Self { realtime, push, devices }
    }

    pub async fn dispatch(&self, event: MarketEvent) {
        let topic = event.topic();
        trace!("📬️ Dispatching {topic}");
        if let Err(e) = self.realtime.emit(topic, event.payload()).await {
            warn!("📬️ Could not emit {topic} to the real-time gateway. {e}");
        }
        let Some(message) = event.push_message() else {
            return;
        };
        let recipients = event.recipients();
        let tokens = match self.devices.device_tokens_for(&recipients).await {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!("📬️ Could not look up device tokens for {topic}. {e}");
                return;
            },
        };
        if tokens.is_empty() {
            debug!("📬️ No devices registered for the {} recipients of {topic}", recipients.len());
            return;
        }
        for token in tokens {
            match self.push.send(&token, &message.title, &message.body).await {
                Ok(id) => trace!("📬️ Push {id} sent for {topic}"),
                Err(e) => warn!("📬️ Push delivery for {topic} failed. {e}"),
            }
        }
    }
}
