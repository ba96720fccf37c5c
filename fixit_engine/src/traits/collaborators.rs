use serde_json::Value;

use crate::{
    db_types::{OrderId, RoomId, UserId},
    traits::CollaboratorError,
};

/// The chat service. Rooms pair a client and a partner around one order.
#[allow(async_fn_in_trait)]
pub trait ChatRooms: Clone {
    async fn create_room(
        &self,
        order_id: &OrderId,
        client_id: &UserId,
        partner_id: &UserId,
    ) -> Result<RoomId, CollaboratorError>;

    /// Deletes every room for the order/partner pair, returning how many were removed.
    async fn delete_rooms(&self, order_id: &OrderId, partner_id: &UserId) -> Result<u64, CollaboratorError>;
}

/// Fan-out of named events to connected clients. Fire-and-forget.
#[allow(async_fn_in_trait)]
pub trait RealtimeNotifier {
    async fn emit(&self, topic: &str, payload: Value) -> Result<(), CollaboratorError>;
}

/// Push delivery to a single device. Returns the provider's message id.
#[allow(async_fn_in_trait)]
pub trait PushSender {
    async fn send(&self, device_token: &str, title: &str, body: &str) -> Result<String, CollaboratorError>;
}

#[allow(async_fn_in_trait)]
pub trait DeviceRegistry {
    async fn device_tokens_for(&self, user_ids: &[UserId]) -> Result<Vec<String>, CollaboratorError>;

    async fn register_device_token(&self, user_id: &UserId, token: &str) -> Result<(), CollaboratorError>;
}
