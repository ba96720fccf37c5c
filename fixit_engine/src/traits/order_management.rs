use crate::{
    db_types::{Applicant, Appointment, NewApplicant, NewOrder, Order, OrderDetails, OrderId, OrderUpdate, RoomId, UserId},
    traits::{MarketError, OrderQueryFilter},
};

/// Storage for orders and the bids placed on them.
///
/// Implementations are responsible for the two uniqueness rules of the order book, and must enforce them atomically
/// rather than by check-then-write:
/// * a client has at most one `pending` order,
/// * a partner bids at most once on an order.
#[allow(async_fn_in_trait)]
pub trait OrderManagement: Clone {
    /// Stores a new order in `pending` status.
    ///
    /// Returns [`MarketError::Conflict`] if the client already has a pending order.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, MarketError>;

    async fn fetch_order(&self, id: &OrderId) -> Result<Option<Order>, MarketError>;

    /// Fetches the order along with its current applicants, oldest bid first.
    async fn fetch_order_details(&self, id: &OrderId) -> Result<Option<OrderDetails>, MarketError>;

    /// Fetches orders (newest first) with their applicants.
    async fn search_orders(&self, filter: OrderQueryFilter) -> Result<Vec<OrderDetails>, MarketError>;

    /// Applies the patch to an open order.
    ///
    /// Returns [`MarketError::NotFound`] for unknown orders and [`MarketError::BusinessRule`] if the order is completed
    /// or cancelled.
    async fn update_order(&self, id: &OrderId, update: OrderUpdate) -> Result<Order, MarketError>;

    /// Records a bid. Returns [`MarketError::Conflict`] if the partner has already bid on this order.
    async fn insert_applicant(
        &self,
        order_id: &OrderId,
        applicant: NewApplicant,
        room_id: Option<RoomId>,
    ) -> Result<Applicant, MarketError>;

    async fn fetch_applicant(&self, order_id: &OrderId, partner_id: &UserId) -> Result<Option<Applicant>, MarketError>;

    /// Removes the bid, returning it if it existed.
    async fn remove_applicant(&self, order_id: &OrderId, partner_id: &UserId)
        -> Result<Option<Applicant>, MarketError>;

    /// In one atomic step:
    /// * moves the order from `pending` to `processing`,
    /// * deletes every applicant except the chosen one,
    /// * creates the appointment at the bid price, inheriting the bid's chat room.
    ///
    /// Fails with [`MarketError::NotFound`] if the order or the bid does not exist, and with
    /// [`MarketError::BusinessRule`] if the order is not `pending` (including when a concurrent selection won). A
    /// failure writes nothing.
    async fn select_applicant(
        &self,
        order_id: &OrderId,
        partner_id: &UserId,
    ) -> Result<(Order, Applicant, Appointment), MarketError>;

    /// Cancels any order that is not completed. Cancelling a cancelled order is a no-op.
    async fn cancel_order(&self, id: &OrderId) -> Result<Order, MarketError>;
}
