use std::fmt::Debug;

use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{
        Appointment,
        BiddingMode,
        NewApplicant,
        NewOrder,
        Order,
        OrderDetails,
        OrderId,
        OrderUpdate,
        UserId,
    },
    events::{EventProducers, MarketEvent},
    traits::{
        ChatRooms,
        MarketError,
        OrderManagement,
        OrderQueryFilter,
        PartnerDirectory,
    },
};

/// What a successful selection produces: the collapsed order and the appointment that now tracks the job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub order: OrderDetails,
    pub appointment: Appointment,
}

/// `OrderMatchingApi` handles job posting, partner discovery, bidding and selection.
///
/// Selecting a bid is the one place an order turns into an appointment.
pub struct OrderMatchingApi<B, C> {
    db: B,
    chat: C,
    producers: EventProducers,
}

impl<B, C> Debug for OrderMatchingApi<B, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderMatchingApi")
    }
}

impl<B, C> OrderMatchingApi<B, C> {
    pub fn new(db: B, chat: C, producers: EventProducers) -> Self {
        Self { db, chat, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}

fn ensure_open(order: &Order) -> Result<(), MarketError> {
    if order.status.is_closed() {
        Err(MarketError::BusinessRule(format!("Order {} is already {}", order.id, order.status)))
    } else {
        Ok(())
    }
}

impl<B, C> OrderMatchingApi<B, C>
where
    B: OrderManagement + PartnerDirectory,
    C: ChatRooms,
{
    /// Posts a new order and tells the partners who can take it.
    ///
    /// The order is returned even when nobody is eligible. A failed eligibility lookup only means nobody hears about
    /// the order.
    pub async fn create_order(&self, order: NewOrder) -> Result<Order, MarketError> {
        if order.client_id.as_str().trim().is_empty() {
            return Err(MarketError::ValidationError("clientId is required".into()));
        }
        if order.category.trim().is_empty() {
            return Err(MarketError::ValidationError("category is required".into()));
        }
        let order = self.db.insert_order(order).await?;
        info!("📋️ Order {} created by {} for {}", order.id, order.client_id, order.category);
        let eligible_partners = match self.db.eligible_partners(&order.category).await {
            Ok(partners) => partners,
            Err(e) => {
                warn!("📋️ Could not look up partners for order {}. Nobody will be notified. {e}", order.id);
                vec![]
            },
        };
        debug!("📋️ {} partners are eligible for order {}", eligible_partners.len(), order.id);
        if !eligible_partners.is_empty() {
            self.producers.publish(MarketEvent::OrderCreated { order: order.clone(), eligible_partners }).await;
        }
        Ok(order)
    }

    /// Records a partner's bid and opens a chat room between them and the client.
    ///
    /// The chat room is best effort. If it cannot be created, the bid is stored without one.
    pub async fn add_applicant(&self, order_id: &OrderId, bid: NewApplicant) -> Result<OrderDetails, MarketError> {
        if bid.offered_price.value() < 0 {
            return Err(MarketError::ValidationError("The offered price cannot be negative".into()));
        }
        let order = self.fetch_order(order_id).await?;
        ensure_open(&order)?;
        if order.bidding_mode != BiddingMode::Select {
            return Err(MarketError::BusinessRule(format!(
                "Order {order_id} uses {} mode and does not accept bids",
                order.bidding_mode
            )));
        }
        let partner_id = bid.partner_id.clone();
        if self.db.fetch_applicant(order_id, &partner_id).await?.is_some() {
            return Err(MarketError::Conflict(format!("Partner {partner_id} has already bid on order {order_id}")));
        }
        let room_id = match self.chat.create_room(order_id, &order.client_id, &partner_id).await {
            Ok(room) => Some(room),
            Err(e) => {
                warn!("📋️ Could not open a chat room for {partner_id} on order {order_id}. {e}");
                None
            },
        };
        let applicant = self.db.insert_applicant(order_id, bid, room_id).await?;
        info!("📋️ {partner_id} bid {} on order {order_id}", applicant.offered_price);
        self.producers.publish(MarketEvent::BidAdded { order, applicant }).await;
        self.get_order(order_id).await
    }

    /// Withdraws a partner's bid and tears down its chat room.
    pub async fn cancel_applicant(&self, order_id: &OrderId, partner_id: &UserId) -> Result<OrderDetails, MarketError> {
        let order = self.fetch_order(order_id).await?;
        ensure_open(&order)?;
        self.db
            .remove_applicant(order_id, partner_id)
            .await?
            .ok_or_else(|| MarketError::NotFound(format!("Partner {partner_id} has not bid on order {order_id}")))?;
        match self.chat.delete_rooms(order_id, partner_id).await {
            Ok(n) => trace!("📋️ {n} chat rooms removed for {partner_id} on order {order_id}"),
            Err(e) => warn!("📋️ Could not remove the chat room for {partner_id} on order {order_id}. {e}"),
        }
        info!("📋️ {partner_id} withdrew from order {order_id}");
        self.get_order(order_id).await
    }

    /// Accepts a partner's bid. The order moves to `processing`, the other bids are dropped, and an appointment is
    /// created at the bid price, inheriting the bid's chat room. All of it happens in one database transaction.
    pub async fn select_applicant(&self, order_id: &OrderId, partner_id: &UserId) -> Result<Selection, MarketError> {
        let (order, applicant, appointment) = self.db.select_applicant(order_id, partner_id).await?;
        info!("📋️ {partner_id} selected for order {order_id}. Appointment {} created", appointment.id);
        self.producers.publish(MarketEvent::ApplicantSelected { order: order.clone(), applicant: applicant.clone() }).await;
        self.producers.publish(MarketEvent::AppointmentCreated { appointment: appointment.clone() }).await;
        let order = OrderDetails { order, applicants: vec![applicant] };
        Ok(Selection { order, appointment })
    }

    pub async fn cancel_order(&self, order_id: &OrderId) -> Result<Order, MarketError> {
        let order = self.db.cancel_order(order_id).await?;
        info!("📋️ Order {order_id} cancelled");
        Ok(order)
    }

    /// Patches the order's free-form fields. An empty patch returns the order as it is.
    pub async fn update_order(&self, order_id: &OrderId, update: OrderUpdate) -> Result<Order, MarketError> {
        if update.is_empty() {
            return self.fetch_order(order_id).await;
        }
        let order = self.db.update_order(order_id, update).await?;
        debug!("📋️ Order {order_id} updated");
        Ok(order)
    }

    pub async fn get_order(&self, order_id: &OrderId) -> Result<OrderDetails, MarketError> {
        self.db.fetch_order_details(order_id).await?.ok_or_else(|| MarketError::NotFound(format!("Order {order_id}")))
    }

    /// All orders, or only the client's when `client_id` is given. Newest first.
    pub async fn list_orders(&self, client_id: Option<UserId>) -> Result<Vec<OrderDetails>, MarketError> {
        let filter = OrderQueryFilter { client_id, ..Default::default() };
        self.db.search_orders(filter).await
    }

    pub async fn orders_for_client(&self, client_id: &UserId) -> Result<Vec<OrderDetails>, MarketError> {
        self.db.search_orders(OrderQueryFilter::default().with_client_id(client_id.clone())).await
    }

    pub async fn orders_by_categories(&self, categories: Vec<String>) -> Result<Vec<OrderDetails>, MarketError> {
        let categories = categories.into_iter().map(|c| c.trim().to_string()).filter(|c| !c.is_empty()).collect::<Vec<_>>();
        if categories.is_empty() {
            return Ok(vec![]);
        }
        self.db.search_orders(OrderQueryFilter::default().with_categories(categories)).await
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, MarketError> {
        self.db.fetch_order(order_id).await?.ok_or_else(|| MarketError::NotFound(format!("Order {order_id}")))
    }
}
