//! `SqliteDatabase` is a concrete implementation of a marketplace backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module. Every write runs inside a database transaction, so a failure part-way through a multi-step operation leaves
//! no trace, and a committed write is visible to every other connection in the pool.
use std::{collections::HashMap, fmt::Debug};

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{migrate, SqliteConnection, SqlitePool};

use super::db::{
    applicants,
    appointments,
    chat_rooms,
    db_url,
    devices,
    ledger,
    new_pool,
    orders,
    partners,
    promotions,
    ratings,
};
use crate::{
    db_types::{
        Applicant,
        Appointment,
        AppointmentId,
        AppointmentUpdate,
        CompletionSettlement,
        NewApplicant,
        NewAppointment,
        NewOrder,
        NewPaidTransaction,
        NewPartnerProfile,
        NewPromotion,
        NewRating,
        NewTransaction,
        Order,
        OrderDetails,
        OrderId,
        OrderStatus,
        OrderUpdate,
        PaidTransaction,
        PartnerProfile,
        Promotion,
        PromotionId,
        PromotionRedemption,
        PromotionUsage,
        Rating,
        RoomId,
        ServiceCategory,
        Transaction,
        TransactionId,
        TransactionKind,
        TransactionStatus,
        UserId,
        Vnd,
    },
    traits::{
        AppointmentManagement,
        AppointmentQueryFilter,
        ChatRooms,
        CleanupResult,
        CollaboratorError,
        CompletedAppointment,
        DescriptorMatch,
        DeviceRegistry,
        LedgerManagement,
        MarketError,
        MarketplaceDatabase,
        OrderManagement,
        OrderQueryFilter,
        PartnerDirectory,
        PromotionManagement,
        RatingManagement,
        TopUpSettlement,
        TransactionQueryFilter,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl MarketplaceDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn close(&mut self) -> Result<(), MarketError> {
        self.pool.close().await;
        Ok(())
    }
}

/// Explains why a conditional write on an appointment touched nothing.
async fn appointment_write_refused(id: &AppointmentId, conn: &mut SqliteConnection) -> MarketError {
    match appointments::fetch_appointment(id, conn).await {
        Ok(Some(a)) => MarketError::BusinessRule(format!("Appointment {id} is already {}", a.status)),
        Ok(None) => MarketError::NotFound(format!("Appointment {id}")),
        Err(e) => e.into(),
    }
}

async fn order_write_refused(id: &OrderId, conn: &mut SqliteConnection) -> MarketError {
    match orders::fetch_order(id, conn).await {
        Ok(Some(o)) => MarketError::BusinessRule(format!("Order {id} is {}", o.status)),
        Ok(None) => MarketError::NotFound(format!("Order {id}")),
        Err(e) => e.into(),
    }
}

impl OrderManagement for SqliteDatabase {
    async fn insert_order(&self, order: NewOrder) -> Result<Order, MarketError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::insert_order(order, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn fetch_order(&self, id: &OrderId) -> Result<Option<Order>, MarketError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_details(&self, id: &OrderId) -> Result<Option<OrderDetails>, MarketError> {
        let mut tx = self.pool.begin().await?;
        let Some(order) = orders::fetch_order(id, &mut tx).await? else {
            return Ok(None);
        };
        let applicants = applicants::fetch_applicants(id, &mut tx).await?;
        tx.commit().await?;
        Ok(Some(OrderDetails { order, applicants }))
    }

    async fn search_orders(&self, filter: OrderQueryFilter) -> Result<Vec<OrderDetails>, MarketError> {
        let mut tx = self.pool.begin().await?;
        let found = orders::search_orders(filter, &mut tx).await?;
        let mut result = Vec::with_capacity(found.len());
        for order in found {
            let applicants = applicants::fetch_applicants(&order.id, &mut tx).await?;
            result.push(OrderDetails { order, applicants });
        }
        tx.commit().await?;
        Ok(result)
    }

    async fn update_order(&self, id: &OrderId, update: OrderUpdate) -> Result<Order, MarketError> {
        let mut tx = self.pool.begin().await?;
        let Some(order) = orders::update_order(id, update, &mut tx).await? else {
            let err = order_write_refused(id, &mut tx).await;
            tx.rollback().await?;
            return Err(err);
        };
        tx.commit().await?;
        Ok(order)
    }

    async fn insert_applicant(
        &self,
        order_id: &OrderId,
        applicant: NewApplicant,
        room_id: Option<RoomId>,
    ) -> Result<Applicant, MarketError> {
        let mut tx = self.pool.begin().await?;
        let applicant = applicants::insert_applicant(order_id, applicant, room_id, &mut tx).await?;
        tx.commit().await?;
        Ok(applicant)
    }

    async fn fetch_applicant(&self, order_id: &OrderId, partner_id: &UserId) -> Result<Option<Applicant>, MarketError> {
        let mut conn = self.pool.acquire().await?;
        let applicant = applicants::fetch_applicant(order_id, partner_id, &mut conn).await?;
        Ok(applicant)
    }

    async fn remove_applicant(
        &self,
        order_id: &OrderId,
        partner_id: &UserId,
    ) -> Result<Option<Applicant>, MarketError> {
        let mut tx = self.pool.begin().await?;
        let applicant = applicants::delete_applicant(order_id, partner_id, &mut tx).await?;
        tx.commit().await?;
        Ok(applicant)
    }

    /// Performs the selection in a single atomic transaction:
    /// * the order moves from `pending` to `processing` with a compare-and-swap. This is the first statement, so
    ///   concurrent selections queue on the write lock, and every one after the winner finds the order taken,
    /// * the chosen bid must exist,
    /// * every other bid on the order is deleted,
    /// * the appointment is created at the bid price, inheriting the bid's chat room.
    async fn select_applicant(
        &self,
        order_id: &OrderId,
        partner_id: &UserId,
    ) -> Result<(Order, Applicant, Appointment), MarketError> {
        let mut tx = self.pool.begin().await?;
        let Some(order) =
            orders::transition_status(order_id, OrderStatus::Pending, OrderStatus::Processing, &mut tx).await?
        else {
            let err = match orders::fetch_order(order_id, &mut tx).await? {
                Some(order) => MarketError::BusinessRule(format!(
                    "Order {order_id} is {} and no longer accepts a selection",
                    order.status
                )),
                None => MarketError::NotFound(format!("Order {order_id}")),
            };
            tx.rollback().await?;
            return Err(err);
        };
        let Some(applicant) = applicants::fetch_applicant(order_id, partner_id, &mut tx).await? else {
            tx.rollback().await?;
            return Err(MarketError::NotFound(format!("Partner {partner_id} has not bid on order {order_id}")));
        };
        let removed = applicants::delete_other_applicants(order_id, partner_id, &mut tx).await?;
        let new_appointment = NewAppointment::new(order.id.clone(), order.client_id.clone(), partner_id.clone())
            .with_room(applicant.room_id.clone())
            .with_agreed_price(applicant.offered_price);
        let appointment = appointments::insert_appointment(new_appointment, &mut tx).await?;
        tx.commit().await?;
        debug!(
            "🗃️ Partner {partner_id} selected for order {order_id}. {removed} other bids removed. Appointment {} created",
            appointment.id
        );
        Ok((order, applicant, appointment))
    }

    async fn cancel_order(&self, id: &OrderId) -> Result<Order, MarketError> {
        let mut tx = self.pool.begin().await?;
        let Some(order) = orders::cancel_order(id, &mut tx).await? else {
            let err = order_write_refused(id, &mut tx).await;
            tx.rollback().await?;
            return Err(err);
        };
        tx.commit().await?;
        Ok(order)
    }
}

impl AppointmentManagement for SqliteDatabase {
    async fn insert_appointment(&self, appointment: NewAppointment) -> Result<Appointment, MarketError> {
        let mut tx = self.pool.begin().await?;
        let appointment = appointments::insert_appointment(appointment, &mut tx).await?;
        tx.commit().await?;
        Ok(appointment)
    }

    async fn fetch_appointment(&self, id: &AppointmentId) -> Result<Option<Appointment>, MarketError> {
        let mut conn = self.pool.acquire().await?;
        let appointment = appointments::fetch_appointment(id, &mut conn).await?;
        Ok(appointment)
    }

    async fn search_appointments(&self, filter: AppointmentQueryFilter) -> Result<Vec<Appointment>, MarketError> {
        let mut conn = self.pool.acquire().await?;
        let result = appointments::search_appointments(filter, &mut conn).await?;
        Ok(result)
    }

    async fn update_appointment(
        &self,
        id: &AppointmentId,
        update: AppointmentUpdate,
    ) -> Result<Appointment, MarketError> {
        let mut tx = self.pool.begin().await?;
        let Some(appointment) = appointments::update_appointment(id, update, &mut tx).await? else {
            let err = appointment_write_refused(id, &mut tx).await;
            tx.rollback().await?;
            return Err(err);
        };
        tx.commit().await?;
        Ok(appointment)
    }

    async fn complete_appointment(
        &self,
        id: &AppointmentId,
        settlement: CompletionSettlement,
    ) -> Result<CompletedAppointment, MarketError> {
        let mut tx = self.pool.begin().await?;
        let Some(appointment) =
            appointments::mark_completed(id, settlement.payment_method, settlement.settlement_ref.clone(), &mut tx)
                .await?
        else {
            let err = appointment_write_refused(id, &mut tx).await;
            tx.rollback().await?;
            return Err(err);
        };
        let transaction = match settlement.balance_change() {
            Some(change) => {
                let partner_id = &settlement.partner_id;
                let new_balance = if change.is_positive() {
                    partners::credit_balance(partner_id, change, &mut tx).await?
                } else {
                    partners::debit_balance(partner_id, -change, &mut tx).await?
                };
                let status = match new_balance {
                    Some(_) => TransactionStatus::Success,
                    None => {
                        warn!(
                            "🗃️ Could not apply {change} to the balance of {partner_id} for appointment {id}. The \
                             settlement is recorded as failed."
                        );
                        TransactionStatus::Failed
                    },
                };
                let mut record = NewTransaction::pending(partner_id.clone(), TransactionKind::Appointment, settlement.amount);
                record.status = status;
                record.balance_after = new_balance;
                record.appointment_id = Some(id.clone());
                record.payment_method = settlement.payment_method;
                record.settlement_ref = settlement.settlement_ref.clone();
                Some(ledger::insert_transaction(record, &mut tx).await?)
            },
            None => None,
        };
        if orders::transition_status(&appointment.order_id, OrderStatus::Processing, OrderStatus::Completed, &mut tx)
            .await?
            .is_none()
        {
            debug!("🗃️ Order {} was not processing, so its status is left alone", appointment.order_id);
        }
        tx.commit().await?;
        debug!("🗃️ Appointment {id} completed");
        Ok(CompletedAppointment { appointment, transaction })
    }

    async fn cancel_appointment(&self, id: &AppointmentId, reason: &str) -> Result<Appointment, MarketError> {
        let mut tx = self.pool.begin().await?;
        let Some(appointment) = appointments::mark_cancelled(id, reason, &mut tx).await? else {
            let err = appointment_write_refused(id, &mut tx).await;
            tx.rollback().await?;
            return Err(err);
        };
        if orders::transition_status(&appointment.order_id, OrderStatus::Processing, OrderStatus::Cancelled, &mut tx)
            .await?
            .is_none()
        {
            debug!("🗃️ Order {} was not processing, so its status is left alone", appointment.order_id);
        }
        tx.commit().await?;
        debug!("🗃️ Appointment {id} cancelled");
        Ok(appointment)
    }
}

impl LedgerManagement for SqliteDatabase {
    async fn insert_transaction(&self, transaction: NewTransaction) -> Result<Transaction, MarketError> {
        let mut tx = self.pool.begin().await?;
        let transaction = ledger::insert_transaction(transaction, &mut tx).await?;
        tx.commit().await?;
        Ok(transaction)
    }

    async fn insert_paid_transaction(&self, payment: NewPaidTransaction) -> Result<PaidTransaction, MarketError> {
        let mut tx = self.pool.begin().await?;
        let payment = ledger::insert_paid_transaction(payment, &mut tx).await?;
        tx.commit().await?;
        Ok(payment)
    }

    async fn find_pending_top_up(&self, descriptor: &DescriptorMatch) -> Result<Option<Transaction>, MarketError> {
        let mut conn = self.pool.acquire().await?;
        let result = ledger::find_pending_top_up(descriptor, &mut conn).await?;
        Ok(result)
    }

    async fn find_pending_job_payment(
        &self,
        descriptor: &DescriptorMatch,
    ) -> Result<Option<PaidTransaction>, MarketError> {
        let mut conn = self.pool.acquire().await?;
        let result = ledger::find_pending_job_payment(descriptor, &mut conn).await?;
        Ok(result)
    }

    /// Consumes the intent and credits the balance in a single atomic transaction:
    /// * the intent flips from `pending` to `success` with a compare-and-swap. Losing the swap means a concurrent
    ///   webhook already consumed it,
    /// * the intent amount is credited to the owner's balance. If there is no balance record, the whole transaction is
    ///   rolled back, so the intent stays pending,
    /// * the new balance is written back onto the intent.
    async fn settle_top_up(&self, transaction: &Transaction) -> Result<TopUpSettlement, MarketError> {
        let mut tx = self.pool.begin().await?;
        if !ledger::claim_transaction(&transaction.id, &mut tx).await? {
            tx.rollback().await?;
            debug!("🗃️ Top-up {} has already been consumed", transaction.id);
            return Ok(TopUpSettlement::AlreadyConsumed);
        }
        let Some(new_balance) = partners::credit_balance(&transaction.user_id, transaction.amount, &mut tx).await?
        else {
            tx.rollback().await?;
            warn!("🗃️ No balance record for {}. Top-up {} left pending", transaction.user_id, transaction.id);
            return Ok(TopUpSettlement::BalanceNotFound);
        };
        let transaction = ledger::set_balance_after(&transaction.id, new_balance, &mut tx).await?;
        tx.commit().await?;
        Ok(TopUpSettlement::Settled { transaction, new_balance })
    }

    async fn claim_job_payment(&self, id: &TransactionId) -> Result<Option<PaidTransaction>, MarketError> {
        let mut tx = self.pool.begin().await?;
        let result = ledger::claim_paid_transaction(id, &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn fetch_transactions(&self, filter: TransactionQueryFilter) -> Result<Vec<Transaction>, MarketError> {
        let mut conn = self.pool.acquire().await?;
        let result = ledger::search_transactions(filter, &mut conn).await?;
        Ok(result)
    }

    async fn delete_stale_intents(&self, cutoff: DateTime<Utc>) -> Result<CleanupResult, MarketError> {
        let mut tx = self.pool.begin().await?;
        let transactions = ledger::delete_stale_top_ups(cutoff, &mut tx).await?;
        let paid_transactions = ledger::delete_stale_job_payments(cutoff, &mut tx).await?;
        tx.commit().await?;
        Ok(CleanupResult { transactions, paid_transactions })
    }

    async fn fetch_balance(&self, user_id: &UserId) -> Result<Option<Vnd>, MarketError> {
        let mut conn = self.pool.acquire().await?;
        let balance = partners::fetch_balance(user_id, &mut conn).await?;
        Ok(balance)
    }
}

impl PromotionManagement for SqliteDatabase {
    async fn insert_promotion(&self, promotion: NewPromotion) -> Result<Promotion, MarketError> {
        let mut tx = self.pool.begin().await?;
        let promotion = promotions::insert_promotion(promotion, &mut tx).await?;
        tx.commit().await?;
        Ok(promotion)
    }

    async fn fetch_promotion_by_code(&self, code: &str) -> Result<Option<Promotion>, MarketError> {
        let mut conn = self.pool.acquire().await?;
        let promotion = promotions::fetch_by_code(code, &mut conn).await?;
        Ok(promotion)
    }

    async fn fetch_promotions(&self, active_only: bool) -> Result<Vec<Promotion>, MarketError> {
        let mut conn = self.pool.acquire().await?;
        let result = promotions::fetch_all(active_only, &mut conn).await?;
        Ok(result)
    }

    async fn delete_promotion(&self, id: &PromotionId) -> Result<bool, MarketError> {
        let mut tx = self.pool.begin().await?;
        let deleted = promotions::delete_promotion(id, &mut tx).await?;
        tx.commit().await?;
        Ok(deleted)
    }

    async fn usage_counts_for_user(&self, user_id: &UserId) -> Result<HashMap<PromotionId, i64>, MarketError> {
        let mut conn = self.pool.acquire().await?;
        let counts = promotions::usage_counts(user_id, &mut conn).await?;
        Ok(counts)
    }

    async fn fetch_usage_history(&self, id: &PromotionId) -> Result<Vec<PromotionUsage>, MarketError> {
        let mut conn = self.pool.acquire().await?;
        let history = promotions::usage_history(id, &mut conn).await?;
        Ok(history)
    }

    async fn redeem_promotion(&self, redemption: PromotionRedemption) -> Result<Appointment, MarketError> {
        let PromotionRedemption { promotion_id, code, user_id, appointment_id, discount } = redemption;
        let mut tx = self.pool.begin().await?;
        if !promotions::bump_usage(&promotion_id, &mut tx).await? {
            tx.rollback().await?;
            return Err(MarketError::BusinessRule(format!("Promotion {code} has reached its usage limit")));
        }
        if !promotions::insert_usage_if_allowed(&promotion_id, &user_id, Some(&appointment_id), &mut tx).await? {
            tx.rollback().await?;
            return Err(MarketError::BusinessRule(format!("Promotion {code} has already been used by {user_id}")));
        }
        let Some(appointment) = appointments::apply_discount(&appointment_id, &code, discount, &mut tx).await? else {
            let err = appointment_write_refused(&appointment_id, &mut tx).await;
            tx.rollback().await?;
            return Err(err);
        };
        tx.commit().await?;
        debug!("🗃️ Promotion {code} redeemed by {user_id} on appointment {appointment_id} for {discount}");
        Ok(appointment)
    }

    async fn add_promotion_target(&self, code: &str, client_id: &UserId) -> Result<Promotion, MarketError> {
        let mut tx = self.pool.begin().await?;
        let promotion = promotions::fetch_by_code(code, &mut tx)
            .await?
            .ok_or_else(|| MarketError::NotFound(format!("Promotion {code}")))?;
        if promotion.targets(client_id) {
            return Ok(promotion);
        }
        let mut targets = promotion.target_clients.0;
        targets.push(client_id.clone());
        let promotion = promotions::set_targets(&promotion.id, targets, &mut tx).await?;
        tx.commit().await?;
        Ok(promotion)
    }
}

impl RatingManagement for SqliteDatabase {
    async fn insert_rating(&self, partner_id: &UserId, rating: NewRating) -> Result<Rating, MarketError> {
        let mut tx = self.pool.begin().await?;
        let rating = ratings::insert_rating(partner_id, rating, &mut tx).await?;
        tx.commit().await?;
        Ok(rating)
    }

    async fn fetch_ratings_for_partner(&self, partner_id: &UserId) -> Result<Vec<Rating>, MarketError> {
        let mut conn = self.pool.acquire().await?;
        let result = ratings::ratings_for_partner(partner_id, &mut conn).await?;
        Ok(result)
    }
}

impl PartnerDirectory for SqliteDatabase {
    async fn eligible_partners(&self, category: &str) -> Result<Vec<UserId>, MarketError> {
        let mut conn = self.pool.acquire().await?;
        let result = partners::eligible_partners(category, &mut conn).await?;
        Ok(result)
    }

    async fn fetch_partner_profile(&self, user_id: &UserId) -> Result<Option<PartnerProfile>, MarketError> {
        let mut conn = self.pool.acquire().await?;
        let profile = partners::fetch_profile(user_id, &mut conn).await?;
        Ok(profile)
    }

    async fn partner_categories(&self, user_id: &UserId) -> Result<Vec<ServiceCategory>, MarketError> {
        let mut conn = self.pool.acquire().await?;
        let result = partners::categories(user_id, &mut conn).await?;
        Ok(result)
    }

    async fn upsert_partner_profile(&self, profile: NewPartnerProfile) -> Result<PartnerProfile, MarketError> {
        let mut tx = self.pool.begin().await?;
        let result = partners::upsert_profile(&profile, &mut tx).await?;
        partners::replace_categories(&profile.user_id, &profile.categories, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Partner profile for {} saved with {} categories", result.user_id, profile.categories.len());
        Ok(result)
    }

    async fn set_partner_online(&self, user_id: &UserId, online: bool) -> Result<Option<PartnerProfile>, MarketError> {
        let mut tx = self.pool.begin().await?;
        let profile = partners::set_online(user_id, online, &mut tx).await?;
        tx.commit().await?;
        Ok(profile)
    }
}

/// Local chat rooms, used when no external chat service is configured.
impl ChatRooms for SqliteDatabase {
    async fn create_room(
        &self,
        order_id: &OrderId,
        client_id: &UserId,
        partner_id: &UserId,
    ) -> Result<RoomId, CollaboratorError> {
        let mut tx = self.pool.begin().await?;
        let room = chat_rooms::insert_room(order_id, client_id, partner_id, &mut tx).await?;
        tx.commit().await?;
        Ok(room.id)
    }

    async fn delete_rooms(&self, order_id: &OrderId, partner_id: &UserId) -> Result<u64, CollaboratorError> {
        let mut tx = self.pool.begin().await?;
        let count = chat_rooms::delete_rooms(order_id, partner_id, &mut tx).await?;
        tx.commit().await?;
        Ok(count)
    }
}

impl DeviceRegistry for SqliteDatabase {
    async fn device_tokens_for(&self, user_ids: &[UserId]) -> Result<Vec<String>, CollaboratorError> {
        let mut conn = self.pool.acquire().await?;
        let tokens = devices::tokens_for(user_ids, &mut conn).await?;
        Ok(tokens)
    }

    async fn register_device_token(&self, user_id: &UserId, token: &str) -> Result<(), CollaboratorError> {
        let mut tx = self.pool.begin().await?;
        devices::register_token(user_id, token, &mut tx).await?;
        tx.commit().await?;
        Ok(())
    }
}

impl SqliteDatabase {
    /// Creates a new database API object, using the URL in `FIXIT_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date with the embedded migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
