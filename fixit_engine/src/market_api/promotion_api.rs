use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{
        Appointment,
        AppointmentId,
        DiscountKind,
        NewPromotion,
        Promotion,
        PromotionCategory,
        PromotionId,
        PromotionRedemption,
        UserId,
        Vnd,
    },
    traits::{AppointmentManagement, MarketError, PromotionManagement},
};

/// The result of a successful promotion redemption.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionApplied {
    pub discount: Vnd,
    pub final_amount: Vnd,
    pub appointment: Appointment,
}

/// `PromotionApi` decides who may use which discount code, computes the discount and redeems it against an appointment.
pub struct PromotionApi<B> {
    db: B,
}

impl<B> Debug for PromotionApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PromotionApi")
    }
}

impl<B: Clone> Clone for PromotionApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone() }
    }
}

impl<B> PromotionApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

/// Whether `client_id` may see the promotion right now, ignoring usage counts.
///
/// Global promotions are open to everyone. Welcome and personal promotions are restricted to their target list. Event
/// promotions are open to everyone while the event runs.
pub fn is_offered_to(promotion: &Promotion, client_id: &UserId, now: DateTime<Utc>) -> bool {
    if !promotion.is_active {
        return false;
    }
    match promotion.category {
        PromotionCategory::Global => true,
        PromotionCategory::Welcome | PromotionCategory::Personal => promotion.targets(client_id),
        PromotionCategory::Event => promotion.is_running(now),
    }
}

fn validate_new_promotion(promotion: &NewPromotion) -> Result<(), MarketError> {
    if promotion.code.trim().is_empty() {
        return Err(MarketError::ValidationError("Promotion code cannot be empty".into()));
    }
    if promotion.value <= 0 {
        return Err(MarketError::ValidationError("Promotion value must be positive".into()));
    }
    if promotion.discount_kind == DiscountKind::Percentage && promotion.value > 100 {
        return Err(MarketError::ValidationError("A percentage discount cannot exceed 100".into()));
    }
    if promotion.max_discount.is_some_and(|cap| !cap.is_positive()) {
        return Err(MarketError::ValidationError("maxDiscount must be positive when given".into()));
    }
    if promotion.usage_per_user < 1 {
        return Err(MarketError::ValidationError("usagePerUser must be at least 1".into()));
    }
    if let Some(limit) = promotion.usage_limit {
        if limit < 1 {
            return Err(MarketError::ValidationError("usageLimit must be at least 1".into()));
        }
    }
    if let (Some(start), Some(end)) = (promotion.start_date, promotion.end_date) {
        if end < start {
            return Err(MarketError::ValidationError("endDate cannot be before startDate".into()));
        }
    }
    Ok(())
}

impl<B> PromotionApi<B>
where B: PromotionManagement + AppointmentManagement
{
    /// All promotions, newest first.
    pub async fn list_all(&self) -> Result<Vec<Promotion>, MarketError> {
        self.db.fetch_promotions(false).await
    }

    /// The active promotions that the client may still use.
    pub async fn list_eligible(&self, client_id: &UserId) -> Result<Vec<Promotion>, MarketError> {
        let now = Utc::now();
        let promotions = self.db.fetch_promotions(true).await?;
        let used = self.db.usage_counts_for_user(client_id).await?;
        let eligible = promotions
            .into_iter()
            .filter(|p| is_offered_to(p, client_id, now))
            .filter(|p| used.get(&p.id).copied().unwrap_or(0) < p.usage_per_user)
            .collect::<Vec<_>>();
        trace!("🎟️ {} promotions are available to {client_id}", eligible.len());
        Ok(eligible)
    }

    pub async fn create(&self, promotion: NewPromotion) -> Result<Promotion, MarketError> {
        validate_new_promotion(&promotion)?;
        let promotion = self.db.insert_promotion(promotion).await?;
        info!("🎟️ Promotion {} created", promotion.code);
        Ok(promotion)
    }

    pub async fn remove(&self, id: &PromotionId) -> Result<(), MarketError> {
        if !self.db.delete_promotion(id).await? {
            return Err(MarketError::NotFound(format!("Promotion {id}")));
        }
        info!("🎟️ Promotion {id} removed");
        Ok(())
    }

    /// Adds the client to the promotion's target list, e.g. when a welcome promotion is granted on sign-up.
    pub async fn enroll_client(&self, code: &str, client_id: &UserId) -> Result<Promotion, MarketError> {
        let promotion = self.db.add_promotion_target(code, client_id).await?;
        debug!("🎟️ {client_id} enrolled in promotion {code}");
        Ok(promotion)
    }

    /// Redeems `code` for `user_id` against the appointment.
    ///
    /// The checks below run first so that callers get a precise reason. The caps are enforced again by the backend in
    /// the same transaction as the write, which is what makes them hold under concurrent requests.
    pub async fn apply(
        &self,
        appointment_id: &AppointmentId,
        code: &str,
        user_id: &UserId,
    ) -> Result<PromotionApplied, MarketError> {
        let promotion = self
            .db
            .fetch_promotion_by_code(code)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| MarketError::NotFound(format!("Promotion {code} does not exist or is not active")))?;
        let now = Utc::now();
        if !promotion.has_started(now) {
            return Err(MarketError::BusinessRule(format!("Promotion {code} has not started yet")));
        }
        if promotion.has_expired(now) {
            return Err(MarketError::BusinessRule(format!("Promotion {code} has expired")));
        }
        let used = self.db.usage_counts_for_user(user_id).await?.get(&promotion.id).copied().unwrap_or(0);
        if used >= promotion.usage_per_user {
            return Err(MarketError::BusinessRule(format!("Promotion {code} has already been used by {user_id}")));
        }
        if promotion.usage_limit_reached() {
            return Err(MarketError::BusinessRule(format!("Promotion {code} has reached its usage limit")));
        }
        if promotion.has_target_list() && !promotion.targets(user_id) {
            return Err(MarketError::BusinessRule(format!("Promotion {code} is not available to {user_id}")));
        }
        let appointment = self
            .db
            .fetch_appointment(appointment_id)
            .await?
            .ok_or_else(|| MarketError::NotFound(format!("Appointment {appointment_id}")))?;
        if appointment.status.is_terminal() {
            return Err(MarketError::BusinessRule(format!(
                "Appointment {appointment_id} is {} and cannot take a promotion",
                appointment.status
            )));
        }
        if let Some(minimum) = promotion.min_order_value {
            if appointment.agreed_price < minimum {
                return Err(MarketError::BusinessRule(format!(
                    "Promotion {code} needs an order of at least {minimum}"
                )));
            }
        }
        let discount = promotion.discount_for(appointment.agreed_price);
        let redemption = PromotionRedemption {
            promotion_id: promotion.id.clone(),
            code: promotion.code.clone(),
            user_id: user_id.clone(),
            appointment_id: appointment_id.clone(),
            discount,
        };
        let appointment = self.db.redeem_promotion(redemption).await?;
        info!("🎟️ Promotion {code} applied to appointment {appointment_id}. Discount: {discount}");
        Ok(PromotionApplied { discount, final_amount: appointment.final_amount, appointment })
    }
}
