use std::collections::HashMap;

use crate::{
    db_types::{Appointment, NewPromotion, Promotion, PromotionId, PromotionRedemption, PromotionUsage, UserId},
    traits::MarketError,
};

#[allow(async_fn_in_trait)]
pub trait PromotionManagement: Clone {
    /// Returns [`MarketError::Conflict`] if the code is taken.
    async fn insert_promotion(&self, promotion: NewPromotion) -> Result<Promotion, MarketError>;

    async fn fetch_promotion_by_code(&self, code: &str) -> Result<Option<Promotion>, MarketError>;

    /// Newest first.
    async fn fetch_promotions(&self, active_only: bool) -> Result<Vec<Promotion>, MarketError>;

    /// Deletes the promotion and its usage history. Returns `false` if it did not exist.
    async fn delete_promotion(&self, id: &PromotionId) -> Result<bool, MarketError>;

    /// How many times the user has redeemed each promotion.
    async fn usage_counts_for_user(&self, user_id: &UserId) -> Result<HashMap<PromotionId, i64>, MarketError>;

    async fn fetch_usage_history(&self, id: &PromotionId) -> Result<Vec<PromotionUsage>, MarketError>;

    /// Redeems a promotion against an appointment, atomically:
    /// * the global usage counter is bumped only while it is below `usage_limit`,
    /// * a usage row is appended only while the user's count is below `usage_per_user`,
    /// * the appointment gets the code and discount, and `final_amount` is recomputed.
    ///
    /// If either cap refuses the write, nothing is changed and [`MarketError::BusinessRule`] is returned.
    async fn redeem_promotion(&self, redemption: PromotionRedemption) -> Result<Appointment, MarketError>;

    /// Adds a client to the promotion's target list. Adding an existing target is a no-op.
    async fn add_promotion_target(&self, code: &str, client_id: &UserId) -> Result<Promotion, MarketError>;
}
