use crate::{
    db_types::{NewRating, Rating, UserId},
    traits::MarketError,
};

#[allow(async_fn_in_trait)]
pub trait RatingManagement: Clone {
    /// Stores the rating against `partner_id`. Returns [`MarketError::Conflict`] if the appointment has already been
    /// rated, including when a concurrent rating got there first.
    async fn insert_rating(&self, partner_id: &UserId, rating: NewRating) -> Result<Rating, MarketError>;

    /// The partner's visible ratings, newest first.
    async fn fetch_ratings_for_partner(&self, partner_id: &UserId) -> Result<Vec<Rating>, MarketError>;
}
