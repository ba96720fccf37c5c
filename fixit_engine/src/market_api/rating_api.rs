use std::fmt::Debug;

use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{NewRating, Rating, UserId, MAX_RATING, MIN_RATING},
    traits::{AppointmentManagement, MarketError, RatingManagement},
};

/// A partner's ratings with their average score, rounded to one decimal. The average is `None` until the first
/// rating arrives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerRatings {
    pub partner_id: UserId,
    pub average_rating: Option<f64>,
    pub total: usize,
    pub ratings: Vec<Rating>,
}

impl PartnerRatings {
    pub fn new(partner_id: UserId, ratings: Vec<Rating>) -> Self {
        let total = ratings.len();
        let average_rating = (total > 0).then(|| {
            let sum = ratings.iter().map(|r| r.rating).sum::<i64>() as f64;
            (sum * 10.0 / total as f64).round() / 10.0
        });
        Self { partner_id, average_rating, total, ratings }
    }
}

/// `RatingApi` lets clients rate the partner who did their job, once per appointment.
pub struct RatingApi<B> {
    db: B,
}

impl<B> Debug for RatingApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RatingApi")
    }
}

impl<B: Clone> Clone for RatingApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone() }
    }
}

impl<B> RatingApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

fn validate_new_rating(rating: &NewRating) -> Result<(), MarketError> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating.rating) {
        return Err(MarketError::ValidationError(format!("rating must be between {MIN_RATING} and {MAX_RATING}")));
    }
    if rating.client_id.as_str().trim().is_empty() {
        return Err(MarketError::ValidationError("clientId is required".into()));
    }
    Ok(())
}

impl<B> RatingApi<B>
where B: AppointmentManagement + RatingManagement
{
    /// Records the client's rating of an appointment.
    ///
    /// Only the appointment's client may rate it, and only once. A second attempt, including a concurrent one, fails
    /// with [`MarketError::Conflict`].
    pub async fn rate(&self, rating: NewRating) -> Result<Rating, MarketError> {
        validate_new_rating(&rating)?;
        let appointment_id = &rating.appointment_id;
        let appointment = self
            .db
            .fetch_appointment(appointment_id)
            .await?
            .ok_or_else(|| MarketError::NotFound(format!("Appointment {appointment_id}")))?;
        if appointment.client_id != rating.client_id {
            return Err(MarketError::BusinessRule(format!(
                "{} cannot rate appointment {appointment_id}, which belongs to another client",
                rating.client_id
            )));
        }
        if let Some(partner_id) = &rating.partner_id {
            if partner_id != &appointment.partner_id {
                return Err(MarketError::ValidationError(format!(
                    "Partner {partner_id} did not work on appointment {appointment_id}"
                )));
            }
        }
        let rating = self.db.insert_rating(&appointment.partner_id, rating).await?;
        info!(
            "⭐️ {} rated {} with {} for appointment {}",
            rating.client_id, rating.partner_id, rating.rating, rating.appointment_id
        );
        Ok(rating)
    }

    /// The partner's ratings, newest first, with their average.
    pub async fn for_partner(&self, partner_id: &UserId) -> Result<PartnerRatings, MarketError> {
        let ratings = self.db.fetch_ratings_for_partner(partner_id).await?;
        trace!("⭐️ {} ratings found for {partner_id}", ratings.len());
        Ok(PartnerRatings::new(partner_id.clone(), ratings))
    }
}
