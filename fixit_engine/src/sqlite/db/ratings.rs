use chrono::Utc;
use log::debug;
use sqlx::{types::Json, SqliteConnection};

use crate::{
    db_types::{NewRating, Rating, RatingId, UserId},
    traits::MarketError,
};

/// Fails with [`MarketError::Conflict`] when the appointment already carries a rating.
pub(crate) async fn insert_rating(
    partner_id: &UserId,
    rating: NewRating,
    conn: &mut SqliteConnection,
) -> Result<Rating, MarketError> {
    let appointment_id = rating.appointment_id.clone();
    let rating: Rating = sqlx::query_as(
        r#"
            INSERT INTO ratings (id, appointment_id, client_id, partner_id, rating, comment, images, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(RatingId::new_random())
    .bind(rating.appointment_id)
    .bind(rating.client_id)
    .bind(partner_id)
    .bind(rating.rating)
    .bind(rating.comment)
    .bind(Json(rating.images))
    .bind(Utc::now())
    .fetch_one(conn)
    .await
    .map_err(|e| MarketError::conflict_on_unique(e, format!("Appointment {appointment_id} has already been rated")))?;
    debug!("🗃️ Rating {} stored for partner {partner_id}", rating.id);
    Ok(rating)
}

pub(crate) async fn ratings_for_partner(
    partner_id: &UserId,
    conn: &mut SqliteConnection,
) -> Result<Vec<Rating>, sqlx::Error> {
    sqlx::query_as(
        "SELECT * FROM ratings WHERE partner_id = $1 AND is_visible = 1 ORDER BY created_at DESC, rowid DESC",
    )
    .bind(partner_id)
    .fetch_all(conn)
    .await
}
