use chrono::Utc;
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Applicant, NewApplicant, OrderId, RoomId, UserId},
    traits::MarketError,
};

/// Records a bid. The `(order_id, partner_id)` primary key turns a repeat bid into [`MarketError::Conflict`].
pub(crate) async fn insert_applicant(
    order_id: &OrderId,
    applicant: NewApplicant,
    room_id: Option<RoomId>,
    conn: &mut SqliteConnection,
) -> Result<Applicant, MarketError> {
    let partner_id = applicant.partner_id.clone();
    let applicant: Applicant = sqlx::query_as(
        r#"
            INSERT INTO applicants (order_id, partner_id, name, avatar_url, offered_price, note, room_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(applicant.partner_id)
    .bind(applicant.name)
    .bind(applicant.avatar_url)
    .bind(applicant.offered_price)
    .bind(applicant.note)
    .bind(room_id)
    .bind(Utc::now())
    .fetch_one(conn)
    .await
    .map_err(|e| MarketError::conflict_on_unique(e, format!("Partner {partner_id} has already bid on order {order_id}")))?;
    debug!("🗃️ Partner {} bid {} on order {order_id}", applicant.partner_id, applicant.offered_price);
    Ok(applicant)
}

/// All bids on the order, oldest first.
pub(crate) async fn fetch_applicants(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<Applicant>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM applicants WHERE order_id = $1 ORDER BY created_at, rowid")
        .bind(order_id)
        .fetch_all(conn)
        .await
}

pub(crate) async fn fetch_applicant(
    order_id: &OrderId,
    partner_id: &UserId,
    conn: &mut SqliteConnection,
) -> Result<Option<Applicant>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM applicants WHERE order_id = $1 AND partner_id = $2")
        .bind(order_id)
        .bind(partner_id)
        .fetch_optional(conn)
        .await
}

pub(crate) async fn delete_applicant(
    order_id: &OrderId,
    partner_id: &UserId,
    conn: &mut SqliteConnection,
) -> Result<Option<Applicant>, sqlx::Error> {
    sqlx::query_as("DELETE FROM applicants WHERE order_id = $1 AND partner_id = $2 RETURNING *")
        .bind(order_id)
        .bind(partner_id)
        .fetch_optional(conn)
        .await
}

/// Deletes every bid on the order except the one from `keep`. Returns the number of bids removed.
pub(crate) async fn delete_other_applicants(
    order_id: &OrderId,
    keep: &UserId,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM applicants WHERE order_id = $1 AND partner_id != $2")
        .bind(order_id)
        .bind(keep)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}
