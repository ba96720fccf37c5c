use chrono::Utc;
use log::debug;
use sqlx::SqliteConnection;

use crate::db_types::{ChatRoom, OrderId, RoomId, UserId};

pub(crate) async fn insert_room(
    order_id: &OrderId,
    client_id: &UserId,
    partner_id: &UserId,
    conn: &mut SqliteConnection,
) -> Result<ChatRoom, sqlx::Error> {
    let room: ChatRoom = sqlx::query_as(
        "INSERT INTO chat_rooms (id, order_id, client_id, partner_id, created_at) VALUES ($1, $2, $3, $4, $5) \
         RETURNING *",
    )
    .bind(RoomId::new_random())
    .bind(order_id)
    .bind(client_id)
    .bind(partner_id)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Chat room {} opened for order {order_id} between {client_id} and {partner_id}", room.id);
    Ok(room)
}

pub(crate) async fn delete_rooms(
    order_id: &OrderId,
    partner_id: &UserId,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM chat_rooms WHERE order_id = $1 AND partner_id = $2")
        .bind(order_id)
        .bind(partner_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}
