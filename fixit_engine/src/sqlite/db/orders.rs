use chrono::Utc;
use log::{debug, trace};
use sqlx::{types::Json, QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderStatus, OrderUpdate},
    traits::{MarketError, OrderQueryFilter},
};

/// Inserts a new order in `pending` status.
///
/// The partial unique index on `(client_id) WHERE status = 'pending'` rejects a second open order for the same client,
/// which is reported as [`MarketError::Conflict`].
pub(crate) async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, MarketError> {
    let id = OrderId::new_random();
    let now = Utc::now();
    let client_id = order.client_id.clone();
    let order: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                id,
                client_id,
                service,
                category,
                description,
                images,
                scheduled_for,
                address,
                longitude,
                latitude,
                bidding_mode,
                price_range,
                status,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 'pending', $13, $13)
            RETURNING *;
        "#,
    )
    .bind(id)
    .bind(order.client_id)
    .bind(order.service)
    .bind(order.category)
    .bind(order.description)
    .bind(Json(order.images))
    .bind(order.scheduled_for)
    .bind(order.address)
    .bind(order.longitude)
    .bind(order.latitude)
    .bind(order.bidding_mode)
    .bind(order.price_range)
    .bind(now)
    .fetch_one(conn)
    .await
    .map_err(|e| MarketError::conflict_on_unique(e, format!("Client {client_id} already has a pending order")))?;
    debug!("🗃️ Order {} for client {} inserted", order.id, order.client_id);
    Ok(order)
}

pub(crate) async fn fetch_order(id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await
}

/// Fetches orders matching the filter, newest first.
pub(crate) async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders WHERE 1 = 1");
    if let Some(client_id) = query.client_id {
        builder.push(" AND client_id = ").push_bind(client_id);
    }
    if let Some(categories) = query.categories {
        builder.push(" AND category IN (");
        let mut list = builder.separated(", ");
        categories.into_iter().for_each(|c| {
            list.push_bind(c);
        });
        list.push_unseparated(")");
    }
    if let Some(status) = query.status {
        builder.push(" AND status = ").push_bind(status);
    }
    builder.push(" ORDER BY created_at DESC, rowid DESC");
    trace!("🗃️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    trace!("🗃️ Result of search_orders: {} rows", orders.len());
    Ok(orders)
}

/// Patches the free-form fields of an open (pending or processing) order. Returns `None` if no open order matched.
pub(crate) async fn update_order(
    id: &OrderId,
    update: OrderUpdate,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new("UPDATE orders SET ");
    let mut set_clause = builder.separated(", ");
    if let Some(description) = update.description {
        set_clause.push("description = ").push_bind_unseparated(description);
    }
    if let Some(images) = update.images {
        set_clause.push("images = ").push_bind_unseparated(Json(images));
    }
    if let Some(scheduled_for) = update.scheduled_for {
        set_clause.push("scheduled_for = ").push_bind_unseparated(scheduled_for);
    }
    if let Some(address) = update.address {
        set_clause.push("address = ").push_bind_unseparated(address);
    }
    if let Some(longitude) = update.longitude {
        set_clause.push("longitude = ").push_bind_unseparated(longitude);
    }
    if let Some(latitude) = update.latitude {
        set_clause.push("latitude = ").push_bind_unseparated(latitude);
    }
    if let Some(price_range) = update.price_range {
        set_clause.push("price_range = ").push_bind_unseparated(price_range);
    }
    set_clause.push("updated_at = ").push_bind_unseparated(Utc::now());
    builder.push(" WHERE id = ").push_bind(id.clone());
    builder.push(" AND status IN ('pending', 'processing') RETURNING *");
    trace!("🗃️ Executing query: {}", builder.sql());
    builder.build_query_as::<Order>().fetch_optional(conn).await
}

/// Moves the order from `from` to `to`. Returns `None` if the order was not in the `from` status.
pub(crate) async fn transition_status(
    id: &OrderId,
    from: OrderStatus,
    to: OrderStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order: Option<Order> =
        sqlx::query_as("UPDATE orders SET status = $1, updated_at = $2 WHERE id = $3 AND status = $4 RETURNING *")
            .bind(to)
            .bind(Utc::now())
            .bind(id)
            .bind(from)
            .fetch_optional(conn)
            .await?;
    if order.is_some() {
        debug!("🗃️ Order {id} moved from {from} to {to}");
    }
    Ok(order)
}

/// Cancels the order unless it has been completed. Returns `None` if the order is missing or completed.
pub(crate) async fn cancel_order(id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as(
        "UPDATE orders SET status = 'cancelled', updated_at = $1 WHERE id = $2 AND status != 'completed' RETURNING *",
    )
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(conn)
    .await
}
