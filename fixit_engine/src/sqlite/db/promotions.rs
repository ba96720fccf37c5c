use std::collections::HashMap;

use chrono::Utc;
use log::debug;
use sqlx::{types::Json, SqliteConnection};

use crate::{
    db_types::{AppointmentId, NewPromotion, Promotion, PromotionId, PromotionUsage, UserId},
    traits::MarketError,
};

pub(crate) async fn insert_promotion(
    promotion: NewPromotion,
    conn: &mut SqliteConnection,
) -> Result<Promotion, MarketError> {
    let id = PromotionId::new_random();
    let now = Utc::now();
    let code = promotion.code.clone();
    let promotion: Promotion = sqlx::query_as(
        r#"
            INSERT INTO promotions (
                id,
                code,
                discount_kind,
                value,
                max_discount,
                min_order_value,
                start_date,
                end_date,
                category,
                target_clients,
                usage_limit,
                usage_per_user,
                usage_count,
                is_active,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 0, $13, $14, $14)
            RETURNING *;
        "#,
    )
    .bind(id)
    .bind(promotion.code)
    .bind(promotion.discount_kind)
    .bind(promotion.value)
    .bind(promotion.max_discount)
    .bind(promotion.min_order_value)
    .bind(promotion.start_date.unwrap_or(now))
    .bind(promotion.end_date)
    .bind(promotion.category)
    .bind(Json(promotion.target_clients))
    .bind(promotion.usage_limit)
    .bind(promotion.usage_per_user)
    .bind(promotion.is_active)
    .bind(now)
    .fetch_one(conn)
    .await
    .map_err(|e| MarketError::conflict_on_unique(e, format!("Promotion code {code} is already in use")))?;
    debug!("🗃️ Promotion {} ({}) created", promotion.code, promotion.id);
    Ok(promotion)
}

pub(crate) async fn fetch_by_code(code: &str, conn: &mut SqliteConnection) -> Result<Option<Promotion>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM promotions WHERE code = $1").bind(code).fetch_optional(conn).await
}

pub(crate) async fn fetch_all(active_only: bool, conn: &mut SqliteConnection) -> Result<Vec<Promotion>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM promotions WHERE ($1 = 0 OR is_active = 1) ORDER BY created_at DESC, rowid DESC")
        .bind(active_only)
        .fetch_all(conn)
        .await
}

/// Deletes the promotion's usage history and then the promotion itself. Returns `false` if there was no promotion.
pub(crate) async fn delete_promotion(id: &PromotionId, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    sqlx::query("DELETE FROM promotion_usages WHERE promotion_id = $1").bind(id).execute(&mut *conn).await?;
    let result = sqlx::query("DELETE FROM promotions WHERE id = $1").bind(id).execute(conn).await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn usage_counts(
    user_id: &UserId,
    conn: &mut SqliteConnection,
) -> Result<HashMap<PromotionId, i64>, sqlx::Error> {
    let rows: Vec<(PromotionId, i64)> =
        sqlx::query_as("SELECT promotion_id, COUNT(*) FROM promotion_usages WHERE user_id = $1 GROUP BY promotion_id")
            .bind(user_id)
            .fetch_all(conn)
            .await?;
    Ok(rows.into_iter().collect())
}

pub(crate) async fn usage_history(
    id: &PromotionId,
    conn: &mut SqliteConnection,
) -> Result<Vec<PromotionUsage>, sqlx::Error> {
    sqlx::query_as(
        "SELECT promotion_id, user_id, appointment_id, used_at FROM promotion_usages WHERE promotion_id = $1 ORDER BY \
         id",
    )
    .bind(id)
    .fetch_all(conn)
    .await
}

/// Bumps the global usage counter while it is below `usage_limit`. Returns `false` when the cap refused the write.
pub(crate) async fn bump_usage(id: &PromotionId, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE promotions SET usage_count = usage_count + 1, updated_at = $1
        WHERE id = $2 AND (usage_limit IS NULL OR usage_count < usage_limit)
        "#,
    )
    .bind(Utc::now())
    .bind(id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Appends a usage row while the user's count is below `usage_per_user`. Returns `false` when the cap refused it.
pub(crate) async fn insert_usage_if_allowed(
    id: &PromotionId,
    user_id: &UserId,
    appointment_id: Option<&AppointmentId>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO promotion_usages (promotion_id, user_id, appointment_id, used_at)
        SELECT p.id, $2, $3, $4 FROM promotions p
        WHERE p.id = $1
          AND (SELECT COUNT(*) FROM promotion_usages u WHERE u.promotion_id = $1 AND u.user_id = $2) < p.usage_per_user
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(appointment_id)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub(crate) async fn set_targets(
    id: &PromotionId,
    targets: Vec<UserId>,
    conn: &mut SqliteConnection,
) -> Result<Promotion, sqlx::Error> {
    sqlx::query_as("UPDATE promotions SET target_clients = $1, updated_at = $2 WHERE id = $3 RETURNING *")
        .bind(Json(targets))
        .bind(Utc::now())
        .bind(id)
        .fetch_one(conn)
        .await
}
