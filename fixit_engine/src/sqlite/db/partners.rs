use chrono::Utc;
use log::debug;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::db_types::{NewPartnerProfile, PartnerProfile, ServiceCategory, UserId, Vnd};

pub(crate) async fn fetch_profile(
    user_id: &UserId,
    conn: &mut SqliteConnection,
) -> Result<Option<PartnerProfile>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM partner_profiles WHERE user_id = $1").bind(user_id).fetch_optional(conn).await
}

pub(crate) async fn fetch_balance(user_id: &UserId, conn: &mut SqliteConnection) -> Result<Option<Vnd>, sqlx::Error> {
    sqlx::query_scalar("SELECT balance FROM partner_profiles WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(conn)
        .await
}

/// Adds `amount` to the balance. Returns the new balance, or `None` if the partner has no profile.
pub(crate) async fn credit_balance(
    user_id: &UserId,
    amount: Vnd,
    conn: &mut SqliteConnection,
) -> Result<Option<Vnd>, sqlx::Error> {
    let balance: Option<Vnd> = sqlx::query_scalar(
        "UPDATE partner_profiles SET balance = balance + $1, updated_at = $2 WHERE user_id = $3 RETURNING balance",
    )
    .bind(amount)
    .bind(Utc::now())
    .bind(user_id)
    .fetch_optional(conn)
    .await?;
    if let Some(b) = balance {
        debug!("🗃️ Credited {amount} to {user_id}. New balance: {b}");
    }
    Ok(balance)
}

/// Subtracts `amount` from the balance, but only if the balance covers it. Returns the new balance, or `None` if the
/// partner has no profile or too little money.
pub(crate) async fn debit_balance(
    user_id: &UserId,
    amount: Vnd,
    conn: &mut SqliteConnection,
) -> Result<Option<Vnd>, sqlx::Error> {
    let balance: Option<Vnd> = sqlx::query_scalar(
        r#"
        UPDATE partner_profiles SET balance = balance - $1, updated_at = $2
        WHERE user_id = $3 AND balance >= $1
        RETURNING balance
        "#,
    )
    .bind(amount)
    .bind(Utc::now())
    .bind(user_id)
    .fetch_optional(conn)
    .await?;
    if let Some(b) = balance {
        debug!("🗃️ Debited {amount} from {user_id}. New balance: {b}");
    }
    Ok(balance)
}

/// Partners approved for the category who are online and not locked.
pub(crate) async fn eligible_partners(category: &str, conn: &mut SqliteConnection) -> Result<Vec<UserId>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT p.user_id FROM partner_profiles p
        JOIN partner_categories c ON c.user_id = p.user_id
        WHERE c.category = $1 AND c.approved = 1 AND p.is_online = 1 AND p.is_locked = 0
        ORDER BY p.user_id
        "#,
    )
    .bind(category)
    .fetch_all(conn)
    .await
}

pub(crate) async fn categories(
    user_id: &UserId,
    conn: &mut SqliteConnection,
) -> Result<Vec<ServiceCategory>, sqlx::Error> {
    sqlx::query_as("SELECT category, approved FROM partner_categories WHERE user_id = $1 ORDER BY category")
        .bind(user_id)
        .fetch_all(conn)
        .await
}

/// Creates or refreshes the profile row. The balance of an existing row is untouched.
pub(crate) async fn upsert_profile(
    profile: &NewPartnerProfile,
    conn: &mut SqliteConnection,
) -> Result<PartnerProfile, sqlx::Error> {
    let now = Utc::now();
    let last_online = if profile.is_online { Some(now) } else { None };
    sqlx::query_as(
        r#"
        INSERT INTO partner_profiles (user_id, display_name, balance, is_online, is_locked, last_online_at, created_at, updated_at)
        VALUES ($1, $2, 0, $3, $4, $5, $6, $6)
        ON CONFLICT (user_id) DO UPDATE SET
            display_name = excluded.display_name,
            is_online = excluded.is_online,
            is_locked = excluded.is_locked,
            last_online_at = COALESCE(excluded.last_online_at, last_online_at),
            updated_at = excluded.updated_at
        RETURNING *;
        "#,
    )
    .bind(&profile.user_id)
    .bind(&profile.display_name)
    .bind(profile.is_online)
    .bind(profile.is_locked)
    .bind(last_online)
    .bind(now)
    .fetch_one(conn)
    .await
}

/// Replaces the partner's category list.
pub(crate) async fn replace_categories(
    user_id: &UserId,
    categories: &[ServiceCategory],
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM partner_categories WHERE user_id = $1").bind(user_id).execute(&mut *conn).await?;
    if categories.is_empty() {
        return Ok(());
    }
    let mut builder = QueryBuilder::new("INSERT INTO partner_categories (user_id, category, approved) ");
    builder.push_values(categories, |mut row, c| {
        row.push_bind(user_id.clone()).push_bind(c.category.clone()).push_bind(c.approved);
    });
    builder.build().execute(conn).await?;
    Ok(())
}

pub(crate) async fn set_online(
    user_id: &UserId,
    online: bool,
    conn: &mut SqliteConnection,
) -> Result<Option<PartnerProfile>, sqlx::Error> {
    let now = Utc::now();
    sqlx::query_as(
        r#"
        UPDATE partner_profiles SET
            is_online = $1,
            last_online_at = CASE WHEN $1 THEN $2 ELSE last_online_at END,
            updated_at = $2
        WHERE user_id = $3
        RETURNING *;
        "#,
    )
    .bind(online)
    .bind(now)
    .bind(user_id)
    .fetch_optional(conn)
    .await
}
