use chrono::Utc;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::db_types::UserId;

pub(crate) async fn register_token(user_id: &UserId, token: &str, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT OR IGNORE INTO device_tokens (user_id, token, created_at) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(token)
        .bind(Utc::now())
        .execute(conn)
        .await?;
    Ok(())
}

pub(crate) async fn tokens_for(user_ids: &[UserId], conn: &mut SqliteConnection) -> Result<Vec<String>, sqlx::Error> {
    if user_ids.is_empty() {
        return Ok(vec![]);
    }
    let mut builder = QueryBuilder::new("SELECT DISTINCT token FROM device_tokens WHERE user_id IN (");
    let mut list = builder.separated(", ");
    for id in user_ids {
        list.push_bind(id.clone());
    }
    list.push_unseparated(")");
    builder.build_query_scalar::<String>().fetch_all(conn).await
}
