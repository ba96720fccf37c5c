use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{
        NewPaidTransaction,
        NewTransaction,
        PaidTransaction,
        Transaction,
        TransactionId,
        TransactionKind,
        TransactionStatus,
        Vnd,
    },
    traits::{DescriptorMatch, MarketError, TransactionQueryFilter},
};

pub(crate) async fn insert_transaction(
    transaction: NewTransaction,
    conn: &mut SqliteConnection,
) -> Result<Transaction, MarketError> {
    let id = TransactionId::new_random();
    let now = Utc::now();
    let descriptor = transaction.descriptor.clone().unwrap_or_default();
    let transaction: Transaction = sqlx::query_as(
        r#"
            INSERT INTO transactions (
                id,
                user_id,
                kind,
                amount,
                status,
                descriptor,
                balance_after,
                appointment_id,
                payment_method,
                settlement_ref,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *;
        "#,
    )
    .bind(id)
    .bind(transaction.user_id)
    .bind(transaction.kind)
    .bind(transaction.amount)
    .bind(transaction.status)
    .bind(transaction.descriptor)
    .bind(transaction.balance_after)
    .bind(transaction.appointment_id)
    .bind(transaction.payment_method)
    .bind(transaction.settlement_ref)
    .bind(transaction.created_at)
    .bind(now)
    .fetch_one(conn)
    .await
    .map_err(|e| MarketError::conflict_on_unique(e, format!("A transaction with descriptor {descriptor} already exists")))?;
    debug!(
        "🗃️ Transaction {} ({}, {}) recorded for {} with status {}",
        transaction.id, transaction.kind, transaction.amount, transaction.user_id, transaction.status
    );
    Ok(transaction)
}

pub(crate) async fn insert_paid_transaction(
    payment: NewPaidTransaction,
    conn: &mut SqliteConnection,
) -> Result<PaidTransaction, MarketError> {
    let id = TransactionId::new_random();
    let descriptor = payment.descriptor.clone();
    let payment: PaidTransaction = sqlx::query_as(
        r#"
            INSERT INTO paid_transactions (
                id,
                client_id,
                partner_id,
                appointment_id,
                amount,
                descriptor,
                status,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7, $8)
            RETURNING *;
        "#,
    )
    .bind(id)
    .bind(payment.client_id)
    .bind(payment.partner_id)
    .bind(payment.appointment_id)
    .bind(payment.amount)
    .bind(payment.descriptor)
    .bind(payment.created_at)
    .bind(Utc::now())
    .fetch_one(conn)
    .await
    .map_err(|e| MarketError::conflict_on_unique(e, format!("A job payment with descriptor {descriptor} already exists")))?;
    debug!("🗃️ Job payment {} of {} created for appointment {}", payment.id, payment.amount, payment.appointment_id);
    Ok(payment)
}

/// Pushes the case-insensitive descriptor condition onto the query. Prefix matches use `substr` rather than `LIKE`
/// so that `_` in a descriptor is not treated as a wildcard.
fn push_descriptor_match<'a>(builder: &mut QueryBuilder<'a, sqlx::Sqlite>, descriptor: &DescriptorMatch) {
    match descriptor {
        DescriptorMatch::Exact(d) => {
            builder.push(" AND lower(descriptor) = lower(").push_bind(d.clone()).push(")");
        },
        DescriptorMatch::Prefix(p) => {
            builder
                .push(" AND substr(lower(descriptor), 1, ")
                .push_bind(p.chars().count() as i64)
                .push(") = lower(")
                .push_bind(p.clone())
                .push(")");
        },
    }
}

/// The most recent pending top-up whose descriptor matches.
pub(crate) async fn find_pending_top_up(
    descriptor: &DescriptorMatch,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM transactions WHERE status = 'pending' AND kind = ");
    builder.push_bind(TransactionKind::TopUp);
    push_descriptor_match(&mut builder, descriptor);
    builder.push(" ORDER BY created_at DESC, rowid DESC LIMIT 1");
    trace!("🗃️ Executing query: {}", builder.sql());
    builder.build_query_as::<Transaction>().fetch_optional(conn).await
}

/// The most recent pending job payment whose descriptor matches.
pub(crate) async fn find_pending_job_payment(
    descriptor: &DescriptorMatch,
    conn: &mut SqliteConnection,
) -> Result<Option<PaidTransaction>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM paid_transactions WHERE status = 'pending'");
    push_descriptor_match(&mut builder, descriptor);
    builder.push(" ORDER BY created_at DESC, rowid DESC LIMIT 1");
    trace!("🗃️ Executing query: {}", builder.sql());
    builder.build_query_as::<PaidTransaction>().fetch_optional(conn).await
}

/// Flips a pending transaction to `success`. Returns `true` only for the caller that won the swap.
pub(crate) async fn claim_transaction(id: &TransactionId, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE transactions SET status = $1, updated_at = $2 WHERE id = $3 AND status = $4")
        .bind(TransactionStatus::Success)
        .bind(Utc::now())
        .bind(id)
        .bind(TransactionStatus::Pending)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub(crate) async fn set_balance_after(
    id: &TransactionId,
    balance: Vnd,
    conn: &mut SqliteConnection,
) -> Result<Transaction, sqlx::Error> {
    sqlx::query_as("UPDATE transactions SET balance_after = $1, updated_at = $2 WHERE id = $3 RETURNING *")
        .bind(balance)
        .bind(Utc::now())
        .bind(id)
        .fetch_one(conn)
        .await
}

/// Flips a pending job payment to `success`. Returns `None` if it was no longer pending.
pub(crate) async fn claim_paid_transaction(
    id: &TransactionId,
    conn: &mut SqliteConnection,
) -> Result<Option<PaidTransaction>, sqlx::Error> {
    sqlx::query_as(
        "UPDATE paid_transactions SET status = 'success', updated_at = $1 WHERE id = $2 AND status = 'pending' \
         RETURNING *",
    )
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(conn)
    .await
}

pub(crate) async fn search_transactions(
    filter: TransactionQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<Transaction>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM transactions WHERE 1 = 1");
    if let Some(user_id) = filter.user_id {
        builder.push(" AND user_id = ").push_bind(user_id);
    }
    if let Some(kind) = filter.kind {
        builder.push(" AND kind = ").push_bind(kind);
    }
    if let Some(appointment_id) = filter.appointment_id {
        builder.push(" AND appointment_id = ").push_bind(appointment_id);
    }
    if let Some(since) = filter.since {
        builder.push(" AND created_at >= ").push_bind(since);
    }
    if let Some(until) = filter.until {
        builder.push(" AND created_at < ").push_bind(until);
    }
    builder.push(" ORDER BY created_at DESC, rowid DESC");
    trace!("🗃️ Executing query: {}", builder.sql());
    builder.build_query_as::<Transaction>().fetch_all(conn).await
}

/// Deletes pending top-up intents created before the cutoff. Returns the number of rows removed.
pub(crate) async fn delete_stale_top_ups(cutoff: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM transactions WHERE status = 'pending' AND kind = $1 AND created_at < $2")
        .bind(TransactionKind::TopUp)
        .bind(cutoff)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

/// Deletes pending job payments created before the cutoff. Returns the number of rows removed.
pub(crate) async fn delete_stale_job_payments(
    cutoff: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM paid_transactions WHERE status = 'pending' AND created_at < $1")
        .bind(cutoff)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}
