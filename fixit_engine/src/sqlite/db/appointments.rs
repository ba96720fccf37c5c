use chrono::Utc;
use log::{debug, trace};
use sqlx::{types::Json, QueryBuilder, SqliteConnection};

use crate::{
    db_types::{Appointment, AppointmentId, AppointmentUpdate, NewAppointment, PaymentMethod, Vnd},
    traits::{AppointmentQueryFilter, MarketError},
};

pub(crate) async fn insert_appointment(
    appointment: NewAppointment,
    conn: &mut SqliteConnection,
) -> Result<Appointment, MarketError> {
    let id = AppointmentId::new_random();
    let agreed_price = appointment.agreed_price.unwrap_or_default();
    let labor_cost = appointment.labor_cost.unwrap_or_default();
    let final_amount = (agreed_price + labor_cost).non_negative();
    let appointment: Appointment = sqlx::query_as(
        r#"
            INSERT INTO appointments (
                id,
                order_id,
                client_id,
                partner_id,
                room_id,
                status,
                agreed_price,
                labor_cost,
                final_amount,
                note,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, 'navigation', $6, $7, $8, $9, $10, $10)
            RETURNING *;
        "#,
    )
    .bind(id)
    .bind(appointment.order_id)
    .bind(appointment.client_id)
    .bind(appointment.partner_id)
    .bind(appointment.room_id)
    .bind(agreed_price)
    .bind(labor_cost)
    .bind(final_amount)
    .bind(appointment.note)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    debug!(
        "🗃️ Appointment {} created for order {} (partner {})",
        appointment.id, appointment.order_id, appointment.partner_id
    );
    Ok(appointment)
}

pub(crate) async fn fetch_appointment(
    id: &AppointmentId,
    conn: &mut SqliteConnection,
) -> Result<Option<Appointment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM appointments WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub(crate) async fn search_appointments(
    filter: AppointmentQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<Appointment>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM appointments WHERE 1 = 1");
    if let Some(client_id) = filter.client_id {
        builder.push(" AND client_id = ").push_bind(client_id);
    }
    if let Some(partner_id) = filter.partner_id {
        builder.push(" AND partner_id = ").push_bind(partner_id);
    }
    if let Some(order_id) = filter.order_id {
        builder.push(" AND order_id = ").push_bind(order_id);
    }
    builder.push(" ORDER BY created_at DESC, rowid DESC");
    trace!("🗃️ Executing query: {}", builder.sql());
    builder.build_query_as::<Appointment>().fetch_all(conn).await
}

/// Applies the update to a non-terminal appointment, recomputing `final_amount` in the same statement.
/// Returns `None` if no such appointment exists or it is already completed or cancelled.
pub(crate) async fn update_appointment(
    id: &AppointmentId,
    update: AppointmentUpdate,
    conn: &mut SqliteConnection,
) -> Result<Option<Appointment>, sqlx::Error> {
    let mut builder = QueryBuilder::new("UPDATE appointments SET ");
    let mut set_clause = builder.separated(", ");
    if let Some(status) = update.status {
        set_clause.push("status = ").push_bind_unseparated(status);
    }
    if let Some(agreed_price) = update.agreed_price {
        set_clause.push("agreed_price = ").push_bind_unseparated(agreed_price);
    }
    if let Some(labor_cost) = update.labor_cost {
        set_clause.push("labor_cost = ").push_bind_unseparated(labor_cost);
    }
    if let Some(method) = update.payment_method {
        set_clause.push("payment_method = ").push_bind_unseparated(method);
    }
    if let Some(before_work) = update.before_work {
        set_clause.push("before_work = ").push_bind_unseparated(Json(before_work));
    }
    if let Some(after_work) = update.after_work {
        set_clause.push("after_work = ").push_bind_unseparated(Json(after_work));
    }
    if let Some(issues) = update.additional_issues {
        set_clause.push("additional_issues = ").push_bind_unseparated(Json(issues));
    }
    if let Some(approved) = update.additional_issues_approved {
        set_clause.push("additional_issues_approved = ").push_bind_unseparated(approved);
    }
    if let Some(note) = update.note {
        set_clause.push("note = ").push_bind_unseparated(note);
    }
    // SQLite evaluates every SET expression against the pre-update row, so the new prices are bound again here
    set_clause
        .push("final_amount = MAX(COALESCE(")
        .push_bind_unseparated(update.agreed_price)
        .push_unseparated(", agreed_price) + COALESCE(")
        .push_bind_unseparated(update.labor_cost)
        .push_unseparated(", labor_cost) - promotion_discount, 0)");
    set_clause.push("updated_at = ").push_bind_unseparated(Utc::now());
    builder.push(" WHERE id = ").push_bind(id.clone());
    builder.push(" AND status NOT IN ('completed', 'cancelled') RETURNING *");
    trace!("🗃️ Executing query: {}", builder.sql());
    builder.build_query_as::<Appointment>().fetch_optional(conn).await
}

/// Moves a non-terminal appointment to `completed`. Returns `None` if the appointment is missing or terminal.
pub(crate) async fn mark_completed(
    id: &AppointmentId,
    method: Option<PaymentMethod>,
    settlement_ref: Option<String>,
    conn: &mut SqliteConnection,
) -> Result<Option<Appointment>, sqlx::Error> {
    sqlx::query_as(
        r#"
        UPDATE appointments SET
            status = 'completed',
            payment_method = COALESCE($1, payment_method),
            settlement_ref = COALESCE($2, settlement_ref),
            updated_at = $3
        WHERE id = $4 AND status NOT IN ('completed', 'cancelled')
        RETURNING *;
        "#,
    )
    .bind(method)
    .bind(settlement_ref)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(conn)
    .await
}

/// Moves a non-terminal appointment to `cancelled`. Returns `None` if the appointment is missing or terminal.
pub(crate) async fn mark_cancelled(
    id: &AppointmentId,
    reason: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Appointment>, sqlx::Error> {
    sqlx::query_as(
        r#"
        UPDATE appointments SET status = 'cancelled', cancel_reason = $1, updated_at = $2
        WHERE id = $3 AND status NOT IN ('completed', 'cancelled')
        RETURNING *;
        "#,
    )
    .bind(reason)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(conn)
    .await
}

/// Stores the promotion code and discount on a non-terminal appointment and recomputes `final_amount`.
pub(crate) async fn apply_discount(
    id: &AppointmentId,
    code: &str,
    discount: Vnd,
    conn: &mut SqliteConnection,
) -> Result<Option<Appointment>, sqlx::Error> {
    sqlx::query_as(
        r#"
        UPDATE appointments SET
            promotion_code = $1,
            promotion_discount = $2,
            final_amount = MAX(agreed_price + labor_cost - $2, 0),
            updated_at = $3
        WHERE id = $4 AND status NOT IN ('completed', 'cancelled')
        RETURNING *;
        "#,
    )
    .bind(code)
    .bind(discount)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(conn)
    .await
}
