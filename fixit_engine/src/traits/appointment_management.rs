use crate::{
    db_types::{Appointment, AppointmentId, AppointmentUpdate, CompletionSettlement, NewAppointment},
    traits::{AppointmentQueryFilter, CompletedAppointment, MarketError},
};

/// Storage for appointments.
///
/// Completed and cancelled appointments are terminal. Every mutating method here must refuse to touch them, and must
/// do so in the same statement that performs the write, so that a concurrent completion or cancellation always wins
/// cleanly.
#[allow(async_fn_in_trait)]
pub trait AppointmentManagement: Clone {
    /// Stores a new appointment in `navigation` status. `final_amount` starts at `agreed_price + labor_cost`.
    async fn insert_appointment(&self, appointment: NewAppointment) -> Result<Appointment, MarketError>;

    async fn fetch_appointment(&self, id: &AppointmentId) -> Result<Option<Appointment>, MarketError>;

    /// Newest first.
    async fn search_appointments(&self, filter: AppointmentQueryFilter) -> Result<Vec<Appointment>, MarketError>;

    /// Applies the update and recomputes `final_amount` from the (possibly new) price fields and the stored discount.
    ///
    /// Fails with [`MarketError::NotFound`] or, for terminal appointments, [`MarketError::BusinessRule`].
    async fn update_appointment(
        &self,
        id: &AppointmentId,
        update: AppointmentUpdate,
    ) -> Result<Appointment, MarketError>;

    /// Closes out an appointment in a single atomic transaction:
    /// * status becomes `completed` and the payment method and settlement reference are stored,
    /// * the partner balance moves by [`CompletionSettlement::balance_change`]. A credit always applies; a debit only
    ///   applies if the balance covers it,
    /// * a ledger transaction of kind `appointment` is recorded, `success` if the balance moved and `failed` if it
    ///   could not,
    /// * the linked order becomes `completed`.
    async fn complete_appointment(
        &self,
        id: &AppointmentId,
        settlement: CompletionSettlement,
    ) -> Result<CompletedAppointment, MarketError>;

    /// Marks the appointment (and its order) cancelled, storing the reason.
    async fn cancel_appointment(&self, id: &AppointmentId, reason: &str) -> Result<Appointment, MarketError>;
}
