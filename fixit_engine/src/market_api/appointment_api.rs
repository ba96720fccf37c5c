use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{
        Actor,
        Appointment,
        AppointmentId,
        AppointmentStatus,
        CompletionSettlement,
        NewAppointment,
        OrderId,
        PaymentMethod,
        UserId,
    },
    events::{EventProducers, MarketEvent},
    market_api::{AppointmentPartition, AppointmentPatch, CompletionRequest, PromotionApi},
    traits::{AppointmentManagement, AppointmentQueryFilter, CompletedAppointment, MarketError, PromotionManagement},
};

/// `AppointmentApi` tracks a won job from the partner setting off, through the work itself, to payment.
///
/// Completion and cancellation have their own entry points; the generic [`Self::update`] path can only move an
/// appointment forward through the working states.
pub struct AppointmentApi<B> {
    db: B,
    promotions: PromotionApi<B>,
    producers: EventProducers,
}

impl<B> Debug for AppointmentApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AppointmentApi")
    }
}

impl<B: Clone> Clone for AppointmentApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), promotions: self.promotions.clone(), producers: self.producers.clone() }
    }
}

impl<B: Clone> AppointmentApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        let promotions = PromotionApi::new(db.clone());
        Self { db, promotions, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}

/// Status changes allowed on the generic update path: forwards (or staying put) through the working states.
fn check_status_change(current: AppointmentStatus, next: AppointmentStatus) -> Result<(), MarketError> {
    if next.is_terminal() {
        return Err(MarketError::BusinessRule(format!(
            "An appointment cannot be set to {next} through an update. Use the dedicated endpoint instead."
        )));
    }
    if next < current {
        return Err(MarketError::BusinessRule(format!("An appointment cannot move back from {current} to {next}")));
    }
    Ok(())
}

impl<B> AppointmentApi<B>
where B: AppointmentManagement + PromotionManagement
{
    /// Creates the appointment in `navigation` status and lets the partner know.
    pub async fn create(&self, appointment: NewAppointment) -> Result<Appointment, MarketError> {
        let appointment = self.db.insert_appointment(appointment).await?;
        info!("🛠️ Appointment {} created for order {}", appointment.id, appointment.order_id);
        self.producers.publish(MarketEvent::AppointmentCreated { appointment: appointment.clone() }).await;
        Ok(appointment)
    }

    pub async fn get(&self, id: &AppointmentId) -> Result<Appointment, MarketError> {
        self.db.fetch_appointment(id).await?.ok_or_else(|| MarketError::NotFound(format!("Appointment {id}")))
    }

    pub async fn all(&self) -> Result<Vec<Appointment>, MarketError> {
        self.db.search_appointments(AppointmentQueryFilter::default()).await
    }

    pub async fn by_partner(&self, partner_id: &UserId) -> Result<AppointmentPartition, MarketError> {
        let appointments = self.db.search_appointments(AppointmentQueryFilter::for_partner(partner_id.clone())).await?;
        Ok(AppointmentPartition::from(appointments))
    }

    pub async fn by_client(&self, client_id: &UserId) -> Result<AppointmentPartition, MarketError> {
        let appointments = self.db.search_appointments(AppointmentQueryFilter::for_client(client_id.clone())).await?;
        Ok(AppointmentPartition::from(appointments))
    }

    pub async fn by_order(&self, order_id: &OrderId) -> Result<Vec<Appointment>, MarketError> {
        self.db.search_appointments(AppointmentQueryFilter::for_order(order_id.clone())).await
    }

    /// Applies a generic update made by `actor`, and tells the other side about it.
    ///
    /// If the patch carries a promotion code, it is redeemed for the client after the fields are written. A promotion
    /// that cannot be applied is logged and otherwise ignored; the field update stands.
    pub async fn update(
        &self,
        id: &AppointmentId,
        patch: AppointmentPatch,
        actor: Actor,
    ) -> Result<Appointment, MarketError> {
        let current = self.get(id).await?;
        if current.status.is_terminal() {
            return Err(MarketError::BusinessRule(format!("Appointment {id} is already {}", current.status)));
        }
        if let Some(next) = patch.fields.status {
            check_status_change(current.status, next)?;
        }
        let mut appointment =
            if patch.fields.is_empty() { current } else { self.db.update_appointment(id, patch.fields).await? };
        if let Some(code) = patch.promotion_code.filter(|c| !c.trim().is_empty()) {
            match self.promotions.apply(id, code.trim(), &appointment.client_id).await {
                Ok(applied) => appointment = applied.appointment,
                Err(e) => warn!("🛠️ Could not apply promotion {code} to appointment {id}. {e}"),
            }
        }
        let recipient = match actor {
            Actor::Partner => appointment.client_id.clone(),
            Actor::Client => appointment.partner_id.clone(),
        };
        debug!("🛠️ Appointment {id} updated by the {actor:?}. Status is {}", appointment.status);
        let event = MarketEvent::AppointmentStatusChanged { recipient, appointment: appointment.clone() };
        self.producers.publish(event).await;
        Ok(appointment)
    }

    /// Marks the appointment completed and settles the partner balance.
    ///
    /// A request without a partner id or a (non-zero) amount is ignored: the appointment comes back unchanged. An
    /// unrecognised payment method still completes the appointment, but moves no money.
    pub async fn update_to_complete(
        &self,
        id: &AppointmentId,
        request: CompletionRequest,
        settlement_ref: Option<String>,
    ) -> Result<CompletedAppointment, MarketError> {
        let appointment = self.get(id).await?;
        let (partner_id, amount) = match (request.partner_id, request.amount) {
            (Some(p), Some(a)) if a.value() != 0 => (p, a),
            _ => {
                warn!("🛠️ Completion request for appointment {id} is missing the partner or the amount. Ignoring it.");
                return Ok(CompletedAppointment { appointment, transaction: None });
            },
        };
        if partner_id != appointment.partner_id {
            return Err(MarketError::ValidationError(format!(
                "Partner {partner_id} is not the partner on appointment {id}"
            )));
        }
        if appointment.status.is_terminal() {
            return Err(MarketError::BusinessRule(format!("Appointment {id} is already {}", appointment.status)));
        }
        if amount.value() < 0 {
            return Err(MarketError::ValidationError("The amount cannot be negative".into()));
        }
        let payment_method = match request.payment_method.as_deref().map(str::parse::<PaymentMethod>) {
            Some(Ok(method)) => Some(method),
            Some(Err(e)) => {
                warn!("🛠️ {e}. Appointment {id} will complete without a balance change.");
                None
            },
            None => {
                warn!("🛠️ No payment method given for appointment {id}. It will complete without a balance change.");
                None
            },
        };
        let settlement = CompletionSettlement { partner_id, amount, payment_method, settlement_ref };
        let completed = self.db.complete_appointment(id, settlement).await?;
        info!(
            "🛠️ Appointment {id} completed. {amount} paid by {}",
            payment_method.map(|m| m.to_string()).unwrap_or_else(|| "an unknown method".into())
        );
        let event = MarketEvent::AppointmentCompleted {
            appointment: completed.appointment.clone(),
            transaction: completed.transaction.clone(),
        };
        self.producers.publish(event).await;
        Ok(completed)
    }

    pub async fn update_to_cancel(&self, id: &AppointmentId, reason: &str) -> Result<Appointment, MarketError> {
        let appointment = self.db.cancel_appointment(id, reason).await?;
        info!("🛠️ Appointment {id} cancelled. Reason: {reason}");
        self.producers.publish(MarketEvent::AppointmentCancelled { appointment: appointment.clone() }).await;
        Ok(appointment)
    }
}
