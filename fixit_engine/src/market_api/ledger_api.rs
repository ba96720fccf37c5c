use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;

use crate::{
    db_types::{
        AppointmentId,
        NewPaidTransaction,
        NewTransaction,
        PaidTransaction,
        PaymentMethod,
        Transaction,
        TransactionId,
        TransactionKind,
        UserId,
        Vnd,
    },
    events::{EventProducers, MarketEvent},
    helpers::{Descriptor, DescriptorKind},
    market_api::{
        AppointmentApi,
        CompletionRequest,
        GatewayConfig,
        PaymentIntent,
        ReconciliationFailure,
        TransactionPeriod,
        WebhookOutcome,
        WebhookPayload,
    },
    traits::{
        AppointmentManagement,
        CleanupResult,
        DescriptorMatch,
        LedgerManagement,
        MarketError,
        PromotionManagement,
        TopUpSettlement,
        TransactionQueryFilter,
    },
};

/// The largest difference between a job payment and its intent that is still accepted, to absorb rounding at the
/// gateway.
pub const JOB_PAYMENT_TOLERANCE: u64 = 1;

/// `LedgerApi` creates payment intents and reconciles the payment gateway's webhooks against them.
///
/// Reconciliation is driven by the descriptor the payer copies into the transfer memo. Every intent can be consumed at
/// most once, no matter how often the gateway delivers the same webhook.
pub struct LedgerApi<B> {
    db: B,
    appointments: AppointmentApi<B>,
    gateway: GatewayConfig,
    producers: EventProducers,
}

impl<B> Debug for LedgerApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LedgerApi ({:?})", self.gateway)
    }
}

impl<B: Clone> LedgerApi<B> {
    pub fn new(db: B, gateway: GatewayConfig, producers: EventProducers) -> Self {
        let appointments = AppointmentApi::new(db.clone(), producers.clone());
        Self { db, appointments, gateway, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn gateway(&self) -> &GatewayConfig {
        &self.gateway
    }
}

fn require_positive(amount: Vnd) -> Result<(), MarketError> {
    if amount.is_positive() {
        Ok(())
    } else {
        Err(MarketError::ValidationError(format!("The amount must be positive, not {amount}")))
    }
}

impl<B> LedgerApi<B>
where B: LedgerManagement + AppointmentManagement + PromotionManagement
{
    /// Records a pending top-up for the partner and returns the deep link they should pay through.
    pub async fn create_top_up_intent(&self, user_id: &UserId, amount: Vnd) -> Result<PaymentIntent, MarketError> {
        require_positive(amount)?;
        if !user_id.is_object_id() {
            return Err(MarketError::ValidationError(format!("{user_id} is not a valid user id")));
        }
        let now = Utc::now();
        let descriptor = Descriptor::for_top_up(user_id, now).to_string();
        let intent = NewTransaction::pending(user_id.clone(), TransactionKind::TopUp, amount)
            .with_descriptor(descriptor.as_str())
            .with_created_at(now);
        let transaction = self.db.insert_transaction(intent).await?;
        info!("💰️ Top-up intent {} for {amount} created for {user_id}", transaction.id);
        Ok(self.intent_for(transaction.id.clone(), amount, descriptor))
    }

    /// Records a withdrawal request. These are settled by hand, so there is no deep link.
    pub async fn create_withdraw_intent(&self, user_id: &UserId, amount: Vnd) -> Result<PaymentIntent, MarketError> {
        require_positive(amount)?;
        let intent = NewTransaction::pending(user_id.clone(), TransactionKind::Withdraw, amount);
        let transaction = self.db.insert_transaction(intent).await?;
        info!("💰️ Withdrawal request {} for {amount} created for {user_id}", transaction.id);
        Ok(PaymentIntent { transaction_id: transaction.id, descriptor: None, qr_url: None })
    }

    /// Records a pending job payment from the client and returns the deep link they should pay through.
    pub async fn create_job_payment_intent(
        &self,
        client_id: &UserId,
        partner_id: &UserId,
        appointment_id: &AppointmentId,
        amount: Vnd,
    ) -> Result<PaymentIntent, MarketError> {
        require_positive(amount)?;
        if !appointment_id.is_object_id() {
            return Err(MarketError::ValidationError(format!("{appointment_id} is not a valid appointment id")));
        }
        let appointment = self.appointments.get(appointment_id).await?;
        if appointment.status.is_terminal() {
            return Err(MarketError::BusinessRule(format!(
                "Appointment {appointment_id} is already {}",
                appointment.status
            )));
        }
        if appointment.partner_id != *partner_id || appointment.client_id != *client_id {
            return Err(MarketError::ValidationError(format!(
                "The client and partner do not match appointment {appointment_id}"
            )));
        }
        let now = Utc::now();
        let descriptor = Descriptor::for_job_payment(appointment_id, now).to_string();
        let intent = NewPaidTransaction {
            client_id: client_id.clone(),
            partner_id: partner_id.clone(),
            appointment_id: appointment_id.clone(),
            amount,
            descriptor: descriptor.clone(),
            created_at: now,
        };
        let payment = self.db.insert_paid_transaction(intent).await?;
        info!("💰️ Job payment intent {} for {amount} created for appointment {appointment_id}", payment.id);
        Ok(self.intent_for(payment.id, amount, descriptor))
    }

    fn intent_for(&self, transaction_id: TransactionId, amount: Vnd, descriptor: String) -> PaymentIntent {
        let qr_url = self.gateway.deep_link(amount, &descriptor).map(|u| u.to_string());
        if qr_url.is_none() {
            warn!("💰️ Could not build a payment link from {}. Check the gateway configuration.", self.gateway.qr_base_url);
        }
        PaymentIntent { transaction_id, descriptor: Some(descriptor), qr_url }
    }

    /// Reconciles a payment gateway notification against the pending intent it refers to.
    ///
    /// A notification that cannot be matched is not an error; the reason is reported in the outcome. Errors are
    /// reserved for backend failures, and since intents are consumed with a compare-and-swap, the gateway can safely
    /// retry after one.
    pub async fn handle_webhook(&self, payload: WebhookPayload) -> Result<WebhookOutcome, MarketError> {
        let memo = payload.memo().unwrap_or_default();
        let amount = payload.paid_amount();
        let outcome = match DescriptorKind::classify(memo) {
            Some(DescriptorKind::TopUp) => self.reconcile_top_up(memo, amount).await?,
            Some(DescriptorKind::JobPayment) => self.reconcile_job_payment(memo, amount).await?,
            None => WebhookOutcome::failed(ReconciliationFailure::UnknownTransactionType),
        };
        match outcome.reason {
            Some(reason) => info!("💰️ Webhook for {amount} ({memo}) was not reconciled: {reason}"),
            None => debug!("💰️ Webhook for {amount} ({memo}) reconciled"),
        }
        Ok(outcome)
    }

    async fn reconcile_top_up(&self, memo: &str, amount: Vnd) -> Result<WebhookOutcome, MarketError> {
        let Some(descriptor) = Descriptor::parse(DescriptorKind::TopUp, memo) else {
            return Ok(WebhookOutcome::failed(ReconciliationFailure::InvalidFormat));
        };
        let Some(intent) = self.db.find_pending_top_up(&DescriptorMatch::from(&descriptor)).await? else {
            return Ok(WebhookOutcome::failed(ReconciliationFailure::NotFound));
        };
        if intent.amount != amount {
            warn!("💰️ Top-up {} expected {} but {amount} was paid", intent.id, intent.amount);
            return Ok(WebhookOutcome::failed(ReconciliationFailure::AmountMismatch));
        }
        match self.db.settle_top_up(&intent).await? {
            TopUpSettlement::Settled { transaction, new_balance } => {
                info!("💰️ Top-up {} settled. {} now has {new_balance}", transaction.id, transaction.user_id);
                self.producers.publish(MarketEvent::TopUpSucceeded { transaction, new_balance }).await;
                Ok(WebhookOutcome::top_up(new_balance))
            },
            TopUpSettlement::AlreadyConsumed => Ok(WebhookOutcome::failed(ReconciliationFailure::NotFound)),
            TopUpSettlement::BalanceNotFound => {
                warn!("💰️ Top-up {} could not be credited: {} has no balance", intent.id, intent.user_id);
                Ok(WebhookOutcome::failed(ReconciliationFailure::UpdateBalanceFailed))
            },
        }
    }

    async fn reconcile_job_payment(&self, memo: &str, amount: Vnd) -> Result<WebhookOutcome, MarketError> {
        let Some(descriptor) = Descriptor::parse(DescriptorKind::JobPayment, memo) else {
            return Ok(WebhookOutcome::failed(ReconciliationFailure::InvalidFormat));
        };
        let Some(intent) = self.db.find_pending_job_payment(&DescriptorMatch::from(&descriptor)).await? else {
            return Ok(WebhookOutcome::failed(ReconciliationFailure::NotFound));
        };
        if self.db.fetch_appointment(&intent.appointment_id).await?.is_none() {
            return Ok(WebhookOutcome::failed(ReconciliationFailure::AppointmentNotFound));
        }
        if intent.amount.abs_diff(amount) > JOB_PAYMENT_TOLERANCE {
            warn!("💰️ Job payment {} expected {} but {amount} was paid", intent.id, intent.amount);
            return Ok(WebhookOutcome::failed(ReconciliationFailure::AmountMismatch));
        }
        let Some(payment) = self.db.claim_job_payment(&intent.id).await? else {
            return Ok(WebhookOutcome::failed(ReconciliationFailure::NotFound));
        };
        self.settle_job_payment(payment).await
    }

    async fn settle_job_payment(&self, payment: PaidTransaction) -> Result<WebhookOutcome, MarketError> {
        let request =
            CompletionRequest::new(PaymentMethod::Qr.to_string(), payment.partner_id.clone(), payment.amount);
        let settlement_ref = Some(payment.id.to_string());
        match self.appointments.update_to_complete(&payment.appointment_id, request, settlement_ref).await {
            Ok(completed) => {
                info!("💰️ Job payment {} settled appointment {}", payment.id, payment.appointment_id);
                let outcome = WebhookOutcome::job_payment(payment.appointment_id.clone(), payment.amount);
                let event = MarketEvent::JobPaymentSucceeded { payment, appointment: completed.appointment };
                self.producers.publish(event).await;
                Ok(outcome)
            },
            Err(e) => {
                error!(
                    "💰️ Job payment {} was received, but appointment {} could not be completed. This needs manual \
                     follow-up. {e}",
                    payment.id, payment.appointment_id
                );
                Ok(WebhookOutcome::failed(ReconciliationFailure::SettlementFailed))
            },
        }
    }

    /// Deletes pending top-ups and job payments older than `max_age_hours`. Safe to run as often as you like.
    pub async fn cleanup_expired_transactions(&self, max_age_hours: i64) -> Result<CleanupResult, MarketError> {
        let cutoff = Utc::now() - Duration::hours(max_age_hours);
        let result = self.db.delete_stale_intents(cutoff).await?;
        if result.total() > 0 {
            info!(
                "💰️ Removed {} stale transactions and {} stale job payments created before {cutoff}",
                result.transactions, result.paid_transactions
            );
        } else {
            trace!("💰️ No stale payment intents older than {cutoff}");
        }
        Ok(result)
    }

    /// The user's ledger entries, newest first.
    pub async fn transactions_for_user(
        &self,
        user_id: &UserId,
        period: TransactionPeriod,
    ) -> Result<Vec<Transaction>, MarketError> {
        let mut filter = TransactionQueryFilter::for_user(user_id.clone());
        if let Some(kind) = period.kind {
            filter = filter.with_kind(kind);
        }
        if let Some((since, until)) = period.window()? {
            filter = filter.within(since, until);
        }
        self.db.fetch_transactions(filter).await
    }

    pub async fn balance(&self, user_id: &UserId) -> Result<Vnd, MarketError> {
        self.db.fetch_balance(user_id).await?.ok_or_else(|| MarketError::NotFound(format!("Balance for {user_id}")))
    }
}
