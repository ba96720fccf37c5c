use serde::Serialize;
use serde_json::{json, Value};

use crate::db_types::{Applicant, Appointment, Order, PaidTransaction, Transaction, UserId, Vnd};

/// A push notification to send alongside a real-time event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
}

impl PushMessage {
    pub fn new<S: Into<String>>(title: S, body: S) -> Self {
        Self { title: title.into(), body: body.into() }
    }
}

/// Every state change that other parties get to hear about.
///
/// Events are only published after the write that caused them has been committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketEvent {
    /// A new order, with the partners who can take it.
    OrderCreated { order: Order, eligible_partners: Vec<UserId> },
    /// A partner bid on the client's order.
    BidAdded { order: Order, applicant: Applicant },
    /// The client chose a partner.
    ApplicantSelected { order: Order, applicant: Applicant },
    AppointmentCreated { appointment: Appointment },
    /// One side of the appointment changed it. `recipient` is the other side.
    AppointmentStatusChanged { recipient: UserId, appointment: Appointment },
    AppointmentCompleted { appointment: Appointment, transaction: Option<Transaction> },
    AppointmentCancelled { appointment: Appointment },
    TopUpSucceeded { transaction: Transaction, new_balance: Vnd },
    JobPaymentSucceeded { payment: PaidTransaction, appointment: Appointment },
}

impl MarketEvent {
    /// The real-time topic name for the event.
    pub fn topic(&self) -> &'static str {
        match self {
            Self::OrderCreated { .. } => "order-created",
            Self::BidAdded { .. } => "order-bid-added",
            Self::ApplicantSelected { .. } => "order-applicant-selected",
            Self::AppointmentCreated { .. } => "appointment-created",
            Self::AppointmentStatusChanged { .. } => "appointment-status-changed",
            Self::AppointmentCompleted { .. } => "appointment-completed",
            Self::AppointmentCancelled { .. } => "appointment-cancelled",
            Self::TopUpSucceeded { .. } => "topup-succeeded",
            Self::JobPaymentSucceeded { .. } => "job-payment-succeeded",
        }
    }

    /// The users the event is addressed to.
    pub fn recipients(&self) -> Vec<UserId> {
        match self {
            Self::OrderCreated { eligible_partners, .. } => eligible_partners.clone(),
            Self::BidAdded { order, .. } => vec![order.client_id.clone()],
            Self::ApplicantSelected { applicant, .. } => vec![applicant.partner_id.clone()],
            Self::AppointmentCreated { appointment } => vec![appointment.partner_id.clone()],
            Self::AppointmentStatusChanged { recipient, .. } => vec![recipient.clone()],
            Self::AppointmentCompleted { appointment, .. } => {
                vec![appointment.client_id.clone(), appointment.partner_id.clone()]
            },
            Self::AppointmentCancelled { appointment } => vec![appointment.client_id.clone()],
            Self::TopUpSucceeded { transaction, .. } => vec![transaction.user_id.clone()],
            Self::JobPaymentSucceeded { payment, .. } => vec![payment.client_id.clone(), payment.partner_id.clone()],
        }
    }

    /// The JSON body that goes out on the real-time channel.
    pub fn payload(&self) -> Value {
        let recipients = self.recipients();
        match self {
            Self::OrderCreated { order, .. } => json!({ "order": order, "recipients": recipients }),
            Self::BidAdded { order, applicant } | Self::ApplicantSelected { order, applicant } => {
                json!({ "order": order, "applicant": applicant, "recipients": recipients })
            },
            Self::AppointmentCreated { appointment } |
            Self::AppointmentStatusChanged { appointment, .. } |
            Self::AppointmentCancelled { appointment } => {
                json!({ "appointment": appointment, "recipients": recipients })
            },
            Self::AppointmentCompleted { appointment, transaction } => {
                json!({ "appointment": appointment, "transaction": transaction, "recipients": recipients })
            },
            Self::TopUpSucceeded { transaction, new_balance } => {
                json!({ "transaction": transaction, "newBalance": new_balance, "recipients": recipients })
            },
            Self::JobPaymentSucceeded { payment, appointment } => {
                json!({ "payment": payment, "appointment": appointment, "recipients": recipients })
            },
        }
    }

    /// The push notification for the event, if it warrants one.
    pub fn push_message(&self) -> Option<PushMessage> {
        match self {
            Self::OrderCreated { order, .. } => Some(PushMessage::new(
                "New order".to_string(),
                format!("There is a new {} request. Check it out now!", category_display_name(&order.category)),
            )),
            Self::ApplicantSelected { order, .. } => Some(PushMessage::new(
                "You have been selected".to_string(),
                format!("The client picked you for \"{}\".", order.service),
            )),
            Self::AppointmentStatusChanged { recipient, appointment } => {
                let message = if *recipient == appointment.partner_id {
                    PushMessage::new("The client updated the job status", "Please take a look!")
                } else {
                    PushMessage::new("Your technician updated the job status", "Please take a look!")
                };
                Some(message)
            },
            Self::TopUpSucceeded { transaction, new_balance } => Some(PushMessage::new(
                "Top-up successful".to_string(),
                format!("{} was added to your balance. New balance: {new_balance}", transaction.amount),
            )),
            _ => None,
        }
    }
}

/// Human-readable name for a service category key. Unknown keys are shown as-is.
pub fn category_display_name(category: &str) -> &str {
    match category {
        "electricity" => "Electrical",
        "water" => "Plumbing",
        "locksmith" => "Locksmith",
        "air_conditioning" => "Air conditioning",
        other => other,
    }
}
