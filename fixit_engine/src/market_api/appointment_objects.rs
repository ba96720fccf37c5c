use serde::{Deserialize, Serialize};

use crate::db_types::{Appointment, AppointmentUpdate, UserId, Vnd};

/// A generic appointment update, optionally redeeming a promotion code at the same time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentPatch {
    #[serde(flatten)]
    pub fields: AppointmentUpdate,
    #[serde(default)]
    pub promotion_code: Option<String>,
}

impl AppointmentPatch {
    pub fn new(fields: AppointmentUpdate) -> Self {
        Self { fields, promotion_code: None }
    }

    pub fn with_promotion_code<S: Into<String>>(mut self, code: S) -> Self {
        self.promotion_code = Some(code.into());
        self
    }
}

/// The body of a completion request. Every field is optional on the wire, because the completion path tolerates
/// incomplete requests by doing nothing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub partner_id: Option<UserId>,
    #[serde(default)]
    pub amount: Option<Vnd>,
}

impl CompletionRequest {
    pub fn new<S: Into<String>>(payment_method: S, partner_id: UserId, amount: Vnd) -> Self {
        Self { payment_method: Some(payment_method.into()), partner_id: Some(partner_id), amount: Some(amount) }
    }
}

/// A user's appointments, split on status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentPartition {
    /// `navigation` up to and including `payment`
    pub in_progress: Vec<Appointment>,
    /// `completed` and `cancelled`
    pub history: Vec<Appointment>,
}

impl From<Vec<Appointment>> for AppointmentPartition {
    fn from(appointments: Vec<Appointment>) -> Self {
        let (in_progress, history) = appointments.into_iter().partition(|a| a.status.is_in_progress());
        Self { in_progress, history }
    }
}
