use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Appointment, AppointmentId, OrderId, OrderStatus, Transaction, TransactionKind, UserId, Vnd},
    helpers::Descriptor,
};

/// How to find the pending intent that an inbound descriptor refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorMatch {
    /// The full descriptor, timestamp included. Matches at most one intent.
    Exact(String),
    /// Only the kind and reference were recovered. The most recent pending intent with this prefix wins.
    Prefix(String),
}

impl From<&Descriptor> for DescriptorMatch {
    fn from(descriptor: &Descriptor) -> Self {
        match descriptor.exact() {
            Some(exact) => Self::Exact(exact),
            None => Self::Prefix(descriptor.prefix()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OrderQueryFilter {
    pub client_id: Option<UserId>,
    pub categories: Option<Vec<String>>,
    pub status: Option<OrderStatus>,
}

impl OrderQueryFilter {
    pub fn with_client_id(mut self, client_id: UserId) -> Self {
        self.client_id = Some(client_id);
        self
    }

    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.categories = Some(categories);
        self
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppointmentQueryFilter {
    pub client_id: Option<UserId>,
    pub partner_id: Option<UserId>,
    pub order_id: Option<OrderId>,
}

impl AppointmentQueryFilter {
    pub fn for_client(client_id: UserId) -> Self {
        Self { client_id: Some(client_id), ..Default::default() }
    }

    pub fn for_partner(partner_id: UserId) -> Self {
        Self { partner_id: Some(partner_id), ..Default::default() }
    }

    pub fn for_order(order_id: OrderId) -> Self {
        Self { order_id: Some(order_id), ..Default::default() }
    }
}

/// Ledger search. Results are always newest first.
#[derive(Debug, Clone, Default)]
pub struct TransactionQueryFilter {
    pub user_id: Option<UserId>,
    pub kind: Option<TransactionKind>,
    pub appointment_id: Option<AppointmentId>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl TransactionQueryFilter {
    pub fn for_user(user_id: UserId) -> Self {
        Self { user_id: Some(user_id), ..Default::default() }
    }

    pub fn with_kind(mut self, kind: TransactionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_appointment_id(mut self, appointment_id: AppointmentId) -> Self {
        self.appointment_id = Some(appointment_id);
        self
    }

    /// Restrict to `[since, until)`
    pub fn within(mut self, since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self.until = Some(until);
        self
    }
}

/// The result of trying to consume a pending top-up intent.
#[derive(Debug, Clone)]
pub enum TopUpSettlement {
    /// The intent was consumed and the balance credited.
    Settled { transaction: Transaction, new_balance: Vnd },
    /// Someone else consumed the intent first. Nothing was changed.
    AlreadyConsumed,
    /// There is no balance record for the user. Nothing was changed, and the intent is still pending.
    BalanceNotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedAppointment {
    pub appointment: Appointment,
    /// The ledger record for the balance movement. `None` when the payment method was not recognised.
    pub transaction: Option<Transaction>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResult {
    pub transactions: u64,
    pub paid_transactions: u64,
}

impl CleanupResult {
    pub fn total(&self) -> u64 {
        self.transactions + self.paid_transactions
    }
}
