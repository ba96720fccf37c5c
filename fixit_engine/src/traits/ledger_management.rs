use chrono::{DateTime, Utc};

use crate::{
    db_types::{NewPaidTransaction, NewTransaction, PaidTransaction, Transaction, TransactionId, UserId, Vnd},
    traits::{CleanupResult, DescriptorMatch, MarketError, TopUpSettlement, TransactionQueryFilter},
};

/// Storage for the ledger, and the only place partner balances change.
///
/// Consumption of a pending intent is single-use: implementations must flip `pending` to `success` with a
/// compare-and-swap, and only move money if they won the swap.
#[allow(async_fn_in_trait)]
pub trait LedgerManagement: Clone {
    /// Returns [`MarketError::Conflict`] if an intent with the same descriptor already exists.
    async fn insert_transaction(&self, transaction: NewTransaction) -> Result<Transaction, MarketError>;

    /// Returns [`MarketError::Conflict`] if a job payment with the same descriptor already exists.
    async fn insert_paid_transaction(&self, payment: NewPaidTransaction) -> Result<PaidTransaction, MarketError>;

    /// The pending top-up intent that a webhook descriptor refers to. Prefix matches return the most recent one.
    async fn find_pending_top_up(&self, descriptor: &DescriptorMatch) -> Result<Option<Transaction>, MarketError>;

    /// The pending job payment that a webhook descriptor refers to. Prefix matches return the most recent one.
    async fn find_pending_job_payment(
        &self,
        descriptor: &DescriptorMatch,
    ) -> Result<Option<PaidTransaction>, MarketError>;

    /// Consumes a pending top-up: marks it `success`, credits its amount to the owner's balance and records the new
    /// balance on the transaction. All of it happens atomically, or not at all.
    async fn settle_top_up(&self, transaction: &Transaction) -> Result<TopUpSettlement, MarketError>;

    /// Marks a pending job payment `success`. Returns `None` if it was no longer pending.
    async fn claim_job_payment(&self, id: &TransactionId) -> Result<Option<PaidTransaction>, MarketError>;

    async fn fetch_transactions(&self, filter: TransactionQueryFilter) -> Result<Vec<Transaction>, MarketError>;

    /// Deletes pending top-up intents and pending job payments created before `cutoff`.
    /// Withdrawal requests wait for manual settlement and are never deleted here.
    async fn delete_stale_intents(&self, cutoff: DateTime<Utc>) -> Result<CleanupResult, MarketError>;

    /// The partner's current balance, if they have a profile.
    async fn fetch_balance(&self, user_id: &UserId) -> Result<Option<Vnd>, MarketError>;
}
