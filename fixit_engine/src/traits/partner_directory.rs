use crate::{
    db_types::{NewPartnerProfile, PartnerProfile, ServiceCategory, UserId},
    traits::MarketError,
};

/// Partner lookup. Profiles hold the partner balance, but balances are only ever changed through
/// [`crate::traits::LedgerManagement`] and [`crate::traits::AppointmentManagement`].
#[allow(async_fn_in_trait)]
pub trait PartnerDirectory: Clone {
    /// Partners approved for the category who are online and not locked.
    async fn eligible_partners(&self, category: &str) -> Result<Vec<UserId>, MarketError>;

    async fn fetch_partner_profile(&self, user_id: &UserId) -> Result<Option<PartnerProfile>, MarketError>;

    async fn partner_categories(&self, user_id: &UserId) -> Result<Vec<ServiceCategory>, MarketError>;

    /// Creates the profile (with a zero balance) or refreshes its name, flags and categories. The balance of an
    /// existing profile is left alone.
    async fn upsert_partner_profile(&self, profile: NewPartnerProfile) -> Result<PartnerProfile, MarketError>;

    async fn set_partner_online(&self, user_id: &UserId, online: bool) -> Result<Option<PartnerProfile>, MarketError>;
}
