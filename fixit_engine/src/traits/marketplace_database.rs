use crate::traits::{
    AppointmentManagement,
    LedgerManagement,
    MarketError,
    OrderManagement,
    PartnerDirectory,
    PromotionManagement,
    RatingManagement,
};

/// A complete marketplace backend.
#[allow(async_fn_in_trait)]
pub trait MarketplaceDatabase:
    Clone
    + OrderManagement
    + AppointmentManagement
    + LedgerManagement
    + PromotionManagement
    + RatingManagement
    + PartnerDirectory
{
    /// The URL of the database
    fn url(&self) -> &str;

    async fn close(&mut self) -> Result<(), MarketError>;
}
