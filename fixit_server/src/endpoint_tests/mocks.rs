use fixit_engine::{
    db_types::{NewPartnerProfile, PartnerProfile, ServiceCategory, UserId},
    traits::{CollaboratorError, DeviceRegistry, MarketError, PartnerDirectory},
};
use mockall::mock;

mock! {
    pub Partners {}
    impl Clone for Partners {
        fn clone(&self) -> Self;
    }
    impl PartnerDirectory for Partners {
        async fn eligible_partners(&self, category: &str) -> Result<Vec<UserId>, MarketError>;
        async fn fetch_partner_profile(&self, user_id: &UserId) -> Result<Option<PartnerProfile>, MarketError>;
        async fn partner_categories(&self, user_id: &UserId) -> Result<Vec<ServiceCategory>, MarketError>;
        async fn upsert_partner_profile(&self, profile: NewPartnerProfile) -> Result<PartnerProfile, MarketError>;
        async fn set_partner_online(&self, user_id: &UserId, online: bool) -> Result<Option<PartnerProfile>, MarketError>;
    }
}

mock! {
    pub Devices {}
    impl DeviceRegistry for Devices {
        async fn device_tokens_for(&self, user_ids: &[UserId]) -> Result<Vec<String>, CollaboratorError>;
        async fn register_device_token(&self, user_id: &UserId, token: &str) -> Result<(), CollaboratorError>;
    }
}
