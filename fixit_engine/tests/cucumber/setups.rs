use cucumber::given;
use fixit_engine::{
    db_types::{DiscountKind, NewPartnerProfile, NewPromotion},
    traits::PartnerDirectory,
};

use crate::cucumber::{market_world::MarketSystem, MarketWorld};

#[given("a fresh marketplace")]
async fn fresh_marketplace(world: &mut MarketWorld) {
    world.system = Some(MarketSystem::new().await);
}

#[given(expr = "partner {word} is online for {word}")]
async fn online_partner(world: &mut MarketWorld, name: String, category: String) {
    let system = world.system_mut();
    let partner = system.user(&name);
    let profile = NewPartnerProfile::new(partner).with_category(category).online();
    system.db.upsert_partner_profile(profile).await.expect("Error registering partner");
}

#[given(expr = "partner {word} is offline for {word}")]
async fn offline_partner(world: &mut MarketWorld, name: String, category: String) {
    let system = world.system_mut();
    let partner = system.user(&name);
    let profile = NewPartnerProfile::new(partner).with_category(category);
    system.db.upsert_partner_profile(profile).await.expect("Error registering partner");
}

#[given(expr = "a promotion {word} for {int} percent")]
async fn percentage_promotion(world: &mut MarketWorld, code: String, percent: i64) {
    let promotion = NewPromotion::new(code, DiscountKind::Percentage, percent);
    world.system().promotions.create(promotion).await.expect("Error creating promotion");
}
