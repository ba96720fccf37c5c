use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::Utc;
use fixit_engine::{
    db_types::{PartnerProfile, ServiceCategory, UserId, Vnd},
    traits::{CollaboratorError, MarketError},
};
use serde_json::json;

use super::{
    helpers::{get_request, json, patch_request, post_request},
    mocks::{MockDevices, MockPartners},
};
use crate::routes::{GetPartnerRoute, RegisterDeviceRoute, SetPartnerOnlineRoute};

const PARTNER: &str = "65f1c0a2b3d4e5f60718293a";

fn profile(user_id: &UserId, online: bool) -> PartnerProfile {
    PartnerProfile {
        user_id: user_id.clone(),
        display_name: "Minh the electrician".into(),
        balance: Vnd::from(405_000),
        is_online: online,
        is_locked: false,
        last_online_at: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn partners(mock: MockPartners) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg: &mut ServiceConfig| {
        cfg.app_data(web::Data::new(mock))
            .service(SetPartnerOnlineRoute::<MockPartners>::new())
            .service(GetPartnerRoute::<MockPartners>::new());
    }
}

#[actix_web::test]
async fn fetch_partner_profile() {
    let _ = env_logger::try_init().ok();
    let mut mock = MockPartners::new();
    mock.expect_fetch_partner_profile().times(1).returning(|id| Ok(Some(profile(id, true))));
    mock.expect_partner_categories()
        .times(1)
        .returning(|_| Ok(vec![ServiceCategory::approved("electricity"), ServiceCategory::approved("plumbing")]));
    let (status, body) = get_request(&format!("/partners/{PARTNER}"), partners(mock)).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["userId"], PARTNER);
    assert_eq!(body["balance"], 405_000);
    assert_eq!(body["isOnline"], true);
    assert_eq!(body["categories"][1]["category"], "plumbing");
}

#[actix_web::test]
async fn unknown_partner() {
    let _ = env_logger::try_init().ok();
    let mut mock = MockPartners::new();
    mock.expect_fetch_partner_profile().returning(|_| Ok(None));
    mock.expect_partner_categories().never();
    let (status, body) = get_request("/partners/nobody", partners(mock)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"The data was not found. Partner nobody"}"#);
}

#[actix_web::test]
async fn partner_lookup_backend_failure() {
    let _ = env_logger::try_init().ok();
    let mut mock = MockPartners::new();
    mock.expect_fetch_partner_profile().returning(|_| Err(MarketError::DatabaseError("database is locked".into())));
    let (status, body) = get_request(&format!("/partners/{PARTNER}"), partners(mock)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("database is locked"));
}

#[actix_web::test]
async fn toggle_presence() {
    let _ = env_logger::try_init().ok();
    let mut mock = MockPartners::new();
    mock.expect_set_partner_online()
        .withf(|id, online| id.as_str() == PARTNER && !*online)
        .times(1)
        .returning(|id, online| Ok(Some(profile(id, online))));
    let (status, body) =
        patch_request(&format!("/partners/{PARTNER}/online"), &json!({"online": false}), partners(mock)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["isOnline"], false);

    let mut mock = MockPartners::new();
    mock.expect_set_partner_online().returning(|_, _| Ok(None));
    let (status, _) =
        patch_request(&format!("/partners/{PARTNER}/online"), &json!({"online": true}), partners(mock)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

fn devices(mock: MockDevices) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg: &mut ServiceConfig| {
        cfg.app_data(web::Data::new(mock)).service(RegisterDeviceRoute::<MockDevices>::new());
    }
}

#[actix_web::test]
async fn register_device_tokens() {
    let _ = env_logger::try_init().ok();
    let mut mock = MockDevices::new();
    mock.expect_register_device_token()
        .withf(|user, token| user.as_str() == PARTNER && token == "fcm-token-1")
        .times(1)
        .returning(|_, _| Ok(()));
    let body = json!({"userId": PARTNER, "token": " fcm-token-1 "});
    let (status, body) = post_request("/devices", &body, devices(mock)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["success"], true);
}

#[actix_web::test]
async fn device_registration_failures() {
    let _ = env_logger::try_init().ok();
    let mut mock = MockDevices::new();
    mock.expect_register_device_token().never();
    let (status, _) = post_request("/devices", &json!({"userId": PARTNER, "token": "  "}), devices(mock)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut mock = MockDevices::new();
    mock.expect_register_device_token().returning(|_, _| Err(CollaboratorError::Unavailable("push relay down".into())));
    let (status, body) = post_request("/devices", &json!({"userId": PARTNER, "token": "abc"}), devices(mock)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("push relay down"));
}
