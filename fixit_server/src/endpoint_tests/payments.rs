use actix_web::{http::StatusCode, test::TestRequest};
use fixit_engine::{db_types::UserId, SqliteDatabase};
use serde_json::json;

use super::helpers::{get_request, json, marketplace, new_db, post_request, send_request};

const API_KEY: &str = "sepay-secret";

async fn webhook(db: &SqliteDatabase, auth: Option<&str>, body: serde_json::Value) -> (StatusCode, String) {
    let mut req = TestRequest::post().uri("/payment/webhook").set_json(body);
    if let Some(auth) = auth {
        req = req.insert_header(("Authorization", auth));
    }
    send_request(req, marketplace(db.clone(), Some(API_KEY))).await
}

#[actix_web::test]
async fn webhook_requires_api_key() {
    let _ = env_logger::try_init().ok();
    let db = new_db().await;
    let body = json!({"description": "Lunch money", "transferAmount": 50_000});

    let (status, body_text) = webhook(&db, None, body.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(json(&body_text)["error"].as_str().unwrap().contains("Missing"));
    let (status, _) = webhook(&db, Some("Apikey wrong-key"), body.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = webhook(&db, Some(&format!("Bearer {API_KEY}")), body.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body_text) = webhook(&db, Some(&format!("apikey {API_KEY}")), body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body_text), json!({"ok": false, "reason": "unknown_transaction_type"}));
}

#[actix_web::test]
async fn webhook_without_configured_key_is_open() {
    let db = new_db().await;
    let body = json!({"content": "TOPUP123", "amount": 10});
    let (status, body) = post_request("/payment/webhook", &body, marketplace(db, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body), json!({"ok": false, "reason": "invalid_format"}));
}

#[actix_web::test]
async fn top_up_round_trip() {
    let _ = env_logger::try_init().ok();
    let db = new_db().await;
    let partner = UserId::new_random();
    let profile = json!({"userId": partner, "displayName": "Lan", "categories": [{"category": "plumbing"}]});
    let (status, _) = post_request("/partners", &profile, marketplace(db.clone(), None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) =
        post_request("/payment/topup", &json!({"userId": partner, "amount": 200_000}), marketplace(db.clone(), None))
            .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let intent = json(&body);
    let descriptor = intent["descriptor"].as_str().unwrap().to_string();
    assert!(descriptor.starts_with(&format!("TOPUP{partner}_")));
    let qr_url = intent["qrUrl"].as_str().unwrap();
    assert!(qr_url.contains("amount=200000"), "{qr_url}");
    assert!(qr_url.contains(&format!("des={descriptor}")), "{qr_url}");

    let notification = json!({"description": format!("MBVCB.3312.{descriptor}.CT tu 0123"), "transferAmount": "200000"});
    let auth = format!("Apikey {API_KEY}");
    let (status, body) = webhook(&db, Some(&auth), notification.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body), json!({"ok": true, "newBalance": 200_000}));

    // Gateways retry. The second delivery must not credit the partner again.
    let (status, body) = webhook(&db, Some(&auth), notification).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body), json!({"ok": false, "reason": "not_found"}));

    let (_, body) = get_request(&format!("/partners/{partner}"), marketplace(db.clone(), None)).await;
    assert_eq!(json(&body)["balance"], 200_000);

    let (status, body) =
        get_request(&format!("/payment/user/{partner}?type=topUp"), marketplace(db.clone(), None)).await;
    assert_eq!(status, StatusCode::OK);
    let history = json(&body);
    assert_eq!(history.as_array().map(Vec::len), Some(1));
    assert_eq!(history[0]["status"], "success");
    assert_eq!(history[0]["balanceAfter"], 200_000);

    let (status, body) =
        get_request(&format!("/payment/user/{partner}?type=withdraw"), marketplace(db.clone(), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body).as_array().map(Vec::len), Some(0));
}

#[actix_web::test]
async fn amount_mismatch_leaves_intent_pending() {
    let db = new_db().await;
    let partner = UserId::new_random();
    post_request("/partners", &json!({"userId": partner}), marketplace(db.clone(), None)).await;
    let (_, body) =
        post_request("/payment/topup", &json!({"userId": partner, "amount": 100_000}), marketplace(db.clone(), None))
            .await;
    let descriptor = json(&body)["descriptor"].as_str().unwrap().to_string();

    let auth = format!("Apikey {API_KEY}");
    let (_, body) = webhook(&db, Some(&auth), json!({"content": descriptor, "amount": 90_000})).await;
    assert_eq!(json(&body), json!({"ok": false, "reason": "amount_mismatch"}));
    let (_, body) = get_request(&format!("/payment/user/{partner}"), marketplace(db, None)).await;
    assert_eq!(json(&body)[0]["status"], "pending");
}

#[actix_web::test]
async fn invalid_payment_requests() {
    let db = new_db().await;
    let partner = UserId::new_random();
    let (status, _) =
        post_request("/payment/topup", &json!({"userId": partner, "amount": 0}), marketplace(db.clone(), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) =
        post_request("/payment/topup", &json!({"userId": "not-an-id", "amount": 10}), marketplace(db.clone(), None))
            .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = get_request(&format!("/payment/user/{partner}?month=5"), marketplace(db.clone(), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = get_request(&format!("/payment/user/{partner}?type=bogus"), marketplace(db.clone(), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, body) =
        get_request(&format!("/payment/user/{partner}?year=2147483647"), marketplace(db.clone(), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    let (status, _) =
        get_request(&format!("/payment/user/{partner}?year=2147483647&month=12"), marketplace(db, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
