use actix_web::http::StatusCode;
use fixit_engine::{db_types::UserId, SqliteDatabase};
use serde_json::{json, Value};

use super::helpers::{get_request, json, marketplace, new_db, patch_request, post_request};

async fn register_partner(db: &SqliteDatabase, category: &str) -> UserId {
    let partner = UserId::new_random();
    let body = json!({
        "userId": partner,
        "displayName": "Tuan",
        "categories": [{"category": category}],
        "isOnline": true
    });
    let (status, body) = post_request("/partners", &body, marketplace(db.clone(), None)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(json(&body)["categories"][0]["approved"], true);
    partner
}

async fn post_order(db: &SqliteDatabase, client: &UserId, category: &str) -> Value {
    let body = json!({"clientId": client, "service": "Replace a socket", "category": category});
    let (status, body) = post_request("/orders", &body, marketplace(db.clone(), None)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    json(&body)
}

#[actix_web::test]
async fn clients_have_one_pending_order() {
    let db = new_db().await;
    let client = UserId::new_random();
    let order = post_order(&db, &client, "electricity").await;
    assert_eq!(order["status"], "pending");
    assert_eq!(order["clientId"], client.as_str());

    let body = json!({"clientId": client, "service": "Fix the fan", "category": "electricity"});
    let (status, body) = post_request("/orders", &body, marketplace(db.clone(), None)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json(&body)["error"].is_string());

    let (status, body) = get_request(&format!("/orders?clientId={client}"), marketplace(db.clone(), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body).as_array().map(Vec::len), Some(1));
}

#[actix_web::test]
async fn malformed_bodies_are_rejected() {
    let db = new_db().await;
    let (status, body) = post_request("/orders", &json!({"service": "No client"}), marketplace(db.clone(), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.starts_with(r#"{"error":"Could not read request body"#), "{body}");

    let (status, _) = get_request("/orders/types?types=", marketplace(db.clone(), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = get_request("/orders/0123456789abcdef01234567", marketplace(db, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn bidding_and_selection() {
    let db = new_db().await;
    let client = UserId::new_random();
    let p1 = register_partner(&db, "electricity").await;
    let p2 = register_partner(&db, "electricity").await;
    let order = post_order(&db, &client, "electricity").await;
    let order_id = order["id"].as_str().unwrap().to_string();

    let (status, body) = get_request("/orders/types?types=plumbing,electricity", marketplace(db.clone(), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json(&body).as_array().unwrap().iter().any(|o| o["id"] == order_id.as_str()));

    for (partner, price) in [(&p1, 200_000), (&p2, 180_000)] {
        let bid = json!({"partnerId": partner, "offeredPrice": price, "name": "Tuan"});
        let (status, body) =
            patch_request(&format!("/orders/{order_id}/applicants"), &bid, marketplace(db.clone(), None)).await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }
    let bid = json!({"partnerId": p1, "offeredPrice": 150_000});
    let (status, _) = patch_request(&format!("/orders/{order_id}/applicants"), &bid, marketplace(db.clone(), None)).await;
    assert_eq!(status, StatusCode::CONFLICT, "Each partner bids once");

    let select = json!({"partnerId": p1});
    let (status, body) = patch_request(&format!("/orders/{order_id}/select"), &select, marketplace(db.clone(), None)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let selection = json(&body);
    assert_eq!(selection["order"]["status"], "processing");
    assert_eq!(selection["order"]["applicants"].as_array().map(Vec::len), Some(1));
    assert_eq!(selection["appointment"]["status"], "navigation");
    assert_eq!(selection["appointment"]["agreedPrice"], 200_000);

    let select = json!({"partnerId": p2});
    let (status, _) = patch_request(&format!("/orders/{order_id}/select"), &select, marketplace(db.clone(), None)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[actix_web::test]
async fn appointment_lifecycle() {
    let db = new_db().await;
    let client = UserId::new_random();
    let partner = register_partner(&db, "electricity").await;
    let order = post_order(&db, &client, "electricity").await;
    let order_id = order["id"].as_str().unwrap().to_string();
    let bid = json!({"partnerId": partner, "offeredPrice": 300_000});
    patch_request(&format!("/orders/{order_id}/applicants"), &bid, marketplace(db.clone(), None)).await;
    let (_, body) =
        patch_request(&format!("/orders/{order_id}/select"), &json!({"partnerId": partner}), marketplace(db.clone(), None))
            .await;
    let appointment_id = json(&body)["appointment"]["id"].as_str().unwrap().to_string();

    let patch = json!({"status": "payment", "agreedPrice": 500_000});
    let (status, body) =
        patch_request(&format!("/appointments/{appointment_id}/partner"), &patch, marketplace(db.clone(), None)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(json(&body)["finalAmount"], 500_000);

    let (status, _) =
        patch_request(&format!("/appointments/{appointment_id}/boss"), &patch, marketplace(db.clone(), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let back = json!({"status": "navigation"});
    let (status, _) =
        patch_request(&format!("/appointments/{appointment_id}/client"), &back, marketplace(db.clone(), None)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let complete = json!({"paymentMethod": "qr", "partnerId": partner, "amount": 450_000});
    let (status, body) =
        patch_request(&format!("/appointments/{appointment_id}/complete"), &complete, marketplace(db.clone(), None)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let completed = json(&body);
    assert_eq!(completed["appointment"]["status"], "completed");
    assert_eq!(completed["transaction"]["balanceAfter"], 405_000);
    assert_eq!(completed["transaction"]["kind"], "appointment");

    let (status, body) = get_request(&format!("/appointments/partner/{partner}"), marketplace(db.clone(), None)).await;
    assert_eq!(status, StatusCode::OK);
    let partition = json(&body);
    assert_eq!(partition["inProgress"].as_array().map(Vec::len), Some(0));
    assert_eq!(partition["history"].as_array().map(Vec::len), Some(1));

    let (_, body) = get_request(&format!("/orders/{order_id}"), marketplace(db.clone(), None)).await;
    assert_eq!(json(&body)["status"], "completed");
    let (_, body) = get_request(&format!("/partners/{partner}"), marketplace(db, None)).await;
    assert_eq!(json(&body)["balance"], 405_000);
}
