use actix_web::{http::StatusCode, test::TestRequest};
use fixit_engine::{db_types::UserId, SqliteDatabase};
use serde_json::{json, Value};

use super::helpers::{get_request, json, marketplace, new_db, post_request, send_request};

async fn create_promotion(db: &SqliteDatabase, body: Value) -> Value {
    let (status, body) = post_request("/promotions", &body, marketplace(db.clone(), None)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    json(&body)
}

async fn create_appointment(db: &SqliteDatabase, client: &UserId, agreed_price: i64) -> String {
    let order = json!({"clientId": client, "service": "Clean the aircon", "category": "aircon"});
    let (_, body) = post_request("/orders", &order, marketplace(db.clone(), None)).await;
    let order_id = json(&body)["id"].as_str().unwrap().to_string();
    let appointment =
        json!({"orderId": order_id, "clientId": client, "partnerId": UserId::new_random(), "agreedPrice": agreed_price});
    let (status, body) = post_request("/appointments", &appointment, marketplace(db.clone(), None)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    json(&body)["id"].as_str().unwrap().to_string()
}

#[actix_web::test]
async fn promotion_codes_are_unique() {
    let db = new_db().await;
    let promo = create_promotion(&db, json!({"code": "SAVE10", "discountKind": "percentage", "value": 10})).await;
    assert_eq!(promo["usageCount"], 0);
    assert_eq!(promo["usagePerUser"], 1);
    assert_eq!(promo["isActive"], true);

    let dup = json!({"code": "SAVE10", "discountKind": "fixed", "value": 5_000});
    let (status, _) = post_request("/promotions", &dup, marketplace(db.clone(), None)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let silly = json!({"code": "HALFOFF", "discountKind": "percentage", "value": 150});
    let (status, _) = post_request("/promotions", &silly, marketplace(db.clone(), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = get_request("/promotions", marketplace(db, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body).as_array().map(Vec::len), Some(1));
}

#[actix_web::test]
async fn apply_promotion_once() {
    let _ = env_logger::try_init().ok();
    let db = new_db().await;
    let client = UserId::new_random();
    create_promotion(&db, json!({"code": "SAVE10", "discountKind": "percentage", "value": 10})).await;
    let appointment_id = create_appointment(&db, &client, 500_000).await;

    let apply = json!({"appointmentId": appointment_id, "code": "SAVE10", "userId": client});
    let (status, body) = post_request("/promotions/apply", &apply, marketplace(db.clone(), None)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let applied = json(&body);
    assert_eq!(applied["discount"], 50_000);
    assert_eq!(applied["finalAmount"], 450_000);
    assert_eq!(applied["appointment"]["promotionCode"], "SAVE10");

    let (status, _) = post_request("/promotions/apply", &apply, marketplace(db.clone(), None)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (_, body) = get_request(&format!("/promotions/client/{client}"), marketplace(db.clone(), None)).await;
    assert_eq!(json(&body).as_array().map(Vec::len), Some(0), "Used promotions are no longer offered");

    let unknown = json!({"appointmentId": appointment_id, "code": "NOPE", "userId": client});
    let (status, _) = post_request("/promotions/apply", &unknown, marketplace(db, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn welcome_promotions_follow_enrolment() {
    let db = new_db().await;
    let newcomer = UserId::new_random();
    let someone_else = UserId::new_random();
    let welcome = json!({
        "code": "WELCOME",
        "discountKind": "fixed",
        "value": 30_000,
        "category": "welcome",
        "targetClients": [someone_else]
    });
    create_promotion(&db, welcome).await;
    let (_, body) = get_request(&format!("/promotions/client/{newcomer}"), marketplace(db.clone(), None)).await;
    assert_eq!(json(&body).as_array().map(Vec::len), Some(0));

    let (status, body) =
        post_request("/promotions/WELCOME/targets", &json!({"clientId": newcomer}), marketplace(db.clone(), None)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let targets = json(&body)["targetClients"].as_array().cloned().unwrap_or_default();
    assert!(targets.iter().any(|t| t == newcomer.as_str()));

    let (_, body) = get_request(&format!("/promotions/client/{newcomer}"), marketplace(db.clone(), None)).await;
    let eligible = json(&body);
    assert_eq!(eligible.as_array().map(Vec::len), Some(1));
    assert_eq!(eligible[0]["code"], "WELCOME");

    let (status, _) =
        post_request("/promotions/NOPE/targets", &json!({"clientId": newcomer}), marketplace(db, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn remove_promotion() {
    let db = new_db().await;
    let promo = create_promotion(&db, json!({"code": "GONE", "discountKind": "fixed", "value": 1_000})).await;
    let id = promo["id"].as_str().unwrap().to_string();

    let delete = || TestRequest::delete().uri(&format!("/promotions/{id}"));
    let (status, body) = send_request(delete(), marketplace(db.clone(), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["success"], true);
    let (status, _) = send_request(delete(), marketplace(db.clone(), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, body) = get_request("/promotions", marketplace(db, None)).await;
    assert_eq!(json(&body).as_array().map(Vec::len), Some(0));
}
