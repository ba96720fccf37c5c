use actix_web::http::StatusCode;
use fixit_engine::{db_types::UserId, SqliteDatabase};
use serde_json::json;

use super::helpers::{get_request, json, marketplace, new_db, post_request};

async fn create_appointment(db: &SqliteDatabase, client: &UserId, partner: &UserId) -> String {
    let order = json!({"clientId": client, "service": "Unblock the drain", "category": "plumbing"});
    let (_, body) = post_request("/orders", &order, marketplace(db.clone(), None)).await;
    let order_id = json(&body)["id"].as_str().unwrap().to_string();
    let appointment = json!({"orderId": order_id, "clientId": client, "partnerId": partner, "agreedPrice": 250_000});
    let (status, body) = post_request("/appointments", &appointment, marketplace(db.clone(), None)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    json(&body)["id"].as_str().unwrap().to_string()
}

#[actix_web::test]
async fn clients_rate_each_appointment_once() {
    let _ = env_logger::try_init().ok();
    let db = new_db().await;
    let client = UserId::new_random();
    let partner = UserId::new_random();
    let first = create_appointment(&db, &client, &partner).await;

    let rate = json!({"appointmentId": first, "clientId": client, "rating": 5, "comment": "Quick and tidy"});
    let (status, body) = post_request("/rates", &rate, marketplace(db.clone(), None)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let rating = json(&body);
    assert_eq!(rating["partnerId"], partner.as_str());
    assert_eq!(rating["rating"], 5);
    assert_eq!(rating["comment"], "Quick and tidy");

    let again = json!({"appointmentId": first, "clientId": client, "rating": 1});
    let (status, _) = post_request("/rates", &again, marketplace(db.clone(), None)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let stranger = json!({"appointmentId": first, "clientId": UserId::new_random(), "rating": 1});
    let (status, _) = post_request("/rates", &stranger, marketplace(db.clone(), None)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let other_client = UserId::new_random();
    let second = create_appointment(&db, &other_client, &partner).await;
    let rate = json!({"appointmentId": second, "clientId": other_client, "rating": 4, "partnerId": partner});
    let (status, body) = post_request("/rates", &rate, marketplace(db.clone(), None)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    let (status, body) = get_request(&format!("/rates/partner/{partner}"), marketplace(db, None)).await;
    assert_eq!(status, StatusCode::OK);
    let summary = json(&body);
    assert_eq!(summary["total"], 2);
    assert_eq!(summary["averageRating"], 4.5);
    assert_eq!(summary["ratings"][0]["rating"], 4, "Newest first");
}

#[actix_web::test]
async fn invalid_ratings_are_rejected() {
    let db = new_db().await;
    let client = UserId::new_random();
    let appointment = create_appointment(&db, &client, &UserId::new_random()).await;

    let (status, _) = post_request(
        "/rates",
        &json!({"appointmentId": appointment, "clientId": client, "rating": 6}),
        marketplace(db.clone(), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = post_request(
        "/rates",
        &json!({"appointmentId": appointment, "clientId": client, "rating": 3, "partnerId": UserId::new_random()}),
        marketplace(db.clone(), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = post_request(
        "/rates",
        &json!({"appointmentId": "0123456789abcdef01234567", "clientId": client, "rating": 3}),
        marketplace(db.clone(), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = post_request("/rates", &json!({"clientId": client}), marketplace(db.clone(), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = get_request(&format!("/rates/partner/{}", UserId::new_random()), marketplace(db, None)).await;
    assert_eq!(status, StatusCode::OK);
    let summary = json(&body);
    assert_eq!(summary["total"], 0);
    assert!(summary["averageRating"].is_null());
}
