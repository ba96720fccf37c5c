use actix_web::{http::StatusCode, test, test::TestRequest, web, web::ServiceConfig, App};
use fixit_common::Secret;
use fixit_engine::{
    events::EventProducers,
    market_api::GatewayConfig,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    AppointmentApi,
    LedgerApi,
    OrderMatchingApi,
    PromotionApi,
    RatingApi,
    SqliteDatabase,
};
use log::debug;
use serde::Serialize;
use serde_json::Value;

use crate::{
    routes::WebhookApiKey,
    server::{configure_routes, json_error_handler, query_error_handler},
};

pub async fn new_db() -> SqliteDatabase {
    prepare_test_env(&random_db_path()).await
}

/// The full route table on top of `db`, the way the server wires it, minus the notification relays.
pub fn marketplace(db: SqliteDatabase, api_key: Option<&str>) -> impl FnOnce(&mut ServiceConfig) {
    let api_key = WebhookApiKey(api_key.map(|k| Secret::new(k.to_string())));
    move |cfg: &mut ServiceConfig| {
        let producers = EventProducers::default();
        cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .app_data(web::QueryConfig::default().error_handler(query_error_handler))
            .app_data(web::Data::new(OrderMatchingApi::new(db.clone(), db.clone(), producers.clone())))
            .app_data(web::Data::new(AppointmentApi::new(db.clone(), producers.clone())))
            .app_data(web::Data::new(LedgerApi::new(db.clone(), GatewayConfig::default(), producers)))
            .app_data(web::Data::new(PromotionApi::new(db.clone())))
            .app_data(web::Data::new(RatingApi::new(db.clone())))
            .app_data(web::Data::new(db))
            .app_data(web::Data::new(api_key));
        configure_routes::<SqliteDatabase>(cfg);
    }
}

pub async fn send_request<F>(req: TestRequest, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    let res = test::call_service(&service, req.to_request()).await;
    let status = res.status();
    let body = test::read_body(res).await;
    (status, String::from_utf8_lossy(&body).into_owned())
}

pub async fn get_request<F>(path: &str, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    send_request(TestRequest::get().uri(path), configure).await
}

pub async fn post_request<T, F>(path: &str, body: &T, configure: F) -> (StatusCode, String)
where
    T: Serialize,
    F: FnOnce(&mut ServiceConfig),
{
    send_request(TestRequest::post().uri(path).set_json(body), configure).await
}

pub async fn patch_request<T, F>(path: &str, body: &T, configure: F) -> (StatusCode, String)
where
    T: Serialize,
    F: FnOnce(&mut ServiceConfig),
{
    send_request(TestRequest::patch().uri(path).set_json(body), configure).await
}

pub fn json(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|e| panic!("Response is not JSON ({e}): {body}"))
}
