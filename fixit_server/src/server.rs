use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use actix_web::{
    dev::Server,
    error::{JsonPayloadError, QueryPayloadError},
    http::KeepAlive,
    middleware::Logger,
    web,
    App,
    HttpRequest,
    HttpServer,
};
use fixit_engine::{
    events::{EventHandlers, EventHooks, EventProducers, MarketEvent, NotificationDispatcher},
    traits::{ChatRooms, DeviceRegistry, MarketplaceDatabase},
    AppointmentApi,
    LedgerApi,
    OrderMatchingApi,
    PromotionApi,
    RatingApi,
    SqliteDatabase,
};
use log::*;

use crate::{
    cleanup_worker::start_cleanup_worker,
    config::ServerConfig,
    errors::ServerError,
    notifier::{HttpNotifier, HttpPushSender},
    routes::{
        health,
        AddApplicantRoute,
        AllAppointmentsRoute,
        AppointmentsForClientRoute,
        AppointmentsForOrderRoute,
        AppointmentsForPartnerRoute,
        ApplyPromotionRoute,
        CancelApplicantRoute,
        CancelAppointmentRoute,
        CancelOrderRoute,
        CompleteAppointmentRoute,
        CreateAppointmentRoute,
        CreateOrderRoute,
        CreatePromotionRoute,
        EligiblePromotionsRoute,
        EnrollClientRoute,
        GetAppointmentRoute,
        GetOrderRoute,
        GetPartnerRoute,
        JobPaymentRoute,
        ListOrdersRoute,
        ListPromotionsRoute,
        OrdersByTypesRoute,
        OrdersForClientRoute,
        PartnerRatingsRoute,
        PaymentWebhookRoute,
        RateAppointmentRoute,
        RegisterDeviceRoute,
        RemovePromotionRoute,
        SelectApplicantRoute,
        SetPartnerOnlineRoute,
        TopUpRoute,
        TransactionsForUserRoute,
        UpdateAppointmentRoute,
        UpdateOrderRoute,
        UpsertPartnerRoute,
        WebhookApiKey,
        WithdrawRoute,
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, config.max_connections)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    if config.run_migrations {
        db.migrate().await.map_err(|e| ServerError::InitializeError(format!("Could not run migrations. {e}")))?;
        info!("🗃️ Database migrations are up to date");
    }
    let hooks = create_event_hooks(&config, db.clone())?;
    let handlers = EventHandlers::new(config.event_buffer_size, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;
    // Do not await the worker. It runs until the server shuts down.
    let _cleanup = start_cleanup_worker(
        db.clone(),
        producers.clone(),
        config.gateway.clone(),
        config.pending_tx_max_age,
        config.cleanup_interval,
    );
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Every marketplace event is forwarded to the real-time relay, and to the recipients' devices where the event calls
/// for a push message.
pub fn create_event_hooks(config: &ServerConfig, db: SqliteDatabase) -> Result<EventHooks, ServerError> {
    let realtime = HttpNotifier::new(config.realtime_url.clone())?;
    let push = HttpPushSender::new(config.push_url.clone())?;
    let dispatcher = Arc::new(NotificationDispatcher::new(realtime, push, db));
    let mut hooks = EventHooks::default();
    hooks.on_market_event(move |ev: MarketEvent| {
        let dispatcher = Arc::clone(&dispatcher);
        Box::pin(async move {
            dispatcher.dispatch(ev).await;
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    Ok(hooks)
}

pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    debug!("💻️ Could not deserialize request body. {err}");
    ServerError::InvalidRequestBody(err.to_string()).into()
}

pub fn query_error_handler(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    debug!("💻️ Could not deserialize query string. {err}");
    ServerError::InvalidRequestPath(err.to_string()).into()
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let webhook_key = WebhookApiKey(config.webhook_api_key.clone());
    let gateway = config.gateway.clone();
    let srv = HttpServer::new(move || {
        let orders_api = OrderMatchingApi::new(db.clone(), db.clone(), producers.clone());
        let appointments_api = AppointmentApi::new(db.clone(), producers.clone());
        let ledger_api = LedgerApi::new(db.clone(), gateway.clone(), producers.clone());
        let promotions_api = PromotionApi::new(db.clone());
        let ratings_api = RatingApi::new(db.clone());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("fixit::access_log"))
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .app_data(web::QueryConfig::default().error_handler(query_error_handler))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(appointments_api))
            .app_data(web::Data::new(ledger_api))
            .app_data(web::Data::new(promotions_api))
            .app_data(web::Data::new(ratings_api))
            .app_data(web::Data::new(db.clone()))
            .app_data(web::Data::new(webhook_key.clone()))
            .service(health)
            .configure(configure_routes::<SqliteDatabase>)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// Registers every marketplace route against the backend `B`, which also serves as the chat, partner and device
/// backend.
pub fn configure_routes<B>(cfg: &mut web::ServiceConfig)
where B: MarketplaceDatabase + ChatRooms + DeviceRegistry + 'static {
    cfg.service(CreateOrderRoute::<B, B>::new())
        .service(ListOrdersRoute::<B, B>::new())
        .service(OrdersByTypesRoute::<B, B>::new())
        .service(OrdersForClientRoute::<B, B>::new())
        .service(AddApplicantRoute::<B, B>::new())
        .service(SelectApplicantRoute::<B, B>::new())
        .service(CancelApplicantRoute::<B, B>::new())
        .service(CancelOrderRoute::<B, B>::new())
        .service(GetOrderRoute::<B, B>::new())
        .service(UpdateOrderRoute::<B, B>::new())
        .service(CreateAppointmentRoute::<B>::new())
        .service(AllAppointmentsRoute::<B>::new())
        .service(AppointmentsForPartnerRoute::<B>::new())
        .service(AppointmentsForClientRoute::<B>::new())
        .service(AppointmentsForOrderRoute::<B>::new())
        .service(CompleteAppointmentRoute::<B>::new())
        .service(CancelAppointmentRoute::<B>::new())
        .service(GetAppointmentRoute::<B>::new())
        .service(UpdateAppointmentRoute::<B>::new())
        .service(TopUpRoute::<B>::new())
        .service(WithdrawRoute::<B>::new())
        .service(JobPaymentRoute::<B>::new())
        .service(PaymentWebhookRoute::<B>::new())
        .service(TransactionsForUserRoute::<B>::new())
        .service(ListPromotionsRoute::<B>::new())
        .service(EligiblePromotionsRoute::<B>::new())
        .service(ApplyPromotionRoute::<B>::new())
        .service(CreatePromotionRoute::<B>::new())
        .service(EnrollClientRoute::<B>::new())
        .service(RemovePromotionRoute::<B>::new())
        .service(RateAppointmentRoute::<B>::new())
        .service(PartnerRatingsRoute::<B>::new())
        .service(UpsertPartnerRoute::<B>::new())
        .service(GetPartnerRoute::<B>::new())
        .service(SetPartnerOnlineRoute::<B>::new())
        .service(RegisterDeviceRoute::<B>::new());
}
