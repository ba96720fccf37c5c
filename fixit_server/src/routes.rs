//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests:
//! ```nocompile
//!     fn my_handler() -> impl Responder {
//!         std::thread::sleep(Duration::from_secs(5)); // <-- Bad practice! Will cause the current worker thread to
//! hang!
//!     }
//! ```
//! For this reason, any long, non-cpu-bound operation (e.g. I/O, database operations, etc.) should be expressed as
//! futures or asynchronous functions. Async handlers get executed concurrently by worker threads and thus don’t block
//! execution:
//!
//! ```nocompile
//!     async fn my_handler() -> impl Responder {
//!         tokio::time::sleep(Duration::from_secs(5)).await; // <-- Ok. Worker thread will handle other requests here
//!     }
//! ```
//!
//! Routes with a fixed segment (`/orders/types`, `/appointments/{id}/complete`) must be registered before the
//! catch-all routes that share their prefix (`/orders/{id}`, `/appointments/{id}/{actor}`).
use actix_web::{get, http::header::AUTHORIZATION, web, HttpRequest, HttpResponse, Responder};
use fixit_common::Secret;
use fixit_engine::{
    db_types::{
        Actor,
        AppointmentId,
        NewApplicant,
        NewAppointment,
        NewOrder,
        NewPartnerProfile,
        NewPromotion,
        NewRating,
        OrderId,
        OrderUpdate,
        PromotionId,
        UserId,
    },
    market_api::{AppointmentPatch, CompletionRequest, TransactionPeriod, WebhookPayload},
    traits::{ChatRooms, DeviceRegistry, MarketplaceDatabase, PartnerDirectory},
    AppointmentApi,
    LedgerApi,
    OrderMatchingApi,
    PromotionApi,
    RatingApi,
};
use log::*;

use crate::{
    data_objects::{
        AmountRequest,
        ApplyPromotionRequest,
        CancelAppointmentRequest,
        DeviceTokenRequest,
        EnrollRequest,
        JobPaymentRequest,
        JsonResponse,
        OnlineRequest,
        OrdersQuery,
        PartnerResponse,
        SelectApplicantRequest,
        TypesQuery,
    },
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(create_order => Post "/orders" impl MarketplaceDatabase, ChatRooms);
/// Posts a new job. Partners who can take it are notified once it is stored.
///
/// A client may only have one pending order at a time; a second one is rejected with `409 Conflict`.
pub async fn create_order<B: MarketplaceDatabase, C: ChatRooms>(
    body: web::Json<NewOrder>,
    api: web::Data<OrderMatchingApi<B, C>>,
) -> Result<HttpResponse, ServerError> {
    let order = body.into_inner();
    debug!("💻️ POST order for {} ({})", order.client_id, order.category);
    let order = api.create_order(order).await?;
    Ok(HttpResponse::Created().json(order))
}

route!(list_orders => Get "/orders" impl MarketplaceDatabase, ChatRooms);
pub async fn list_orders<B: MarketplaceDatabase, C: ChatRooms>(
    query: web::Query<OrdersQuery>,
    api: web::Data<OrderMatchingApi<B, C>>,
) -> Result<HttpResponse, ServerError> {
    let orders = api.list_orders(query.into_inner().client_id).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(orders_by_types => Get "/orders/types" impl MarketplaceDatabase, ChatRooms);
/// Open orders in any of the comma-separated categories, e.g. `/orders/types?types=electricity,plumbing`.
pub async fn orders_by_types<B: MarketplaceDatabase, C: ChatRooms>(
    query: web::Query<TypesQuery>,
    api: web::Data<OrderMatchingApi<B, C>>,
) -> Result<HttpResponse, ServerError> {
    let categories = query.categories();
    if categories.is_empty() {
        return Err(ServerError::InvalidRequestBody("At least one service type is required".into()));
    }
    let orders = api.orders_by_categories(categories).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(orders_for_client => Get "/orders/client/{client_id}" impl MarketplaceDatabase, ChatRooms);
pub async fn orders_for_client<B: MarketplaceDatabase, C: ChatRooms>(
    path: web::Path<UserId>,
    api: web::Data<OrderMatchingApi<B, C>>,
) -> Result<HttpResponse, ServerError> {
    let client_id = path.into_inner();
    let orders = api.orders_for_client(&client_id).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(get_order => Get "/orders/{id}" impl MarketplaceDatabase, ChatRooms);
pub async fn get_order<B: MarketplaceDatabase, C: ChatRooms>(
    path: web::Path<OrderId>,
    api: web::Data<OrderMatchingApi<B, C>>,
) -> Result<HttpResponse, ServerError> {
    let order = api.get_order(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(update_order => Patch "/orders/{id}" impl MarketplaceDatabase, ChatRooms);
pub async fn update_order<B: MarketplaceDatabase, C: ChatRooms>(
    path: web::Path<OrderId>,
    body: web::Json<OrderUpdate>,
    api: web::Data<OrderMatchingApi<B, C>>,
) -> Result<HttpResponse, ServerError> {
    let order = api.update_order(&path.into_inner(), body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(add_applicant => Patch "/orders/{id}/applicants" impl MarketplaceDatabase, ChatRooms);
/// Places a bid. Each partner can bid once per order.
pub async fn add_applicant<B: MarketplaceDatabase, C: ChatRooms>(
    path: web::Path<OrderId>,
    body: web::Json<NewApplicant>,
    api: web::Data<OrderMatchingApi<B, C>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let bid = body.into_inner();
    debug!("💻️ Bid of {} on order {order_id} from {}", bid.offered_price, bid.partner_id);
    let order = api.add_applicant(&order_id, bid).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(select_applicant => Patch "/orders/{id}/select" impl MarketplaceDatabase, ChatRooms);
/// Accepts one bid. The order moves to `processing`, every other bid is dropped and an appointment is created.
pub async fn select_applicant<B: MarketplaceDatabase, C: ChatRooms>(
    path: web::Path<OrderId>,
    body: web::Json<SelectApplicantRequest>,
    api: web::Data<OrderMatchingApi<B, C>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let selection = api.select_applicant(&order_id, &body.partner_id).await?;
    Ok(HttpResponse::Ok().json(selection))
}

route!(cancel_applicant => Patch "/orders/{id}/cancel-applicant/{partner_id}" impl MarketplaceDatabase, ChatRooms);
pub async fn cancel_applicant<B: MarketplaceDatabase, C: ChatRooms>(
    path: web::Path<(OrderId, UserId)>,
    api: web::Data<OrderMatchingApi<B, C>>,
) -> Result<HttpResponse, ServerError> {
    let (order_id, partner_id) = path.into_inner();
    let order = api.cancel_applicant(&order_id, &partner_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(cancel_order => Patch "/orders/{id}/cancel" impl MarketplaceDatabase, ChatRooms);
pub async fn cancel_order<B: MarketplaceDatabase, C: ChatRooms>(
    path: web::Path<OrderId>,
    api: web::Data<OrderMatchingApi<B, C>>,
) -> Result<HttpResponse, ServerError> {
    let order = api.cancel_order(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Appointments  ----------------------------------------------------
route!(create_appointment => Post "/appointments" impl MarketplaceDatabase);
pub async fn create_appointment<B: MarketplaceDatabase>(
    body: web::Json<NewAppointment>,
    api: web::Data<AppointmentApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let appointment = api.create(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(appointment))
}

route!(all_appointments => Get "/appointments" impl MarketplaceDatabase);
pub async fn all_appointments<B: MarketplaceDatabase>(
    api: web::Data<AppointmentApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let appointments = api.all().await?;
    Ok(HttpResponse::Ok().json(appointments))
}

route!(appointments_for_partner => Get "/appointments/partner/{id}" impl MarketplaceDatabase);
pub async fn appointments_for_partner<B: MarketplaceDatabase>(
    path: web::Path<UserId>,
    api: web::Data<AppointmentApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let appointments = api.by_partner(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(appointments))
}

route!(appointments_for_client => Get "/appointments/client/{id}" impl MarketplaceDatabase);
pub async fn appointments_for_client<B: MarketplaceDatabase>(
    path: web::Path<UserId>,
    api: web::Data<AppointmentApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let appointments = api.by_client(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(appointments))
}

route!(appointments_for_order => Get "/appointments/order/{id}" impl MarketplaceDatabase);
pub async fn appointments_for_order<B: MarketplaceDatabase>(
    path: web::Path<OrderId>,
    api: web::Data<AppointmentApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let appointments = api.by_order(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(appointments))
}

route!(get_appointment => Get "/appointments/{id}" impl MarketplaceDatabase);
pub async fn get_appointment<B: MarketplaceDatabase>(
    path: web::Path<AppointmentId>,
    api: web::Data<AppointmentApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let appointment = api.get(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(appointment))
}

route!(complete_appointment => Patch "/appointments/{id}/complete" impl MarketplaceDatabase);
/// Completes the appointment and settles the partner's balance according to the payment method.
///
/// A request without a partner or an amount leaves the appointment untouched and returns it as it is.
pub async fn complete_appointment<B: MarketplaceDatabase>(
    path: web::Path<AppointmentId>,
    body: web::Json<CompletionRequest>,
    api: web::Data<AppointmentApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    debug!("💻️ Completion request for appointment {id}");
    let completed = api.update_to_complete(&id, body.into_inner(), None).await?;
    Ok(HttpResponse::Ok().json(completed))
}

route!(cancel_appointment => Post "/appointments/{id}/cancel" impl MarketplaceDatabase);
pub async fn cancel_appointment<B: MarketplaceDatabase>(
    path: web::Path<AppointmentId>,
    body: web::Json<CancelAppointmentRequest>,
    api: web::Data<AppointmentApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let appointment = api.update_to_cancel(&path.into_inner(), &body.reason).await?;
    Ok(HttpResponse::Ok().json(appointment))
}

route!(update_appointment => Patch "/appointments/{id}/{actor}" impl MarketplaceDatabase);
/// A generic update by the client or the partner (`/appointments/{id}/client` or `/appointments/{id}/partner`). The
/// other side is notified.
pub async fn update_appointment<B: MarketplaceDatabase>(
    path: web::Path<(AppointmentId, String)>,
    body: web::Json<AppointmentPatch>,
    api: web::Data<AppointmentApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let (id, actor) = path.into_inner();
    let actor = actor.parse::<Actor>().map_err(|e| ServerError::InvalidRequestPath(e.to_string()))?;
    let appointment = api.update(&id, body.into_inner(), actor).await?;
    Ok(HttpResponse::Ok().json(appointment))
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(top_up => Post "/payment/topup" impl MarketplaceDatabase);
pub async fn top_up<B: MarketplaceDatabase>(
    body: web::Json<AmountRequest>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let intent = api.create_top_up_intent(&body.user_id, body.amount).await?;
    Ok(HttpResponse::Created().json(intent))
}

route!(withdraw => Post "/payment/with-draw" impl MarketplaceDatabase);
pub async fn withdraw<B: MarketplaceDatabase>(
    body: web::Json<AmountRequest>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let intent = api.create_withdraw_intent(&body.user_id, body.amount).await?;
    Ok(HttpResponse::Created().json(intent))
}

route!(job_payment => Post "/payment/paid" impl MarketplaceDatabase);
pub async fn job_payment<B: MarketplaceDatabase>(
    body: web::Json<JobPaymentRequest>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let JobPaymentRequest { client_id, partner_id, appointment_id, amount } = body.into_inner();
    let intent = api.create_job_payment_intent(&client_id, &partner_id, &appointment_id, amount).await?;
    Ok(HttpResponse::Created().json(intent))
}

/// The shared secret the payment gateway must present on webhook calls. `None` disables the check.
#[derive(Debug, Clone, Default)]
pub struct WebhookApiKey(pub Option<Secret<String>>);

impl WebhookApiKey {
    /// Accepts `Authorization: Apikey <key>`. The scheme is case-insensitive; the key is not.
    pub fn authorize(&self, req: &HttpRequest) -> Result<(), ServerError> {
        let Some(expected) = &self.0 else {
            return Ok(());
        };
        let presented = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().split_once(' '))
            .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("apikey"))
            .map(|(_, key)| key.trim());
        match presented {
            Some(key) if key == expected.reveal().as_str() => Ok(()),
            Some(_) => Err(ServerError::Unauthorized("Invalid API key".into())),
            None => Err(ServerError::Unauthorized("Missing Apikey authorization header".into())),
        }
    }
}

route!(payment_webhook => Post "/payment/webhook" impl MarketplaceDatabase);
/// The payment gateway's transfer notification.
///
/// Reconciliation failures are reported as `{"ok": false, "reason": ...}` with a `200` status, since the gateway
/// cannot do anything about them. Only backend failures produce an error status, which tells the gateway to retry.
pub async fn payment_webhook<B: MarketplaceDatabase>(
    req: HttpRequest,
    body: web::Json<WebhookPayload>,
    api: web::Data<LedgerApi<B>>,
    auth: web::Data<WebhookApiKey>,
) -> Result<HttpResponse, ServerError> {
    auth.authorize(&req).map_err(|e| {
        warn!("💻️ Rejected payment webhook from {:?}. {e}", req.peer_addr());
        e
    })?;
    let payload = body.into_inner();
    trace!("💻️ Payment webhook: {payload:?}");
    let outcome = api.handle_webhook(payload).await?;
    if !outcome.ok {
        info!("💻️ Payment webhook could not be reconciled: {:?}", outcome.reason);
    }
    Ok(HttpResponse::Ok().json(outcome))
}

route!(transactions_for_user => Get "/payment/user/{user_id}" impl MarketplaceDatabase);
/// A user's ledger history, optionally narrowed with `?type=topUp&year=2024&month=5` (or `&week=`).
pub async fn transactions_for_user<B: MarketplaceDatabase>(
    path: web::Path<UserId>,
    query: web::Query<TransactionPeriod>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let user_id = path.into_inner();
    let transactions = api.transactions_for_user(&user_id, query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(transactions))
}

//----------------------------------------------   Promotions  ----------------------------------------------------
route!(list_promotions => Get "/promotions" impl MarketplaceDatabase);
pub async fn list_promotions<B: MarketplaceDatabase>(
    api: web::Data<PromotionApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let promotions = api.list_all().await?;
    Ok(HttpResponse::Ok().json(promotions))
}

route!(eligible_promotions => Get "/promotions/client/{client_id}" impl MarketplaceDatabase);
pub async fn eligible_promotions<B: MarketplaceDatabase>(
    path: web::Path<UserId>,
    api: web::Data<PromotionApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let promotions = api.list_eligible(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(promotions))
}

route!(apply_promotion => Post "/promotions/apply" impl MarketplaceDatabase);
pub async fn apply_promotion<B: MarketplaceDatabase>(
    body: web::Json<ApplyPromotionRequest>,
    api: web::Data<PromotionApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let ApplyPromotionRequest { appointment_id, code, user_id } = body.into_inner();
    let applied = api.apply(&appointment_id, &code, &user_id).await?;
    Ok(HttpResponse::Ok().json(applied))
}

route!(create_promotion => Post "/promotions" impl MarketplaceDatabase);
pub async fn create_promotion<B: MarketplaceDatabase>(
    body: web::Json<NewPromotion>,
    api: web::Data<PromotionApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let promotion = api.create(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(promotion))
}

route!(enroll_client => Post "/promotions/{code}/targets" impl MarketplaceDatabase);
pub async fn enroll_client<B: MarketplaceDatabase>(
    path: web::Path<String>,
    body: web::Json<EnrollRequest>,
    api: web::Data<PromotionApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let promotion = api.enroll_client(&path.into_inner(), &body.client_id).await?;
    Ok(HttpResponse::Ok().json(promotion))
}

route!(remove_promotion => Delete "/promotions/{id}" impl MarketplaceDatabase);
pub async fn remove_promotion<B: MarketplaceDatabase>(
    path: web::Path<PromotionId>,
    api: web::Data<PromotionApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    api.remove(&id).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Promotion {id} removed"))))
}

//----------------------------------------------   Ratings  ----------------------------------------------------
route!(rate_appointment => Post "/rates" impl MarketplaceDatabase);
/// A client rates the partner who did their job. Each appointment takes one rating.
pub async fn rate_appointment<B: MarketplaceDatabase>(
    body: web::Json<NewRating>,
    api: web::Data<RatingApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let rating = api.rate(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(rating))
}

route!(partner_ratings => Get "/rates/partner/{partner_id}" impl MarketplaceDatabase);
pub async fn partner_ratings<B: MarketplaceDatabase>(
    path: web::Path<UserId>,
    api: web::Data<RatingApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let ratings = api.for_partner(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ratings))
}

//----------------------------------------------   Partners  ----------------------------------------------------
route!(upsert_partner => Post "/partners" impl PartnerDirectory);
/// Registers a partner, or refreshes their name, flags and service categories. Balances cannot be set here.
pub async fn upsert_partner<B: PartnerDirectory>(
    body: web::Json<NewPartnerProfile>,
    api: web::Data<B>,
) -> Result<HttpResponse, ServerError> {
    let profile = api.upsert_partner_profile(body.into_inner()).await?;
    let categories = api.partner_categories(&profile.user_id).await?;
    Ok(HttpResponse::Ok().json(PartnerResponse { profile, categories }))
}

route!(get_partner => Get "/partners/{id}" impl PartnerDirectory);
pub async fn get_partner<B: PartnerDirectory>(
    path: web::Path<UserId>,
    api: web::Data<B>,
) -> Result<HttpResponse, ServerError> {
    let user_id = path.into_inner();
    let profile = api
        .fetch_partner_profile(&user_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Partner {user_id}")))?;
    let categories = api.partner_categories(&user_id).await?;
    Ok(HttpResponse::Ok().json(PartnerResponse { profile, categories }))
}

route!(set_partner_online => Patch "/partners/{id}/online" impl PartnerDirectory);
pub async fn set_partner_online<B: PartnerDirectory>(
    path: web::Path<UserId>,
    body: web::Json<OnlineRequest>,
    api: web::Data<B>,
) -> Result<HttpResponse, ServerError> {
    let user_id = path.into_inner();
    let profile = api
        .set_partner_online(&user_id, body.online)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Partner {user_id}")))?;
    debug!("💻️ {user_id} is now {}", if profile.is_online { "online" } else { "offline" });
    Ok(HttpResponse::Ok().json(profile))
}

//----------------------------------------------   Devices  ----------------------------------------------------
route!(register_device => Post "/devices" impl DeviceRegistry);
pub async fn register_device<B: DeviceRegistry>(
    body: web::Json<DeviceTokenRequest>,
    api: web::Data<B>,
) -> Result<HttpResponse, ServerError> {
    if body.token.trim().is_empty() {
        return Err(ServerError::InvalidRequestBody("The device token cannot be empty".into()));
    }
    api.register_device_token(&body.user_id, body.token.trim())
        .await
        .map_err(|e| ServerError::BackendError(e.to_string()))?;
    Ok(HttpResponse::Ok().json(JsonResponse::success("Device registered")))
}
