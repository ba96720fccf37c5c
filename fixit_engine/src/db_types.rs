//! Records stored in, and read from, the marketplace backend.
//!
//! All identifiers are 24-character hex strings in the object-id style (see [`crate::helpers::new_object_id`]). The
//! payment descriptors carried in bank-transfer memos embed user and appointment ids, so those must keep that shape.
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use fixit_common::Vnd;
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, Type};
use thiserror::Error;

use crate::helpers::{is_object_id, new_object_id};

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------      Identifiers      -------------------------------------------------------
macro_rules! object_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
        #[sqlx(transparent)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new_random() -> Self {
                Self(new_object_id())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// True when the id has the 24 hex-digit shape that can be embedded in a payment descriptor.
            pub fn is_object_id(&self) -> bool {
                is_object_id(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                if s.is_empty() {
                    Err(ConversionError(format!("{} cannot be empty", stringify!($name))))
                } else {
                    Ok(Self(s.to_string()))
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

object_id!(
    /// Identifies a client or a partner. Accounts themselves live outside this system.
    UserId
);
object_id!(OrderId);
object_id!(AppointmentId);
object_id!(RoomId);
object_id!(TransactionId);
object_id!(PromotionId);
object_id!(RatingId);

//--------------------------------------     OrderStatus       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// The order is open for bids. A client has at most one of these at a time.
    Pending,
    /// A bid has been selected and an appointment is under way.
    Processing,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// Completed and cancelled orders accept no further bids, selections or edits.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

//--------------------------------------     BiddingMode       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BiddingMode {
    /// Open bidding. Partners apply and the client picks one.
    #[default]
    Select,
    /// Direct assignment. Bids are not accepted.
    Assign,
}

impl Display for BiddingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Select => write!(f, "select"),
            Self::Assign => write!(f, "assign"),
        }
    }
}

//--------------------------------------  AppointmentStatus    ---------------------------------------------------------
/// Appointment progress. The declaration order is the order of the work flow, so the derived `Ord` can be used to
/// check that a transition moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Navigation,
    Inspection,
    Working,
    Handover,
    Payment,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    /// `navigation..=payment`. Note that `payment` still counts as in progress.
    pub fn is_in_progress(&self) -> bool {
        (Self::Navigation..=Self::Payment).contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Navigation => "navigation",
            Self::Inspection => "inspection",
            Self::Working => "working",
            Self::Handover => "handover",
            Self::Payment => "payment",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

impl FromStr for AppointmentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "navigation" => Ok(Self::Navigation),
            "inspection" => Ok(Self::Inspection),
            "working" => Ok(Self::Working),
            "handover" => Ok(Self::Handover),
            "payment" => Ok(Self::Payment),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid appointment status: {s}"))),
        }
    }
}

//--------------------------------------    PaymentMethod      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Bank transfer through the payment gateway. The platform collects the money and credits the partner's share.
    Qr,
    /// The client paid the partner directly. The platform's commission is debited from the partner.
    Cash,
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Qr => write!(f, "qr"),
            Self::Cash => write!(f, "cash"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "qr" => Ok(Self::Qr),
            "cash" => Ok(Self::Cash),
            s => Err(ConversionError(format!("Unsupported payment method: {s}"))),
        }
    }
}

//--------------------------------------   TransactionKind     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum TransactionKind {
    TopUp,
    Withdraw,
    /// Settlement of a completed appointment against the partner balance.
    Appointment,
}

impl Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TopUp => write!(f, "topUp"),
            Self::Withdraw => write!(f, "withdraw"),
            Self::Appointment => write!(f, "appointment"),
        }
    }
}

impl FromStr for TransactionKind {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "topUp" | "topup" => Ok(Self::TopUp),
            "withdraw" => Ok(Self::Withdraw),
            "appointment" => Ok(Self::Appointment),
            s => Err(ConversionError(format!("Invalid transaction type: {s}"))),
        }
    }
}

//--------------------------------------  TransactionStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

impl Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

//--------------------------------------        Actor          ---------------------------------------------------------
/// The side of an appointment making a change. Notifications go to the other side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Actor {
    Client,
    Partner,
}

impl FromStr for Actor {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(Self::Client),
            "partner" => Ok(Self::Partner),
            s => Err(ConversionError(format!("Unknown actor: {s}. Expected 'client' or 'partner'"))),
        }
    }
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub client_id: UserId,
    /// Human-readable service name, e.g. "Fix a leaking tap"
    pub service: String,
    /// Machine key of the service category, e.g. `electricity`. Partners are matched on this.
    pub category: String,
    pub description: String,
    pub images: Json<Vec<String>>,
    pub scheduled_for: String,
    pub address: String,
    pub longitude: String,
    pub latitude: String,
    pub bidding_mode: BiddingMode,
    pub price_range: Option<String>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub client_id: UserId,
    pub service: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub scheduled_for: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub longitude: String,
    #[serde(default)]
    pub latitude: String,
    #[serde(default)]
    pub bidding_mode: BiddingMode,
    #[serde(default)]
    pub price_range: Option<String>,
}

impl NewOrder {
    pub fn new<S: Into<String>>(client_id: UserId, service: S, category: S) -> Self {
        Self { client_id, service: service.into(), category: category.into(), ..Default::default() }
    }

    pub fn with_bidding_mode(mut self, mode: BiddingMode) -> Self {
        self.bidding_mode = mode;
        self
    }

    pub fn with_address<S: Into<String>>(mut self, address: S) -> Self {
        self.address = address.into();
        self
    }
}

/// The free-form fields of an order that the client may edit. Lifecycle fields are changed by their own operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdate {
    pub description: Option<String>,
    pub images: Option<Vec<String>>,
    pub scheduled_for: Option<String>,
    pub address: Option<String>,
    pub longitude: Option<String>,
    pub latitude: Option<String>,
    pub price_range: Option<String>,
}

impl OrderUpdate {
    pub fn is_empty(&self) -> bool {
        self.description.is_none() &&
            self.images.is_none() &&
            self.scheduled_for.is_none() &&
            self.address.is_none() &&
            self.longitude.is_none() &&
            self.latitude.is_none() &&
            self.price_range.is_none()
    }
}

/// An order together with its current applicants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub applicants: Vec<Applicant>,
}

//--------------------------------------      Applicant        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Applicant {
    pub order_id: OrderId,
    pub partner_id: UserId,
    pub name: String,
    pub avatar_url: Option<String>,
    pub offered_price: Vnd,
    pub note: Option<String>,
    pub room_id: Option<RoomId>,
    pub created_at: DateTime<Utc>,
}

/// A partner's bid on an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewApplicant {
    pub partner_id: UserId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    pub offered_price: Vnd,
    #[serde(default)]
    pub note: Option<String>,
}

impl NewApplicant {
    pub fn new(partner_id: UserId, offered_price: Vnd) -> Self {
        Self { partner_id, name: String::default(), avatar_url: None, offered_price, note: None }
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }
}

//--------------------------------------     Appointment       ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkEvidence {
    pub note: String,
    pub images: Vec<String>,
    pub approved: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdditionalIssue {
    pub note: String,
    pub images: Vec<String>,
    pub cost: Vnd,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: AppointmentId,
    pub order_id: OrderId,
    pub client_id: UserId,
    pub partner_id: UserId,
    pub room_id: Option<RoomId>,
    pub status: AppointmentStatus,
    pub agreed_price: Vnd,
    pub labor_cost: Vnd,
    pub payment_method: Option<PaymentMethod>,
    pub promotion_code: Option<String>,
    pub promotion_discount: Vnd,
    /// Always `max(agreed_price + labor_cost - promotion_discount, 0)`
    pub final_amount: Vnd,
    pub before_work: Json<WorkEvidence>,
    pub after_work: Json<WorkEvidence>,
    pub additional_issues: Json<Vec<AdditionalIssue>>,
    pub additional_issues_approved: bool,
    pub note: Option<String>,
    pub cancel_reason: Option<String>,
    /// Id of the job payment that settled this appointment, when it was paid through the gateway.
    pub settlement_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAppointment {
    pub order_id: OrderId,
    pub client_id: UserId,
    pub partner_id: UserId,
    #[serde(default)]
    pub room_id: Option<RoomId>,
    #[serde(default)]
    pub agreed_price: Option<Vnd>,
    #[serde(default)]
    pub labor_cost: Option<Vnd>,
    #[serde(default)]
    pub note: Option<String>,
}

impl NewAppointment {
    pub fn new(order_id: OrderId, client_id: UserId, partner_id: UserId) -> Self {
        Self { order_id, client_id, partner_id, room_id: None, agreed_price: None, labor_cost: None, note: None }
    }

    pub fn with_room(mut self, room_id: Option<RoomId>) -> Self {
        self.room_id = room_id;
        self
    }

    pub fn with_agreed_price(mut self, price: Vnd) -> Self {
        self.agreed_price = Some(price);
        self
    }
}

/// The fields of an appointment that the generic update path may change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentUpdate {
    pub status: Option<AppointmentStatus>,
    pub agreed_price: Option<Vnd>,
    pub labor_cost: Option<Vnd>,
    pub payment_method: Option<PaymentMethod>,
    pub before_work: Option<WorkEvidence>,
    pub after_work: Option<WorkEvidence>,
    pub additional_issues: Option<Vec<AdditionalIssue>>,
    pub additional_issues_approved: Option<bool>,
    pub note: Option<String>,
}

impl AppointmentUpdate {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() &&
            self.agreed_price.is_none() &&
            self.labor_cost.is_none() &&
            self.payment_method.is_none() &&
            self.before_work.is_none() &&
            self.after_work.is_none() &&
            self.additional_issues.is_none() &&
            self.additional_issues_approved.is_none() &&
            self.note.is_none()
    }

    pub fn with_status(mut self, status: AppointmentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_agreed_price(mut self, price: Vnd) -> Self {
        self.agreed_price = Some(price);
        self
    }

    pub fn with_labor_cost(mut self, cost: Vnd) -> Self {
        self.labor_cost = Some(cost);
        self
    }
}

/// What the backend needs to close out an appointment in a single atomic step.
#[derive(Debug, Clone)]
pub struct CompletionSettlement {
    pub partner_id: UserId,
    /// Gross amount paid for the job.
    pub amount: Vnd,
    /// `None` when the caller supplied a method we do not recognise. The appointment still completes, but no balance
    /// moves.
    pub payment_method: Option<PaymentMethod>,
    pub settlement_ref: Option<String>,
}

impl CompletionSettlement {
    /// The signed change to the partner balance: the partner keeps 90% of a gateway payment, and owes 10% of a cash
    /// payment.
    pub fn balance_change(&self) -> Option<Vnd> {
        match self.payment_method {
            Some(PaymentMethod::Qr) => Some(self.amount.share(9, 10)),
            Some(PaymentMethod::Cash) => Some(-self.amount.share(1, 10)),
            None => None,
        }
    }
}

//--------------------------------------     Transaction       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub user_id: UserId,
    pub kind: TransactionKind,
    pub amount: Vnd,
    pub status: TransactionStatus,
    /// The correlation string the payer puts in the transfer memo. Only set for gateway intents.
    pub descriptor: Option<String>,
    pub balance_after: Option<Vnd>,
    pub appointment_id: Option<AppointmentId>,
    pub payment_method: Option<PaymentMethod>,
    pub settlement_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: UserId,
    pub kind: TransactionKind,
    pub amount: Vnd,
    pub status: TransactionStatus,
    pub descriptor: Option<String>,
    pub balance_after: Option<Vnd>,
    pub appointment_id: Option<AppointmentId>,
    pub payment_method: Option<PaymentMethod>,
    pub settlement_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewTransaction {
    pub fn pending(user_id: UserId, kind: TransactionKind, amount: Vnd) -> Self {
        Self {
            user_id,
            kind,
            amount,
            status: TransactionStatus::Pending,
            descriptor: None,
            balance_after: None,
            appointment_id: None,
            payment_method: None,
            settlement_ref: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_descriptor<S: Into<String>>(mut self, descriptor: S) -> Self {
        self.descriptor = Some(descriptor.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaidTransaction {
    pub id: TransactionId,
    pub client_id: UserId,
    pub partner_id: UserId,
    pub appointment_id: AppointmentId,
    pub amount: Vnd,
    pub descriptor: String,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPaidTransaction {
    pub client_id: UserId,
    pub partner_id: UserId,
    pub appointment_id: AppointmentId,
    pub amount: Vnd,
    pub descriptor: String,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------      Promotion        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DiscountKind {
    /// `value` is a percentage of the agreed price
    Percentage,
    /// `value` is a flat amount in dong
    Fixed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PromotionCategory {
    /// Available to everyone
    #[default]
    Global,
    /// Only for the clients on the target list
    Personal,
    /// Granted to new clients, who are added to the target list on sign-up
    Welcome,
    /// Available to everyone while the event runs
    Event,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Promotion {
    pub id: PromotionId,
    pub code: String,
    pub discount_kind: DiscountKind,
    pub value: i64,
    pub max_discount: Option<Vnd>,
    pub min_order_value: Option<Vnd>,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub category: PromotionCategory,
    pub target_clients: Json<Vec<UserId>>,
    /// Global cap on the number of redemptions. `None` means unlimited.
    pub usage_limit: Option<i64>,
    pub usage_per_user: i64,
    pub usage_count: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Promotion {
    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        self.start_date <= now
    }

    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        self.end_date.map(|end| end < now).unwrap_or(false)
    }

    pub fn is_running(&self, now: DateTime<Utc>) -> bool {
        self.has_started(now) && !self.has_expired(now)
    }

    pub fn has_target_list(&self) -> bool {
        !self.target_clients.is_empty()
    }

    pub fn targets(&self, client_id: &UserId) -> bool {
        self.target_clients.contains(client_id)
    }

    pub fn usage_limit_reached(&self) -> bool {
        self.usage_limit.map(|limit| self.usage_count >= limit).unwrap_or(false)
    }

    /// The discount this promotion grants on the given agreed price.
    ///
    /// Percentages round down to whole dong and are held to `max_discount` when it is positive. Fixed discounts are
    /// flat and ignore the cap.
    pub fn discount_for(&self, agreed_price: Vnd) -> Vnd {
        match self.discount_kind {
            DiscountKind::Percentage => {
                let discount = agreed_price.share(self.value, 100);
                match self.max_discount {
                    Some(cap) if cap.is_positive() && discount > cap => cap,
                    _ => discount,
                }
            },
            DiscountKind::Fixed => Vnd::from(self.value),
        }
    }
}

fn default_usage_per_user() -> i64 {
    1
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPromotion {
    pub code: String,
    pub discount_kind: DiscountKind,
    pub value: i64,
    #[serde(default)]
    pub max_discount: Option<Vnd>,
    #[serde(default)]
    pub min_order_value: Option<Vnd>,
    /// Defaults to the moment of creation
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub category: PromotionCategory,
    #[serde(default)]
    pub target_clients: Vec<UserId>,
    #[serde(default)]
    pub usage_limit: Option<i64>,
    #[serde(default = "default_usage_per_user")]
    pub usage_per_user: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl NewPromotion {
    pub fn new<S: Into<String>>(code: S, discount_kind: DiscountKind, value: i64) -> Self {
        Self {
            code: code.into(),
            discount_kind,
            value,
            max_discount: None,
            min_order_value: None,
            start_date: None,
            end_date: None,
            category: PromotionCategory::Global,
            target_clients: vec![],
            usage_limit: None,
            usage_per_user: 1,
            is_active: true,
        }
    }

    pub fn with_max_discount(mut self, cap: Vnd) -> Self {
        self.max_discount = Some(cap);
        self
    }

    pub fn with_category(mut self, category: PromotionCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_targets(mut self, targets: Vec<UserId>) -> Self {
        self.target_clients = targets;
        self
    }

    pub fn with_usage_limit(mut self, limit: i64) -> Self {
        self.usage_limit = Some(limit);
        self
    }

    pub fn with_usage_per_user(mut self, per_user: i64) -> Self {
        self.usage_per_user = per_user;
        self
    }

    pub fn with_window(mut self, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Self {
        self.start_date = Some(start);
        self.end_date = end;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionUsage {
    pub promotion_id: PromotionId,
    pub user_id: UserId,
    pub appointment_id: Option<AppointmentId>,
    pub used_at: DateTime<Utc>,
}

/// Everything written when a promotion is redeemed against an appointment.
#[derive(Debug, Clone)]
pub struct PromotionRedemption {
    pub promotion_id: PromotionId,
    pub code: String,
    pub user_id: UserId,
    pub appointment_id: AppointmentId,
    pub discount: Vnd,
}

//--------------------------------------        Rating         ---------------------------------------------------------
pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

/// A client's verdict on a finished job. There is at most one per appointment.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub id: RatingId,
    pub appointment_id: AppointmentId,
    pub client_id: UserId,
    pub partner_id: UserId,
    pub rating: i64,
    pub comment: String,
    pub images: Json<Vec<String>>,
    pub is_visible: bool,
    pub created_at: DateTime<Utc>,
}

/// What a client submits to rate an appointment. The partner is taken from the appointment; if `partner_id` is given
/// it must match.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRating {
    pub appointment_id: AppointmentId,
    pub client_id: UserId,
    #[serde(default)]
    pub partner_id: Option<UserId>,
    pub rating: i64,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub images: Vec<String>,
}

impl NewRating {
    pub fn new(appointment_id: AppointmentId, client_id: UserId, rating: i64) -> Self {
        Self { appointment_id, client_id, partner_id: None, rating, comment: String::default(), images: vec![] }
    }

    pub fn with_comment<S: Into<String>>(mut self, comment: S) -> Self {
        self.comment = comment.into();
        self
    }
}

//--------------------------------------   PartnerProfile      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerProfile {
    pub user_id: UserId,
    pub display_name: String,
    pub balance: Vnd,
    pub is_online: bool,
    pub is_locked: bool,
    pub last_online_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCategory {
    pub category: String,
    #[serde(default = "default_true")]
    pub approved: bool,
}

impl ServiceCategory {
    pub fn approved<S: Into<String>>(category: S) -> Self {
        Self { category: category.into(), approved: true }
    }
}

/// Registers (or refreshes) a partner. Balances are never set through here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPartnerProfile {
    pub user_id: UserId,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub categories: Vec<ServiceCategory>,
    #[serde(default)]
    pub is_online: bool,
    #[serde(default)]
    pub is_locked: bool,
}

impl NewPartnerProfile {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id, display_name: String::default(), categories: vec![], is_online: false, is_locked: false }
    }

    pub fn with_category<S: Into<String>>(mut self, category: S) -> Self {
        self.categories.push(ServiceCategory::approved(category));
        self
    }

    pub fn online(mut self) -> Self {
        self.is_online = true;
        self
    }
}

//--------------------------------------      ChatRoom         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoom {
    pub id: RoomId,
    pub order_id: OrderId,
    pub client_id: UserId,
    pub partner_id: UserId,
    pub created_at: DateTime<Utc>,
}
