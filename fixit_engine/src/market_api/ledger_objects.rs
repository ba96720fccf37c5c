use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    db_types::{AppointmentId, TransactionId, TransactionKind, Vnd},
    traits::MarketError,
};

pub const DEFAULT_QR_BASE_URL: &str = "https://qr.sepay.vn/img";
pub const DEFAULT_MERCHANT_ACCOUNT: &str = "0000000000";
pub const DEFAULT_MERCHANT_BANK: &str = "MB";

/// Where payers are sent to make a bank transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub qr_base_url: String,
    pub merchant_account: String,
    pub bank_code: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            qr_base_url: DEFAULT_QR_BASE_URL.to_string(),
            merchant_account: DEFAULT_MERCHANT_ACCOUNT.to_string(),
            bank_code: DEFAULT_MERCHANT_BANK.to_string(),
        }
    }
}

impl GatewayConfig {
    /// The deep link a payer opens to transfer `amount` with `descriptor` in the memo. `None` if the base URL is
    /// malformed.
    pub fn deep_link(&self, amount: Vnd, descriptor: &str) -> Option<url::Url> {
        url::Url::parse_with_params(&self.qr_base_url, &[
            ("acc", self.merchant_account.as_str()),
            ("bank", self.bank_code.as_str()),
            ("amount", amount.value().to_string().as_str()),
            ("des", descriptor),
        ])
        .ok()
    }
}

/// A freshly created payment intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub transaction_id: TransactionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descriptor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_url: Option<String>,
}

/// The inbound notification from the payment gateway. Gateways disagree on field names, so several are accepted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default)]
    pub transfer_amount: Option<Value>,
}

fn parse_amount(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.round() as i64))
        },
        _ => None,
    }
}

impl WebhookPayload {
    pub fn new<S: Into<String>>(description: S, amount: i64) -> Self {
        Self { description: Some(description.into()), amount: Some(Value::from(amount)), ..Default::default() }
    }

    /// The free text carrying the descriptor: the first non-empty of `description`, `content` and `code`.
    pub fn memo(&self) -> Option<&str> {
        [&self.description, &self.content, &self.code]
            .into_iter()
            .filter_map(|f| f.as_deref())
            .find(|s| !s.trim().is_empty())
    }

    /// `amount`, falling back to `transferAmount`. Anything missing or unparseable counts as zero.
    pub fn paid_amount(&self) -> Vnd {
        let amount = [&self.amount, &self.transfer_amount]
            .into_iter()
            .filter_map(|v| v.as_ref().and_then(parse_amount))
            .find(|v| *v != 0)
            .unwrap_or(0);
        Vnd::from(amount)
    }
}

/// Why a webhook could not be reconciled. These are normal outcomes, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationFailure {
    UnknownTransactionType,
    InvalidFormat,
    NotFound,
    AmountMismatch,
    UpdateBalanceFailed,
    AppointmentNotFound,
    SettlementFailed,
}

impl std::fmt::Display for ReconciliationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::UnknownTransactionType => "unknown_transaction_type",
            Self::InvalidFormat => "invalid_format",
            Self::NotFound => "not_found",
            Self::AmountMismatch => "amount_mismatch",
            Self::UpdateBalanceFailed => "update_balance_failed",
            Self::AppointmentNotFound => "appointment_not_found",
            Self::SettlementFailed => "settlement_failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookOutcome {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<ReconciliationFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_balance: Option<Vnd>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment_id: Option<AppointmentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Vnd>,
}

impl WebhookOutcome {
    pub fn failed(reason: ReconciliationFailure) -> Self {
        Self { ok: false, reason: Some(reason), new_balance: None, appointment_id: None, amount: None }
    }

    pub fn top_up(new_balance: Vnd) -> Self {
        Self { ok: true, reason: None, new_balance: Some(new_balance), appointment_id: None, amount: None }
    }

    pub fn job_payment(appointment_id: AppointmentId, amount: Vnd) -> Self {
        Self { ok: true, reason: None, new_balance: None, appointment_id: Some(appointment_id), amount: Some(amount) }
    }
}

/// Optional filters on a user's transaction history. `month` and `week` each need a `year`, and cannot be combined.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionPeriod {
    #[serde(default, rename = "type")]
    pub kind: Option<TransactionKind>,
    #[serde(default)]
    pub week: Option<u32>,
    #[serde(default)]
    pub month: Option<u32>,
    #[serde(default)]
    pub year: Option<i32>,
}

const SUPPORTED_YEARS: std::ops::RangeInclusive<i32> = 1970..=9999;

fn start_of(date: Option<NaiveDate>) -> Option<DateTime<Utc>> {
    date.and_then(|d| d.and_hms_opt(0, 0, 0)).map(|d| Utc.from_utc_datetime(&d))
}

impl TransactionPeriod {
    /// The `[since, until)` window the filter describes, in UTC. `None` when no calendar filter was given.
    pub fn window(&self) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, MarketError> {
        let invalid = |msg: &str| MarketError::ValidationError(msg.to_string());
        match (self.year, self.month, self.week) {
            (None, None, None) => Ok(None),
            (None, _, _) => Err(invalid("A month or week filter needs a year")),
            (Some(_), Some(_), Some(_)) => Err(invalid("Filter by month or by week, not both")),
            (Some(year), _, _) if !SUPPORTED_YEARS.contains(&year) => Err(invalid("year must be between 1970 and 9999")),
            (Some(year), None, None) => {
                let since = start_of(NaiveDate::from_ymd_opt(year, 1, 1));
                let until = start_of(NaiveDate::from_ymd_opt(year + 1, 1, 1));
                since.zip(until).map(Some).ok_or_else(|| invalid("Invalid year"))
            },
            (Some(year), Some(month), None) => {
                if !(1..=12).contains(&month) {
                    return Err(invalid("month must be between 1 and 12"));
                }
                let since = start_of(NaiveDate::from_ymd_opt(year, month, 1));
                let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
                let until = start_of(NaiveDate::from_ymd_opt(next_year, next_month, 1));
                since.zip(until).map(Some).ok_or_else(|| invalid("Invalid month"))
            },
            (Some(year), None, Some(week)) => {
                let since = start_of(NaiveDate::from_isoywd_opt(year, week, Weekday::Mon))
                    .ok_or_else(|| invalid("Invalid ISO week for that year"))?;
                Ok(Some((since, since + Duration::days(7))))
            },
        }
    }
}
