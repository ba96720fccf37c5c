//! Payment descriptors.
//!
//! A descriptor is the short string a payer copies into the bank-transfer memo so that the gateway webhook can be
//! matched to the intent that produced it:
//!
//! * `TOPUP<24-hex user id>_<13-digit epoch ms>` for balance top-ups,
//! * `PAID<24-hex appointment id>_<13-digit epoch ms>` for job payments.
//!
//! Banks often wrap the memo in their own text (`MBVCB.3312.TOPUP65f...CT tu ...`), so parsing searches the whole
//! string. Some banks upper-case the memo, so hex ids are normalised to lower case.
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::db_types::{AppointmentId, UserId};

const TOP_UP_PREFIX: &str = "TOPUP";
const JOB_PAYMENT_PREFIX: &str = "PAID";

static TOP_UP_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"TOPUP([0-9a-fA-F]{24})(?:_(\d{13}))?").expect("top-up descriptor pattern"));
static JOB_PAYMENT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"PAID([0-9a-fA-F]{24})(?:_(\d{13}))?").expect("job payment descriptor pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorKind {
    TopUp,
    JobPayment,
}

impl DescriptorKind {
    /// Classifies free memo text. Top-ups take precedence when both markers appear.
    pub fn classify(text: &str) -> Option<Self> {
        if text.contains(TOP_UP_PREFIX) {
            Some(Self::TopUp)
        } else if text.contains(JOB_PAYMENT_PREFIX) {
            Some(Self::JobPayment)
        } else {
            None
        }
    }

    fn prefix(&self) -> &'static str {
        match self {
            Self::TopUp => TOP_UP_PREFIX,
            Self::JobPayment => JOB_PAYMENT_PREFIX,
        }
    }

    fn pattern(&self) -> &'static Regex {
        match self {
            Self::TopUp => &TOP_UP_PATTERN,
            Self::JobPayment => &JOB_PAYMENT_PATTERN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub kind: DescriptorKind,
    /// The embedded user id (top-ups) or appointment id (job payments), in lower case
    pub reference: String,
    /// Milliseconds since the unix epoch at intent creation. Absent when the payer dropped the suffix.
    pub timestamp: Option<i64>,
}

impl Descriptor {
    pub fn for_top_up(user_id: &UserId, at: DateTime<Utc>) -> Self {
        Self {
            kind: DescriptorKind::TopUp,
            reference: user_id.as_str().to_lowercase(),
            timestamp: Some(at.timestamp_millis()),
        }
    }

    pub fn for_job_payment(appointment_id: &AppointmentId, at: DateTime<Utc>) -> Self {
        Self {
            kind: DescriptorKind::JobPayment,
            reference: appointment_id.as_str().to_lowercase(),
            timestamp: Some(at.timestamp_millis()),
        }
    }

    /// Finds the first descriptor of the given kind anywhere in `text`.
    pub fn parse(kind: DescriptorKind, text: &str) -> Option<Self> {
        let captures = kind.pattern().captures(text)?;
        let reference = captures.get(1)?.as_str().to_lowercase();
        let timestamp = captures.get(2).and_then(|m| m.as_str().parse::<i64>().ok());
        Some(Self { kind, reference, timestamp })
    }

    /// The descriptor without its timestamp. Every intent for the same user (or appointment) shares this prefix.
    pub fn prefix(&self) -> String {
        format!("{}{}", self.kind.prefix(), self.reference)
    }

    /// The full descriptor, when the timestamp is known. This is the single-use key of one intent.
    pub fn exact(&self) -> Option<String> {
        self.timestamp.map(|ts| format!("{}_{ts:013}", self.prefix()))
    }
}

impl std::fmt::Display for Descriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.exact() {
            Some(s) => f.write_str(&s),
            None => f.write_str(&self.prefix()),
        }
    }
}
