use std::fmt::Display;

use fixit_engine::db_types::{AppointmentId, PartnerProfile, ServiceCategory, UserId, Vnd};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

//----------------------------------------------   Orders  ----------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectApplicantRequest {
    pub partner_id: UserId,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrdersQuery {
    #[serde(default)]
    pub client_id: Option<UserId>,
}

/// `?types=electricity,plumbing`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypesQuery {
    #[serde(default)]
    pub types: String,
}

impl TypesQuery {
    pub fn categories(&self) -> Vec<String> {
        self.types.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()
    }
}

//----------------------------------------------   Appointments  ----------------------------------------------------
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    #[serde(default)]
    pub reason: String,
}

//----------------------------------------------   Payments  ----------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountRequest {
    pub user_id: UserId,
    pub amount: Vnd,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPaymentRequest {
    pub client_id: UserId,
    pub partner_id: UserId,
    pub appointment_id: AppointmentId,
    pub amount: Vnd,
}

//----------------------------------------------   Promotions  ----------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyPromotionRequest {
    pub appointment_id: AppointmentId,
    pub code: String,
    pub user_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollRequest {
    pub client_id: UserId,
}

//----------------------------------------------   Partners  ----------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerResponse {
    #[serde(flatten)]
    pub profile: PartnerProfile,
    pub categories: Vec<ServiceCategory>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnlineRequest {
    pub online: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceTokenRequest {
    pub user_id: UserId,
    pub token: String,
}
