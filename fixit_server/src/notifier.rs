//! HTTP clients for the real-time and push relays.
//!
//! Both relays are optional. When no URL is configured, notifications are written to the log instead, which is
//! enough for development and for running the marketplace without a socket gateway.
use std::sync::Arc;

use fixit_engine::traits::{CollaboratorError, PushSender, RealtimeNotifier};
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::ServerError;

fn build_client() -> Result<Client, ServerError> {
    let mut headers = HeaderMap::with_capacity(2);
    headers.insert("Accept", HeaderValue::from_static("application/json"));
    headers.insert("Content-Type", HeaderValue::from_static("application/json"));
    Client::builder()
        .user_agent("Fixit Marketplace Server")
        .default_headers(headers)
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .map_err(|e| ServerError::InitializeError(format!("Could not create the notification client. {e}")))
}

async fn post_json(client: &Client, url: &str, body: &Value) -> Result<reqwest::Response, CollaboratorError> {
    let response =
        client.post(url).json(body).send().await.map_err(|e| CollaboratorError::Unavailable(e.to_string()))?;
    if response.status().is_success() {
        Ok(response)
    } else {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        Err(CollaboratorError::Rejected(format!("{status}: {message}")))
    }
}

/// Forwards events to the real-time relay as `{ "topic": ..., "payload": ... }`.
#[derive(Clone)]
pub struct HttpNotifier {
    url: Option<String>,
    client: Arc<Client>,
}

impl HttpNotifier {
    pub fn new(url: Option<String>) -> Result<Self, ServerError> {
        let client = build_client()?;
        match &url {
            Some(u) => info!("📬️ Real-time events will be relayed to {u}"),
            None => warn!("📬️ No real-time relay is configured. Events will only be logged."),
        }
        Ok(Self { url, client: Arc::new(client) })
    }
}

impl RealtimeNotifier for HttpNotifier {
    async fn emit(&self, topic: &str, payload: Value) -> Result<(), CollaboratorError> {
        let Some(url) = &self.url else {
            info!("📬️ [{topic}] {payload}");
            return Ok(());
        };
        let body = json!({ "topic": topic, "payload": payload });
        post_json(&self.client, url, &body).await?;
        trace!("📬️ Relayed {topic}");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PushReceipt {
    #[serde(default)]
    message_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct PushRequest<'a> {
    token: &'a str,
    title: &'a str,
    body: &'a str,
}

/// Sends push messages through the push relay, one device token per request.
#[derive(Clone)]
pub struct HttpPushSender {
    url: Option<String>,
    client: Arc<Client>,
}

impl HttpPushSender {
    pub fn new(url: Option<String>) -> Result<Self, ServerError> {
        let client = build_client()?;
        if url.is_none() {
            warn!("📬️ No push relay is configured. Push messages will only be logged.");
        }
        Ok(Self { url, client: Arc::new(client) })
    }
}

impl PushSender for HttpPushSender {
    async fn send(&self, device_token: &str, title: &str, body: &str) -> Result<String, CollaboratorError> {
        let Some(url) = &self.url else {
            info!("📬️ Push to {device_token}: {title}. {body}");
            return Ok(String::from("logged"));
        };
        let request = serde_json::to_value(PushRequest { token: device_token, title, body })
            .map_err(|e| CollaboratorError::Rejected(e.to_string()))?;
        let response = post_json(&self.client, url, &request).await?;
        let receipt = response.json::<PushReceipt>().await.map_err(|e| CollaboratorError::Rejected(e.to_string()))?;
        Ok(receipt.message_id.unwrap_or_default())
    }
}
