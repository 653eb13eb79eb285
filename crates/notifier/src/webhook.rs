//! HTTP webhook delivery.
//!
//! Each dispatch is POSTed as the JSON-encoded `DispatchRequest` plus a
//! `timestamp`. When a secret is configured the body is signed with
//! HMAC-SHA256 and sent as `X-Signature-256: sha256=<hex>`.

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde_json::json;
use sha2::Sha256;

use crate::{DeliveryError, DeliveryProvider, DispatchRequest};

type HmacSha256 = Hmac<Sha256>;

pub struct WebhookProvider {
    http_client: Client,
    url: String,
    secret: Option<String>,
}

impl WebhookProvider {
    pub fn new(url: String, secret: Option<String>) -> Self {
        Self {
            http_client: Client::new(),
            url,
            secret,
        }
    }

    fn sign_payload(payload: &str, secret: &str) -> Result<String, DeliveryError> {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| DeliveryError::Transport(format!("Invalid webhook secret: {}", e)))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn render_payload(request: &DispatchRequest) -> Result<String, DeliveryError> {
        let payload = json!({
            "notification_id": request.notification_id,
            "title": request.title,
            "body": request.body,
            "audience": request.audience,
            "data": request.additional_data,
            "timestamp": Utc::now().to_rfc3339(),
        });
        Ok(serde_json::to_string(&payload)?)
    }
}

#[async_trait]
impl DeliveryProvider for WebhookProvider {
    async fn dispatch(&self, request: &DispatchRequest) -> Result<(), DeliveryError> {
        let payload = Self::render_payload(request)?;

        let mut http_request = self
            .http_client
            .post(&self.url)
            .header("Content-Type", "application/json");

        if let Some(secret) = &self.secret {
            let signature = Self::sign_payload(&payload, secret)?;
            http_request = http_request.header("X-Signature-256", format!("sha256={}", signature));
        }

        let response = http_request
            .body(payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(
                notification_id = %request.notification_id,
                status = status.as_u16(),
                "Webhook accepted notification"
            );
            Ok(())
        } else {
            let detail = response.text().await.unwrap_or_default();
            Err(DeliveryError::Rejected(format!(
                "Webhook returned {}: {}",
                status, detail
            )))
        }
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}
