//! # Meta Conversions API
//!
//! Reports qualified leads to the Meta (Facebook) Conversions API as server
//! events. Only hashed user data leaves the process.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value, json};
use tracing::{info, warn};

use super::{ConversionEvent, ConversionReporter, ForwardError};
use crate::config::MetaConfig;

const ACTION_SOURCE: &str = "website";
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Map a canonical stage to a Meta standard event name.
pub fn event_name_for_stage(stage: &str) -> &'static str {
    match stage {
        "won" => "Purchase",
        "interested" => "Schedule",
        _ => "Lead",
    }
}

/// Build the `POST /events` body for a single conversion.
pub fn build_event_payload(
    event: &ConversionEvent,
    currency: &str,
    test_event_code: Option<&str>,
) -> Value {
    let mut user_data = Map::new();
    let hashed = [
        ("em", &event.user_data.email_hash),
        ("ph", &event.user_data.phone_hash),
        ("fn", &event.user_data.first_name_hash),
        ("ln", &event.user_data.last_name_hash),
    ];
    for (key, digest) in hashed {
        if let Some(digest) = digest {
            user_data.insert(key.to_string(), json!([digest]));
        }
    }

    let mut body = json!({
        "data": [{
            "event_name": event_name_for_stage(&event.stage),
            "event_time": event.event_time.timestamp(),
            "action_source": ACTION_SOURCE,
            "event_id": event.lead_id,
            "user_data": user_data,
            "custom_data": {
                "lead_stage": event.stage,
                "value": event.value,
                "currency": currency,
            },
        }]
    });

    if let Some(code) = test_event_code {
        body["test_event_code"] = json!(code);
    }

    body
}

/// [`ConversionReporter`] backed by the Graph API.
#[derive(Debug, Clone)]
pub struct MetaConversionsClient {
    client: Client,
    endpoint: String,
    access_token: String,
    test_event_code: Option<String>,
    currency: String,
}

impl MetaConversionsClient {
    /// Build a client from configuration. Returns `Ok(None)` when no pixel
    /// id and access token are configured.
    pub fn from_config(config: &MetaConfig) -> Result<Option<Self>, ForwardError> {
        let (Some(pixel_id), Some(access_token)) = (&config.pixel_id, &config.access_token) else {
            return Ok(None);
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        let endpoint = format!(
            "{}/{}/{}/events",
            config.graph_base.trim_end_matches('/'),
            config.api_version,
            pixel_id
        );

        Ok(Some(Self {
            client,
            endpoint,
            access_token: access_token.clone(),
            test_event_code: config.test_event_code.clone(),
            currency: config.currency.clone(),
        }))
    }

    /// Events endpoint, without the access token.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ConversionReporter for MetaConversionsClient {
    async fn report(&self, event: &ConversionEvent) -> Result<(), ForwardError> {
        let payload = build_event_payload(event, &self.currency, self.test_event_code.as_deref());

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("access_token", self.access_token.as_str())])
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            warn!(
                lead_id = %event.lead_id,
                status = status.as_u16(),
                "Meta Conversions API rejected event"
            );
            return Err(ForwardError::Status {
                status: status.as_u16(),
                body,
            });
        }

        info!(
            lead_id = %event.lead_id,
            event_name = event_name_for_stage(&event.stage),
            "Conversion reported to Meta"
        );
        Ok(())
    }
}
