//! Webhook delivery history: per-tracking-id callback attempts with HTTP
//! outcome codes.

use async_trait::async_trait;
use reqwest::StatusCode;

use lt_domain::ParamBag;
use lt_ports::{DataSource, ProbeError, ProbePayload};

use super::{int_param, str_param};

#[derive(Debug, Clone)]
pub struct WebhookHistoryConfig {
    pub base_url: String,
    pub api_token: Option<String>,
}

impl WebhookHistoryConfig {
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("WEBHOOK_HISTORY_URL").ok()?;
        Some(Self {
            base_url,
            api_token: std::env::var("WEBHOOK_HISTORY_TOKEN").ok(),
        })
    }
}

pub struct WebhookHistorySource {
    config: WebhookHistoryConfig,
    client: reqwest::Client,
}

impl WebhookHistorySource {
    pub fn new(config: WebhookHistoryConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl DataSource for WebhookHistorySource {
    fn name(&self) -> &str {
        "webhook"
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["webhook-delivery-history".to_string()]
    }

    async fn invoke(
        &self,
        _capability: &str,
        params: &ParamBag,
    ) -> Result<ProbePayload, ProbeError> {
        let tracking_id =
            str_param(params, "tracking_id").ok_or_else(|| ProbeError::InvalidParams {
                reason: "tracking_id required".to_string(),
            })?;
        let window_days = int_param(params, "window_days").unwrap_or(7);

        let mut request = self
            .client
            .get(format!(
                "{}/api/v1/callbacks/{tracking_id}",
                self.config.base_url
            ))
            .query(&[("window_days", window_days.to_string())]);
        if let Some(token) = &self.config.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| ProbeError::Connection {
            message: e.to_string(),
        })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(ProbePayload::NotFound),
            status if status.is_success() => {
                let payload: serde_json::Value =
                    response.json().await.map_err(|e| ProbeError::Backend {
                        message: format!("invalid response body: {e}"),
                    })?;
                Ok(ProbePayload::Found(payload))
            }
            status => Err(ProbeError::Backend {
                message: format!("webhook history API returned {status}"),
            }),
        }
    }
}
