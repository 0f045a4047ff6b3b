//! Structured log search against the columnar log store's HTTP interface.

use async_trait::async_trait;
use chrono::NaiveDate;

use lt_domain::{ParamBag, ParamValue};
use lt_ports::{DataSource, ProbeError, ProbePayload};

use super::str_param;

#[derive(Debug, Clone)]
pub struct LogSearchConfig {
    pub base_url: String,
    pub api_token: Option<String>,
}

impl LogSearchConfig {
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("LOG_STORE_URL").ok()?;
        Some(Self {
            base_url,
            api_token: std::env::var("LOG_STORE_TOKEN").ok(),
        })
    }
}

pub struct LogSearchSource {
    config: LogSearchConfig,
    client: reqwest::Client,
}

impl LogSearchSource {
    pub fn new(config: LogSearchConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

fn date_param(params: &ParamBag, name: &str) -> Option<NaiveDate> {
    match params.get(name) {
        Some(ParamValue::Date(d)) => Some(*d),
        _ => None,
    }
}

#[async_trait]
impl DataSource for LogSearchSource {
    fn name(&self) -> &str {
        "logs"
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["structured-log-search".to_string()]
    }

    async fn invoke(
        &self,
        _capability: &str,
        params: &ParamBag,
    ) -> Result<ProbePayload, ProbeError> {
        let service = str_param(params, "service").ok_or_else(|| ProbeError::InvalidParams {
            reason: "service required".to_string(),
        })?;
        let search = str_param(params, "search").ok_or_else(|| ProbeError::InvalidParams {
            reason: "search required".to_string(),
        })?;
        let start = date_param(params, "start").ok_or_else(|| ProbeError::InvalidParams {
            reason: "start required".to_string(),
        })?;
        let end = date_param(params, "end").ok_or_else(|| ProbeError::InvalidParams {
            reason: "end required".to_string(),
        })?;

        let mut body = serde_json::json!({
            "service": service,
            "search": search,
            "start": start.format("%Y-%m-%d").to_string(),
            "end": end.format("%Y-%m-%d").to_string(),
        });
        if let Some(tracking_id) = str_param(params, "tracking_id") {
            body["tracking_id"] = serde_json::Value::String(tracking_id.to_string());
        }

        let mut request = self
            .client
            .post(format!("{}/api/v1/logs/search", self.config.base_url))
            .json(&body);
        if let Some(token) = &self.config.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| ProbeError::Connection {
            message: e.to_string(),
        })?;

        if !response.status().is_success() {
            return Err(ProbeError::Backend {
                message: format!("log store returned {}", response.status()),
            });
        }

        let payload: serde_json::Value =
            response.json().await.map_err(|e| ProbeError::Backend {
                message: format!("invalid response body: {e}"),
            })?;

        // An empty result set is still a finding (count = 0), not NotFound:
        // the absence of matching log lines is evidence in itself.
        Ok(ProbePayload::Found(payload))
    }
}
