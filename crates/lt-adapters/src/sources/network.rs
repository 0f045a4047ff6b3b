//! Network relationship API: shipper↔carrier links, tracking permissions,
//! and configured identifier mappings.

use async_trait::async_trait;
use reqwest::StatusCode;

use lt_domain::ParamBag;
use lt_ports::{DataSource, ProbeError, ProbePayload};

use super::str_param;

#[derive(Debug, Clone)]
pub struct NetworkApiConfig {
    pub base_url: String,
    pub api_token: Option<String>,
}

impl NetworkApiConfig {
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("NETWORK_API_URL").ok()?;
        Some(Self {
            base_url,
            api_token: std::env::var("NETWORK_API_TOKEN").ok(),
        })
    }
}

pub struct NetworkApiSource {
    config: NetworkApiConfig,
    client: reqwest::Client,
}

impl NetworkApiSource {
    pub fn new(config: NetworkApiConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl DataSource for NetworkApiSource {
    fn name(&self) -> &str {
        "network"
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["network-relationship".to_string()]
    }

    async fn invoke(
        &self,
        _capability: &str,
        params: &ParamBag,
    ) -> Result<ProbePayload, ProbeError> {
        let shipper_id = str_param(params, "shipper_id").ok_or_else(|| ProbeError::InvalidParams {
            reason: "shipper_id required".to_string(),
        })?;
        let carrier_id = str_param(params, "carrier_id").ok_or_else(|| ProbeError::InvalidParams {
            reason: "carrier_id required".to_string(),
        })?;

        let mut request = self
            .client
            .get(format!("{}/api/v1/relationships", self.config.base_url))
            .query(&[("shipper_id", shipper_id), ("carrier_id", carrier_id)]);
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
                message: format!("network API returned {status}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lt_domain::ParamValue;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_relationship_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/relationships"))
            .and(query_param("shipper_id", "walmart"))
            .and(query_param("carrier_id", "hardy-brothers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "active": true,
                "eld_enabled": false,
                "tracking_methods": ["mobile_app"]
            })))
            .mount(&server)
            .await;

        let source = NetworkApiSource::new(NetworkApiConfig {
            base_url: server.uri(),
            api_token: None,
        });

        let mut params = ParamBag::new();
        params.insert(
            "shipper_id".to_string(),
            ParamValue::Str("walmart".to_string()),
        );
        params.insert(
            "carrier_id".to_string(),
            ParamValue::Str("hardy-brothers".to_string()),
        );

        match source.invoke("network-relationship", &params).await.unwrap() {
            ProbePayload::Found(value) => {
                assert_eq!(value["active"], true);
                assert_eq!(value["eld_enabled"], false);
            }
            ProbePayload::NotFound => panic!("expected found"),
        }
    }
}
