//! Platform tracking API: the system of record for loads.

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use lt_domain::ParamBag;
use lt_ports::{DataSource, ProbeError, ProbePayload};

use super::{int_param, str_param};

/// Configuration for the platform API client.
#[derive(Debug, Clone)]
pub struct PlatformApiConfig {
    pub base_url: String,
    pub api_token: Option<String>,
}

impl PlatformApiConfig {
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("PLATFORM_API_URL").ok()?;
        Some(Self {
            base_url,
            api_token: std::env::var("PLATFORM_API_TOKEN").ok(),
        })
    }
}

/// Load lookup against the platform tracking API.
pub struct PlatformApiSource {
    config: PlatformApiConfig,
    client: reqwest::Client,
}

impl PlatformApiSource {
    pub fn new(config: PlatformApiConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn request(&self, url: String) -> reqwest::RequestBuilder {
        let mut request = self.client.get(url);
        if let Some(token) = &self.config.api_token {
            request = request.bearer_auth(token);
        }
        request
    }

    async fn fetch(&self, request: reqwest::RequestBuilder) -> Result<ProbePayload, ProbeError> {
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
                message: format!("platform API returned {status}"),
            }),
        }
    }
}

#[async_trait]
impl DataSource for PlatformApiSource {
    fn name(&self) -> &str {
        "platform"
    }

    fn capabilities(&self) -> Vec<String> {
        vec![
            "platform-load-lookup-by-id".to_string(),
            "platform-load-lookup-by-number".to_string(),
        ]
    }

    async fn invoke(
        &self,
        capability: &str,
        params: &ParamBag,
    ) -> Result<ProbePayload, ProbeError> {
        match capability {
            "platform-load-lookup-by-id" => {
                let tracking_id =
                    int_param(params, "tracking_id").ok_or_else(|| ProbeError::InvalidParams {
                        reason: "tracking_id required".to_string(),
                    })?;
                debug!(tracking_id, "looking up load by id");
                self.fetch(self.request(format!(
                    "{}/api/v1/loads/{tracking_id}",
                    self.config.base_url
                )))
                .await
            }
            "platform-load-lookup-by-number" => {
                let load_number =
                    str_param(params, "load_number").ok_or_else(|| ProbeError::InvalidParams {
                        reason: "load_number required".to_string(),
                    })?;
                debug!(load_number, "looking up load by number");
                let mut request = self
                    .request(format!("{}/api/v1/loads", self.config.base_url))
                    .query(&[("load_number", load_number)]);
                if let Some(shipper_id) = str_param(params, "shipper_id") {
                    request = request.query(&[("shipper_id", shipper_id)]);
                }
                self.fetch(request).await
            }
            other => Err(ProbeError::InvalidParams {
                reason: format!("unknown capability {other}"),
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

    fn source(base_url: String) -> PlatformApiSource {
        PlatformApiSource::new(PlatformApiConfig {
            base_url,
            api_token: None,
        })
    }

    #[tokio::test]
    async fn test_lookup_by_id_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/loads/607485162"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tracking_id": 607485162,
                "status": "In Transit",
                "carrier_id": "hardy-brothers"
            })))
            .mount(&server)
            .await;

        let mut params = ParamBag::new();
        params.insert("tracking_id".to_string(), ParamValue::Int(607485162));
        let payload = source(server.uri())
            .invoke("platform-load-lookup-by-id", &params)
            .await
            .unwrap();

        match payload {
            ProbePayload::Found(value) => {
                assert_eq!(value["status"], "In Transit");
            }
            ProbePayload::NotFound => panic!("expected found"),
        }
    }

    #[tokio::test]
    async fn test_lookup_by_number_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/loads"))
            .and(query_param("load_number", "TESTOP1999"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let mut params = ParamBag::new();
        params.insert(
            "load_number".to_string(),
            ParamValue::Str("TESTOP1999".to_string()),
        );
        let payload = source(server.uri())
            .invoke("platform-load-lookup-by-number", &params)
            .await
            .unwrap();
        assert_eq!(payload, ProbePayload::NotFound);
    }

    #[tokio::test]
    async fn test_server_error_is_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut params = ParamBag::new();
        params.insert("tracking_id".to_string(), ParamValue::Int(1));
        let result = source(server.uri())
            .invoke("platform-load-lookup-by-id", &params)
            .await;
        assert!(matches!(result, Err(ProbeError::Backend { .. })));
    }
}
