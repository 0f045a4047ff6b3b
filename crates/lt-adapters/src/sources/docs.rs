//! Keyword search over the wiki, chat archive, and issue tracker.
//!
//! Fans the same keyword set out to each configured space and merges the
//! hits into one result list of titles, snippets, and permalinks.

use async_trait::async_trait;
use tracing::debug;

use lt_domain::{ParamBag, ParamValue};
use lt_ports::{DataSource, ProbeError, ProbePayload};

use super::str_param;

#[derive(Debug, Clone)]
pub struct DocSearchConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    /// Spaces to search when the probe does not name one.
    pub default_spaces: Vec<String>,
}

impl DocSearchConfig {
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("DOC_SEARCH_URL").ok()?;
        let default_spaces = std::env::var("DOC_SEARCH_SPACES")
            .map(|s| s.split(',').map(|p| p.trim().to_string()).collect())
            .unwrap_or_else(|_| vec!["wiki".to_string(), "issues".to_string()]);
        Some(Self {
            base_url,
            api_token: std::env::var("DOC_SEARCH_TOKEN").ok(),
            default_spaces,
        })
    }
}

pub struct DocSearchSource {
    config: DocSearchConfig,
    client: reqwest::Client,
}

impl DocSearchSource {
    pub fn new(config: DocSearchConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    async fn search_space(
        &self,
        space: &str,
        keywords: &[String],
    ) -> Result<Vec<serde_json::Value>, ProbeError> {
        let mut request = self
            .client
            .get(format!("{}/api/v1/search", self.config.base_url))
            .query(&[("space", space), ("q", &keywords.join(" "))]);
        if let Some(token) = &self.config.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| ProbeError::Connection {
            message: e.to_string(),
        })?;
        if !response.status().is_success() {
            return Err(ProbeError::Backend {
                message: format!("doc search returned {}", response.status()),
            });
        }
        let body: serde_json::Value = response.json().await.map_err(|e| ProbeError::Backend {
            message: format!("invalid response body: {e}"),
        })?;
        Ok(body
            .get("results")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl DataSource for DocSearchSource {
    fn name(&self) -> &str {
        "docs"
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["kv-doc-search".to_string()]
    }

    async fn invoke(
        &self,
        _capability: &str,
        params: &ParamBag,
    ) -> Result<ProbePayload, ProbeError> {
        let keywords = match params.get("keywords") {
            Some(ParamValue::StrList(list)) if !list.is_empty() => list.clone(),
            _ => {
                return Err(ProbeError::InvalidParams {
                    reason: "keywords required".to_string(),
                })
            }
        };

        let spaces: Vec<String> = match str_param(params, "space") {
            Some(space) => vec![space.to_string()],
            None => self.config.default_spaces.clone(),
        };

        let mut results = Vec::new();
        for space in &spaces {
            // A failing space degrades the result set instead of failing
            // the whole probe.
            match self.search_space(space, &keywords).await {
                Ok(mut hits) => results.append(&mut hits),
                Err(e) => debug!(space = %space, error = %e, "doc search space failed"),
            }
        }

        Ok(ProbePayload::Found(serde_json::json!({
            "keywords": keywords,
            "spaces": spaces,
            "results": results,
        })))
    }
}
