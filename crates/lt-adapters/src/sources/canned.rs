//! Canned in-memory data source for tests and demo runs.
//!
//! Serves fixed payloads per capability, optionally after a delay, and can
//! be scripted to fail. Used by the engine's end-to-end tests and by the
//! API when no real backends are configured.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use lt_domain::ParamBag;
use lt_ports::{DataSource, ProbeError, ProbePayload};

/// One scripted response.
#[derive(Debug, Clone)]
pub enum CannedResponse {
    Found(serde_json::Value),
    NotFound,
    Error(String),
    /// Sleep this long, then time out from the registry's perspective.
    Hang(Duration),
}

/// In-memory data source with scripted responses per capability.
pub struct CannedSource {
    name: String,
    responses: HashMap<String, CannedResponse>,
    invocations: Mutex<Vec<(String, ParamBag)>>,
}

impl CannedSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            responses: HashMap::new(),
            invocations: Mutex::new(Vec::new()),
        }
    }

    pub fn with_response(
        mut self,
        capability: impl Into<String>,
        response: CannedResponse,
    ) -> Self {
        self.responses.insert(capability.into(), response);
        self
    }

    pub fn with_payload(self, capability: impl Into<String>, payload: serde_json::Value) -> Self {
        self.with_response(capability, CannedResponse::Found(payload))
    }

    /// Capabilities invoked so far, with their parameters.
    pub fn invocations(&self) -> Vec<(String, ParamBag)> {
        self.invocations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

#[async_trait]
impl DataSource for CannedSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Vec<String> {
        self.responses.keys().cloned().collect()
    }

    async fn invoke(
        &self,
        capability: &str,
        params: &ParamBag,
    ) -> Result<ProbePayload, ProbeError> {
        self.invocations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((capability.to_string(), params.clone()));

        match self.responses.get(capability) {
            Some(CannedResponse::Found(payload)) => Ok(ProbePayload::Found(payload.clone())),
            Some(CannedResponse::NotFound) => Ok(ProbePayload::NotFound),
            Some(CannedResponse::Error(message)) => Err(ProbeError::Backend {
                message: message.clone(),
            }),
            Some(CannedResponse::Hang(duration)) => {
                tokio::time::sleep(*duration).await;
                Err(ProbeError::Backend {
                    message: "canned hang elapsed".to_string(),
                })
            }
            None => Err(ProbeError::InvalidParams {
                reason: format!("no canned response for {capability}"),
            }),
        }
    }
}
