//! Investigation endpoints.
//!
//! The streaming endpoint frames progress events as SSE
//! (`event: <type>` / `data: <json>`); dropping the response stream cancels
//! the investigation, which propagates into outstanding probes and oracle
//! calls.

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::Stream;
use serde::Deserialize;
use tracing::{info, instrument};

use lt_domain::{route, IncidentRequest, ModeHint, RoutingDecision, Verdict};
use lt_engine::{InvestigationContext, Orchestrator};

use crate::handlers::{ApiError, ApiResult};
use crate::AppState;

/// Structured identifiers attached to an incoming incident.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestIdentifiers {
    #[serde(default)]
    pub ticket_id: Option<String>,
    #[serde(default)]
    pub load_number: Option<String>,
    #[serde(default)]
    pub tracking_id: Option<String>,
    #[serde(default)]
    pub shipper: Option<String>,
    #[serde(default)]
    pub carrier: Option<String>,
}

/// Wire shape of an investigation request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvestigateRequest {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub identifiers: Option<RequestIdentifiers>,
    #[serde(default)]
    pub mode_hint: Option<ModeHint>,
}

impl InvestigateRequest {
    fn into_incident(self) -> IncidentRequest {
        let identifiers = self.identifiers.unwrap_or_default();
        IncidentRequest {
            description: self.description,
            ticket_id: identifiers.ticket_id,
            load_number: identifiers.load_number,
            tracking_id: identifiers.tracking_id,
            shipper: identifiers.shipper,
            carrier: identifiers.carrier,
            mode_hint: self.mode_hint,
        }
    }
}

fn validated_incident(request: InvestigateRequest) -> Result<IncidentRequest, ApiError> {
    let incident = request.into_incident();
    if !incident.has_usable_input() {
        return Err(ApiError::BadRequest {
            message: "provide a description, load number, or tracking id".to_string(),
        });
    }
    Ok(incident)
}

/// Run an investigation, streaming progress events over SSE.
#[instrument(skip(state, body))]
pub async fn investigate_stream(
    State(state): State<AppState>,
    Json(body): Json<InvestigateRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let incident = body.into_incident();

    let (ctx, mut events) =
        InvestigationContext::new(state.config, state.registry, state.oracle);
    let orchestrator = Orchestrator::new(ctx);

    // The orchestrator runs detached; the event stream is the only link to
    // the consumer, and dropping it cancels the run.
    tokio::spawn(async move {
        let verdict = orchestrator.run(incident).await;
        info!(
            category = verdict.root_cause_category.as_str(),
            needs_human = verdict.needs_human,
            "streamed investigation finished"
        );
    });

    let stream = async_stream::stream! {
        while let Some(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(data) => yield Ok(Event::default().event(event.event_name()).data(data)),
                Err(e) => {
                    tracing::error!(error = %e, "failed to serialize progress event");
                }
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Run an investigation to completion and return the verdict.
#[instrument(skip(state, body))]
pub async fn investigate(
    State(state): State<AppState>,
    Json(body): Json<InvestigateRequest>,
) -> ApiResult<Json<Verdict>> {
    let incident = validated_incident(body)?;

    let (ctx, events) = InvestigationContext::new(state.config, state.registry, state.oracle);
    let orchestrator = Orchestrator::new(ctx);
    let verdict = orchestrator.run(incident).await;

    // Keep the consumer side alive until the run is over so the engine
    // never observes a disconnect; the buffered events are discarded.
    drop(events);

    Ok(Json(verdict))
}

/// Routing decision only: no probes, no oracle calls.
#[instrument(skip(_state, body))]
pub async fn route_explain(
    State(_state): State<AppState>,
    Json(body): Json<InvestigateRequest>,
) -> ApiResult<Json<RoutingDecision>> {
    let incident = validated_incident(body)?;
    Ok(Json(route(&incident)))
}
