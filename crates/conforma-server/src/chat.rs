//! Streaming chat route.
//!
//! Runs a full analysis for each request and relays its progress as SSE
//! events, then streams the synthesized answer token by token. Event kinds:
//! `status` per pipeline event, `requirements` once if any were extracted,
//! `token` per answer fragment, `done` exactly once on success, `error` as
//! the terminal event on any escape.

use std::convert::Infallible;
use std::pin::pin;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::error;

use conforma_core::{ChatTurn, DocumentSelection, PipelineResult};
use conforma_pipeline::{run_analysis, stream_answer, AnalysisContext};

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub chat_history: Vec<ChatTurn>,
    #[serde(default)]
    pub selected_regulatory: Vec<String>,
    #[serde(default)]
    pub selected_internal: Vec<String>,
}

/// A wire-level SSE event before axum framing.
#[derive(Debug)]
pub(crate) struct WireEvent {
    pub kind: &'static str,
    pub data: Value,
}

pub async fn stream(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = wire_events(state.ctx, request)
        .map(|e| Ok(Event::default().event(e.kind).data(e.data.to_string())));
    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Drive one analysis-plus-answer run, yielding wire events.
pub(crate) fn wire_events(
    ctx: AnalysisContext,
    request: ChatRequest,
) -> impl Stream<Item = WireEvent> + Send {
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        drive(ctx, request, tx).await;
    });
    ReceiverStream::new(rx)
}

async fn drive(ctx: AnalysisContext, request: ChatRequest, tx: mpsc::Sender<WireEvent>) {
    let internal = DocumentSelection::new(request.selected_internal);
    let regulatory = DocumentSelection::new(request.selected_regulatory);

    let mut result = PipelineResult::default();
    {
        let mut analysis = pin!(run_analysis(ctx.clone(), internal, regulatory));
        while let Some(event) = analysis.next().await {
            result = event.snapshot;
            let sent = send(
                &tx,
                "status",
                json!({
                    "message": event.message,
                    "requirements_count": result.requirements.len(),
                    "compliance_results_count": result.compliance_results.len(),
                }),
            )
            .await;
            if !sent {
                return;
            }
        }
    }

    if !result.requirements.is_empty() {
        let payload = json!({
            "requirements": result.requirements,
            "compliance_results": result.compliance_results,
        });
        if !send(&tx, "requirements", payload).await {
            return;
        }
    }

    let history: &[ChatTurn] = &request.chat_history;
    match stream_answer(&ctx, &request.message, &result, history).await {
        Ok(fragments) => {
            let mut fragments = pin!(fragments);
            while let Some(fragment) = fragments.next().await {
                match fragment {
                    Ok(token) => {
                        if !token.is_empty()
                            && !send(&tx, "token", json!({ "token": token })).await
                        {
                            return;
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "answer stream failed mid-flight");
                        send(&tx, "error", json!({ "error": e.to_string() })).await;
                        return;
                    }
                }
            }
        }
        Err(e) => {
            error!(error = %e, "answer synthesis failed");
            send(&tx, "error", json!({ "error": e.to_string() })).await;
            return;
        }
    }

    send(&tx, "done", json!({ "complete": true })).await;
}

async fn send(tx: &mpsc::Sender<WireEvent>, kind: &'static str, data: Value) -> bool {
    tx.send(WireEvent { kind, data }).await.is_ok()
}
