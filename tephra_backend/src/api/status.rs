use super::{ApiResult, AppState};
use crate::diagnostics::{collect_report, DebugReport};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
    version: &'static str,
    api_port: u16,
    remote_configured: bool,
}

pub(crate) async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        api_port: state.config.api_port,
        remote_configured: state.config.remote.is_some(),
    })
}

pub(crate) async fn debug_report(State(state): State<AppState>) -> ApiResult<DebugReport> {
    let report = collect_report(
        &state.config,
        &state.http_client,
        &state.posts,
        &state.comments,
    )
    .await;
    Ok(Json(report))
}

#[derive(Serialize)]
pub(crate) struct InspectInfo {
    ok: bool,
    note: &'static str,
}

pub(crate) async fn inspect_info() -> Json<InspectInfo> {
    Json(InspectInfo {
        ok: true,
        note: "POST to this endpoint to inspect headers and raw body",
    })
}

#[derive(Serialize)]
pub(crate) struct InspectEcho {
    headers: Map<String, Value>,
    raw: Option<String>,
}

/// Echoes the request back at the sender. Handy when a reverse proxy or
/// client SDK is suspected of rewriting headers or mangling the body.
pub(crate) async fn inspect_echo(headers: HeaderMap, body: Option<String>) -> Json<InspectEcho> {
    let mut echoed = Map::new();
    for (name, value) in headers.iter() {
        echoed.insert(
            name.as_str().to_string(),
            Value::String(String::from_utf8_lossy(value.as_bytes()).into_owned()),
        );
    }
    Json(InspectEcho {
        headers: echoed,
        raw: body,
    })
}
