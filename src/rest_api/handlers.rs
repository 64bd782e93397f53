//! HTTP handlers for the REST API

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, info, instrument, warn};

use super::auth::AuthDecision;
use super::dto::{failed_state, HealthResponse};
use super::server::AppState;
use crate::crd::SwitchoverState;
use crate::switchover::RequestData;

type StateResponse = (StatusCode, Json<SwitchoverState>);

/// Mode requests are a few dozen bytes
const MAX_REQUEST_BODY: usize = 64 * 1024;

fn failed(mode: impl Into<String>, comment: impl Into<String>) -> StateResponse {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(failed_state(mode, comment)),
    )
}

/// Rejects requests the configured authenticator does not accept
pub async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    match state.authenticator.check(request.headers()).await {
        AuthDecision::Allowed => next.run(request).await,
        AuthDecision::Denied { token_sent } => {
            warn!(path = %request.uri().path(), "Unauthorized request");
            let mut response = (StatusCode::UNAUTHORIZED, "Access denied").into_response();
            if !token_sent {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
            }
            response
        }
    }
}

/// Current persisted state, unauthenticated
#[instrument(skip(state))]
pub async fn health(State(state): State<AppState>) -> StateResponse {
    match state.reader.get_mode_and_status().await {
        Ok(current) => (StatusCode::OK, Json(current)),
        Err(e) => {
            error!(error = %e, "Can not read disaster recovery state");
            failed("", format!("Can not get a disaster recovery state. Error is [{e}]"))
        }
    }
}

/// Aggregated service health for the current mode
#[instrument(skip(state))]
pub async fn healthz(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    info!("New request for disaster recovery service health has been received");
    match state.health.get_health().await {
        Ok(status) => {
            info!(%status, "The disaster recovery health state");
            #[cfg(feature = "metrics")]
            crate::controller::metrics::inc_health_check(status.as_str());
            (StatusCode::OK, Json(HealthResponse { status }))
        }
        Err(e) => {
            error!(error = %e, "Can not get the service health");
            #[cfg(feature = "metrics")]
            crate::controller::metrics::inc_health_check("error");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(HealthResponse::down()))
        }
    }
}

#[instrument(skip(state))]
pub async fn get_mode(State(state): State<AppState>) -> StateResponse {
    info!("New request for disaster recovery status has been received");
    match state.reader.get_mode_and_status().await {
        Ok(current) => {
            info!(mode = %current.mode, status = %current.status, "The disaster recovery status");
            (StatusCode::OK, Json(current))
        }
        Err(e) => {
            let comment = format!("Can not get a disaster recovery state. Error is [{e}]");
            error!("{comment}");
            failed("", comment)
        }
    }
}

/// Mode-change request. The body is parsed here so malformed JSON still gets
/// a switchover-shaped answer.
#[instrument(skip(state, body))]
pub async fn set_mode(State(state): State<AppState>, body: Body) -> StateResponse {
    let bytes = match to_bytes(body, MAX_REQUEST_BODY).await {
        Ok(bytes) => bytes,
        Err(e) => {
            let comment = format!("Reading data from request failed. Error is [{e}]");
            error!("{comment}");
            return failed("", comment);
        }
    };
    let data: RequestData = match serde_json::from_slice(&bytes) {
        Ok(data) => data,
        Err(e) => {
            let comment = format!("Unmarshalling data from request failed. Error is [{e}]");
            error!("{comment}");
            return failed("", comment);
        }
    };
    info!(mode = %data.mode, no_wait = ?data.no_wait, "New request for disaster recovery mode changing has been received");

    match state.orchestrator.set_mode(data).await {
        Ok(accepted) => (StatusCode::OK, Json(accepted)),
        Err(rejected) => {
            error!(error = %rejected, "Can not set disaster recovery mode");
            failed(rejected.state.mode, rejected.state.comment)
        }
    }
}

/// Prometheus text exposition
#[cfg(feature = "metrics")]
pub async fn metrics() -> Result<String, StatusCode> {
    use prometheus_client::encoding::text::encode;

    let mut buffer = String::new();
    encode(&mut buffer, &crate::controller::metrics::REGISTRY).map_err(|e| {
        error!(error = %e, "Failed to encode metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(buffer)
}
