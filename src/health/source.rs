//! Custom health sources
//!
//! A health source reports an opaque, externally computed verdict for the
//! current mode. It is either an in-process function supplied by the
//! embedding application or a remote HTTP endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Certificate, Client};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{HealthRequest, HealthStatus};
use crate::error::{Error, Result};

/// Opaque health verdict provider
#[async_trait]
pub trait HealthSource: Send + Sync {
    async fn check(&self, request: &HealthRequest) -> Result<HealthStatus>;
}

/// Health source backed by an embedder-supplied function
pub struct FnHealthSource<F>(Arc<F>);

impl<F> FnHealthSource<F>
where
    F: Fn(&HealthRequest) -> anyhow::Result<HealthStatus> + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self(Arc::new(f))
    }
}

#[async_trait]
impl<F> HealthSource for FnHealthSource<F>
where
    F: Fn(&HealthRequest) -> anyhow::Result<HealthStatus> + Send + Sync + 'static,
{
    async fn check(&self, request: &HealthRequest) -> Result<HealthStatus> {
        (self.0)(request).map_err(|e| Error::HealthCheckError(format!("{e:#}")))
    }
}

/// Body returned by an external health endpoint
#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    message: String,
}

/// Health source that queries `GET <endpoint>?mode=<m>&fullHealth=<b>`.
///
/// Never fails: transport errors, non-200 responses, malformed bodies and
/// unknown status values all map to [`HealthStatus::Down`].
#[derive(Clone)]
pub struct EndpointHealthSource {
    client: Client,
    endpoint: String,
}

impl EndpointHealthSource {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Build a client for `endpoint`, trusting `ca_pem` in addition to the
    /// built-in roots when given
    pub fn new(endpoint: impl Into<String>, ca_pem: Option<&[u8]>) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(Self::DEFAULT_TIMEOUT)
            .user_agent(concat!("disaster-recovery-daemon/", env!("CARGO_PKG_VERSION")));
        if let Some(pem) = ca_pem {
            let cert = Certificate::from_pem(pem).map_err(Error::HttpError)?;
            builder = builder.add_root_certificate(cert);
        }
        let client = builder.build().map_err(Error::HttpError)?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    async fn fetch(&self, request: &HealthRequest) -> Result<HealthStatus> {
        let full_health = request.full_health.to_string();
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("mode", request.mode.as_str()), ("fullHealth", full_health.as_str())])
            .send()
            .await?;

        if resp.status() != reqwest::StatusCode::OK {
            return Err(Error::HealthCheckError(format!(
                "health endpoint returned HTTP {}",
                resp.status()
            )));
        }

        let body: StatusResponse = resp.json().await.map_err(|e| {
            Error::HealthCheckError(format!("can not evaluate status from health endpoint: {e}"))
        })?;
        let status = body.status.parse::<HealthStatus>().map_err(|_| {
            Error::HealthCheckError(format!(
                "status from health endpoint must be up, degraded or down, but '{}' was given",
                body.status
            ))
        })?;
        if !body.message.is_empty() {
            info!(%status, message = %body.message, "External health endpoint reported status");
        }
        Ok(status)
    }
}

#[async_trait]
impl HealthSource for EndpointHealthSource {
    async fn check(&self, request: &HealthRequest) -> Result<HealthStatus> {
        debug!(endpoint = %self.endpoint, mode = %request.mode, "Querying external health endpoint");
        match self.fetch(request).await {
            Ok(status) => Ok(status),
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "External health check failed, reporting down");
                Ok(HealthStatus::Down)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(mode: &str, full_health: bool) -> HealthRequest {
        HealthRequest {
            mode: mode.to_string(),
            full_health,
        }
    }

    // ── FnHealthSource ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_fn_source_passes_request_through() {
        let source = FnHealthSource::new(|req: &HealthRequest| {
            Ok(if req.mode == "active" { HealthStatus::Up } else { HealthStatus::Degraded })
        });
        assert_eq!(source.check(&request("active", false)).await.unwrap(), HealthStatus::Up);
        assert_eq!(
            source.check(&request("standby", false)).await.unwrap(),
            HealthStatus::Degraded
        );
    }

    #[tokio::test]
    async fn test_fn_source_error_is_health_error() {
        let source = FnHealthSource::new(|_: &HealthRequest| anyhow::bail!("health check exploded"));
        let err = source.check(&request("active", false)).await.unwrap_err();
        assert!(matches!(err, Error::HealthCheckError(ref m) if m == "health check exploded"));
    }

    // ── EndpointHealthSource ───────────────────────────────────────────────

    #[tokio::test]
    async fn test_endpoint_reports_status_case_insensitive() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .and(query_param("mode", "standby"))
            .and(query_param("fullHealth", "true"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status": "DEGRADED", "message": "lagging"})),
            )
            .mount(&server)
            .await;

        let source = EndpointHealthSource::new(format!("{}/health", server.uri()), None).unwrap();
        let status = source.check(&request("standby", true)).await.unwrap();
        assert_eq!(status, HealthStatus::Degraded);
    }

    #[tokio::test]
    async fn test_endpoint_non_200_is_down() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let source = EndpointHealthSource::new(server.uri(), None).unwrap();
        assert_eq!(source.check(&request("active", false)).await.unwrap(), HealthStatus::Down);
    }

    #[tokio::test]
    async fn test_endpoint_unknown_status_is_down() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "green"})),
            )
            .mount(&server)
            .await;

        let source = EndpointHealthSource::new(server.uri(), None).unwrap();
        assert_eq!(source.check(&request("active", false)).await.unwrap(), HealthStatus::Down);
    }

    #[tokio::test]
    async fn test_endpoint_malformed_body_is_down() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let source = EndpointHealthSource::new(server.uri(), None).unwrap();
        assert_eq!(source.check(&request("active", false)).await.unwrap(), HealthStatus::Down);
    }

    #[tokio::test]
    async fn test_endpoint_unreachable_is_down() {
        // Port 1 is reserved and nothing listens there
        let source = EndpointHealthSource::new("http://127.0.0.1:1/health", None).unwrap();
        assert_eq!(source.check(&request("active", false)).await.unwrap(), HealthStatus::Down);
    }
}
