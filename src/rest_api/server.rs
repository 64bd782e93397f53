//! Axum HTTP server for the REST API

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::get,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::auth::Authenticator;
use super::handlers;
use crate::config::ServerConfig;
use crate::health::HealthAggregator;
use crate::switchover::{ModeReader, SwitchoverOrchestrator};
use crate::{Error, Result};

/// Grace period for in-flight requests after shutdown is requested
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub reader: ModeReader,
    pub orchestrator: SwitchoverOrchestrator,
    pub health: Arc<HealthAggregator>,
    pub authenticator: Arc<dyn Authenticator>,
}

/// Routes of the daemon: `/health` is open, the rest require authentication
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/healthz", get(handlers::healthz))
        .route(
            "/sitemanager",
            get(handlers::get_mode).post(handlers::set_mode),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            handlers::require_auth,
        ));

    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected);

    #[cfg(feature = "metrics")]
    let app = app.route("/metrics", get(handlers::metrics));

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Build a rustls server configuration from PEM-encoded certificate chain and key
pub fn build_tls_server_config(cert_pem: &[u8], key_pem: &[u8]) -> Result<rustls::ServerConfig> {
    let certs = CertificateDer::pem_slice_iter(cert_pem)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::TlsError(format!("Failed to parse certificates: {}", e)))?;
    if certs.is_empty() {
        return Err(Error::TlsError("No certificate found in PEM data".to_string()));
    }

    let key = PrivateKeyDer::from_pem_slice(key_pem)
        .map_err(|e| Error::TlsError(format!("Failed to parse private key: {}", e)))?;

    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::TlsError(format!("Failed to select protocol versions: {}", e)))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| Error::TlsError(format!("Failed to create server config: {}", e)))
}

/// Serve the REST API until `shutdown` resolves
pub async fn run_server<F>(state: AppState, config: &ServerConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    if config.tls_enabled {
        let cert_pem = tokio::fs::read(config.cert_file()).await?;
        let key_pem = tokio::fs::read(config.key_file()).await?;
        let server_config = build_tls_server_config(&cert_pem, &key_pem)?;
        let rustls_config = RustlsConfig::from_config(Arc::new(server_config));

        let handle = Handle::new();
        let signal_handle = handle.clone();
        tokio::spawn(async move {
            shutdown.await;
            signal_handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        });

        info!("REST API server listening on {} with TLS", addr);
        axum_server::bind_rustls(addr, rustls_config)
            .handle(handle)
            .serve(app.into_make_service())
            .await?;
    } else {
        info!("REST API server listening on {} (insecure)", addr);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;
    }

    info!("REST API server stopped");
    Ok(())
}
