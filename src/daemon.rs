//! Embeddable daemon facade
//!
//! Wires the Kubernetes-backed collaborators, the REST API and, when the
//! embedding application supplies a DR action, the switchover controller.
//!
//! ```ignore
//! Daemon::new(config)
//!     .with_action(FnAction::new(|request| perform_switchover(request)))
//!     .with_retry(3, Duration::from_secs(10))
//!     .run()
//!     .await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use kube::Client;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::Config;
use crate::controller::{Controller, DrAction, RetryPolicy};
use crate::document::{DocumentStore, KubeDocumentStore};
use crate::health::{EndpointHealthSource, HealthAggregator, HealthSource, KubeWorkloadReadiness};
use crate::rest_api::{run_server, AppState, Authenticator, NoAuth, TokenReviewAuthenticator};
use crate::switchover::{ModeReader, SwitchoverOrchestrator};
use crate::Result;

pub struct Daemon {
    config: Config,
    health_source: Option<Arc<dyn HealthSource>>,
    full_health: bool,
    action: Option<Arc<dyn DrAction>>,
}

impl Daemon {
    pub fn new(config: Config) -> Self {
        let full_health = config.health.full_health_enabled;
        Self {
            config,
            health_source: None,
            full_health,
            action: None,
        }
    }

    /// Custom health source; replaces the configured external endpoint
    pub fn with_health_source(mut self, source: impl HealthSource + 'static, full_health: bool) -> Self {
        self.health_source = Some(Arc::new(source));
        self.full_health = full_health;
        self
    }

    /// DR action run by the controller. Without one only the REST API is served.
    pub fn with_action(mut self, action: impl DrAction + 'static) -> Self {
        self.action = Some(Arc::new(action));
        self
    }

    pub fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.config.controller.retry = RetryPolicy::new(attempts, delay);
        self
    }

    pub fn with_action_timeout(mut self, timeout: Duration) -> Self {
        self.config.controller.action_timeout = Some(timeout);
        self
    }

    /// Run with the default in-cluster or kubeconfig client until SIGINT/SIGTERM
    pub async fn run(self) -> Result<()> {
        let client = Client::try_default().await?;
        self.run_with_client(client).await
    }

    pub async fn run_with_client(self, client: Client) -> Result<()> {
        let Daemon {
            config,
            health_source,
            full_health,
            action,
        } = self;

        let store: Arc<dyn DocumentStore> =
            Arc::new(KubeDocumentStore::new(client.clone(), &config.resource));
        let health = build_health(&config, client.clone(), store.clone(), health_source, full_health).await?;
        let authenticator: Arc<dyn Authenticator> = if config.auth.enabled {
            info!(username = %config.auth.expected_username(), "Token authentication enabled");
            Arc::new(TokenReviewAuthenticator::new(client, config.auth.clone()))
        } else {
            warn!("Token authentication disabled, the API is open");
            Arc::new(NoAuth)
        };

        let state = AppState {
            reader: ModeReader::new(store.clone(), config.paths.status.clone()),
            orchestrator: SwitchoverOrchestrator::new(store.clone(), config.paths.clone()),
            health: Arc::new(health),
            authenticator,
        };

        let (stop_tx, stop_rx) = watch::channel(false);
        tokio::spawn(async move {
            shutdown_signal().await;
            info!("Shutdown signal received");
            let _ = stop_tx.send(true);
        });

        info!(
            resource = %config.resource.resource,
            name = %config.resource.name,
            namespace = %config.resource.namespace,
            "Starting disaster recovery daemon"
        );
        let server = run_server(state, &config.server, stopped(stop_rx.clone()));

        match action {
            Some(action) => {
                let mut controller = Controller::new(store, config.paths.clone(), action)
                    .with_retry(config.controller.retry);
                if let Some(timeout) = config.controller.action_timeout {
                    controller = controller.with_action_timeout(timeout);
                }
                tokio::try_join!(server, controller.run(stopped(stop_rx)))?;
            }
            None => {
                info!("No DR action configured, controller not started");
                server.await?;
            }
        }

        info!("Disaster recovery daemon stopped");
        Ok(())
    }
}

async fn build_health(
    config: &Config,
    client: Client,
    store: Arc<dyn DocumentStore>,
    custom: Option<Arc<dyn HealthSource>>,
    full_health: bool,
) -> Result<HealthAggregator> {
    let readiness = Arc::new(KubeWorkloadReadiness::new(client, config.resource.namespace.clone()));
    let aggregator = HealthAggregator::new(
        store,
        config.paths.status.clone(),
        readiness,
        config.health.groups.clone(),
    );

    let custom = match (custom, config.health.endpoint.as_deref()) {
        (Some(source), _) => Some(source),
        (None, Some(endpoint)) => {
            let ca = match tokio::fs::read(config.server.ca_file()).await {
                Ok(pem) => Some(pem),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(e) => return Err(e.into()),
            };
            info!(%endpoint, custom_ca = ca.is_some(), "Using external health endpoint");
            let source = EndpointHealthSource::new(endpoint, ca.as_deref())?;
            Some(Arc::new(source) as Arc<dyn HealthSource>)
        }
        (None, None) => None,
    };

    Ok(match custom {
        Some(source) => aggregator.with_custom_source(source, full_health),
        None => aggregator,
    })
}

async fn stopped(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

/// Resolves on Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        tokio::select! {
            _ = ctrl_c() => {},
            _ = terminate() => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c().await;
    }
}

async fn ctrl_c() {
    if let Err(err) = signal::ctrl_c().await {
        warn!(?err, "failed to install Ctrl+C handler");
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            term.recv().await;
        }
        Err(err) => warn!(?err, "failed to install SIGTERM handler"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stopped_resolves_after_signal() {
        let (tx, rx) = watch::channel(false);
        let waiter = tokio::spawn(stopped(rx));
        tx.send(true).unwrap();
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_stopped_resolves_when_sender_dropped() {
        let (tx, rx) = watch::channel(false);
        drop(tx);
        stopped(rx).await;
    }
}
