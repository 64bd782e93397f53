use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, instrument, warn};

use super::{HealthGroups, HealthRequest, HealthSource, HealthStatus, WorkloadGroup, WorkloadReadiness};
use crate::config::StatusPaths;
use crate::crd::Mode;
use crate::document::DocumentStore;
use crate::error::{Error, Result};
use crate::switchover::read_status;

/// Computes the health verdict for the currently persisted mode
#[derive(Clone)]
pub struct HealthAggregator {
    store: Arc<dyn DocumentStore>,
    status_paths: StatusPaths,
    readiness: Arc<dyn WorkloadReadiness>,
    groups: HealthGroups,
    custom: Option<Arc<dyn HealthSource>>,
    full_health: bool,
}

impl HealthAggregator {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        status_paths: StatusPaths,
        readiness: Arc<dyn WorkloadReadiness>,
        groups: HealthGroups,
    ) -> Self {
        Self {
            store,
            status_paths,
            readiness,
            groups,
            custom: None,
            full_health: false,
        }
    }

    /// Attach a custom health source. With `full_health` its verdict replaces
    /// the workload aggregation; otherwise it only contributes as an add-on.
    pub fn with_custom_source(mut self, source: Arc<dyn HealthSource>, full_health: bool) -> Self {
        self.custom = Some(source);
        self.full_health = full_health;
        self
    }

    #[instrument(skip(self))]
    pub async fn get_health(&self) -> Result<HealthStatus> {
        let state = read_status(self.store.as_ref(), &self.status_paths).await?;
        let mode = state.mode.to_lowercase();

        if let (true, Some(custom)) = (self.full_health, self.custom.as_ref()) {
            debug!(%mode, "Delegating health to the custom source");
            return custom.check(&self.request(&mode)).await;
        }

        let parsed: Mode = mode.parse().map_err(|_| {
            Error::HealthCheckError(format!(
                "can't perform health check for the disaster recovery mode - [{mode}]"
            ))
        })?;
        let groups = self.groups.for_mode(parsed);

        let Some(main) = groups.main.as_ref() else {
            return Ok(HealthStatus::Up);
        };
        let main_status = self.group_status(main).await?;
        let additional_status = match groups.additional.as_ref() {
            Some(group) => self.group_status(group).await?,
            None => HealthStatus::Up,
        };
        let custom_status = match self.custom.as_ref() {
            Some(custom) => custom.check(&self.request(&mode)).await.unwrap_or_else(|e| {
                warn!(error = %e, "Custom health source failed, treating as down");
                HealthStatus::Down
            }),
            None => HealthStatus::Up,
        };

        let status = main_status
            .demoted_by(additional_status)
            .demoted_by(custom_status);
        debug!(%mode, %main_status, %additional_status, %custom_status, %status, "Aggregated health");
        Ok(status)
    }

    fn request(&self, mode: &str) -> HealthRequest {
        HealthRequest {
            mode: mode.to_string(),
            full_health: self.full_health,
        }
    }

    /// Up when every workload is ready (or none are configured), down when
    /// none are, degraded in between. Any lookup failure fails the whole check.
    async fn group_status(&self, group: &WorkloadGroup) -> Result<HealthStatus> {
        let lookups = group
            .iter()
            .map(|(kind, name)| self.readiness.replica_counts(kind, name));
        let counts = try_join_all(lookups).await?;

        let total = counts.len();
        let ready = counts.iter().filter(|c| c.is_ready()).count();
        Ok(if total == 0 || ready == total {
            HealthStatus::Up
        } else if ready == 0 {
            HealthStatus::Down
        } else {
            HealthStatus::Degraded
        })
    }
}
