use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, instrument, warn};

use super::{status_from_document, write_mode, write_status, RequestData};
use crate::config::DisasterRecoveryPaths;
use crate::crd::{Mode, ModeDataUpdate, SwitchoverState, SwitchoverStatus};
use crate::document::{nested_string, DocumentStore};
use crate::error::Error;

/// Pause between the QUEUE write and the desired-mode write so the watch
/// layer sees them in order. Best effort only, nothing confirms it.
pub const QUEUE_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// A rejected mode request: the state explains the rejection to the caller,
/// the error decides how it is reported
#[derive(Debug, Error)]
#[error("{error}")]
pub struct SetModeError {
    pub state: SwitchoverState,
    #[source]
    pub error: Error,
}

impl SetModeError {
    fn new(mode: &str, comment: impl Into<String>, error: Error) -> Self {
        Self {
            state: SwitchoverState::new(mode, SwitchoverStatus::Failed, comment),
            error,
        }
    }
}

/// Admission control for mode-change requests ("SetMode")
#[derive(Clone)]
pub struct SwitchoverOrchestrator {
    store: Arc<dyn DocumentStore>,
    paths: DisasterRecoveryPaths,
}

impl SwitchoverOrchestrator {
    pub fn new(store: Arc<dyn DocumentStore>, paths: DisasterRecoveryPaths) -> Self {
        Self { store, paths }
    }

    /// Validate and admit a mode request.
    ///
    /// On admission the status is set to QUEUE (keeping the current mode),
    /// then the desired mode is written. Re-requesting the stored mode while
    /// the last switchover did not finish attaches a fresh nudge annotation
    /// so the controller does not treat the write as unchanged.
    #[instrument(skip(self), fields(mode = %data.mode))]
    pub async fn set_mode(&self, data: RequestData) -> Result<SwitchoverState, SetModeError> {
        let outcome = self.admit(&data).await;

        #[cfg(feature = "metrics")]
        crate::controller::metrics::inc_mode_request(match &outcome {
            Ok(state) if state.status == SwitchoverStatus::Done => "noop",
            Ok(_) => "accepted",
            Err(_) => "rejected",
        });

        if let Err(rejected) = &outcome {
            warn!(error = %rejected.error, comment = %rejected.state.comment, "Mode request rejected");
        }
        outcome
    }

    async fn admit(&self, data: &RequestData) -> Result<SwitchoverState, SetModeError> {
        let requested = data.mode.as_str();
        let mode: Mode = requested.parse().map_err(|e| {
            SetModeError::new(
                requested,
                format!(
                    "'{requested}' mode is not in the allowed list. Please, use '{}', '{}' or '{}'",
                    Mode::Active,
                    Mode::Standby,
                    Mode::Disabled
                ),
                e,
            )
        })?;

        let (current, stored_mode) = self
            .current_state()
            .await
            .map_err(|e| {
                SetModeError::new(
                    requested,
                    format!(
                        "The custom resource does not contain information about disaster recovery. Error is [{e}]"
                    ),
                    e,
                )
            })?;

        if current.status == SwitchoverStatus::Running {
            return Err(SetModeError::new(
                requested,
                "The switchover process is in progress. Please, wait until it will be finished",
                Error::SwitchoverInProgress,
            ));
        }

        let status_mode = current.mode.parse::<Mode>().ok();
        let stored = stored_mode.parse::<Mode>().ok();
        if status_mode == Some(mode) && stored == Some(mode) && current.status == SwitchoverStatus::Done {
            info!(%mode, "Requested mode is already in place");
            return Ok(SwitchoverState::new(
                mode.as_str(),
                SwitchoverStatus::Done,
                "The switchover process has already been done",
            ));
        }

        let queued = SwitchoverState::new(
            current.mode.as_str(),
            SwitchoverStatus::Queue,
            "Switchover is in queue",
        );
        write_status(self.store.as_ref(), &self.paths.status, &queued)
            .await
            .map_err(|e| SetModeError::new(requested, e.to_string(), e))?;

        tokio::time::sleep(QUEUE_GRACE_PERIOD).await;

        let mut update = ModeDataUpdate::new(mode, data.no_wait.unwrap_or(true));
        if stored == Some(mode) && current.status != SwitchoverStatus::Done {
            update = update.with_retry_nudge(retry_token());
        }
        write_mode(self.store.as_ref(), &self.paths, &update)
            .await
            .map_err(|e| SetModeError::new(requested, e.to_string(), e))?;

        info!(%mode, no_wait = update.no_wait, retry = !update.annotations.is_empty(), "Mode request admitted");
        Ok(SwitchoverState::mode_only(mode.as_str()))
    }

    async fn current_state(&self) -> crate::Result<(SwitchoverState, String)> {
        let document = self.store.get().await?;
        let current = status_from_document(&document.content, &self.paths.status)?;
        let stored_mode = nested_string(&document.content, &self.paths.mode)?.unwrap_or_default();
        Ok((current, stored_mode))
    }
}

/// Distinct value for every call so the annotation always changes
fn retry_token() -> String {
    let now = chrono::Utc::now();
    now.timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_micros())
        .to_string()
}
