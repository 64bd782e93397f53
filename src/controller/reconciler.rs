//! Watch-driven switchover controller
//!
//! One [`Controller`] owns one watch over the tracked document. Events are
//! handled strictly one at a time; a switchover runs at most once per
//! distinct change and always ends in a terminal status.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::{FutureExt, StreamExt};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use super::action::{ControllerRequest, ControllerResponse, DrAction};
use super::request::build_controller_request;
use super::retry::{retry_with_delay, RetryPolicy};
use crate::config::DisasterRecoveryPaths;
use crate::crd::{SwitchoverState, SwitchoverStatus};
use crate::document::{DocumentEvent, DocumentStore, EventType};
use crate::error::{Error, Result};
use crate::switchover::write_status;

#[cfg(feature = "metrics")]
use super::metrics;

/// Why an event did not trigger the DR action
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Event carried no current snapshot
    NoDocument,
    /// Snapshot could not be parsed with the configured field paths
    Malformed,
    /// Old and new snapshots are identical
    Identical,
    /// Desired mode and retry annotation did not change
    Unchanged,
    /// Requested mode already finished successfully
    AlreadyDone,
    /// Document version matches the controller's own last write
    SeenVersion,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NoDocument => "no_document",
            SkipReason::Malformed => "malformed",
            SkipReason::Identical => "identical",
            SkipReason::Unchanged => "unchanged",
            SkipReason::AlreadyDone => "already_done",
            SkipReason::SeenVersion => "seen_version",
        }
    }
}

/// Result of handling one watch event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventOutcome {
    Ignored(SkipReason),
    /// The action ran; carries the persisted state it returned
    Executed(SwitchoverState),
    /// Every attempt failed; carries the persisted FAILED state
    Failed(SwitchoverState),
}

enum Attempt {
    Skipped(SkipReason),
    Finished(SwitchoverState),
}

pub struct Controller {
    store: Arc<dyn DocumentStore>,
    paths: DisasterRecoveryPaths,
    action: Arc<dyn DrAction>,
    retry: RetryPolicy,
    action_timeout: Option<Duration>,
    /// Version of the document after the controller's last own write
    last_seen_version: Option<String>,
}

impl Controller {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        paths: DisasterRecoveryPaths,
        action: Arc<dyn DrAction>,
    ) -> Self {
        Self {
            store,
            paths,
            action,
            retry: RetryPolicy::default(),
            action_timeout: None,
            last_seen_version: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Bound each action invocation; an elapsed timeout is a failed attempt
    pub fn with_action_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout = Some(timeout);
        self
    }

    /// Consume the document watch until `shutdown` resolves or the stream ends.
    ///
    /// An event in progress always runs to completion before shutdown is
    /// observed.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let mut events = self.store.watch();
        tokio::pin!(shutdown);
        info!("Controller started");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Controller received shutdown signal");
                    break;
                }
                next = events.next() => match next {
                    Some(Ok(event)) => self.dispatch(event).await,
                    Some(Err(e)) => warn!(error = %e, "Watch stream error"),
                    None => {
                        warn!("Watch stream ended");
                        break;
                    }
                },
            }
        }

        info!("Controller finished");
        Ok(())
    }

    async fn dispatch(&mut self, event: DocumentEvent) {
        match event.event_type {
            EventType::Added | EventType::Modified => {
                let outcome = self
                    .handle_event(event.old.as_ref(), event.new.as_ref(), event.event_type)
                    .await;
                debug!(?outcome, "Event handled");
            }
            EventType::Deleted => warn!("Tracked document was deleted"),
        }
    }

    /// Decide whether an add/modify event needs a switchover and run it.
    ///
    /// Never fails: store errors and exhausted retries are persisted as a
    /// FAILED status when possible and otherwise logged.
    #[instrument(skip(self, old, new), fields(event = %event_type))]
    pub async fn handle_event(
        &mut self,
        old: Option<&Value>,
        new: Option<&Value>,
        event_type: EventType,
    ) -> EventOutcome {
        let Some(new) = new else {
            info!("DR resource is null");
            return skipped(SkipReason::NoDocument);
        };
        let request = match build_controller_request(new, &self.paths, event_type) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Cannot build DR request from resource");
                return skipped(SkipReason::Malformed);
            }
        };
        if request.mode.is_empty() {
            warn!(path = %self.paths.mode, "DR resource has no desired mode");
            return skipped(SkipReason::Malformed);
        }

        if let Some(old) = old {
            let previous = match build_controller_request(old, &self.paths, event_type) {
                Ok(previous) => previous,
                Err(e) => {
                    warn!(error = %e, "Cannot build DR request from previous resource");
                    return skipped(SkipReason::Malformed);
                }
            };
            if previous.object == request.object {
                return skipped(SkipReason::Identical);
            }
            if previous.mode == request.mode
                && previous.switchover_annotation == request.switchover_annotation
            {
                info!(
                    mode = %request.mode,
                    switchover_retry = %request.switchover_annotation,
                    status = %request.status.status,
                    "Skip event, mode and retry annotation are unchanged"
                );
                return skipped(SkipReason::Unchanged);
            }
        }

        let policy = self.retry;
        let result = retry_with_delay(
            policy,
            "dr-switchover",
            self,
            |controller| controller.execute_dr_function(request.clone()).boxed(),
            |controller, _, _| controller.last_seen_version = None,
        )
        .await;

        match result {
            Ok(Attempt::Skipped(reason)) => skipped(reason),
            Ok(Attempt::Finished(state)) => {
                #[cfg(feature = "metrics")]
                metrics::inc_switchover(&request.mode, state.status.as_str());
                EventOutcome::Executed(state)
            }
            Err(exhausted) => {
                error!(
                    attempts = exhausted.attempts,
                    error = %exhausted.last_error,
                    "Error occurred during performing DR controller function"
                );
                let failed = SwitchoverState::new(
                    request.mode.as_str(),
                    SwitchoverStatus::Failed,
                    exhausted.last_error.to_string(),
                );
                if let Err(e) = write_status(self.store.as_ref(), &self.paths.status, &failed).await {
                    error!(error = %e, "Cannot update resource status");
                }
                if let Err(e) = self.refresh_version().await {
                    error!(error = %e, "Cannot refresh resource version");
                }
                #[cfg(feature = "metrics")]
                metrics::inc_switchover(&request.mode, SwitchoverStatus::Failed.as_str());
                EventOutcome::Failed(failed)
            }
        }
    }

    /// One switchover attempt guarded by the already-done and seen-version
    /// checks
    async fn execute_dr_function(&mut self, request: ControllerRequest) -> Result<Attempt> {
        let version = self.store.version().await?;

        if request.mode == request.status.mode && request.status.status == SwitchoverStatus::Done {
            info!(mode = %request.mode, "Current DR mode is already in place and finished successfully");
            return Ok(Attempt::Skipped(SkipReason::AlreadyDone));
        }
        if self.last_seen_version.as_deref() == Some(version.as_str()) {
            info!(%version, "Incoming DR resource does not contain changes");
            return Ok(Attempt::Skipped(SkipReason::SeenVersion));
        }
        self.refresh_version().await?;

        info!(
            mode = %request.mode,
            status = %request.status.status,
            "New incoming DR request"
        );
        let running = SwitchoverState::new(
            request.mode.as_str(),
            SwitchoverStatus::Running,
            "Switchover is in progress",
        );
        write_status(self.store.as_ref(), &self.paths.status, &running).await?;
        self.refresh_version().await?;

        let mode = request.mode.clone();
        let response = self.invoke_action(request).await?;
        info!(
            status = %response.status,
            comment = %response.comment,
            "Switchover finished"
        );

        write_status(self.store.as_ref(), &self.paths.status, &response).await?;
        self.refresh_version().await?;
        debug!(%mode, "Switchover state persisted");
        Ok(Attempt::Finished(response))
    }

    async fn invoke_action(&self, request: ControllerRequest) -> Result<SwitchoverState> {
        let mode = request.mode.clone();
        let started = Instant::now();

        #[cfg(feature = "metrics")]
        metrics::inc_switchover_attempt(&mode);

        let outcome = match self.action_timeout {
            Some(limit) => self.invoke_with_timeout(request, limit).await,
            None => self.action.execute(request).await,
        };

        let elapsed = started.elapsed();
        #[cfg(feature = "metrics")]
        metrics::observe_switchover_duration_seconds(&mode, elapsed.as_secs_f64());

        match outcome {
            Ok(response) => Ok(response.state),
            Err(e) => {
                warn!(%mode, elapsed_ms = elapsed.as_millis(), error = %e, "DR action failed");
                Err(Error::ActionError(format!("{e:#}")))
            }
        }
    }

    /// An elapsed timeout fails the attempt, but the invocation is still
    /// awaited: blocking actions can not be cancelled, and the next attempt
    /// must not overlap a running one.
    async fn invoke_with_timeout(
        &self,
        request: ControllerRequest,
        limit: Duration,
    ) -> anyhow::Result<ControllerResponse> {
        let action = self.action.clone();
        let mut invocation = tokio::spawn(async move { action.execute(request).await });

        match tokio::time::timeout(limit, &mut invocation).await {
            Ok(joined) => joined.unwrap_or_else(|e| Err(anyhow::anyhow!("DR action panicked: {e}"))),
            Err(_) => {
                warn!(?limit, "DR action timed out, waiting for it to return");
                if let Err(e) = invocation.await {
                    warn!(error = %e, "Timed out DR action did not complete cleanly");
                }
                Err(anyhow::anyhow!("DR action did not finish within {limit:?}"))
            }
        }
    }

    async fn refresh_version(&mut self) -> Result<()> {
        let version = self.store.version().await?;
        self.last_seen_version = Some(version);
        Ok(())
    }
}

fn skipped(reason: SkipReason) -> EventOutcome {
    #[cfg(feature = "metrics")]
    metrics::inc_event_skipped(reason.as_str());
    EventOutcome::Ignored(reason)
}
