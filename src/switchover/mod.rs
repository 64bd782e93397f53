//! Switchover state persistence and mode-change admission
//!
//! The status block {mode, status, comment} and the desired-mode fields live
//! at configurable paths inside the tracked document. This module reads and
//! writes them and hosts the orchestrator that admits new mode requests.

mod orchestrator;


use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use crate::config::{DisasterRecoveryPaths, StatusPaths};
use crate::crd::{ModeDataUpdate, SwitchoverState, SwitchoverStatus};
use crate::document::{nested_string, DocumentStore, FieldPath, FieldUpdate};
use crate::error::Result;

pub use orchestrator::{SetModeError, SwitchoverOrchestrator, QUEUE_GRACE_PERIOD};

/// Mode-change request received at the HTTP boundary
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestData {
    #[serde(default)]
    pub mode: String,

    #[serde(default, rename = "no-wait", skip_serializing_if = "Option::is_none")]
    pub no_wait: Option<bool>,
}

impl RequestData {
    pub fn new(mode: impl Into<String>) -> Self {
        Self {
            mode: mode.into(),
            no_wait: None,
        }
    }

    pub fn with_no_wait(mut self, no_wait: bool) -> Self {
        self.no_wait = Some(no_wait);
        self
    }
}

/// Extract the status block from raw document content
pub fn status_from_document(content: &Value, paths: &StatusPaths) -> Result<SwitchoverState> {
    let mode = nested_string(content, &paths.mode)?.unwrap_or_default();
    let status = match nested_string(content, &paths.status)? {
        Some(raw) => raw.parse::<SwitchoverStatus>()?,
        None => SwitchoverStatus::Unset,
    };
    let comment = nested_string(content, &paths.comment)?.unwrap_or_default();
    Ok(SwitchoverState {
        mode,
        status,
        comment,
    })
}

/// Read the persisted status block
pub async fn read_status(store: &dyn DocumentStore, paths: &StatusPaths) -> Result<SwitchoverState> {
    let document = store.get().await?;
    status_from_document(&document.content, paths)
}

/// Persist a status block, through the status sub-resource unless the
/// status is configured as an ordinary field. The comment is skipped when
/// no comment path is configured.
#[instrument(skip(store, paths), fields(mode = %state.mode, status = %state.status))]
pub async fn write_status(
    store: &dyn DocumentStore,
    paths: &StatusPaths,
    state: &SwitchoverState,
) -> Result<()> {
    let mut updates = vec![
        FieldUpdate::new(paths.mode.clone(), state.mode.as_str()),
        FieldUpdate::new(paths.status.clone(), state.status.as_str()),
    ];
    if !paths.comment.is_empty() {
        updates.push(FieldUpdate::new(paths.comment.clone(), state.comment.as_str()));
    }

    if paths.treat_status_as_field {
        store.update_fields(updates).await
    } else {
        store.update_status(updates).await
    }
}

/// Persist a desired-mode request, with the no-wait flag typed as configured
/// and any annotations merged into `metadata.annotations`
#[instrument(skip(store, paths, update), fields(mode = %update.mode, no_wait = update.no_wait))]
pub async fn write_mode(
    store: &dyn DocumentStore,
    paths: &DisasterRecoveryPaths,
    update: &ModeDataUpdate,
) -> Result<()> {
    let no_wait = if paths.no_wait_as_string {
        Value::from(update.no_wait.to_string())
    } else {
        Value::from(update.no_wait)
    };
    let mut updates = vec![
        FieldUpdate::new(paths.mode.clone(), update.mode.as_str()),
        FieldUpdate::new(paths.no_wait.clone(), no_wait),
    ];
    let annotations = FieldPath::parse("metadata.annotations");
    updates.extend(
        update
            .annotations
            .iter()
            .map(|(key, value)| FieldUpdate::new(annotations.child(key.as_str()), value.as_str())),
    );
    store.update_fields(updates).await
}

/// Read-only view of the persisted switchover state
#[derive(Clone)]
pub struct ModeReader {
    store: Arc<dyn DocumentStore>,
    paths: StatusPaths,
}

impl ModeReader {
    pub fn new(store: Arc<dyn DocumentStore>, paths: StatusPaths) -> Self {
        Self { store, paths }
    }

    pub async fn get_mode_and_status(&self) -> Result<SwitchoverState> {
        read_status(self.store.as_ref(), &self.paths).await
    }
}
