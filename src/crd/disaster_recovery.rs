//! DisasterRecovery Custom Resource Definition
//!
//! The default document layout: the desired role lives in
//! `spec.disasterRecovery` and the switchover outcome in
//! `status.disasterRecoveryStatus`. Operators that keep these fields elsewhere
//! configure explicit field paths instead.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{Mode, SwitchoverState};

pub const DEFAULT_MODE_PATH: &str = "spec.disasterRecovery.mode";
pub const DEFAULT_NO_WAIT_PATH: &str = "spec.disasterRecovery.noWait";
pub const DEFAULT_STATUS_MODE_PATH: &str = "status.disasterRecoveryStatus.mode";
pub const DEFAULT_STATUS_STATUS_PATH: &str = "status.disasterRecoveryStatus.status";
pub const DEFAULT_STATUS_COMMENT_PATH: &str = "status.disasterRecoveryStatus.comment";

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "disaster-recovery.io",
    version = "v1",
    kind = "DisasterRecovery",
    namespaced,
    status = "DisasterRecoveryStatus",
    shortname = "dr",
    printcolumn = r#"{"name":"Desired","type":"string","jsonPath":".spec.disasterRecovery.mode"}"#,
    printcolumn = r#"{"name":"Current","type":"string","jsonPath":".status.disasterRecoveryStatus.mode"}"#,
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.disasterRecoveryStatus.status"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DisasterRecoverySpec {
    #[serde(default)]
    pub disaster_recovery: DesiredMode,
}

/// Switchover request written by the daemon's HTTP boundary
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DesiredMode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,

    /// Skip waiting for dependent services during the switchover
    #[serde(default)]
    pub no_wait: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DisasterRecoveryStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disaster_recovery_status: Option<SwitchoverState>,
}
