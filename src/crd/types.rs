//! Shared types for disaster-recovery switchover state
//!
//! These types are used by the CRD, the controller and the HTTP boundary.

use std::collections::BTreeMap;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Annotation key bumped to re-trigger a switchover to the mode already requested
pub const SWITCHOVER_ANNOTATION_KEY: &str = "switchoverRetry";

/// Disaster-recovery role of a site
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Serving traffic
    Active,
    /// Replicating from the active site
    Standby,
    /// Taken out of the DR pair
    #[serde(alias = "disable")]
    Disabled,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Active, Mode::Standby, Mode::Disabled];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Active => "active",
            Mode::Standby => "standby",
            Mode::Disabled => "disabled",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    /// Exact lowercase match; `disable` is accepted as a legacy spelling
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Mode::Active),
            "standby" => Ok(Mode::Standby),
            "disabled" | "disable" => Ok(Mode::Disabled),
            other => Err(Error::ValidationError(format!(
                "illegal mode field value - [{other}]"
            ))),
        }
    }
}

/// Progress of the most recent switchover
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SwitchoverStatus {
    Queue,
    Running,
    Done,
    Failed,
    /// No status recorded yet
    #[default]
    #[serde(rename = "")]
    Unset,
}

impl SwitchoverStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwitchoverStatus::Queue => "queue",
            SwitchoverStatus::Running => "running",
            SwitchoverStatus::Done => "done",
            SwitchoverStatus::Failed => "failed",
            SwitchoverStatus::Unset => "",
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, SwitchoverStatus::Unset)
    }
}

impl std::fmt::Display for SwitchoverStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SwitchoverStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queue" => Ok(SwitchoverStatus::Queue),
            "running" => Ok(SwitchoverStatus::Running),
            "done" => Ok(SwitchoverStatus::Done),
            "failed" => Ok(SwitchoverStatus::Failed),
            "" => Ok(SwitchoverStatus::Unset),
            other => Err(Error::DocumentError(format!(
                "unknown switchover status '{other}'"
            ))),
        }
    }
}

/// Status block recorded on the tracked document and returned over HTTP.
///
/// `mode` stays a plain string: it echoes whatever was stored or requested,
/// including values outside the allowed list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SwitchoverState {
    #[serde(default)]
    pub mode: String,

    #[serde(default, skip_serializing_if = "SwitchoverStatus::is_unset")]
    pub status: SwitchoverStatus,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

impl SwitchoverState {
    pub fn new(
        mode: impl Into<String>,
        status: SwitchoverStatus,
        comment: impl Into<String>,
    ) -> Self {
        Self {
            mode: mode.into(),
            status,
            comment: comment.into(),
        }
    }

    /// State carrying only the mode
    pub fn mode_only(mode: impl Into<String>) -> Self {
        Self {
            mode: mode.into(),
            ..Default::default()
        }
    }
}

/// Desired-mode write issued by the switchover orchestrator
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModeDataUpdate {
    pub mode: Mode,
    pub no_wait: bool,
    /// Annotations merged into `metadata.annotations`
    pub annotations: BTreeMap<String, String>,
}

impl ModeDataUpdate {
    pub fn new(mode: Mode, no_wait: bool) -> Self {
        Self {
            mode,
            no_wait,
            annotations: BTreeMap::new(),
        }
    }

    /// Attach the retry nudge so watchers see a change even when the mode is unchanged
    pub fn with_retry_nudge(mut self, token: impl Into<String>) -> Self {
        self.annotations
            .insert(SWITCHOVER_ANNOTATION_KEY.to_string(), token.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("active".parse::<Mode>().unwrap(), Mode::Active);
        assert_eq!("standby".parse::<Mode>().unwrap(), Mode::Standby);
        assert_eq!("disabled".parse::<Mode>().unwrap(), Mode::Disabled);
        assert_eq!("disable".parse::<Mode>().unwrap(), Mode::Disabled);
        assert!("Active".parse::<Mode>().is_err());
        assert!("".parse::<Mode>().is_err());
        assert_eq!(Mode::Disabled.to_string(), "disabled");
    }

    #[test]
    fn test_mode_serde_alias() {
        let mode: Mode = serde_json::from_value(json!("disable")).unwrap();
        assert_eq!(mode, Mode::Disabled);
        assert_eq!(serde_json::to_value(Mode::Disabled).unwrap(), json!("disabled"));
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("done".parse::<SwitchoverStatus>().unwrap(), SwitchoverStatus::Done);
        assert_eq!("".parse::<SwitchoverStatus>().unwrap(), SwitchoverStatus::Unset);
        assert!("DONE".parse::<SwitchoverStatus>().is_err());
    }

    #[test]
    fn test_state_omits_empty_fields() {
        let state = SwitchoverState::mode_only("standby");
        assert_eq!(serde_json::to_value(&state).unwrap(), json!({"mode": "standby"}));

        let state = SwitchoverState::new("active", SwitchoverStatus::Failed, "lag");
        assert_eq!(
            serde_json::to_value(&state).unwrap(),
            json!({"mode": "active", "status": "failed", "comment": "lag"})
        );

        let parsed: SwitchoverState = serde_json::from_value(json!({"mode": "active"})).unwrap();
        assert_eq!(parsed.status, SwitchoverStatus::Unset);
    }

    #[test]
    fn test_retry_nudge_annotation() {
        let update = ModeDataUpdate::new(Mode::Active, true).with_retry_nudge("42");
        assert_eq!(update.annotations.get(SWITCHOVER_ANNOTATION_KEY).unwrap(), "42");
    }
}
