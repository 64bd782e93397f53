//! Data Transfer Objects for the REST API

use serde::{Deserialize, Serialize};

use crate::crd::{SwitchoverState, SwitchoverStatus};
use crate::health::HealthStatus;

/// Body of `GET /healthz`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
}

impl HealthResponse {
    pub fn down() -> Self {
        Self {
            status: HealthStatus::Down,
        }
    }
}

/// Failed switchover body returned with HTTP 500
pub fn failed_state(mode: impl Into<String>, comment: impl Into<String>) -> SwitchoverState {
    SwitchoverState::new(mode, SwitchoverStatus::Failed, comment)
}
