//! Mode-aware health aggregation
//!
//! Health meaning depends on the current DR mode: each mode names its own
//! main and additional workload groups. Workload readiness is folded into an
//! up/degraded/down verdict and optionally combined with a custom health
//! source using a demote-only rule.

mod aggregator;
mod readiness;
mod source;


use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::crd::Mode;
use crate::error::{Error, Result};

pub use aggregator::HealthAggregator;
pub use readiness::{KubeWorkloadReadiness, ReplicaCounts, WorkloadGroup, WorkloadKind, WorkloadReadiness};
pub use source::{EndpointHealthSource, FnHealthSource, HealthSource};

/// Tri-state health verdict
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
    Degraded,
    Down,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Up => "up",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Down => "down",
        }
    }

    /// Demote-only combination: a failing secondary signal turns `up` into
    /// `degraded` and leaves any other primary verdict as it is
    pub fn demoted_by(self, secondary: HealthStatus) -> HealthStatus {
        if self == HealthStatus::Up && secondary != HealthStatus::Up {
            HealthStatus::Degraded
        } else {
            self
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for HealthStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(HealthStatus::Up),
            "degraded" => Ok(HealthStatus::Degraded),
            "down" => Ok(HealthStatus::Down),
            other => Err(Error::HealthCheckError(format!(
                "unknown health status '{other}'"
            ))),
        }
    }
}

/// Input handed to a custom health source
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthRequest {
    pub mode: String,
    pub full_health: bool,
}

/// Main and additional workload groups for one mode
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServiceGroups {
    /// When absent the mode is trivially healthy
    pub main: Option<WorkloadGroup>,
    /// Can only demote the main verdict
    pub additional: Option<WorkloadGroup>,
}

/// Workload groups for every mode
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HealthGroups {
    pub active: ServiceGroups,
    pub standby: ServiceGroups,
    pub disabled: ServiceGroups,
}

impl HealthGroups {
    pub fn for_mode(&self, mode: Mode) -> &ServiceGroups {
        match mode {
            Mode::Active => &self.active,
            Mode::Standby => &self.standby,
            Mode::Disabled => &self.disabled,
        }
    }
}
