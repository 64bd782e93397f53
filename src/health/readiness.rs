//! Workload readiness lookups for Deployments and StatefulSets

use std::collections::BTreeMap;
use std::str::FromStr;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use kube::{Api, Client};
use tracing::{debug, instrument};

use crate::error::{Error, Result};

/// Kind of workload whose replicas are checked
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WorkloadKind {
    Deployment,
    StatefulSet,
}

impl WorkloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadKind::Deployment => "deployment",
            WorkloadKind::StatefulSet => "statefulset",
        }
    }
}

impl std::fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WorkloadKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "deployment" => Ok(WorkloadKind::Deployment),
            "statefulset" => Ok(WorkloadKind::StatefulSet),
            other => Err(Error::ConfigError(format!(
                "unsupported workload kind '{other}', expected 'deployment' or 'statefulset'"
            ))),
        }
    }
}

/// Workload names grouped by kind
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkloadGroup(BTreeMap<WorkloadKind, Vec<String>>);

impl WorkloadGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: WorkloadKind, name: impl Into<String>) -> Self {
        self.insert(kind, name);
        self
    }

    pub fn insert(&mut self, kind: WorkloadKind, name: impl Into<String>) {
        self.0.entry(kind).or_default().push(name.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }

    pub fn iter(&self) -> impl Iterator<Item = (WorkloadKind, &str)> + '_ {
        self.0
            .iter()
            .flat_map(|(kind, names)| names.iter().map(move |n| (*kind, n.as_str())))
    }
}

/// Replica counts reported for one workload
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplicaCounts {
    pub ready: i32,
    pub updated: i32,
    pub desired: i32,
}

impl ReplicaCounts {
    /// Ready when every desired replica is both ready and updated, and at
    /// least one replica is desired
    pub fn is_ready(&self) -> bool {
        self.desired != 0 && self.ready.min(self.updated) == self.desired
    }
}

/// Source of live replica counts
#[async_trait]
pub trait WorkloadReadiness: Send + Sync {
    async fn replica_counts(&self, kind: WorkloadKind, name: &str) -> Result<ReplicaCounts>;
}

/// Reads Deployments and StatefulSets from one namespace
#[derive(Clone)]
pub struct KubeWorkloadReadiness {
    client: Client,
    namespace: String,
}

impl KubeWorkloadReadiness {
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }
}

#[async_trait]
impl WorkloadReadiness for KubeWorkloadReadiness {
    #[instrument(skip(self), fields(namespace = %self.namespace))]
    async fn replica_counts(&self, kind: WorkloadKind, name: &str) -> Result<ReplicaCounts> {
        let counts = match kind {
            WorkloadKind::Deployment => {
                let api: Api<Deployment> = Api::namespaced(self.client.clone(), &self.namespace);
                let deployment = api.get(name).await?;
                let status = deployment.status.unwrap_or_default();
                ReplicaCounts {
                    ready: status.ready_replicas.unwrap_or(0),
                    updated: status.updated_replicas.unwrap_or(0),
                    desired: deployment.spec.and_then(|s| s.replicas).unwrap_or(1),
                }
            }
            WorkloadKind::StatefulSet => {
                let api: Api<StatefulSet> = Api::namespaced(self.client.clone(), &self.namespace);
                let statefulset = api.get(name).await?;
                let status = statefulset.status.unwrap_or_default();
                ReplicaCounts {
                    ready: status.ready_replicas.unwrap_or(0),
                    updated: status.updated_replicas.unwrap_or(0),
                    desired: statefulset.spec.and_then(|s| s.replicas).unwrap_or(1),
                }
            }
        };
        debug!(%kind, name, ?counts, "Fetched replica counts");
        Ok(counts)
    }
}
