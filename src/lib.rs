//! Disaster-recovery switchover daemon for Kubernetes-hosted services
//!
//! A site manager asks for a mode (`active`, `standby` or `disabled`) over
//! HTTP. The request is recorded in a tracked custom resource, a controller
//! watching that resource runs the embedder-supplied DR action, and the
//! outcome is written back as the switchover status. Health is reported per
//! mode from workload readiness and an optional custom source.

pub mod config;
pub mod controller;
pub mod crd;
pub mod document;
pub mod error;
pub mod health;
pub mod switchover;
pub mod telemetry;

#[cfg(feature = "rest-api")]
pub mod daemon;

#[cfg(feature = "rest-api")]
pub mod rest_api;

pub use crate::error::{Error, Result};
