//! Reconciliation controller for the tracked DR document
//! This module contains the watch loop, the event dedup rules, the bounded
//! retry around the DR action, and the controller's Prometheus metrics.

mod action;
#[cfg(feature = "metrics")]
pub mod metrics;
mod reconciler;
mod request;
mod retry;

pub use action::{ControllerRequest, ControllerResponse, DrAction, FnAction};
pub use reconciler::{Controller, EventOutcome, SkipReason};
pub use request::build_controller_request;
pub use retry::{retry_with_delay, RetryError, RetryPolicy};
