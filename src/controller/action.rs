//! The pluggable switchover action
//!
//! The controller knows when a switchover is due; the embedding application
//! knows how to perform it. [`DrAction`] is the seam between the two.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::crd::SwitchoverState;
use crate::document::EventType;

/// Everything the action needs to perform one switchover
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerRequest {
    /// Desired mode as written in the document
    pub mode: String,
    pub no_wait: bool,
    /// Current value of the retry annotation, empty when absent
    pub switchover_annotation: String,
    /// Status block at the time the event was observed
    pub status: SwitchoverState,
    pub event_type: EventType,
    /// Full document content
    pub object: Value,
}

/// Terminal state reported by the action
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ControllerResponse {
    pub state: SwitchoverState,
}

impl From<SwitchoverState> for ControllerResponse {
    fn from(state: SwitchoverState) -> Self {
        Self { state }
    }
}

/// Embedder-supplied switchover logic.
///
/// An `Err` is retried by the controller; an `Ok` is persisted verbatim,
/// including an explicit `failed` state.
#[async_trait]
pub trait DrAction: Send + Sync {
    async fn execute(&self, request: ControllerRequest) -> anyhow::Result<ControllerResponse>;
}

/// Adapter for a blocking closure; runs on the blocking thread pool
pub struct FnAction<F>(Arc<F>);

impl<F> FnAction<F>
where
    F: Fn(ControllerRequest) -> anyhow::Result<ControllerResponse> + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self(Arc::new(f))
    }
}

#[async_trait]
impl<F> DrAction for FnAction<F>
where
    F: Fn(ControllerRequest) -> anyhow::Result<ControllerResponse> + Send + Sync + 'static,
{
    async fn execute(&self, request: ControllerRequest) -> anyhow::Result<ControllerResponse> {
        let f = self.0.clone();
        tokio::task::spawn_blocking(move || f(request)).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::SwitchoverStatus;
    use serde_json::json;

    fn request() -> ControllerRequest {
        ControllerRequest {
            mode: "standby".to_string(),
            no_wait: true,
            switchover_annotation: String::new(),
            status: SwitchoverState::new("active", SwitchoverStatus::Done, ""),
            event_type: EventType::Modified,
            object: json!({"spec": {}}),
        }
    }

    #[tokio::test]
    async fn test_fn_action_runs_closure() {
        let action = FnAction::new(|req: ControllerRequest| {
            Ok(SwitchoverState::new(req.mode, SwitchoverStatus::Done, "ok").into())
        });
        let response = action.execute(request()).await.unwrap();
        assert_eq!(response.state.mode, "standby");
        assert_eq!(response.state.status, SwitchoverStatus::Done);
    }

    #[tokio::test]
    async fn test_fn_action_propagates_error() {
        let action = FnAction::new(|_req: ControllerRequest| anyhow::bail!("replica lag too high"));
        let err = action.execute(request()).await.unwrap_err();
        assert_eq!(err.to_string(), "replica lag too high");
    }

    #[test]
    fn test_request_serializes_camel_case() {
        let value = serde_json::to_value(request()).unwrap();
        assert_eq!(value["noWait"], true);
        assert_eq!(value["eventType"], "MODIFIED");
        assert_eq!(value["switchoverAnnotation"], "");
        assert_eq!(value["status"]["mode"], "active");
    }
}
