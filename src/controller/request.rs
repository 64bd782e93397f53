use serde_json::Value;

use super::action::ControllerRequest;
use crate::config::DisasterRecoveryPaths;
use crate::crd::SWITCHOVER_ANNOTATION_KEY;
use crate::document::{nested_bool, nested_string, parse_bool, EventType, FieldPath};
use crate::error::Result;
use crate::switchover::status_from_document;

/// Build a controller request from raw document content.
///
/// Fails when a field has the wrong type or when a string-typed no-wait flag
/// is present but not a boolean. Absent fields read as empty strings and a
/// missing no-wait flag as `false`; whether an empty mode is acceptable is up
/// to the caller.
pub fn build_controller_request(
    object: &Value,
    paths: &DisasterRecoveryPaths,
    event_type: EventType,
) -> Result<ControllerRequest> {
    let mode = nested_string(object, &paths.mode)?.unwrap_or_default();

    let no_wait = if paths.no_wait_as_string {
        match nested_string(object, &paths.no_wait)? {
            Some(raw) => parse_bool(&raw)?,
            None => false,
        }
    } else {
        nested_bool(object, &paths.no_wait)?.unwrap_or(false)
    };

    let annotation_path = FieldPath::new(["metadata", "annotations", SWITCHOVER_ANNOTATION_KEY]);
    let switchover_annotation = nested_string(object, &annotation_path)?.unwrap_or_default();

    Ok(ControllerRequest {
        mode,
        no_wait,
        switchover_annotation,
        status: status_from_document(object, &paths.status)?,
        event_type,
        object: object.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StatusPaths;
    use crate::crd::SwitchoverStatus;
    use crate::error::Error;
    use serde_json::json;

    fn data_paths() -> DisasterRecoveryPaths {
        DisasterRecoveryPaths {
            mode: FieldPath::parse("data.mode"),
            no_wait: FieldPath::parse("data.noWait"),
            no_wait_as_string: true,
            status: StatusPaths {
                mode: FieldPath::parse("data.status_mode"),
                status: FieldPath::parse("data.status_status"),
                comment: FieldPath::parse("data.status_comment"),
                treat_status_as_field: true,
            },
        }
    }

    #[test]
    fn test_builds_from_default_layout() {
        let doc = json!({
            "metadata": {"annotations": {"switchoverRetry": "42"}},
            "spec": {"disasterRecovery": {"mode": "standby", "noWait": true}},
            "status": {"disasterRecoveryStatus": {"mode": "active", "status": "done", "comment": "ok"}}
        });
        let request =
            build_controller_request(&doc, &DisasterRecoveryPaths::default_layout(false), EventType::Added)
                .unwrap();

        assert_eq!(request.mode, "standby");
        assert!(request.no_wait);
        assert_eq!(request.switchover_annotation, "42");
        assert_eq!(request.status.mode, "active");
        assert_eq!(request.status.status, SwitchoverStatus::Done);
        assert_eq!(request.status.comment, "ok");
        assert_eq!(request.event_type, EventType::Added);
        assert_eq!(request.object, doc);
    }

    #[test]
    fn test_string_no_wait() {
        let doc = json!({"data": {"mode": "active", "noWait": "True"}});
        assert!(build_controller_request(&doc, &data_paths(), EventType::Modified).unwrap().no_wait);

        let doc = json!({"data": {"mode": "active"}});
        assert!(!build_controller_request(&doc, &data_paths(), EventType::Modified).unwrap().no_wait);
    }

    #[test]
    fn test_absent_fields_read_as_empty() {
        let request = build_controller_request(&json!({"data": {}}), &data_paths(), EventType::Added).unwrap();
        assert_eq!(request.mode, "");
        assert_eq!(request.switchover_annotation, "");
        assert!(request.status.status.is_unset());
    }

    #[test]
    fn test_malformed_documents() {
        let paths = data_paths();
        for doc in [
            json!({"data": {"mode": "active", "noWait": ""}}),
            json!({"data": {"mode": "active", "noWait": "maybe"}}),
            json!({"data": {"mode": 5}}),
            json!({"data": {"mode": "active", "status_status": "paused"}}),
        ] {
            let err = build_controller_request(&doc, &paths, EventType::Added).unwrap_err();
            assert!(matches!(err, Error::DocumentError(_)), "{doc}: {err:?}");
        }
    }

    #[test]
    fn test_bool_no_wait_rejects_string() {
        let doc = json!({"spec": {"disasterRecovery": {"mode": "active", "noWait": "true"}}});
        assert!(build_controller_request(
            &doc,
            &DisasterRecoveryPaths::default_layout(false),
            EventType::Added
        )
        .is_err());
    }
}
