use super::*;

#[test]
fn request_sets_fields() {
    let frame = Frame::request("presentation:open", Data::new());
    assert_eq!(frame.syscall, "presentation:open");
    assert_eq!(frame.status, Status::Request);
    assert!(frame.parent_id.is_none());
    assert!(frame.presentation_id.is_none());
    assert!(frame.ts > 0);
}

#[test]
fn reply_inherits_context() {
    let presentation_id = Uuid::new_v4();
    let req = Frame::request("slide:add", Data::new()).with_presentation_id(presentation_id);
    let done = req.done();

    assert_eq!(done.parent_id, Some(req.id));
    assert_eq!(done.presentation_id, Some(presentation_id));
    assert_eq!(done.syscall, "slide:add");
    assert_eq!(done.status, Status::Done);
}

#[test]
fn done_with_carries_payload() {
    let req = Frame::request("canvas:save", Data::new());
    let done = req.done_with(Data::from([("applied".to_string(), serde_json::json!(true))]));
    assert_eq!(done.status, Status::Done);
    assert_eq!(done.data.get("applied"), Some(&serde_json::json!(true)));
}

#[test]
fn prefix_and_op_extraction() {
    let frame = Frame::request("slide:switch", Data::new());
    assert_eq!(frame.prefix(), "slide");
    assert_eq!(frame.op(), "switch");

    let frame = Frame::request("noseparator", Data::new());
    assert_eq!(frame.prefix(), "noseparator");
    assert_eq!(frame.op(), "");
}

#[test]
fn minimal_inbound_json_parses() {
    let id = Uuid::new_v4();
    let raw = format!(r#"{{"id":"{id}","parent_id":null,"ts":1,"syscall":"slide:add","status":"request"}}"#);
    let frame: Frame = serde_json::from_str(&raw).expect("frame should parse without data");
    assert_eq!(frame.id, id);
    assert!(frame.data.is_empty());
    assert!(frame.from.is_none());
}

#[test]
fn error_from_typed() {
    #[derive(Debug, thiserror::Error)]
    #[error("not found")]
    struct NotFound;

    impl ErrorCode for NotFound {
        fn error_code(&self) -> &'static str {
            "E_NOT_FOUND"
        }
    }

    let req = Frame::request("presentation:open", Data::new());
    let err = req.error_from(&NotFound);

    assert_eq!(err.status, Status::Error);
    assert_eq!(err.data.get("code").and_then(|v| v.as_str()), Some("E_NOT_FOUND"));
    assert_eq!(err.data.get("message").and_then(|v| v.as_str()), Some("not found"));
    assert_eq!(
        err.data
            .get("retryable")
            .and_then(serde_json::Value::as_bool),
        Some(false)
    );
}

#[test]
fn status_wire_names() {
    assert_eq!(serde_json::to_value(Status::Done).unwrap(), "done");
    assert_eq!(serde_json::from_value::<Status>(serde_json::json!("error")).unwrap(), Status::Error);
    assert!(serde_json::from_value::<Status>(serde_json::json!("item")).is_err());
}
