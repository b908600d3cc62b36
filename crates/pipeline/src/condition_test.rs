//! Tests for condition parsing and matching, covering the strict init
//! rules and the discarding-tag side effect

use serde_json::json;

use conduit_model::{EventGroup, Timestamp};

use crate::condition::Condition;

fn log_group() -> EventGroup {
    let mut group = EventGroup::new();
    group.add_log_event(Timestamp::from_secs(1), &[(b"msg", b"hello")]);
    group
}

#[test]
fn init_accepts_the_documented_shapes() {
    let cond = Condition::from_json("t", &json!({ "Type": "event_type", "Value": "log" })).unwrap();
    assert!(matches!(cond, Condition::EventType(_)));

    let cond = Condition::from_json(
        "t",
        &json!({ "Type": "tag", "Key": "level", "Value": "INFO" }),
    )
    .unwrap();
    assert!(matches!(cond, Condition::Tag(_)));
}

#[test]
fn init_rejects_malformed_shapes() {
    // field name is case-sensitive
    assert!(Condition::from_json("t", &json!({ "type": "event_type" })).is_err());
    // Type must be a non-empty string
    assert!(Condition::from_json("t", &json!({ "Type": true })).is_err());
    assert!(Condition::from_json("t", &json!({ "Type": "" })).is_err());
    assert!(Condition::from_json("t", &json!({ "Type": "unknown", "Value": "x" })).is_err());
    // Value is required
    assert!(Condition::from_json("t", &json!({ "Type": "event_type" })).is_err());
    // tag needs a Key
    assert!(Condition::from_json("t", &json!({ "Type": "tag", "Value": "INFO" })).is_err());
    // unknown event type value
    assert!(
        Condition::from_json("t", &json!({ "Type": "event_type", "Value": "frobs" })).is_err()
    );
}

#[test]
fn event_type_matches_only_homogeneous_groups() {
    let cond = Condition::from_json("t", &json!({ "Type": "event_type", "Value": "log" })).unwrap();
    let mut group = log_group();
    assert!(cond.check(&group));

    let metric_cond =
        Condition::from_json("t", &json!({ "Type": "event_type", "Value": "metric" })).unwrap();
    assert!(!metric_cond.check(&group));

    // a mixed group matches neither
    group.add_metric_event(Timestamp::from_secs(2), b"cpu", 1.0);
    assert!(!cond.check(&group));
    assert!(!metric_cond.check(&group));
}

#[test]
fn trace_value_matches_span_events() {
    let cond =
        Condition::from_json("t", &json!({ "Type": "event_type", "Value": "trace" })).unwrap();
    let mut group = EventGroup::new();
    group.add_span_event(Timestamp::from_secs(1), b"handle");
    assert!(cond.check(&group));
}

#[test]
fn tag_condition_checks_exact_value() {
    let cond = Condition::from_json(
        "t",
        &json!({ "Type": "tag", "Key": "level", "Value": "INFO" }),
    )
    .unwrap();
    let mut group = log_group();
    assert!(!cond.check(&group));
    group.set_tag(b"level", b"WARN");
    assert!(!cond.check(&group));
    group.set_tag(b"level", b"INFO");
    assert!(cond.check(&group));
}

#[test]
fn discarding_tag_removes_the_tag_exactly_once() {
    let cond = Condition::from_json(
        "t",
        &json!({ "Type": "tag", "Key": "level", "Value": "INFO", "DiscardingTag": true }),
    )
    .unwrap();
    let mut group = log_group();
    group.set_tag(b"level", b"INFO");

    assert!(cond.get_result(&mut group));
    assert!(!group.has_tag(b"level"));

    // the tag is gone, so the next evaluation does not match
    assert!(!cond.get_result(&mut group));
}

#[test]
fn non_discarding_match_leaves_the_tag() {
    let cond = Condition::from_json(
        "t",
        &json!({ "Type": "tag", "Key": "level", "Value": "INFO" }),
    )
    .unwrap();
    let mut group = log_group();
    group.set_tag(b"level", b"INFO");
    assert!(cond.get_result(&mut group));
    assert!(group.has_tag(b"level"));
}
