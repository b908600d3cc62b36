//! Group-to-JSON serialization shared by the built-in flushers

use serde_json::{json, Map, Value};

use conduit_model::{Event, EventGroup};

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Render a group as one JSON object
///
/// Real flushers own their wire formats; this is the diagnostic format
/// the stdout flusher emits and tests assert against.
pub fn group_to_json(group: &EventGroup) -> Value {
    let tags: Map<String, Value> = group
        .tags()
        .iter()
        .map(|(k, v)| (lossy(k), Value::String(lossy(v))))
        .collect();

    let events: Vec<Value> = group
        .events()
        .iter()
        .map(|event| match event {
            Event::Log(e) => {
                let contents: Map<String, Value> = e
                    .contents()
                    .iter()
                    .map(|(k, v)| (lossy(k), Value::String(lossy(v))))
                    .collect();
                json!({
                    "type": "log",
                    "timestamp": e.timestamp.secs,
                    "timestamp_nanos": e.timestamp.nanos,
                    "contents": contents,
                })
            }
            Event::Metric(e) => json!({
                "type": "metric",
                "timestamp": e.timestamp.secs,
                "name": lossy(&e.name),
                "value": e.value,
            }),
            Event::Span(e) => json!({
                "type": "span",
                "timestamp": e.timestamp.secs,
                "name": lossy(&e.name),
                "trace_id": lossy(&e.trace_id),
                "span_id": lossy(&e.span_id),
                "duration_ns": e.duration_ns,
            }),
        })
        .collect();

    json!({ "tags": tags, "events": events })
}
