//! Routing conditions
//!
//! A condition decides whether an event group goes to a given flusher.
//! The JSON shape is validated strictly at pipeline init: a missing or
//! malformed `Type`, a missing `Value`, or a `tag` without `Key` fails
//! initialization rather than silently matching nothing.
//!
//! ```json
//! { "Type": "event_type", "Value": "log" }
//! { "Type": "tag", "Key": "level", "Value": "INFO", "DiscardingTag": true }
//! ```

use serde_json::Value;

use conduit_model::{EventGroup, EventType};

use crate::error::{PipelineError, Result};

/// Matches groups whose events all share one type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTypeCondition {
    expected: EventType,
}

impl EventTypeCondition {
    pub fn check(&self, group: &EventGroup) -> bool {
        group.all_events_of_type(self.expected)
    }
}

/// Matches groups carrying a tag, optionally consuming it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagCondition {
    key: String,
    value: String,
    discarding_tag: bool,
}

impl TagCondition {
    pub fn check(&self, group: &EventGroup) -> bool {
        group
            .get_tag(self.key.as_bytes())
            .map(|v| v.as_ref() == self.value.as_bytes())
            .unwrap_or(false)
    }

    /// Check, and on a discarding match remove the tag from the group
    pub fn get_result(&self, group: &mut EventGroup) -> bool {
        if !self.check(group) {
            return false;
        }
        if self.discarding_tag {
            group.del_tag(self.key.as_bytes());
        }
        true
    }
}

/// The closed set of routing conditions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    EventType(EventTypeCondition),
    Tag(TagCondition),
}

impl Condition {
    /// Build from the JSON condition schema; strict on shape
    pub fn from_json(pipeline: &str, value: &Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            PipelineError::config(pipeline, "route condition must be a JSON object")
        })?;
        let condition_type = match object.get("Type") {
            Some(Value::String(s)) if !s.is_empty() => s.as_str(),
            Some(Value::String(_)) => {
                return Err(PipelineError::config(pipeline, "condition Type is empty"))
            }
            Some(_) => {
                return Err(PipelineError::config(
                    pipeline,
                    "condition Type must be a string",
                ))
            }
            None => {
                return Err(PipelineError::config(pipeline, "condition Type is missing"))
            }
        };
        let value_field = match object.get("Value") {
            Some(Value::String(s)) if !s.is_empty() => s.as_str(),
            _ => {
                return Err(PipelineError::config(
                    pipeline,
                    format!("condition of type '{condition_type}' requires a string Value"),
                ))
            }
        };

        match condition_type {
            "event_type" => {
                let expected = match value_field {
                    "log" => EventType::Log,
                    "metric" => EventType::Metric,
                    "trace" => EventType::Span,
                    other => {
                        return Err(PipelineError::config(
                            pipeline,
                            format!("unknown event type '{other}' in condition"),
                        ))
                    }
                };
                Ok(Condition::EventType(EventTypeCondition { expected }))
            }
            "tag" => {
                let key = match object.get("Key") {
                    Some(Value::String(s)) if !s.is_empty() => s.clone(),
                    _ => {
                        return Err(PipelineError::config(
                            pipeline,
                            "tag condition requires a string Key",
                        ))
                    }
                };
                let discarding_tag = object
                    .get("DiscardingTag")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                Ok(Condition::Tag(TagCondition {
                    key,
                    value: value_field.to_string(),
                    discarding_tag,
                }))
            }
            other => Err(PipelineError::config(
                pipeline,
                format!("unknown condition type '{other}'"),
            )),
        }
    }

    /// Pure match test, no side effects
    pub fn check(&self, group: &EventGroup) -> bool {
        match self {
            Condition::EventType(c) => c.check(group),
            Condition::Tag(c) => c.check(group),
        }
    }

    /// Match test with the discarding-tag side effect applied on success
    pub fn get_result(&self, group: &mut EventGroup) -> bool {
        match self {
            Condition::EventType(c) => c.check(group),
            Condition::Tag(c) => c.get_result(group),
        }
    }
}

#[cfg(test)]
#[path = "condition_test.rs"]
mod tests;
