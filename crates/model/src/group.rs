//! EventGroup - an ordered batch of events sharing one arena

use bytes::Bytes;

use crate::buffer::SourceBuffer;
use crate::event::{Event, EventType, LogEvent, MetricEvent, SpanEvent, Timestamp};

/// Batch of events plus group-level tags and the owning arena
///
/// Groups move through the pipeline; the only sanctioned duplication is
/// [`EventGroup::shallow_copy`], which clones event metadata while sharing
/// the arena bytes through their refcounts.
#[derive(Debug, Default)]
pub struct EventGroup {
    events: Vec<Event>,
    tags: Vec<(Bytes, Bytes)>,
    buffer: SourceBuffer,
}

impl EventGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy a string into the group's arena
    #[inline]
    pub fn copy_string(&mut self, s: &[u8]) -> Bytes {
        self.buffer.copy_string(s)
    }

    /// Append an already-built event
    pub fn push_event(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Build and append a log event from borrowed contents
    pub fn add_log_event(&mut self, timestamp: Timestamp, contents: &[(&[u8], &[u8])]) {
        let mut event = LogEvent::new(timestamp);
        for (k, v) in contents {
            let key = self.buffer.copy_string(k);
            let value = self.buffer.copy_string(v);
            event.set_content(key, value);
        }
        self.events.push(Event::Log(event));
    }

    /// Build and append a metric event
    pub fn add_metric_event(&mut self, timestamp: Timestamp, name: &[u8], value: f64) {
        let name = self.buffer.copy_string(name);
        self.events.push(Event::Metric(MetricEvent::new(timestamp, name, value)));
    }

    /// Build and append a span event
    pub fn add_span_event(&mut self, timestamp: Timestamp, name: &[u8]) {
        let name = self.buffer.copy_string(name);
        self.events.push(Event::Span(SpanEvent::new(timestamp, name)));
    }

    #[inline]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    #[inline]
    pub fn events_mut(&mut self) -> &mut Vec<Event> {
        &mut self.events
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Set a group tag, replacing an existing value for the same key
    pub fn set_tag(&mut self, key: &[u8], value: &[u8]) {
        let value = self.buffer.copy_string(value);
        if let Some(entry) = self.tags.iter_mut().find(|(k, _)| k.as_ref() == key) {
            entry.1 = value;
        } else {
            let key = self.buffer.copy_string(key);
            self.tags.push((key, value));
        }
    }

    pub fn get_tag(&self, key: &[u8]) -> Option<&Bytes> {
        self.tags
            .iter()
            .find(|(k, _)| k.as_ref() == key)
            .map(|(_, v)| v)
    }

    #[inline]
    pub fn has_tag(&self, key: &[u8]) -> bool {
        self.get_tag(key).is_some()
    }

    /// Remove a group tag; returns whether it was present
    pub fn del_tag(&mut self, key: &[u8]) -> bool {
        let before = self.tags.len();
        self.tags.retain(|(k, _)| k.as_ref() != key);
        self.tags.len() != before
    }

    #[inline]
    pub fn tags(&self) -> &[(Bytes, Bytes)] {
        &self.tags
    }

    /// True iff every event in the group has the given type
    ///
    /// An empty group matches no type.
    pub fn all_events_of_type(&self, event_type: EventType) -> bool {
        !self.events.is_empty() && self.events.iter().all(|e| e.event_type() == event_type)
    }

    /// Estimated payload bytes of events plus group tags
    pub fn data_size(&self) -> usize {
        self.events.iter().map(Event::data_size).sum::<usize>()
            + self.tags.iter().map(|(k, v)| k.len() + v.len()).sum::<usize>()
    }

    /// Clone the group's metadata while sharing the arena bytes
    ///
    /// Event strings are refcounted views, so the copy holds the same
    /// backing allocations; no payload bytes are duplicated. The copy gets
    /// a fresh, empty arena for any strings written after the split.
    pub fn shallow_copy(&self) -> Self {
        Self {
            events: self.events.clone(),
            tags: self.tags.clone(),
            buffer: SourceBuffer::new(),
        }
    }
}

#[cfg(test)]
#[path = "group_test.rs"]
mod tests;
