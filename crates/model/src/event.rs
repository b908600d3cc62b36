//! Event - the tagged union of telemetry payloads
//!
//! Three event kinds flow through a pipeline: log records, metric samples,
//! and tracing spans. All string fields are arena views (`bytes::Bytes`).

use bytes::Bytes;

/// Event timestamp with nanosecond precision
///
/// Nanoseconds are carried only when the pipeline enables them; otherwise
/// they are zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timestamp {
    pub secs: i64,
    pub nanos: u32,
}

impl Timestamp {
    #[inline]
    pub const fn from_secs(secs: i64) -> Self {
        Self { secs, nanos: 0 }
    }

    #[inline]
    pub const fn new(secs: i64, nanos: u32) -> Self {
        Self { secs, nanos }
    }
}

/// Discriminant of the event union
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Log,
    Metric,
    Span,
}

impl EventType {
    /// Name used in routing conditions and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Log => "log",
            EventType::Metric => "metric",
            EventType::Span => "span",
        }
    }
}

/// A log record: ordered key/value contents
#[derive(Debug, Clone, Default)]
pub struct LogEvent {
    pub timestamp: Timestamp,
    contents: Vec<(Bytes, Bytes)>,
}

impl LogEvent {
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            contents: Vec::new(),
        }
    }

    /// Append a content pair; duplicate keys are kept in order
    pub fn set_content(&mut self, key: Bytes, value: Bytes) {
        self.contents.push((key, value));
    }

    /// Look up the first content value for a key
    pub fn content(&self, key: &[u8]) -> Option<&Bytes> {
        self.contents
            .iter()
            .find(|(k, _)| k.as_ref() == key)
            .map(|(_, v)| v)
    }

    #[inline]
    pub fn contents(&self) -> &[(Bytes, Bytes)] {
        &self.contents
    }

    fn data_size(&self) -> usize {
        self.contents
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

/// A metric sample
#[derive(Debug, Clone, Default)]
pub struct MetricEvent {
    pub timestamp: Timestamp,
    pub name: Bytes,
    pub value: f64,
    tags: Vec<(Bytes, Bytes)>,
}

impl MetricEvent {
    pub fn new(timestamp: Timestamp, name: Bytes, value: f64) -> Self {
        Self {
            timestamp,
            name,
            value,
            tags: Vec::new(),
        }
    }

    pub fn set_tag(&mut self, key: Bytes, value: Bytes) {
        self.tags.push((key, value));
    }

    #[inline]
    pub fn tags(&self) -> &[(Bytes, Bytes)] {
        &self.tags
    }

    fn data_size(&self) -> usize {
        self.name.len()
            + std::mem::size_of::<f64>()
            + self.tags.iter().map(|(k, v)| k.len() + v.len()).sum::<usize>()
    }
}

/// A tracing span
#[derive(Debug, Clone, Default)]
pub struct SpanEvent {
    pub timestamp: Timestamp,
    pub name: Bytes,
    pub trace_id: Bytes,
    pub span_id: Bytes,
    pub duration_ns: u64,
    tags: Vec<(Bytes, Bytes)>,
}

impl SpanEvent {
    pub fn new(timestamp: Timestamp, name: Bytes) -> Self {
        Self {
            timestamp,
            name,
            ..Default::default()
        }
    }

    pub fn set_tag(&mut self, key: Bytes, value: Bytes) {
        self.tags.push((key, value));
    }

    #[inline]
    pub fn tags(&self) -> &[(Bytes, Bytes)] {
        &self.tags
    }

    fn data_size(&self) -> usize {
        self.name.len()
            + self.trace_id.len()
            + self.span_id.len()
            + std::mem::size_of::<u64>()
            + self.tags.iter().map(|(k, v)| k.len() + v.len()).sum::<usize>()
    }
}

/// The tagged union flowing through the pipeline
#[derive(Debug, Clone)]
pub enum Event {
    Log(LogEvent),
    Metric(MetricEvent),
    Span(SpanEvent),
}

impl Event {
    #[inline]
    pub fn event_type(&self) -> EventType {
        match self {
            Event::Log(_) => EventType::Log,
            Event::Metric(_) => EventType::Metric,
            Event::Span(_) => EventType::Span,
        }
    }

    #[inline]
    pub fn timestamp(&self) -> Timestamp {
        match self {
            Event::Log(e) => e.timestamp,
            Event::Metric(e) => e.timestamp,
            Event::Span(e) => e.timestamp,
        }
    }

    /// Estimated payload bytes, used for queue byte accounting
    pub fn data_size(&self) -> usize {
        let base = std::mem::size_of::<Timestamp>();
        base + match self {
            Event::Log(e) => e.data_size(),
            Event::Metric(e) => e.data_size(),
            Event::Span(e) => e.data_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_event_contents_keep_order() {
        let mut e = LogEvent::new(Timestamp::from_secs(100));
        e.set_content(Bytes::from_static(b"k1"), Bytes::from_static(b"v1"));
        e.set_content(Bytes::from_static(b"k2"), Bytes::from_static(b"v2"));
        assert_eq!(e.contents().len(), 2);
        assert_eq!(e.content(b"k1").unwrap().as_ref(), b"v1");
        assert!(e.content(b"missing").is_none());
    }

    #[test]
    fn event_type_matches_variant() {
        let log = Event::Log(LogEvent::default());
        let metric = Event::Metric(MetricEvent::default());
        let span = Event::Span(SpanEvent::default());
        assert_eq!(log.event_type(), EventType::Log);
        assert_eq!(metric.event_type(), EventType::Metric);
        assert_eq!(span.event_type(), EventType::Span);
        assert_eq!(EventType::Span.as_str(), "span");
    }

    #[test]
    fn data_size_counts_contents() {
        let mut e = LogEvent::new(Timestamp::from_secs(1));
        e.set_content(Bytes::from_static(b"key"), Bytes::from_static(b"value"));
        let size = Event::Log(e).data_size();
        assert_eq!(size, std::mem::size_of::<Timestamp>() + 8);
    }
}
