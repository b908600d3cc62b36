//! Conduit - Event Model
//!
//! The unit of data flowing through a collection pipeline is the
//! [`EventGroup`]: an ordered batch of typed events sharing one string
//! arena ([`SourceBuffer`]).
//!
//! # Design
//!
//! - **Zero-copy strings**: every string in an event is a `bytes::Bytes`
//!   view into the group's arena. Cloning a view is O(1) and keeps the
//!   backing allocation alive, so the arena can never be freed while an
//!   event still references it.
//! - **Move on the hot path**: groups are passed by move between pipeline
//!   stages. Fan-out to multiple flushers uses [`EventGroup::shallow_copy`],
//!   which clones event metadata and shares the arena bytes.
//! - **Size accounting**: [`EventGroup::data_size`] feeds the byte gauges
//!   of the queue layer; queues treat the payload as opaque beyond this.

mod buffer;
mod event;
mod group;

pub use buffer::SourceBuffer;
pub use event::{Event, EventType, LogEvent, MetricEvent, SpanEvent, Timestamp};
pub use group::EventGroup;

/// Initial arena chunk capacity in bytes
pub const DEFAULT_ARENA_CAPACITY: usize = 4096;
