//! Null flusher - accepts and discards everything
//!
//! The benchmarking and testing destination: serialization still runs,
//! transport is a counter increment.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;

use conduit_model::EventGroup;
use conduit_queue::SenderQueueItem;

use crate::context::PipelineContext;
use crate::error::Result;
use crate::plugin::{serialize::group_to_json, Flusher, FlusherFactory, PluginParams};

#[derive(Default)]
pub struct NullFlusher {
    sent: AtomicU64,
    bytes_sent: AtomicU64,
}

impl NullFlusher {
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }
}

impl Flusher for NullFlusher {
    fn serialize(&self, group: &EventGroup) -> Bytes {
        Bytes::from(group_to_json(group).to_string())
    }

    fn send(&self, item: &SenderQueueItem) -> bool {
        self.sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent
            .fetch_add(item.data.len() as u64, Ordering::Relaxed);
        true
    }

    fn name(&self) -> &'static str {
        "flusher_null"
    }
}

pub struct NullFlusherFactory;

impl FlusherFactory for NullFlusherFactory {
    fn create(&self, _params: &PluginParams, _ctx: &PipelineContext) -> Result<Box<dyn Flusher>> {
        Ok(Box::new(NullFlusher::default()))
    }

    fn name(&self) -> &'static str {
        "flusher_null"
    }
}
