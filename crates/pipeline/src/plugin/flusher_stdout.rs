//! Stdout flusher - JSON lines on standard output
//!
//! The development destination: each routed group becomes one JSON line.

use std::io::Write;

use bytes::Bytes;

use conduit_model::EventGroup;
use conduit_queue::SenderQueueItem;

use crate::context::PipelineContext;
use crate::error::Result;
use crate::plugin::{serialize::group_to_json, Flusher, FlusherFactory, PluginParams};

pub struct StdoutFlusher;

impl Flusher for StdoutFlusher {
    fn serialize(&self, group: &EventGroup) -> Bytes {
        Bytes::from(group_to_json(group).to_string())
    }

    fn send(&self, item: &SenderQueueItem) -> bool {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        if handle.write_all(&item.data).is_err() {
            return false;
        }
        handle.write_all(b"\n").is_ok()
    }

    fn name(&self) -> &'static str {
        "flusher_stdout"
    }
}

pub struct StdoutFlusherFactory;

impl FlusherFactory for StdoutFlusherFactory {
    fn create(&self, _params: &PluginParams, _ctx: &PipelineContext) -> Result<Box<dyn Flusher>> {
        Ok(Box::new(StdoutFlusher))
    }

    fn name(&self) -> &'static str {
        "flusher_stdout"
    }
}
