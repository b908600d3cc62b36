//! Router - pipeline-internal demultiplexer
//!
//! Evaluates route conditions in declaration order and fans each event
//! group out to the matching flushers. Fan-out is a shallow copy: event
//! metadata is cloned, payload bytes stay shared through the arena's
//! refcounts. Without a `route` table every group goes to all flushers.

use conduit_config::RouteEntry;
use conduit_model::EventGroup;

use crate::condition::Condition;
use crate::error::{PipelineError, Result};

/// Ordered condition table mapping groups to flusher indices
pub struct Router {
    entries: Vec<(Condition, usize)>,
    /// No route config: the implicit all-flushers branch
    all_flushers: bool,
    flusher_count: usize,
}

impl Router {
    /// Compile the route table; a malformed condition fails pipeline init
    pub fn init(
        pipeline: &str,
        route: Option<&[RouteEntry]>,
        flusher_count: usize,
    ) -> Result<Self> {
        match route {
            None => Ok(Self {
                entries: Vec::new(),
                all_flushers: true,
                flusher_count,
            }),
            Some(entries) => {
                let mut compiled = Vec::with_capacity(entries.len());
                for entry in entries {
                    if entry.flusher_index >= flusher_count {
                        return Err(PipelineError::config(
                            pipeline,
                            format!(
                                "route references flusher {} of {}",
                                entry.flusher_index, flusher_count
                            ),
                        ));
                    }
                    let condition = Condition::from_json(pipeline, &entry.condition)?;
                    compiled.push((condition, entry.flusher_index));
                }
                Ok(Self {
                    entries: compiled,
                    all_flushers: false,
                    flusher_count,
                })
            }
        }
    }

    /// Route one group, consuming it
    ///
    /// Returns `(flusher_index, group)` pairs, one per matching flusher:
    /// delivery is set-equal to the matched entries' targets, so a flusher
    /// named by several matching entries still receives the group once.
    /// Discarding-tag side effects are applied to the group before the
    /// fan-out copies are taken, so every recipient sees the tag removed.
    /// The group itself moves into the last target; earlier targets get
    /// shallow copies.
    pub fn route(&self, mut group: EventGroup) -> Vec<(usize, EventGroup)> {
        let targets: Vec<usize> = if self.all_flushers {
            (0..self.flusher_count).collect()
        } else {
            let mut targets = Vec::new();
            for (condition, index) in &self.entries {
                // Evaluate every entry: a discarding match consumes its
                // tag even when the target is already on the list.
                if condition.get_result(&mut group) && !targets.contains(index) {
                    targets.push(*index);
                }
            }
            targets
        };

        if targets.is_empty() {
            return Vec::new();
        }

        let mut routed = Vec::with_capacity(targets.len());
        let last = targets.len() - 1;
        for (position, index) in targets.iter().enumerate() {
            if position == last {
                routed.push((*index, std::mem::take(&mut group)));
            } else {
                routed.push((*index, group.shallow_copy()));
            }
        }
        routed
    }

    #[inline]
    pub fn routes_to_all(&self) -> bool {
        self.all_flushers
    }

    #[inline]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
#[path = "router_test.rs"]
mod tests;
