//! Config diffing for reloads
//!
//! A reload compares the incoming config set against the running one by
//! name and structural equality, producing the added/modified/removed sets
//! that the pipeline manager reconciles atomically per name.

use std::collections::{HashMap, HashSet};

use crate::pipeline::PipelineConfig;

/// The reconciliation work list of one reload
#[derive(Debug, Default)]
pub struct ConfigDiff {
    pub added: Vec<PipelineConfig>,
    pub modified: Vec<PipelineConfig>,
    pub removed: Vec<String>,
}

impl ConfigDiff {
    /// Compare the running set against the incoming one
    ///
    /// An unchanged config (structurally equal body) appears in no list.
    pub fn compute(
        current: &HashMap<String, PipelineConfig>,
        incoming: Vec<PipelineConfig>,
    ) -> Self {
        let mut diff = ConfigDiff::default();
        let mut incoming_names: HashSet<String> = HashSet::with_capacity(incoming.len());

        for config in incoming {
            incoming_names.insert(config.name.clone());
            match current.get(&config.name) {
                None => diff.added.push(config),
                Some(existing) if *existing != config => diff.modified.push(config),
                Some(_) => {}
            }
        }

        for name in current.keys() {
            if !incoming_names.contains(name) {
                diff.removed.push(name.clone());
            }
        }
        diff.removed.sort_unstable();
        diff
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }
}
