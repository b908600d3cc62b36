//! Priority buckets with round-robin rotation inside each priority
//!
//! Shared by the process-queue registries: pop sweeps priorities in
//! ascending order and resumes each bucket after the queue it last served.

use std::collections::BTreeMap;

use crate::key::QueueKey;

#[derive(Debug, Default)]
pub(crate) struct PriorityBuckets {
    buckets: BTreeMap<u32, Bucket>,
}

#[derive(Debug, Default)]
struct Bucket {
    keys: Vec<QueueKey>,
    cursor: usize,
}

impl PriorityBuckets {
    pub(crate) fn insert(&mut self, priority: u32, key: QueueKey) {
        let bucket = self.buckets.entry(priority).or_default();
        if !bucket.keys.contains(&key) {
            bucket.keys.push(key);
        }
    }

    /// Move a key to a different priority (no-op when unchanged)
    pub(crate) fn reassign(&mut self, old: u32, new: u32, key: QueueKey) {
        if old == new {
            return;
        }
        self.remove(old, key);
        self.insert(new, key);
    }

    pub(crate) fn remove(&mut self, priority: u32, key: QueueKey) {
        if let Some(bucket) = self.buckets.get_mut(&priority) {
            bucket.keys.retain(|k| *k != key);
            if bucket.keys.is_empty() {
                self.buckets.remove(&priority);
            } else if bucket.cursor >= bucket.keys.len() {
                bucket.cursor = 0;
            }
        }
    }

    pub(crate) fn priorities(&self) -> Vec<u32> {
        self.buckets.keys().copied().collect()
    }

    /// Visit the bucket's keys starting after the last served one, until
    /// `try_pop` succeeds; advances the cursor past the winner
    pub(crate) fn round_robin<T>(
        &mut self,
        priority: u32,
        mut try_pop: impl FnMut(QueueKey) -> Option<T>,
    ) -> Option<T> {
        let bucket = self.buckets.get_mut(&priority)?;
        let len = bucket.keys.len();
        for offset in 0..len {
            let index = (bucket.cursor + offset) % len;
            if let Some(value) = try_pop(bucket.keys[index]) {
                bucket.cursor = (index + 1) % len;
                return Some(value);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_robin_resumes_after_the_winner() {
        let mut buckets = PriorityBuckets::default();
        buckets.insert(0, QueueKey(1));
        buckets.insert(0, QueueKey(2));
        buckets.insert(0, QueueKey(3));

        let popped = buckets.round_robin(0, Some).unwrap();
        assert_eq!(popped, QueueKey(1));
        let popped = buckets.round_robin(0, Some).unwrap();
        assert_eq!(popped, QueueKey(2));

        // A queue with nothing to offer is skipped.
        let popped = buckets
            .round_robin(0, |k| if k == QueueKey(3) { None } else { Some(k) })
            .unwrap();
        assert_eq!(popped, QueueKey(1));
    }

    #[test]
    fn remove_keeps_cursor_in_range() {
        let mut buckets = PriorityBuckets::default();
        buckets.insert(1, QueueKey(1));
        buckets.insert(1, QueueKey(2));
        buckets.round_robin(1, Some);
        buckets.round_robin(1, Some);
        buckets.remove(1, QueueKey(2));
        assert_eq!(buckets.round_robin(1, Some), Some(QueueKey(1)));
    }
}
