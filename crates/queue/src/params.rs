//! Queue sizing parameters

use crate::error::{QueueError, Result};

/// Capacity and watermarks of a bounded queue
///
/// `valid_to_push` is cleared from the instant the queue reaches
/// `high_watermark` until it drains back to `low_watermark`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueParam {
    pub capacity: usize,
    pub low_watermark: usize,
    pub high_watermark: usize,
}

impl QueueParam {
    pub fn new(capacity: usize, low_watermark: usize, high_watermark: usize) -> Self {
        Self {
            capacity,
            low_watermark,
            high_watermark,
        }
    }

    /// Enforce `low < high <= capacity`
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(QueueError::InvalidParam {
                reason: "capacity must be positive".into(),
            });
        }
        if self.low_watermark >= self.high_watermark {
            return Err(QueueError::InvalidParam {
                reason: format!(
                    "low watermark {} must be below high watermark {}",
                    self.low_watermark, self.high_watermark
                ),
            });
        }
        if self.high_watermark > self.capacity {
            return Err(QueueError::InvalidParam {
                reason: format!(
                    "high watermark {} exceeds capacity {}",
                    self.high_watermark, self.capacity
                ),
            });
        }
        Ok(())
    }
}

impl Default for QueueParam {
    fn default() -> Self {
        Self {
            capacity: 20,
            low_watermark: 10,
            high_watermark: 15,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_param_is_valid() {
        assert!(QueueParam::default().validate().is_ok());
    }

    #[test]
    fn rejects_inverted_watermarks() {
        assert!(QueueParam::new(6, 4, 4).validate().is_err());
        assert!(QueueParam::new(6, 5, 4).validate().is_err());
        assert!(QueueParam::new(4, 2, 6).validate().is_err());
        assert!(QueueParam::new(0, 0, 0).validate().is_err());
        assert!(QueueParam::new(6, 2, 4).validate().is_ok());
    }
}
