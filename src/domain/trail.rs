// Bounded trail of recent positions
use super::position::PositionSample;
use std::collections::VecDeque;

pub const DEFAULT_TRAIL_CAPACITY: usize = 10;

/// Fixed-capacity FIFO of position samples, oldest first
#[derive(Debug, Clone, PartialEq)]
pub struct TrailBuffer {
    samples: VecDeque<PositionSample>,
    capacity: usize,
}

impl TrailBuffer {
    /// A capacity of zero is clamped to one so the trail can always end
    /// with the last known position.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, returning the evicted oldest sample on overflow
    pub fn append(&mut self, sample: PositionSample) -> Option<PositionSample> {
        let evicted = if self.samples.len() == self.capacity {
            self.samples.pop_front()
        } else {
            None
        };
        self.samples.push_back(sample);
        evicted
    }

    /// Samples in arrival order, oldest first
    pub fn as_sequence(&self) -> Vec<PositionSample> {
        self.samples.iter().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PositionSample> {
        self.samples.iter()
    }

    #[cfg(test)]
    pub fn last(&self) -> Option<&PositionSample> {
        self.samples.back()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for TrailBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_TRAIL_CAPACITY)
    }
}
