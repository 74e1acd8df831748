use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use super::types::DetectedObject;

/// Fixed-capacity FIFO. Pushing into a full buffer evicts the oldest entry first.
#[derive(Debug, Clone)]
pub struct BoundedHistory<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedHistory<T> {
    pub fn new(capacity: usize) -> Self {
        Self { entries: VecDeque::with_capacity(capacity), capacity }
    }

    /// Returns the evicted entry, if any.
    pub fn push(&mut self, item: T) -> Option<T> {
        if self.capacity == 0 { return Some(item); }
        let evicted = if self.entries.len() == self.capacity { self.entries.pop_front() } else { None };
        self.entries.push_back(item);
        evicted
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
    pub fn capacity(&self) -> usize { self.capacity }
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator { self.entries.iter() }
    pub fn last(&self) -> Option<&T> { self.entries.back() }
    pub fn clear(&mut self) { self.entries.clear(); }
}

#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    pub timestamp: DateTime<Utc>,
    pub objects: Vec<DetectedObject>,
}

impl FrameSnapshot {
    pub fn count(&self) -> usize { self.objects.len() }
}

#[derive(Debug, Clone)]
pub struct FrameHistory {
    frames: BoundedHistory<FrameSnapshot>,
}

impl FrameHistory {
    pub fn new(capacity: usize) -> Self { Self { frames: BoundedHistory::new(capacity) } }

    pub fn record(&mut self, timestamp: DateTime<Utc>, objects: Vec<DetectedObject>) {
        self.frames.push(FrameSnapshot { timestamp, objects });
    }

    /// Every snapshot except the newest one.
    pub fn prior(&self) -> impl Iterator<Item = &FrameSnapshot> {
        let n = self.frames.len().saturating_sub(1);
        self.frames.iter().take(n)
    }

    pub fn prior_len(&self) -> usize { self.frames.len().saturating_sub(1) }

    /// Mean object count over [`prior`](Self::prior); `None` when there is no prior frame.
    pub fn prior_mean_count(&self) -> Option<f64> {
        let n = self.prior_len();
        if n == 0 { return None; }
        let total: usize = self.prior().map(FrameSnapshot::count).sum();
        Some(total as f64 / n as f64)
    }

    pub fn latest(&self) -> Option<&FrameSnapshot> { self.frames.last() }
    pub fn len(&self) -> usize { self.frames.len() }
    pub fn is_empty(&self) -> bool { self.frames.is_empty() }
    pub fn capacity(&self) -> usize { self.frames.capacity() }
    pub fn clear(&mut self) { self.frames.clear(); }
}

#[derive(Debug, Clone)]
pub struct AnomalyHistory {
    keys: BoundedHistory<(String, DateTime<Utc>)>,
}

impl AnomalyHistory {
    pub fn new(capacity: usize) -> Self { Self { keys: BoundedHistory::new(capacity) } }

    /// No time decay: a key stays until enough newer keys push it out.
    pub fn contains(&self, key: &str) -> bool { self.keys.iter().any(|(k, _)| k == key) }

    /// Records `key` unless already present. Returns whether it was recorded.
    pub fn admit(&mut self, key: String, timestamp: DateTime<Utc>) -> bool {
        if self.contains(&key) { return false; }
        self.keys.push((key, timestamp));
        true
    }

    pub fn len(&self) -> usize { self.keys.len() }
    pub fn is_empty(&self) -> bool { self.keys.is_empty() }
    pub fn capacity(&self) -> usize { self.keys.capacity() }
    pub fn clear(&mut self) { self.keys.clear(); }
}
