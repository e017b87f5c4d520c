//! Bounded FIFO of sentences waiting for a connection.

use std::collections::VecDeque;

/// Capacity used by the TCP forwarder.
pub const DEFAULT_QUEUE_CAPACITY: usize = 500;

/// Ordered pending sentences; the oldest entry is evicted when full.
#[derive(Debug, Clone)]
pub struct OutboundQueue {
    items: VecDeque<String>,
    capacity: usize,
}

impl OutboundQueue {
    /// Create an empty queue holding at most `capacity` sentences.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sentence, evicting from the front if needed.
    ///
    /// Returns the number of sentences dropped (0 or 1).
    pub fn push(&mut self, sentence: String) -> usize {
        let mut dropped = 0;
        while self.items.len() >= self.capacity {
            self.items.pop_front();
            dropped += 1;
        }
        self.items.push_back(sentence);
        dropped
    }

    /// Put a sentence back at the head, e.g. after a failed write.
    ///
    /// If the queue is full the sentence is discarded instead.
    pub fn push_front(&mut self, sentence: String) -> bool {
        if self.items.len() >= self.capacity {
            return false;
        }
        self.items.push_front(sentence);
        true
    }

    /// Remove and return the oldest sentence.
    pub fn pop(&mut self) -> Option<String> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Iterate oldest first without consuming.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }
}

impl Default for OutboundQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overflow_evicts_oldest() {
        let mut queue = OutboundQueue::default();
        let mut dropped = 0;
        for i in 0..501 {
            dropped += queue.push(format!("msg-{}", i));
        }

        assert_eq!(dropped, 1);
        assert_eq!(queue.len(), 500);
        let kept: Vec<&str> = queue.iter().collect();
        assert_eq!(kept.first(), Some(&"msg-1"));
        assert_eq!(kept.last(), Some(&"msg-500"));
    }

    #[test]
    fn test_pop_is_fifo() {
        let mut queue = OutboundQueue::new(3);
        queue.push("a".into());
        queue.push("b".into());
        assert_eq!(queue.pop().as_deref(), Some("a"));
        assert_eq!(queue.pop().as_deref(), Some("b"));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_push_front_respects_capacity() {
        let mut queue = OutboundQueue::new(2);
        queue.push("b".into());
        assert!(queue.push_front("a".into()));
        assert!(!queue.push_front("z".into()));
        assert_eq!(queue.iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut queue = OutboundQueue::new(0);
        queue.push("x".into());
        queue.push("y".into());
        assert_eq!(queue.capacity(), 1);
        assert_eq!(queue.pop().as_deref(), Some("y"));
    }
}
