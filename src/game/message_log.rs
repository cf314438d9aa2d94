//! Bounded log of player-facing messages.

use crate::config;
use crate::game::MessageImportance;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One logged line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub turn: u64,
    pub text: String,
    #[serde(default)]
    pub importance: MessageImportance,
}

/// Ring buffer of the most recent messages; the oldest entry is dropped
/// once capacity is reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageLog {
    capacity: usize,
    entries: VecDeque<LogEntry>,
}

impl MessageLog {
    /// # Examples
    ///
    /// ```
    /// use gloomdeep::{MessageImportance, MessageLog};
    ///
    /// let mut log = MessageLog::new(2);
    /// log.push(1, "one", MessageImportance::Info);
    /// log.push(2, "two", MessageImportance::Info);
    /// log.push(3, "three", MessageImportance::Info);
    /// assert_eq!(log.len(), 2);
    /// assert_eq!(log.last().unwrap().text, "three");
    /// ```
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    pub fn push(&mut self, turn: u64, text: impl Into<String>, importance: MessageImportance) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry {
            turn,
            text: text.into(),
            importance,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// The last `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<&LogEntry> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).collect()
    }

    /// Whether any logged text contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.entries.iter().any(|entry| entry.text.contains(needle))
    }
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new(config::MESSAGE_LOG_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_drops_oldest() {
        let mut log = MessageLog::new(50);
        for turn in 0..60 {
            log.push(turn, format!("message {}", turn), MessageImportance::Info);
        }
        assert_eq!(log.len(), 50);
        assert_eq!(log.iter().next().unwrap().turn, 10);
        assert!(!log.contains("message 9"));
        assert!(log.contains("message 59"));
    }

    #[test]
    fn test_recent_is_oldest_first() {
        let mut log = MessageLog::default();
        log.push(1, "a", MessageImportance::Info);
        log.push(2, "b", MessageImportance::Combat);
        log.push(3, "c", MessageImportance::Warning);
        let recent: Vec<&str> = log.recent(2).iter().map(|e| e.text.as_str()).collect();
        assert_eq!(recent, vec!["b", "c"]);
        assert_eq!(log.recent(10).len(), 3);
    }
}
