//! Bounded runtime fault log

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::trace;

/// A timestamped fault message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticRecord {
    /// When the fault was recorded
    pub timestamp: DateTime<Utc>,
    /// Human-readable description
    pub message: String,
}

/// Fixed-capacity FIFO of [`DiagnosticRecord`]s
///
/// Inserting into a full sink evicts the oldest record first.
#[derive(Debug, Clone)]
pub struct DiagnosticsSink {
    records: VecDeque<DiagnosticRecord>,
    capacity: usize,
}

impl DiagnosticsSink {
    /// Create a sink holding at most `capacity` records
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a message stamped with the current time
    pub fn push(&mut self, message: impl Into<String>) {
        self.push_at(Utc::now(), message);
    }

    /// Record a message with an explicit timestamp
    pub fn push_at(&mut self, timestamp: DateTime<Utc>, message: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        while self.records.len() >= self.capacity {
            if let Some(evicted) = self.records.pop_front() {
                trace!("Evicted diagnostic: {}", evicted.message);
            }
        }
        self.records.push_back(DiagnosticRecord {
            timestamp,
            message: message.into(),
        });
    }

    /// Records, oldest first
    pub fn records(&self) -> impl Iterator<Item = &DiagnosticRecord> {
        self.records.iter()
    }

    /// Copy of the records for the UI, oldest first
    pub fn snapshot(&self) -> Vec<DiagnosticRecord> {
        self.records.iter().cloned().collect()
    }

    /// Number of records held
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the sink is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Maximum number of records
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Deterministic rate limiter for recurring faults
///
/// Admits the first occurrence and then every `every`-th one after it, so
/// with `every = 100` about 1% of a sustained fault stream is recorded.
#[derive(Debug, Clone)]
pub struct ErrorSampler {
    every: u64,
    seen: u64,
}

impl ErrorSampler {
    /// Admit one occurrence out of `every`. Zero is treated as one.
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            seen: 0,
        }
    }

    /// Count an occurrence and report whether it should be recorded
    pub fn admit(&mut self) -> bool {
        let admitted = self.seen % self.every == 0;
        self.seen += 1;
        admitted
    }

    /// Occurrences counted so far
    pub fn seen(&self) -> u64 {
        self.seen
    }
}
