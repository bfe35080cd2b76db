//! Append-only local queue of preference signals.
//!
//! One [`PreferenceSignal`] records one decision event — what was offered,
//! what the user's vibe looked like, what they chose. The queue is capped:
//! when full, the oldest entry is dropped first. Draining is FIFO in batches
//! for upload.
//!
//! The snapshot format mirrors the field-snapshot discipline used elsewhere
//! in this codebase: a version constant written into every snapshot, and a
//! hard rejection of snapshots from a newer format.
//!
//! # Invariants
//!
//! - **QUE-001**: the queue never holds more than its cap; overflow evicts
//!   from the front (oldest first).
//! - **QUE-002**: `drain_batch` returns entries in insertion order.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::VibeError;
use crate::vibe::VibeVector;

/// Maximum queued entries (QUE-001).
pub const QUEUE_CAP: usize = 500;

/// Default number of entries drained per upload batch.
pub const DRAIN_BATCH: usize = 50;

/// Current snapshot format version.
pub const QUEUE_SNAPSHOT_VERSION: u16 = 1;

/// What the user did with an offer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferenceDecision {
    /// Took the suggestion.
    Accepted,
    /// Explicitly turned it down.
    Declined,
    /// Let it expire without interacting.
    Ignored,
}

/// Durable record of one decision event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PreferenceSignal {
    /// Vibe distribution at decision time.
    pub vibe: VibeVector,
    /// What was offered (merge, rally, venue suggestion, ...).
    pub offer: String,
    /// Free-form context tag supplied by the caller.
    pub context: String,
    /// The user's decision.
    pub decision: PreferenceDecision,
    /// Follow-up outcome, when one was observed later.
    pub outcome: Option<String>,
    /// Unix epoch ms when the decision was recorded.
    pub recorded_at_ms: i64,
}

/// Capacity-bounded FIFO queue of preference signals.
///
/// Appends must come through a single writer (the pipeline holds it behind
/// `&mut`), which is what preserves the cap invariant under concurrency.
#[derive(Clone, Debug, Default)]
pub struct PreferenceQueue {
    entries: VecDeque<PreferenceSignal>,
}

impl PreferenceQueue {
    /// Empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one signal, evicting the oldest entry if at cap (QUE-001).
    pub fn push(&mut self, signal: PreferenceSignal) {
        if self.entries.len() >= QUEUE_CAP {
            self.entries.pop_front();
        }
        self.entries.push_back(signal);
    }

    /// Remove and return up to `max` entries in insertion order (QUE-002).
    pub fn drain_batch(&mut self, max: usize) -> Vec<PreferenceSignal> {
        let take = max.min(self.entries.len());
        self.entries.drain(..take).collect()
    }

    /// Entries currently queued.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries oldest first, without removing them.
    pub fn iter(&self) -> impl Iterator<Item = &PreferenceSignal> {
        self.entries.iter()
    }
}

// ─── Snapshot ───────────────────────────────────────────────────────────────

/// Serializable snapshot of the whole queue for local persistence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// Format version — [`QUEUE_SNAPSHOT_VERSION`] for new snapshots.
    pub version: u16,
    /// Unix epoch ms when the snapshot was taken.
    pub saved_at_ms: i64,
    /// Queued entries, oldest first.
    pub entries: Vec<PreferenceSignal>,
}

impl QueueSnapshot {
    /// Capture the queue as a snapshot.
    pub fn from_queue(queue: &PreferenceQueue, saved_at_ms: i64) -> Self {
        Self {
            version: QUEUE_SNAPSHOT_VERSION,
            saved_at_ms,
            entries: queue.iter().cloned().collect(),
        }
    }

    /// Rebuild a queue from this snapshot.
    ///
    /// Rejects snapshots written by a newer format version; entries beyond
    /// the cap are trimmed from the front, oldest first (QUE-001).
    pub fn restore(self) -> Result<PreferenceQueue, VibeError> {
        if self.version > QUEUE_SNAPSHOT_VERSION {
            return Err(VibeError::SnapshotVersion {
                found: self.version,
                supported: QUEUE_SNAPSHOT_VERSION,
            });
        }
        let mut queue = PreferenceQueue::new();
        for entry in self.entries {
            queue.push(entry);
        }
        Ok(queue)
    }

    /// Serialize to the JSON persistence format.
    pub fn to_json(&self) -> Result<String, VibeError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse the JSON persistence format.
    pub fn from_json(json: &str) -> Result<Self, VibeError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vibe::VibeVector;

    fn signal(tag: u32) -> PreferenceSignal {
        PreferenceSignal {
            vibe: VibeVector::uniform(),
            offer: format!("offer-{tag}"),
            context: "test".to_string(),
            decision: PreferenceDecision::Accepted,
            outcome: None,
            recorded_at_ms: tag as i64,
        }
    }

    #[test]
    fn test_push_and_fifo_drain() {
        let mut queue = PreferenceQueue::new();
        for i in 0..5 {
            queue.push(signal(i));
        }
        assert_eq!(queue.len(), 5);

        let batch = queue.drain_batch(3);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[0].offer, "offer-0");
        assert_eq!(batch[2].offer, "offer-2");
        assert_eq!(queue.len(), 2);

        // Draining more than remains returns what is left.
        let rest = queue.drain_batch(DRAIN_BATCH);
        assert_eq!(rest.len(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_cap_evicts_oldest_first() {
        // QUE-001.
        let mut queue = PreferenceQueue::new();
        for i in 0..(QUEUE_CAP as u32 + 10) {
            queue.push(signal(i));
        }
        assert_eq!(queue.len(), QUEUE_CAP);
        // The first 10 entries were evicted.
        let front = queue.drain_batch(1);
        assert_eq!(front[0].offer, "offer-10");
    }

    #[test]
    fn test_snapshot_round_trip_preserves_order() {
        let mut queue = PreferenceQueue::new();
        for i in 0..7 {
            queue.push(signal(i));
        }
        let json = QueueSnapshot::from_queue(&queue, 99).to_json().unwrap();
        let restored = QueueSnapshot::from_json(&json).unwrap();
        assert_eq!(restored.version, QUEUE_SNAPSHOT_VERSION);
        assert_eq!(restored.saved_at_ms, 99);

        let mut queue = restored.restore().unwrap();
        let batch = queue.drain_batch(7);
        assert_eq!(batch[0].offer, "offer-0");
        assert_eq!(batch[6].offer, "offer-6");
    }

    #[test]
    fn test_newer_snapshot_version_rejected() {
        let snapshot = QueueSnapshot {
            version: QUEUE_SNAPSHOT_VERSION + 1,
            saved_at_ms: 0,
            entries: vec![],
        };
        assert!(matches!(
            snapshot.restore(),
            Err(VibeError::SnapshotVersion { found, .. }) if found == QUEUE_SNAPSHOT_VERSION + 1
        ));
    }

    #[test]
    fn test_malformed_json_is_decode_error() {
        assert!(matches!(
            QueueSnapshot::from_json("{not json"),
            Err(VibeError::SnapshotDecode(_))
        ));
    }
}
