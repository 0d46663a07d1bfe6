//! The sequencer and bounded action log.
//!
//! Every accepted action receives the next value of a single counter, so
//! sequences are strictly increasing and gapless. The log keeps only the
//! most recent `capacity` stamped actions; a caller whose watermark falls
//! behind the oldest retained action gets a delta flagged
//! `resync_required`.

use std::collections::VecDeque;

use imperion_types::{ActionRequest, Delta, RoomId, StampedAction};

/// Sequence counter, version counter, and ring buffer of stamped actions.
#[derive(Debug, Clone)]
pub struct ActionLog {
    /// Sequence of the most recently stamped action (0 before any).
    sequence: u64,
    /// Bumped once per recorded action. Starts at 1.
    version: u64,
    /// Timestamp of the most recently recorded action.
    last_update: i64,
    /// Retained actions, oldest first.
    history: VecDeque<StampedAction>,
    /// Maximum retained actions.
    capacity: usize,
}

impl ActionLog {
    /// Create an empty log retaining at most `capacity` actions.
    pub fn new(capacity: usize, now: i64) -> Self {
        Self {
            sequence: 0,
            version: 1,
            last_update: now,
            history: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Sequence of the most recent action.
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Current version.
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Time of the most recently recorded action.
    pub const fn last_update(&self) -> i64 {
        self.last_update
    }

    /// Retained actions, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &StampedAction> {
        self.history.iter()
    }

    /// Assign the next sequence number and a timestamp to `request`.
    pub const fn stamp(&mut self, request: ActionRequest, now: i64) -> StampedAction {
        self.sequence = self.sequence.saturating_add(1);
        StampedAction {
            sequence: self.sequence,
            timestamp: now,
            request,
        }
    }

    /// Append a stamped action, evicting the oldest if full, and bump the
    /// version.
    pub fn record(&mut self, action: StampedAction) {
        self.last_update = action.timestamp;
        self.version = self.version.saturating_add(1);
        if self.capacity == 0 {
            return;
        }
        while self.history.len() >= self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(action);
    }

    /// Everything after `since`, or `None` if the caller is up to date.
    pub fn delta(&self, room_id: &RoomId, since: u64) -> Option<Delta> {
        if self.sequence <= since {
            return None;
        }

        let first_needed = since.saturating_add(1);
        let resync_required = self
            .history
            .front()
            .is_none_or(|oldest| oldest.sequence > first_needed);

        Some(Delta {
            room_id: room_id.clone(),
            sequence: self.sequence,
            changes: self
                .history
                .iter()
                .filter(|action| action.sequence > since)
                .cloned()
                .collect(),
            timestamp: self.last_update,
            version: self.version,
            resync_required,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imperion_types::{ActionKind, PlayerId};

    fn request() -> ActionRequest {
        ActionRequest::new(PlayerId::new("p1"), ActionKind::Resources(serde_json::Value::Null))
    }

    fn log_with(capacity: usize, actions: u64) -> ActionLog {
        let mut log = ActionLog::new(capacity, 0);
        for i in 0..actions {
            let stamped = log.stamp(request(), i64::try_from(i).unwrap_or(i64::MAX));
            log.record(stamped);
        }
        log
    }

    #[test]
    fn sequences_are_gapless_and_increasing() {
        let log = log_with(100, 10);
        let sequences: Vec<u64> = log.history().map(|a| a.sequence).collect();
        assert_eq!(sequences, (1..=10).collect::<Vec<_>>());
        assert_eq!(log.sequence(), 10);
        assert_eq!(log.version(), 11);
    }

    #[test]
    fn up_to_date_callers_get_none() {
        let log = log_with(100, 5);
        let room = RoomId::new("r");
        assert!(log.delta(&room, 5).is_none());
        assert!(log.delta(&room, 6).is_none());
        assert!(ActionLog::new(100, 0).delta(&room, 0).is_none());
    }

    #[test]
    fn delta_returns_actions_after_watermark() {
        let log = log_with(100, 5);
        let delta = log.delta(&RoomId::new("r"), 2);
        let delta = delta.unwrap_or_else(|| panic!("expected a delta"));
        assert_eq!(delta.sequence, 5);
        assert_eq!(
            delta.changes.iter().map(|a| a.sequence).collect::<Vec<_>>(),
            vec![3, 4, 5]
        );
        assert!(!delta.resync_required);
    }

    #[test]
    fn ring_buffer_evicts_oldest() {
        let log = log_with(100, 150);
        assert_eq!(log.history().count(), 100);
        assert_eq!(log.history().next().map(|a| a.sequence), Some(51));
    }

    #[test]
    fn far_behind_caller_is_told_to_resync() {
        let log = log_with(100, 150);
        let room = RoomId::new("r");

        let behind = log.delta(&room, 10).unwrap_or_else(|| panic!("expected a delta"));
        assert!(behind.resync_required);
        assert_eq!(behind.sequence, 150);
        assert_eq!(behind.changes.len(), 100);

        // Watermark 50 needs 51 onward, which is exactly the oldest kept.
        let edge = log.delta(&room, 50).unwrap_or_else(|| panic!("expected a delta"));
        assert!(!edge.resync_required);
    }

    #[test]
    fn zero_capacity_always_resyncs() {
        let log = log_with(0, 3);
        let delta = log.delta(&RoomId::new("r"), 1).unwrap_or_else(|| panic!("expected a delta"));
        assert!(delta.changes.is_empty());
        assert!(delta.resync_required);
    }
}
