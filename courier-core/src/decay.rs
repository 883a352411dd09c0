//! Deadline decay and urgency queries.
//!
//! Advancing time runs in three separate phases over the queue:
//!
//! 1. decrement every deadline and note which obligations expired,
//! 2. penalise the senders of the expired obligations in insertion order,
//! 3. rebuild the slots left to right without them.
//!
//! The slots are not compacted until phases 1 and 2 have finished reading.

use crate::engine::ObligationQueue;
use crate::events::QueueEvent;
use crate::obligation::{DeliveryObligation, ObligationId};
use crate::queue::SlotMove;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

/// How close an obligation is to its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Urgency {
    Critical,
    Urgent,
    Normal,
}

/// Counts of live obligations by urgency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrgencyStats {
    pub critical: usize,
    pub urgent: usize,
    pub normal: usize,
}

/// What one call to [`ObligationQueue::advance_time`] did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecayReport {
    pub elapsed: u32,
    /// Expired obligations in insertion order, already removed and penalised.
    pub expired: Vec<DeliveryObligation>,
    /// Survivors that are now urgent or critical, front first.
    pub urgent: Vec<ObligationId>,
    /// Survivors that moved up to close the gaps.
    pub moves: Vec<SlotMove>,
}

impl ObligationQueue {
    /// Advance the clock by `units` segments and decay every deadline by the
    /// same amount.
    #[instrument(skip(self))]
    pub fn advance_time(&mut self, units: u32) -> DecayReport {
        if units == 0 {
            return DecayReport::default();
        }
        self.clock.advance(units);
        let elapsed = i32::try_from(units).unwrap_or(i32::MAX);

        // Phase 1: decrement and collect.
        let mut expired: Vec<DeliveryObligation> = Vec::new();
        for obligation in self.store.active_mut() {
            obligation.deadline = obligation.deadline.saturating_sub(elapsed);
            if obligation.is_expired() {
                expired.push(obligation.clone());
            }
        }

        // Phase 2: consequences, oldest first.
        expired.sort_by_key(|o| o.sequence);
        let penalty = self.config.expiry_penalty;
        for obligation in &expired {
            warn!(
                obligation_id = %obligation.id,
                sender = %obligation.sender_id,
                category = %obligation.category,
                penalty,
                "Obligation expired"
            );
            self.penalise_sender(obligation, penalty);
            self.emit(QueueEvent::Expired {
                obligation_id: obligation.id,
                sender_id: obligation.sender_id.clone(),
                category: obligation.category,
                penalty,
            });
        }

        // Phase 3: compact.
        let (moves, _) = self.store.compact_retaining(|o| !o.is_expired());
        self.emit_moves(&moves);

        for obligation in &mut expired {
            obligation.queue_position = 0;
        }
        let urgent = self
            .store
            .active()
            .filter(|o| self.urgency_of(o) != Urgency::Normal)
            .map(|o| o.id)
            .collect();

        debug!(
            expired = expired.len(),
            remaining = self.store.count(),
            day = self.clock.day,
            segment = self.clock.segment,
            "Time advanced"
        );

        DecayReport {
            elapsed: units,
            expired,
            urgent,
            moves,
        }
    }

    pub fn urgency_of(&self, obligation: &DeliveryObligation) -> Urgency {
        if obligation.deadline <= self.config.critical_deadline {
            Urgency::Critical
        } else if obligation.deadline <= self.config.urgent_deadline {
            Urgency::Urgent
        } else {
            Urgency::Normal
        }
    }

    /// Live obligations with `0 < deadline <= threshold`, soonest first.
    /// Ties keep queue order.
    pub fn expiring_within(&self, threshold: i32) -> Vec<&DeliveryObligation> {
        let mut expiring: Vec<&DeliveryObligation> = self
            .store
            .active()
            .filter(|o| o.deadline > 0 && o.deadline <= threshold)
            .collect();
        expiring.sort_by_key(|o| o.deadline);
        expiring
    }

    /// The obligation with the least time left. Ties go to the front-most.
    pub fn most_urgent(&self) -> Option<&DeliveryObligation> {
        self.store
            .active()
            .fold(None, |best: Option<&DeliveryObligation>, o| match best {
                Some(b) if b.deadline <= o.deadline => Some(b),
                _ => Some(o),
            })
    }

    pub fn urgency_stats(&self) -> UrgencyStats {
        self.store
            .active()
            .fold(UrgencyStats::default(), |mut stats, o| {
                match self.urgency_of(o) {
                    Urgency::Critical => stats.critical += 1,
                    Urgency::Urgent => stats.urgent += 1,
                    Urgency::Normal => stats.normal += 1,
                }
                stats
            })
    }

    pub fn has_critical_deadlines(&self) -> bool {
        self.store
            .active()
            .any(|o| self.urgency_of(o) == Urgency::Critical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obligation::{NpcId, TokenCategory};
    use crate::testing::{assert_balance, assert_positions_consistent, TestHarness};

    #[test]
    fn test_zero_units_is_noop() {
        let harness = TestHarness::new();
        let mut queue = harness.build();
        harness.fill_deadlines(&mut queue, &[("a", 1)]);
        let clock = queue.clock();

        let report = queue.advance_time(0);
        assert!(report.expired.is_empty());
        assert_eq!(queue.clock(), clock);
        assert_eq!(queue.obligation_at(1).map(|o| o.deadline), Some(1));
    }

    #[test]
    fn test_deadlines_decrement_and_clock_advances() {
        let harness = TestHarness::new();
        let mut queue = harness.build();
        harness.fill_deadlines(&mut queue, &[("a", 10), ("b", 20)]);
        let start = queue.clock();

        let report = queue.advance_time(4);
        assert!(report.expired.is_empty());
        assert_eq!(report.elapsed, 4);
        assert_eq!(queue.obligation_at(1).map(|o| o.deadline), Some(6));
        assert_eq!(queue.obligation_at(2).map(|o| o.deadline), Some(16));
        assert_eq!(queue.clock().segment, start.segment + 4);
        assert_eq!(report.urgent.len(), 1);
    }

    #[test]
    fn test_expiry_penalises_and_compacts() {
        let harness = TestHarness::new().with_tokens("b", TokenCategory::Trust, 5);
        let mut queue = harness.build();
        let ids = harness.fill_deadlines(&mut queue, &[("a", 10), ("b", 1), ("c", 10)]);

        let report = queue.advance_time(2);

        assert_eq!(report.expired.len(), 1);
        assert_eq!(report.expired[0].id, ids[1]);
        assert_eq!(report.expired[0].queue_position, 0);
        assert_balance(&queue, "b", TokenCategory::Trust, 3);
        assert_eq!(queue.history_for(&NpcId::from("b")).expired, 1);
        assert_eq!(queue.position_of(&ids[2]), Some(2));
        assert_eq!(report.moves.len(), 1);
        assert_positions_consistent(&queue);
    }

    #[test]
    fn test_expired_processed_in_insertion_order() {
        let harness = TestHarness::new();
        let mut queue = harness.build();
        // Later insertion sits in front.
        let older = harness.place(&mut queue, 3, "old", TokenCategory::Trust);
        let newer = harness.place(&mut queue, 1, "new", TokenCategory::Trust);
        for id in [older, newer] {
            if let Some(o) = queue.store.get_mut(&id) {
                o.deadline = 1;
            }
        }

        let report = queue.advance_time(1);
        let order: Vec<_> = report.expired.iter().map(|o| o.id).collect();
        assert_eq!(order, vec![older, newer]);

        let expired_events: Vec<_> = queue
            .take_events()
            .into_iter()
            .filter_map(|e| match e {
                QueueEvent::Expired { obligation_id, .. } => Some(obligation_id),
                _ => None,
            })
            .collect();
        assert_eq!(expired_events, vec![older, newer]);
    }

    #[test]
    fn test_urgency_queries() {
        let harness = TestHarness::new();
        let mut queue = harness.build();
        let ids = harness.fill_deadlines(&mut queue, &[("a", 12), ("b", 2), ("c", 5), ("d", 3)]);

        let stats = queue.urgency_stats();
        assert_eq!(
            stats,
            UrgencyStats {
                critical: 2,
                urgent: 1,
                normal: 1
            }
        );
        assert!(queue.has_critical_deadlines());
        assert_eq!(queue.most_urgent().map(|o| o.id), Some(ids[1]));

        let soon: Vec<_> = queue.expiring_within(5).iter().map(|o| o.id).collect();
        assert_eq!(soon, vec![ids[1], ids[3], ids[2]]);
    }

    #[test]
    fn test_empty_queue_queries() {
        let queue = TestHarness::new().build();
        assert!(queue.most_urgent().is_none());
        assert!(!queue.has_critical_deadlines());
        assert_eq!(queue.urgency_stats(), UrgencyStats::default());
    }
}
