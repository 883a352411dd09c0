//! Structured notifications emitted by the queue.
//!
//! The queue never formats text. Every observable consequence of an
//! operation is pushed as a [`QueueEvent`] into an [`EventOutbox`] that the
//! host drains and renders however it likes.

use crate::obligation::{NpcId, ObligationId, PositioningReason, PriorityCause, TokenCategory};
use serde::{Deserialize, Serialize};

/// Broad category of an event, for routing in the host UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    Placement,
    Displacement,
    Penalty,
    Delivery,
    Manipulation,
}

/// Something that happened to the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueueEvent {
    /// An obligation entered the queue.
    Inserted {
        obligation_id: ObligationId,
        sender_id: NpcId,
        position: usize,
        reason: PositioningReason,
        leverage_boost: usize,
    },

    /// A standing obligation extended a new obligation's deadline.
    DeadlineBonusApplied {
        obligation_id: ObligationId,
        bonus: i32,
    },

    /// An obligation moved to another slot as a side effect.
    Shifted {
        obligation_id: ObligationId,
        sender_id: NpcId,
        from: usize,
        to: usize,
    },

    /// An obligation was pushed past the last slot and dropped.
    Overflowed {
        obligation_id: ObligationId,
        sender_id: NpcId,
        category: TokenCategory,
        penalty: u32,
        /// Pushed out by forced displacement rather than a leverage cascade.
        forced: bool,
    },

    /// An obligation claimed a slot by forced displacement.
    ForcedIn {
        obligation_id: ObligationId,
        sender_id: NpcId,
        position: usize,
        cause: PriorityCause,
        displaced: usize,
    },

    /// Tokens burned from a displaced sender.
    TokensBurned {
        npc_id: NpcId,
        category: TokenCategory,
        amount: u32,
    },

    /// A burden marker against an NPC, one per burned token.
    BurdenAdded {
        npc_id: NpcId,
        category: TokenCategory,
    },

    /// An obligation's deadline passed.
    Expired {
        obligation_id: ObligationId,
        sender_id: NpcId,
        category: TokenCategory,
        penalty: u32,
    },

    Delivered {
        obligation_id: ObligationId,
        sender_id: NpcId,
        recipient_id: NpcId,
        payment: u32,
    },

    /// A player-paid displacement went through.
    DisplacementExecuted {
        obligation_id: ObligationId,
        from: usize,
        to: usize,
        total_tokens: u32,
        npcs_charged: usize,
    },

    Swapped {
        first: usize,
        second: usize,
    },

    Purged {
        obligation_id: ObligationId,
        sender_id: NpcId,
        tokens: u32,
    },

    PriorityMoved {
        obligation_id: ObligationId,
        from: usize,
        tokens: u32,
    },

    DeadlineExtended {
        obligation_id: ObligationId,
        tokens: u32,
        bonus: i32,
        deadline: i32,
    },

    Skipped {
        obligation_id: ObligationId,
        from: usize,
        tokens: u32,
    },

    Transferred {
        obligation_id: ObligationId,
        from_recipient: NpcId,
        to_recipient: NpcId,
        tokens: u32,
    },

    Cancelled {
        obligation_id: ObligationId,
        sender_id: NpcId,
    },
}

impl QueueEvent {
    pub fn category(&self) -> EventCategory {
        match self {
            QueueEvent::Inserted { .. } | QueueEvent::DeadlineBonusApplied { .. } => {
                EventCategory::Placement
            }
            QueueEvent::Shifted { .. }
            | QueueEvent::ForcedIn { .. }
            | QueueEvent::DisplacementExecuted { .. } => EventCategory::Displacement,
            QueueEvent::Overflowed { .. }
            | QueueEvent::TokensBurned { .. }
            | QueueEvent::BurdenAdded { .. }
            | QueueEvent::Expired { .. } => EventCategory::Penalty,
            QueueEvent::Delivered { .. } => EventCategory::Delivery,
            QueueEvent::Swapped { .. }
            | QueueEvent::Purged { .. }
            | QueueEvent::PriorityMoved { .. }
            | QueueEvent::DeadlineExtended { .. }
            | QueueEvent::Skipped { .. }
            | QueueEvent::Transferred { .. }
            | QueueEvent::Cancelled { .. } => EventCategory::Manipulation,
        }
    }
}

/// Events waiting to be drained by the host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventOutbox {
    pending: Vec<QueueEvent>,
}

impl EventOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: QueueEvent) {
        self.pending.push(event);
    }

    /// Take every pending event, leaving the outbox empty.
    pub fn drain(&mut self) -> Vec<QueueEvent> {
        std::mem::take(&mut self.pending)
    }

    pub fn pending(&self) -> &[QueueEvent] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_empties_outbox() {
        let mut outbox = EventOutbox::new();
        outbox.push(QueueEvent::Swapped { first: 1, second: 2 });
        outbox.push(QueueEvent::BurdenAdded {
            npc_id: NpcId::from("elena"),
            category: TokenCategory::Trust,
        });

        assert_eq!(outbox.len(), 2);
        let drained = outbox.drain();
        assert_eq!(drained.len(), 2);
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_event_categories() {
        let expired = QueueEvent::Expired {
            obligation_id: ObligationId::new(),
            sender_id: NpcId::from("elena"),
            category: TokenCategory::Trust,
            penalty: 2,
        };
        assert_eq!(expired.category(), EventCategory::Penalty);
        assert_eq!(
            QueueEvent::Swapped { first: 1, second: 2 }.category(),
            EventCategory::Manipulation
        );
    }
}
