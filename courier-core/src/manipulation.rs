//! Player-paid queue manipulations.
//!
//! Every operation validates first, then pays, then mutates. A failed check
//! or a token shortfall returns before the ledger or the slots are touched.

use crate::engine::ObligationQueue;
use crate::error::{QueueError, ValidationFailure};
use crate::events::QueueEvent;
use crate::obligation::{DeliveryObligation, NpcId, ObligationId, TokenCategory};
use crate::queue::SlotMove;
use crate::standing::QueueAction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, instrument};

/// Result of moving an obligation to the front.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontMove {
    pub obligation_id: ObligationId,
    pub from: usize,
    pub tokens: u32,
    /// Obligations that moved up to close the gap.
    pub moves: Vec<SlotMove>,
}

impl ObligationQueue {
    /// Swap two adjacent slots for free. Only allowed during the free swap
    /// window, once per day.
    #[instrument(skip(self))]
    pub fn morning_swap(&mut self, first: usize, second: usize) -> Result<(), QueueError> {
        self.store.check_position(first)?;
        self.store.check_position(second)?;

        let current = self.clock.window();
        let required = self.config.free_swap_window;
        if current != required {
            return Err(ValidationFailure::WrongTimeWindow { required, current }.into());
        }
        let day = self.clock.day;
        if self.last_morning_swap_day == Some(day) {
            return Err(ValidationFailure::SwapAlreadyUsedToday { day }.into());
        }
        if first.abs_diff(second) != 1 {
            return Err(ValidationFailure::NotAdjacent { first, second }.into());
        }
        if self.store.obligation_at(first).is_none() && self.store.obligation_at(second).is_none() {
            return Err(ValidationFailure::BothSlotsEmpty { first, second }.into());
        }

        self.store.swap(first, second);
        self.last_morning_swap_day = Some(day);
        info!(first, second, day, "Morning swap");
        self.emit(QueueEvent::Swapped { first, second });
        Ok(())
    }

    /// Destroy the obligation in the last slot.
    ///
    /// `payment` is spent with the purged obligation's sender and must add
    /// up to exactly `purge_cost`, in any mix of categories.
    #[instrument(skip(self))]
    pub fn purge(
        &mut self,
        payment: &BTreeMap<TokenCategory, u32>,
    ) -> Result<DeliveryObligation, QueueError> {
        let last = self.store.capacity();
        let target = self.occupant(last)?;
        self.check_veto(QueueAction::Purge, target)?;

        let offered = payment
            .values()
            .fold(0u32, |total, amount| total.saturating_add(*amount));
        let required = self.config.purge_cost;
        if offered != required {
            return Err(ValidationFailure::WrongPaymentTotal { required, offered }.into());
        }

        let sender_id = target.sender_id.clone();
        let charges: Vec<(NpcId, TokenCategory, u32)> = payment
            .iter()
            .filter(|(_, &amount)| amount > 0)
            .map(|(&category, &amount)| (sender_id.clone(), category, amount))
            .collect();
        self.spend_all(&charges)?;

        let purged = self
            .store
            .take(last)
            .ok_or(ValidationFailure::EmptySlot { position: last })?;
        info!(obligation_id = %purged.id, sender = %purged.sender_id, tokens = offered, "Obligation purged");
        self.emit(QueueEvent::Purged {
            obligation_id: purged.id,
            sender_id: purged.sender_id.clone(),
            tokens: offered,
        });
        Ok(purged)
    }

    /// Move the obligation at `position` into an empty slot 1 for
    /// `priority_move_cost` tokens of its own category with its sender.
    #[instrument(skip(self))]
    pub fn priority_move(&mut self, position: usize) -> Result<FrontMove, QueueError> {
        let target = self.front_move_candidate(position)?;
        self.check_veto(QueueAction::PriorityMove, target)?;

        let (sender_id, category) = (target.sender_id.clone(), target.category);
        let tokens = self.config.priority_move_cost;
        self.charge(&sender_id, category, tokens)?;

        let front = self.jump_to_front(position, tokens)?;
        info!(obligation_id = %front.obligation_id, from = position, tokens, "Priority move");
        self.emit(QueueEvent::PriorityMoved {
            obligation_id: front.obligation_id,
            from: position,
            tokens,
        });
        self.emit_moves(&front.moves);
        Ok(front)
    }

    /// Pay `extend_cost` tokens of the obligation's category to add
    /// `extend_bonus` to its deadline. Returns the new deadline.
    #[instrument(skip(self))]
    pub fn extend_deadline(&mut self, position: usize) -> Result<i32, QueueError> {
        let target = self.occupant(position)?;
        self.check_veto(QueueAction::ExtendDeadline, target)?;

        let (obligation_id, sender_id, category) =
            (target.id, target.sender_id.clone(), target.category);
        let tokens = self.config.extend_cost;
        self.charge(&sender_id, category, tokens)?;

        let bonus = self.config.extend_bonus;
        let obligation = self
            .store
            .obligation_at_mut(position)
            .ok_or(ValidationFailure::EmptySlot { position })?;
        obligation.deadline = obligation.deadline.saturating_add(bonus);
        let deadline = obligation.deadline;

        info!(%obligation_id, tokens, bonus, deadline, "Deadline extended");
        self.emit(QueueEvent::DeadlineExtended {
            obligation_id,
            tokens,
            bonus,
            deadline,
        });
        Ok(deadline)
    }

    /// Jump the obligation at slot `position` into an empty slot 1.
    ///
    /// Costs `(position - 1) * multiplier` tokens of its category with its
    /// sender, where the multiplier comes from standing obligations. The
    /// skip goes on that sender's record.
    #[instrument(skip(self))]
    pub fn skip(&mut self, position: usize) -> Result<FrontMove, QueueError> {
        let target = self.front_move_candidate(position)?;
        self.check_veto(QueueAction::Skip, target)?;

        let multiplier = self.standing.skip_cost_multiplier(target);
        let tokens = u32::try_from(position - 1)
            .unwrap_or(u32::MAX)
            .saturating_mul(multiplier);
        let (sender_id, category) = (target.sender_id.clone(), target.category);
        self.charge(&sender_id, category, tokens)?;

        let front = self.jump_to_front(position, tokens)?;
        self.history.record_skip(&sender_id);
        info!(obligation_id = %front.obligation_id, sender = %sender_id, from = position, tokens, "Obligation skipped ahead");
        self.emit(QueueEvent::Skipped {
            obligation_id: front.obligation_id,
            from: position,
            tokens,
        });
        self.emit_moves(&front.moves);
        Ok(front)
    }

    /// Hand an obligation to a different recipient for `transfer_cost`
    /// tokens with the original sender. Its slot does not change.
    #[instrument(skip(self), fields(obligation_id = %obligation_id, new_recipient = %new_recipient))]
    pub fn transfer(
        &mut self,
        obligation_id: ObligationId,
        new_recipient: &NpcId,
    ) -> Result<(), QueueError> {
        let target = self
            .store
            .get(&obligation_id)
            .ok_or(QueueError::NotFound(obligation_id))?;
        let recipient = self
            .resolve_npc(new_recipient)
            .ok_or_else(|| ValidationFailure::UnknownNpc(new_recipient.clone()))?;
        if recipient.id == target.recipient_id {
            return Err(ValidationFailure::SameRecipient(recipient.id.clone()).into());
        }
        let (recipient_id, recipient_name) = (recipient.id.clone(), recipient.name.clone());
        self.check_veto(QueueAction::Transfer, target)?;

        let (sender_id, category) = (target.sender_id.clone(), target.category);
        let tokens = self.config.transfer_cost;
        self.charge(&sender_id, category, tokens)?;

        let obligation = self
            .store
            .get_mut(&obligation_id)
            .ok_or(QueueError::NotFound(obligation_id))?;
        let from_recipient = std::mem::replace(&mut obligation.recipient_id, recipient_id.clone());
        obligation.recipient_name = recipient_name;

        info!(from = %from_recipient, to = %recipient_id, tokens, "Obligation transferred");
        self.emit(QueueEvent::Transferred {
            obligation_id,
            from_recipient,
            to_recipient: recipient_id,
            tokens,
        });
        Ok(())
    }

    /// Drop an obligation without penalty. Needs at least
    /// `cancel_threshold` positive tokens in total with the sender; nothing
    /// is spent.
    #[instrument(skip(self), fields(obligation_id = %obligation_id))]
    pub fn cancel(&mut self, obligation_id: ObligationId) -> Result<DeliveryObligation, QueueError> {
        let position = self
            .store
            .position_of(&obligation_id)
            .ok_or(QueueError::NotFound(obligation_id))?;
        let target = self.occupant(position)?;
        self.check_veto(QueueAction::Cancel, target)?;

        let sender_id = target.sender_id.clone();
        let available: i32 = self
            .ledger
            .balances(&sender_id)
            .values()
            .filter(|&&v| v > 0)
            .fold(0i32, |total, v| total.saturating_add(*v));
        let required = self.config.cancel_threshold;
        if available < required {
            return Err(ValidationFailure::RelationshipTooWeak {
                npc_id: sender_id,
                required,
                available,
            }
            .into());
        }

        let cancelled = self
            .store
            .take(position)
            .ok_or(ValidationFailure::EmptySlot { position })?;
        let moves = self.store.compact();

        info!(sender = %sender_id, "Obligation cancelled");
        self.emit(QueueEvent::Cancelled {
            obligation_id,
            sender_id,
        });
        self.emit_moves(&moves);
        Ok(cancelled)
    }

    /// Shared checks for moves into slot 1.
    fn front_move_candidate(&self, position: usize) -> Result<&DeliveryObligation, QueueError> {
        let target = self.occupant(position)?;
        if position == 1 {
            return Err(ValidationFailure::AlreadyAtFront.into());
        }
        if self.store.obligation_at(1).is_some() {
            return Err(ValidationFailure::FrontOccupied.into());
        }
        Ok(target)
    }

    /// Move the occupant of `position` into the empty slot 1 and close the gap.
    fn jump_to_front(&mut self, position: usize, tokens: u32) -> Result<FrontMove, QueueError> {
        let obligation = self
            .store
            .take(position)
            .ok_or(ValidationFailure::EmptySlot { position })?;
        let obligation_id = obligation.id;
        self.store.place(1, obligation);
        let moves = self.store.compact();
        Ok(FrontMove {
            obligation_id,
            from: position,
            tokens,
            moves,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{GameClock, TimeWindow};
    use crate::standing::StandingObligation;
    use crate::testing::{assert_balance, assert_positions_consistent, TestHarness};

    fn payment(entries: &[(TokenCategory, u32)]) -> BTreeMap<TokenCategory, u32> {
        entries.iter().copied().collect()
    }

    #[test]
    fn test_morning_swap_once_per_day() {
        let harness = TestHarness::new();
        let mut queue = harness.build();
        let ids = harness.fill(&mut queue, &["a", "b"]);

        queue.morning_swap(1, 2).expect("first swap");
        assert_eq!(queue.position_of(&ids[0]), Some(2));
        assert_eq!(queue.position_of(&ids[1]), Some(1));

        let err = queue.morning_swap(1, 2).unwrap_err();
        assert_eq!(
            err,
            QueueError::Validation(ValidationFailure::SwapAlreadyUsedToday { day: 1 })
        );

        queue.set_clock(GameClock::at_window(2, TimeWindow::Dawn, 24));
        assert!(queue.morning_swap(2, 3).is_ok());
        assert_eq!(queue.position_of(&ids[0]), Some(3));
        assert_positions_consistent(&queue);
    }

    #[test]
    fn test_morning_swap_rejections() {
        let harness = TestHarness::new();
        let mut queue = harness.build();
        harness.fill(&mut queue, &["a", "b", "c"]);

        assert!(matches!(
            queue.morning_swap(1, 3),
            Err(QueueError::Validation(ValidationFailure::NotAdjacent { .. }))
        ));
        assert!(matches!(
            queue.morning_swap(6, 7),
            Err(QueueError::Validation(ValidationFailure::BothSlotsEmpty { .. }))
        ));

        queue.set_clock(GameClock::at_window(1, TimeWindow::Afternoon, 24));
        assert_eq!(
            queue.morning_swap(1, 2),
            Err(QueueError::Validation(ValidationFailure::WrongTimeWindow {
                required: TimeWindow::Dawn,
                current: TimeWindow::Afternoon
            }))
        );
        assert!(queue.take_events().is_empty());
    }

    #[test]
    fn test_purge_mixed_payment() {
        let harness = TestHarness::new()
            .with_tokens("h", TokenCategory::Trust, 2)
            .with_tokens("h", TokenCategory::Shadow, 1);
        let mut queue = harness.build();
        let ids = harness.fill(&mut queue, &["a", "b", "c", "d", "e", "f", "g", "h"]);

        let purged = queue
            .purge(&payment(&[(TokenCategory::Trust, 2), (TokenCategory::Shadow, 1)]))
            .expect("purge");

        assert_eq!(purged.id, ids[7]);
        assert!(queue.obligation_at(8).is_none());
        assert_balance(&queue, "h", TokenCategory::Trust, 0);
        assert_balance(&queue, "h", TokenCategory::Shadow, 0);
        assert_eq!(queue.count(), 7);
    }

    #[test]
    fn test_purge_shortfall_spends_nothing() {
        let harness = TestHarness::new()
            .with_tokens("h", TokenCategory::Trust, 2)
            .with_tokens("h", TokenCategory::Shadow, 0);
        let mut queue = harness.build();
        harness.place(&mut queue, 8, "h", TokenCategory::Trust);

        let err = queue
            .purge(&payment(&[(TokenCategory::Trust, 2), (TokenCategory::Shadow, 1)]))
            .unwrap_err();
        assert!(err.is_insufficient_tokens());
        assert_balance(&queue, "h", TokenCategory::Trust, 2);
        assert!(queue.obligation_at(8).is_some());
    }

    #[test]
    fn test_purge_empty_last_slot() {
        let mut queue = TestHarness::new().build();
        assert_eq!(
            queue.purge(&payment(&[(TokenCategory::Trust, 3)])),
            Err(QueueError::Validation(ValidationFailure::EmptySlot { position: 8 }))
        );
    }

    #[test]
    fn test_purge_vetoed() {
        let harness = TestHarness::new()
            .with_tokens("blackwood", TokenCategory::Status, 5)
            .with_standing(
                StandingObligation::new("Noble Oath")
                    .with_category(TokenCategory::Status)
                    .forbidding(QueueAction::Purge),
            );
        let mut queue = harness.build();
        harness.place(&mut queue, 8, "blackwood", TokenCategory::Status);

        let err = queue
            .purge(&payment(&[(TokenCategory::Status, 3)]))
            .unwrap_err();
        assert_eq!(
            err,
            QueueError::Vetoed {
                action: QueueAction::Purge,
                reason: "Noble Oath forbids purge".to_string()
            }
        );
        assert_balance(&queue, "blackwood", TokenCategory::Status, 5);
    }

    #[test]
    fn test_priority_move_compacts_tail() {
        let harness = TestHarness::new().with_tokens("c", TokenCategory::Trust, 6);
        let mut queue = harness.build();
        let b = harness.place(&mut queue, 2, "b", TokenCategory::Trust);
        let c = harness.place(&mut queue, 4, "c", TokenCategory::Trust);
        let d = harness.place(&mut queue, 5, "d", TokenCategory::Trust);

        let front = queue.priority_move(4).expect("priority move");

        assert_eq!(front.tokens, 5);
        assert_eq!(queue.position_of(&c), Some(1));
        assert_eq!(queue.position_of(&b), Some(2));
        assert_eq!(queue.position_of(&d), Some(3));
        assert_balance(&queue, "c", TokenCategory::Trust, 1);
        assert_positions_consistent(&queue);
    }

    #[test]
    fn test_priority_move_rejections() {
        let harness = TestHarness::new().with_tokens("b", TokenCategory::Trust, 2);
        let mut queue = harness.build();
        harness.place(&mut queue, 2, "b", TokenCategory::Trust);

        assert!(queue.priority_move(2).unwrap_err().is_insufficient_tokens());
        assert_eq!(
            queue.priority_move(3),
            Err(QueueError::Validation(ValidationFailure::EmptySlot { position: 3 }))
        );
        assert_balance(&queue, "b", TokenCategory::Trust, 2);
    }

    #[test]
    fn test_extend_deadline() {
        let harness = TestHarness::new().with_tokens("a", TokenCategory::Commerce, 2);
        let mut queue = harness.build();
        harness.fill_with(&mut queue, &[("a", TokenCategory::Commerce)]);

        assert_eq!(queue.extend_deadline(1), Ok(32));
        assert_balance(&queue, "a", TokenCategory::Commerce, 0);
        assert!(queue.extend_deadline(1).unwrap_err().is_insufficient_tokens());
        assert_eq!(queue.obligation_at(1).map(|o| o.deadline), Some(32));
    }

    #[test]
    fn test_skip_cost_and_history() {
        let harness = TestHarness::new()
            .with_tokens("d", TokenCategory::Shadow, 10)
            .with_standing(
                StandingObligation::new("Shadow Pact")
                    .with_category(TokenCategory::Shadow)
                    .with_skip_multiplier(2),
            );
        let mut queue = harness.build();
        harness.place(&mut queue, 2, "b", TokenCategory::Trust);
        harness.place(&mut queue, 3, "c", TokenCategory::Trust);
        let d = harness.place(&mut queue, 4, "d", TokenCategory::Shadow);

        let front = queue.skip(4).expect("skip");

        // (4 - 1) * 2
        assert_eq!(front.tokens, 6);
        assert_balance(&queue, "d", TokenCategory::Shadow, 4);
        assert_eq!(queue.position_of(&d), Some(1));
        assert_eq!(queue.history_for(&NpcId::from("d")).skipped, 1);
        assert_eq!(queue.history_for(&NpcId::from("b")).skipped, 0);
        assert_eq!(queue.history_for(&NpcId::from("c")).skipped, 0);
        assert_positions_consistent(&queue);
    }

    #[test]
    fn test_skip_from_front() {
        let harness = TestHarness::new();
        let mut queue = harness.build();
        harness.fill(&mut queue, &["a"]);
        assert_eq!(
            queue.skip(1),
            Err(QueueError::Validation(ValidationFailure::AlreadyAtFront))
        );
    }

    #[test]
    fn test_transfer() {
        let harness = TestHarness::new().with_tokens("a", TokenCategory::Trust, 4);
        let mut queue = harness.build();
        let ids = harness.fill(&mut queue, &["a"]);

        assert_eq!(
            queue.transfer(ids[0], &NpcId::from("nobody")),
            Err(QueueError::Validation(ValidationFailure::UnknownNpc(
                NpcId::from("nobody")
            )))
        );

        queue
            .transfer(ids[0], &NpcId::from("Lord Blackwood"))
            .expect("transfer by name");
        let moved = queue.get(&ids[0]).expect("still queued");
        assert_eq!(moved.recipient_id, NpcId::from("blackwood"));
        assert_eq!(moved.queue_position, 1);
        assert_balance(&queue, "a", TokenCategory::Trust, 0);

        assert_eq!(
            queue.transfer(ids[0], &NpcId::from("blackwood")),
            Err(QueueError::Validation(ValidationFailure::SameRecipient(
                NpcId::from("blackwood")
            )))
        );
    }

    #[test]
    fn test_cancel_requires_strong_relationship() {
        let harness = TestHarness::new()
            .with_tokens("a", TokenCategory::Trust, 6)
            .with_tokens("a", TokenCategory::Commerce, 3)
            .with_tokens("a", TokenCategory::Shadow, -4);
        let mut queue = harness.build();
        let ids = harness.fill(&mut queue, &["a", "b"]);

        assert!(matches!(
            queue.cancel(ids[0]),
            Err(QueueError::Validation(ValidationFailure::RelationshipTooWeak {
                required: 10,
                available: 9,
                ..
            }))
        ));

        queue.ledger_mut().add(TokenCategory::Status, 1, &NpcId::from("a"));
        let cancelled = queue.cancel(ids[0]).expect("cancel");
        assert_eq!(cancelled.id, ids[0]);
        assert_eq!(queue.position_of(&ids[1]), Some(1));
        assert_balance(&queue, "a", TokenCategory::Trust, 6);
        assert_positions_consistent(&queue);
    }
}
