//! The fixed-size slot array.
//!
//! [`QueueStore`] only moves obligations around; it knows nothing about
//! tokens, history or events. Every mutating method leaves each occupied
//! slot's `queue_position` equal to its 1-based index and reports what moved
//! so the caller can charge and notify.

use crate::error::ValidationFailure;
use crate::obligation::{DeliveryObligation, NpcId, ObligationId, TokenCategory};
use serde::{Deserialize, Serialize};

/// One obligation changing slots as a side effect of another operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotMove {
    pub obligation_id: ObligationId,
    pub sender_id: NpcId,
    pub category: TokenCategory,
    pub from: usize,
    pub to: usize,
}

impl SlotMove {
    fn of(obligation: &DeliveryObligation, from: usize, to: usize) -> Self {
        Self {
            obligation_id: obligation.id,
            sender_id: obligation.sender_id.clone(),
            category: obligation.category,
            from,
            to,
        }
    }

    /// Slots travelled, in either direction.
    pub fn distance(&self) -> usize {
        self.from.abs_diff(self.to)
    }
}

/// Result of a shift that may push obligations off the end of the queue.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Shift {
    pub moves: Vec<SlotMove>,
    /// Obligations pushed past the last slot, already removed from the store.
    pub overflowed: Vec<DeliveryObligation>,
}

/// Ordered slots; position 1 is the front.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueStore {
    slots: Vec<Option<DeliveryObligation>>,
    next_sequence: u64,
}

impl QueueStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
            next_sequence: 1,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Raw slots, including empty ones.
    pub fn slots(&self) -> &[Option<DeliveryObligation>] {
        &self.slots
    }

    /// Occupied slots in priority order.
    pub fn active(&self) -> impl Iterator<Item = &DeliveryObligation> {
        self.slots.iter().flatten()
    }

    pub(crate) fn active_mut(&mut self) -> impl Iterator<Item = &mut DeliveryObligation> {
        self.slots.iter_mut().flatten()
    }

    pub fn count(&self) -> usize {
        self.active().count()
    }

    pub fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Reject positions outside `1..=capacity`.
    pub fn check_position(&self, position: usize) -> Result<(), ValidationFailure> {
        if position == 0 || position > self.capacity() {
            return Err(ValidationFailure::PositionOutOfRange {
                position,
                capacity: self.capacity(),
            });
        }
        Ok(())
    }

    pub fn obligation_at(&self, position: usize) -> Option<&DeliveryObligation> {
        position
            .checked_sub(1)
            .and_then(|index| self.slots.get(index))
            .and_then(Option::as_ref)
    }

    pub(crate) fn obligation_at_mut(&mut self, position: usize) -> Option<&mut DeliveryObligation> {
        position
            .checked_sub(1)
            .and_then(|index| self.slots.get_mut(index))
            .and_then(Option::as_mut)
    }

    pub fn position_of(&self, id: &ObligationId) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|o| o.id == *id))
            .map(|index| index + 1)
    }

    pub fn get(&self, id: &ObligationId) -> Option<&DeliveryObligation> {
        self.active().find(|o| o.id == *id)
    }

    pub(crate) fn get_mut(&mut self, id: &ObligationId) -> Option<&mut DeliveryObligation> {
        self.active_mut().find(|o| o.id == *id)
    }

    pub fn contains(&self, id: &ObligationId) -> bool {
        self.get(id).is_some()
    }

    /// Give an incoming obligation the next insertion sequence number.
    pub(crate) fn stamp(&mut self, obligation: &mut DeliveryObligation) {
        obligation.sequence = self.next_sequence;
        self.next_sequence += 1;
    }

    /// Put an obligation into a slot the caller knows is empty and in range.
    /// Returns whatever was there, which should be `None`.
    pub(crate) fn place(
        &mut self,
        position: usize,
        mut obligation: DeliveryObligation,
    ) -> Option<DeliveryObligation> {
        obligation.queue_position = position;
        let slot = self.slots.get_mut(position.checked_sub(1)?)?;
        slot.replace(obligation)
    }

    /// Remove and return the occupant of a slot, leaving a gap.
    pub(crate) fn take(&mut self, position: usize) -> Option<DeliveryObligation> {
        let mut obligation = self.slots.get_mut(position.checked_sub(1)?)?.take()?;
        obligation.queue_position = 0;
        Some(obligation)
    }

    /// Exchange two slots. Either may be empty.
    pub(crate) fn swap(&mut self, first: usize, second: usize) {
        if first == 0 || second == 0 || first > self.capacity() || second > self.capacity() {
            return;
        }
        self.slots.swap(first - 1, second - 1);
        self.renumber(first);
        self.renumber(second);
    }

    /// Cascade insert: the occupants of `target..=capacity` are lifted out in
    /// order, the new obligation takes `target`, and the lifted occupants are
    /// laid back down one after another from `target + 1`. Whoever no longer
    /// fits is returned in `overflowed`.
    pub(crate) fn insert_at(&mut self, obligation: DeliveryObligation, target: usize) -> Shift {
        let mut shift = Shift::default();
        if target == 0 || target > self.capacity() {
            return shift;
        }

        if self.obligation_at(target).is_none() {
            self.place(target, obligation);
            return shift;
        }

        let lifted: Vec<(usize, DeliveryObligation)> = (target..=self.capacity())
            .filter_map(|position| self.take(position).map(|o| (position, o)))
            .collect();

        self.place(target, obligation);

        let mut next = target + 1;
        for (from, occupant) in lifted {
            if next > self.capacity() {
                shift.overflowed.push(occupant);
                continue;
            }
            if from != next {
                shift.moves.push(SlotMove::of(&occupant, from, next));
            }
            self.place(next, occupant);
            next += 1;
        }
        shift
    }

    /// Move every occupant of `start..=capacity` down exactly one slot. The
    /// last slot's occupant, if any, falls off the end.
    pub(crate) fn shift_down_from(&mut self, start: usize) -> Shift {
        let mut shift = Shift::default();
        if start == 0 || start > self.capacity() {
            return shift;
        }

        let last = self.capacity();
        if let Some(fallen) = self.take(last) {
            shift.overflowed.push(fallen);
        }
        for from in (start..last).rev() {
            if let Some(occupant) = self.take(from) {
                shift.moves.push(SlotMove::of(&occupant, from, from + 1));
                self.place(from + 1, occupant);
            }
        }
        shift.moves.reverse();
        shift
    }

    /// Move the occupant of `from` forward to `to`, pushing every occupant of
    /// `to..from` back one slot. Nothing can fall off: the vacated `from`
    /// absorbs the shift.
    pub(crate) fn move_forward(&mut self, from: usize, to: usize) -> Vec<SlotMove> {
        let mut moves = Vec::new();
        if to == 0 || to >= from || from > self.capacity() {
            return moves;
        }
        let Some(moving) = self.take(from) else {
            return moves;
        };

        for position in (to..from).rev() {
            if let Some(occupant) = self.take(position) {
                moves.push(SlotMove::of(&occupant, position, position + 1));
                self.place(position + 1, occupant);
            }
        }
        self.place(to, moving);
        moves.reverse();
        moves
    }

    /// Close every gap in one left-to-right pass, preserving relative order.
    pub(crate) fn compact(&mut self) -> Vec<SlotMove> {
        self.compact_retaining(|_| true).0
    }

    /// Rebuild the slots left to right, keeping only obligations for which
    /// `keep` holds. Returns the moves made and the obligations dropped.
    pub(crate) fn compact_retaining(
        &mut self,
        mut keep: impl FnMut(&DeliveryObligation) -> bool,
    ) -> (Vec<SlotMove>, Vec<DeliveryObligation>) {
        let capacity = self.capacity();
        let old = std::mem::replace(&mut self.slots, vec![None; capacity]);
        let mut moves = Vec::new();
        let mut dropped = Vec::new();
        let mut next = 1;

        for (index, slot) in old.into_iter().enumerate() {
            let Some(mut obligation) = slot else {
                continue;
            };
            if !keep(&obligation) {
                obligation.queue_position = 0;
                dropped.push(obligation);
                continue;
            }
            let from = index + 1;
            if from != next {
                moves.push(SlotMove::of(&obligation, from, next));
            }
            self.place(next, obligation);
            next += 1;
        }
        (moves, dropped)
    }

    /// Whether every occupied slot's recorded position matches its index and
    /// no obligation appears twice.
    pub fn is_consistent(&self) -> bool {
        let positions_match = self
            .slots
            .iter()
            .enumerate()
            .all(|(index, slot)| slot.as_ref().map_or(true, |o| o.queue_position == index + 1));

        let mut ids: Vec<ObligationId> = self.active().map(|o| o.id).collect();
        let total = ids.len();
        ids.sort();
        ids.dedup();

        positions_match && ids.len() == total
    }

    fn renumber(&mut self, position: usize) {
        if let Some(obligation) = self.obligation_at_mut(position) {
            obligation.queue_position = position;
        }
    }
}
