//! ObligationQueue - the session-level API for the delivery queue.
//!
//! The queue owns the slot store, the per-NPC history, the clock and the
//! event outbox, and holds the three external collaborators (token ledger,
//! NPC directory, standing obligations) behind traits. Every public
//! operation runs to completion in one call and either succeeds or returns
//! an error before touching any state.
//!
//! Insertion and paid displacement live in [`displacement`](crate::displacement),
//! time decay in [`decay`](crate::decay) and player actions in
//! [`manipulation`](crate::manipulation); they are all methods on
//! [`ObligationQueue`].

use crate::clock::GameClock;
use crate::config::{ConfigError, QueueConfig};
use crate::error::{QueueError, ValidationFailure};
use crate::events::{EventOutbox, QueueEvent};
use crate::history::{HistoryBook, LetterHistory};
use crate::ledger::TokenLedger;
use crate::npc::{Npc, NpcDirectory};
use crate::obligation::{DeliveryObligation, NpcId, ObligationId, TokenCategory};
use crate::position::{Placement, PositionCalculator};
use crate::queue::{QueueStore, SlotMove};
use crate::standing::{QueueAction, StandingObligations};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// What the player got for a delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    /// The delivered obligation, no longer queued.
    pub obligation: DeliveryObligation,
    /// Coins owed to the player.
    pub payment: u32,
    /// Tokens granted with the recipient.
    pub reward_tokens: u32,
}

/// The player's obligation queue.
pub struct ObligationQueue {
    pub(crate) config: QueueConfig,
    pub(crate) store: QueueStore,
    pub(crate) ledger: Box<dyn TokenLedger>,
    pub(crate) npcs: Box<dyn NpcDirectory>,
    pub(crate) standing: Box<dyn StandingObligations>,
    pub(crate) history: HistoryBook,
    pub(crate) clock: GameClock,
    pub(crate) last_morning_swap_day: Option<u32>,
    pub(crate) events: EventOutbox,
}

impl ObligationQueue {
    /// Create an empty queue. The clock starts at the free swap window of day 1.
    pub fn new(
        config: QueueConfig,
        ledger: impl TokenLedger + 'static,
        npcs: impl NpcDirectory + 'static,
        standing: impl StandingObligations + 'static,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let clock = GameClock::at_window(1, config.free_swap_window, config.segments_per_day);
        Ok(Self {
            store: QueueStore::new(config.capacity),
            ledger: Box::new(ledger),
            npcs: Box::new(npcs),
            standing: Box::new(standing),
            history: HistoryBook::new(),
            clock,
            last_morning_swap_day: None,
            events: EventOutbox::new(),
            config,
        })
    }

    // ========================================================================
    // Collaborators and state
    // ========================================================================

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn ledger(&self) -> &dyn TokenLedger {
        self.ledger.as_ref()
    }

    /// Mutable ledger access for the host game (rewards, trades).
    pub fn ledger_mut(&mut self) -> &mut dyn TokenLedger {
        self.ledger.as_mut()
    }

    pub fn npcs(&self) -> &dyn NpcDirectory {
        self.npcs.as_ref()
    }

    pub fn clock(&self) -> GameClock {
        self.clock
    }

    /// Synchronise the queue's clock with the host game. Deadlines are not
    /// touched; use [`advance_time`](Self::advance_time) for that. A zero
    /// day length is raised to one segment.
    pub fn set_clock(&mut self, clock: GameClock) {
        self.clock = clock.normalized();
    }

    pub fn history(&self) -> &HistoryBook {
        &self.history
    }

    pub fn history_for(&self, npc_id: &NpcId) -> LetterHistory {
        self.history.get(npc_id).copied().unwrap_or_default()
    }

    /// Drain every event emitted since the last call.
    pub fn take_events(&mut self) -> Vec<QueueEvent> {
        self.events.drain()
    }

    pub fn pending_events(&self) -> &[QueueEvent] {
        self.events.pending()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn store(&self) -> &QueueStore {
        &self.store
    }

    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    pub fn slots(&self) -> &[Option<DeliveryObligation>] {
        self.store.slots()
    }

    /// Queued obligations, front first.
    pub fn active_obligations(&self) -> impl Iterator<Item = &DeliveryObligation> {
        self.store.active()
    }

    pub fn position_of(&self, id: &ObligationId) -> Option<usize> {
        self.store.position_of(id)
    }

    pub fn obligation_at(&self, position: usize) -> Option<&DeliveryObligation> {
        self.store.obligation_at(position)
    }

    pub fn get(&self, id: &ObligationId) -> Option<&DeliveryObligation> {
        self.store.get(id)
    }

    pub fn count(&self) -> usize {
        self.store.count()
    }

    pub fn is_full(&self) -> bool {
        self.store.is_full()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    // ========================================================================
    // Placement
    // ========================================================================

    /// Where this obligation would enter the queue right now, ignoring any
    /// priority cause. Reads the ledger but changes nothing.
    pub fn placement_for(&self, obligation: &DeliveryObligation) -> Placement {
        let calculator = PositionCalculator::new(&self.config);
        match self.resolve_sender(obligation) {
            Some(npc) => {
                let balances = self.ledger.balances(&npc.id);
                let has_standing = self.standing.active_for(&npc.id);
                calculator.compute(&balances, has_standing)
            }
            None => calculator.neutral(),
        }
    }

    /// Look the sender up by id, then by display name.
    fn resolve_sender(&self, obligation: &DeliveryObligation) -> Option<&Npc> {
        self.npcs
            .by_id(&obligation.sender_id)
            .or_else(|| self.npcs.by_name(&obligation.sender_name))
    }

    /// Look an NPC up by id, then treating the id as a display name.
    pub(crate) fn resolve_npc(&self, npc_id: &NpcId) -> Option<&Npc> {
        self.npcs
            .by_id(npc_id)
            .or_else(|| self.npcs.by_name(npc_id.as_str()))
    }

    // ========================================================================
    // Delivery
    // ========================================================================

    /// Deliver the obligation in slot 1.
    #[instrument(skip(self))]
    pub fn deliver_from_front(&mut self) -> Result<DeliveryReceipt, QueueError> {
        if self.store.obligation_at(1).is_none() {
            return Err(ValidationFailure::EmptySlot { position: 1 }.into());
        }
        self.deliver_at(1)
    }

    /// Deliver a specific obligation wherever it sits. Whether the player is
    /// actually at the recipient is the caller's concern.
    #[instrument(skip(self), fields(obligation_id = %id))]
    pub fn deliver(&mut self, id: ObligationId) -> Result<DeliveryReceipt, QueueError> {
        let position = self.store.position_of(&id).ok_or(QueueError::NotFound(id))?;
        self.deliver_at(position)
    }

    fn deliver_at(&mut self, position: usize) -> Result<DeliveryReceipt, QueueError> {
        let obligation = self
            .store
            .take(position)
            .ok_or(ValidationFailure::EmptySlot { position })?;
        let moves = self.store.compact();

        let reward = self.config.delivery_reward;
        if reward > 0 {
            self.ledger
                .add(obligation.category, reward, &obligation.recipient_id);
        }
        self.history.record_delivery(&obligation.sender_id);

        info!(
            obligation_id = %obligation.id,
            sender = %obligation.sender_id,
            recipient = %obligation.recipient_id,
            payment = obligation.payment,
            "Obligation delivered"
        );
        self.emit(QueueEvent::Delivered {
            obligation_id: obligation.id,
            sender_id: obligation.sender_id.clone(),
            recipient_id: obligation.recipient_id.clone(),
            payment: obligation.payment,
        });
        self.emit_moves(&moves);

        Ok(DeliveryReceipt {
            payment: obligation.payment,
            reward_tokens: reward,
            obligation,
        })
    }

    // ========================================================================
    // Shared helpers
    // ========================================================================

    pub(crate) fn emit(&mut self, event: QueueEvent) {
        self.events.push(event);
    }

    pub(crate) fn emit_moves(&mut self, moves: &[SlotMove]) {
        for SlotMove {
            obligation_id,
            sender_id,
            from,
            to,
            ..
        } in moves
        {
            self.events.push(QueueEvent::Shifted {
                obligation_id: *obligation_id,
                sender_id: sender_id.clone(),
                from: *from,
                to: *to,
            });
        }
    }

    /// Relationship damage for a dropped obligation: tokens removed from the
    /// sender and an expiry on their record.
    pub(crate) fn penalise_sender(&mut self, obligation: &DeliveryObligation, penalty: u32) {
        if penalty > 0 {
            self.ledger
                .remove(obligation.category, penalty, &obligation.sender_id);
        }
        self.history.record_expiry(&obligation.sender_id);
    }

    /// Fail with `Vetoed` when a standing obligation forbids the action.
    pub(crate) fn check_veto(
        &self,
        action: QueueAction,
        obligation: &DeliveryObligation,
    ) -> Result<(), QueueError> {
        match self.standing.is_action_forbidden(action, obligation) {
            Some(reason) => {
                debug!(%action, obligation_id = %obligation.id, %reason, "Action vetoed");
                Err(QueueError::Vetoed { action, reason })
            }
            None => Ok(()),
        }
    }

    /// Fail with `InsufficientTokens` unless the balance covers `amount`.
    pub(crate) fn ensure_affordable(
        &self,
        npc_id: &NpcId,
        category: TokenCategory,
        amount: u32,
    ) -> Result<(), QueueError> {
        let available = self.ledger.balance(npc_id, category);
        if i64::from(available) < i64::from(amount) {
            return Err(QueueError::InsufficientTokens {
                npc_id: npc_id.clone(),
                category,
                required: amount,
                available,
            });
        }
        Ok(())
    }

    /// Check then spend. Nothing is spent on failure.
    pub(crate) fn charge(
        &mut self,
        npc_id: &NpcId,
        category: TokenCategory,
        amount: u32,
    ) -> Result<(), QueueError> {
        self.spend_all(&[(npc_id.clone(), category, amount)])
    }

    /// Spend several amounts as one payment. Every balance is checked before
    /// anything is spent, and earlier spends are refunded if the ledger still
    /// refuses one. Each (NPC, category) pair should appear once.
    pub(crate) fn spend_all(
        &mut self,
        charges: &[(NpcId, TokenCategory, u32)],
    ) -> Result<(), QueueError> {
        for (npc_id, category, amount) in charges {
            self.ensure_affordable(npc_id, *category, *amount)?;
        }
        for (index, (npc_id, category, amount)) in charges.iter().enumerate() {
            if self.ledger.spend(*category, *amount, npc_id) {
                continue;
            }
            for (refund_npc, refund_category, refund) in &charges[..index] {
                self.ledger.add(*refund_category, *refund, refund_npc);
            }
            return Err(QueueError::InsufficientTokens {
                npc_id: npc_id.clone(),
                category: *category,
                required: *amount,
                available: self.ledger.balance(npc_id, *category),
            });
        }
        Ok(())
    }

    /// The obligation at `position`, or the matching validation failure.
    pub(crate) fn occupant(&self, position: usize) -> Result<&DeliveryObligation, QueueError> {
        self.store.check_position(position)?;
        self.store
            .obligation_at(position)
            .ok_or_else(|| ValidationFailure::EmptySlot { position }.into())
    }
}

impl std::fmt::Debug for ObligationQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObligationQueue")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("history", &self.history)
            .field("clock", &self.clock)
            .field("last_morning_swap_day", &self.last_morning_swap_day)
            .field("pending_events", &self.events.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestHarness;

    #[test]
    fn test_new_rejects_invalid_config() {
        let harness = TestHarness::new();
        let config = QueueConfig::default().with_capacity(1);
        let result = ObligationQueue::new(
            config,
            harness.ledger.clone(),
            harness.roster.clone(),
            harness.standing.clone(),
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_clock_starts_in_free_window() {
        let queue = TestHarness::new().build();
        assert_eq!(queue.clock().day, 1);
        assert_eq!(queue.clock().window(), queue.config().free_swap_window);
    }

    #[test]
    fn test_set_clock_with_zero_day_length() {
        let harness = TestHarness::new();
        let mut queue = harness.build();
        harness.fill(&mut queue, &["a", "b"]);

        queue.set_clock(GameClock {
            day: 1,
            segment: 0,
            segments_per_day: 0,
        });
        assert_eq!(queue.clock().segments_per_day, 1);

        assert!(matches!(
            queue.morning_swap(1, 2),
            Err(QueueError::Validation(ValidationFailure::WrongTimeWindow { .. }))
        ));
        let report = queue.advance_time(1);
        assert!(report.expired.is_empty());
        assert_eq!(queue.clock().day, 2);
    }

    #[test]
    fn test_unknown_sender_gets_neutral_placement() {
        let queue = TestHarness::new().build();
        let stranger = DeliveryObligation::new("stranger", "elena", TokenCategory::Trust);
        let placement = queue.placement_for(&stranger);
        assert_eq!(placement.position, 8);
    }

    #[test]
    fn test_sender_resolved_by_name() {
        let queue = TestHarness::new()
            .with_tokens("elena", TokenCategory::Trust, 4)
            .build();
        let letter = DeliveryObligation::new("unknown-id", "marcus", TokenCategory::Trust)
            .with_sender_name("Elena");
        assert_eq!(queue.placement_for(&letter).position, 4);
    }

    #[test]
    fn test_deliver_from_front_compacts_and_rewards() {
        let harness = TestHarness::new().with_tokens("elena", TokenCategory::Trust, 1);
        let mut queue = harness.build();
        let first = harness.insert(&mut queue, "elena", TokenCategory::Trust);
        let second = harness.insert(&mut queue, "marcus", TokenCategory::Commerce);
        assert_eq!(queue.position_of(&first), Some(7));
        assert_eq!(queue.position_of(&second), Some(8));

        // Nothing in slot 1 yet.
        assert!(queue.deliver_from_front().is_err());

        let receipt = queue.deliver(first).expect("deliverable");
        assert_eq!(receipt.obligation.id, first);
        assert_eq!(receipt.reward_tokens, 1);
        assert_eq!(queue.position_of(&second), Some(1));
        assert_eq!(queue.history_for(&NpcId::from("elena")).delivered, 1);
        assert_eq!(
            queue
                .ledger()
                .balance(&receipt.obligation.recipient_id, TokenCategory::Trust),
            1
        );

        let front = queue.deliver_from_front().expect("slot 1 occupied");
        assert_eq!(front.obligation.id, second);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_deliver_unknown_id() {
        let mut queue = TestHarness::new().build();
        let missing = ObligationId::new();
        assert_eq!(queue.deliver(missing), Err(QueueError::NotFound(missing)));
    }
}
