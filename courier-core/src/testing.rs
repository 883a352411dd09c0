//! Testing utilities for the obligation queue.
//!
//! This module provides tools for deterministic tests:
//! - `TestHarness` for building a queue over seeded collaborators
//! - Setup helpers that place obligations directly into chosen slots
//! - Assertion helpers for verifying queue and ledger state

use crate::config::{ConfigError, QueueConfig};
use crate::engine::ObligationQueue;
use crate::ledger::InMemoryLedger;
use crate::npc::{Npc, NpcRoster};
use crate::obligation::{DeliveryObligation, NpcId, ObligationId, TokenCategory};
use crate::standing::{StandingObligation, StandingRegistry};

/// Recipient used by [`letter`].
pub const DEFAULT_RECIPIENT: &str = "aldric";

/// An obligation from `sender` to [`DEFAULT_RECIPIENT`] on default terms.
pub fn letter(sender: &str, category: TokenCategory) -> DeliveryObligation {
    DeliveryObligation::new(sender, DEFAULT_RECIPIENT, category)
}

/// Seeded collaborators plus configuration, ready to build queues.
#[derive(Debug, Clone)]
pub struct TestHarness {
    pub config: QueueConfig,
    pub ledger: InMemoryLedger,
    pub roster: NpcRoster,
    pub standing: StandingRegistry,
}

impl TestHarness {
    /// Default configuration, empty ledger, no standing obligations and a
    /// small cast of named NPCs.
    pub fn new() -> Self {
        let roster = [
            ("elena", "Elena"),
            ("marcus", "Marcus"),
            ("blackwood", "Lord Blackwood"),
            ("aldric", "Aldric"),
            ("garrett", "Garrett"),
            ("bertram", "Bertram"),
        ]
        .into_iter()
        .fold(NpcRoster::new(), |roster, (id, name)| {
            roster.with_npc(Npc::new(id, name))
        });

        Self {
            config: QueueConfig::default(),
            ledger: InMemoryLedger::new(),
            roster,
            standing: StandingRegistry::new(),
        }
    }

    pub fn with_config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    pub fn with_npc(mut self, id: &str, name: &str) -> Self {
        self.roster.add(Npc::new(id, name));
        self
    }

    pub fn with_tokens(mut self, npc_id: &str, category: TokenCategory, amount: i32) -> Self {
        self.ledger.set_balance(npc_id, category, amount);
        self
    }

    pub fn with_standing(mut self, obligation: StandingObligation) -> Self {
        self.standing.add(obligation);
        self
    }

    pub fn try_build(&self) -> Result<ObligationQueue, ConfigError> {
        ObligationQueue::new(
            self.config.clone(),
            self.ledger.clone(),
            self.roster.clone(),
            self.standing.clone(),
        )
    }

    /// Build a fresh queue. Panics on an invalid configuration.
    #[track_caller]
    pub fn build(&self) -> ObligationQueue {
        match self.try_build() {
            Ok(queue) => queue,
            Err(err) => panic!("Invalid test configuration: {err}"),
        }
    }

    /// Insert through the normal path and return the new id.
    #[track_caller]
    pub fn insert(
        &self,
        queue: &mut ObligationQueue,
        sender: &str,
        category: TokenCategory,
    ) -> ObligationId {
        match queue.insert(letter(sender, category)) {
            Ok(outcome) => outcome.obligation_id,
            Err(err) => panic!("Insert from {sender} failed: {err}"),
        }
    }

    /// Put an obligation straight into an empty slot, bypassing placement
    /// rules, penalties and events.
    #[track_caller]
    pub fn place(
        &self,
        queue: &mut ObligationQueue,
        position: usize,
        sender: &str,
        category: TokenCategory,
    ) -> ObligationId {
        self.place_obligation(queue, position, letter(sender, category))
    }

    #[track_caller]
    pub fn place_obligation(
        &self,
        queue: &mut ObligationQueue,
        position: usize,
        mut obligation: DeliveryObligation,
    ) -> ObligationId {
        assert!(
            queue.store.check_position(position).is_ok(),
            "Position {position} is outside the queue"
        );
        assert!(
            queue.store.obligation_at(position).is_none(),
            "Position {position} is already occupied"
        );
        let id = obligation.id;
        queue.store.stamp(&mut obligation);
        queue.store.place(position, obligation);
        id
    }

    /// Place Trust obligations from `senders` into slots 1, 2, 3...
    #[track_caller]
    pub fn fill(&self, queue: &mut ObligationQueue, senders: &[&str]) -> Vec<ObligationId> {
        senders
            .iter()
            .enumerate()
            .map(|(index, sender)| self.place(queue, index + 1, sender, TokenCategory::Trust))
            .collect()
    }

    /// Like [`fill`](Self::fill) with a category per obligation.
    #[track_caller]
    pub fn fill_with(
        &self,
        queue: &mut ObligationQueue,
        entries: &[(&str, TokenCategory)],
    ) -> Vec<ObligationId> {
        entries
            .iter()
            .enumerate()
            .map(|(index, (sender, category))| self.place(queue, index + 1, sender, *category))
            .collect()
    }

    /// Like [`fill`](Self::fill) with a deadline per obligation.
    #[track_caller]
    pub fn fill_deadlines(
        &self,
        queue: &mut ObligationQueue,
        entries: &[(&str, i32)],
    ) -> Vec<ObligationId> {
        entries
            .iter()
            .enumerate()
            .map(|(index, (sender, deadline))| {
                let obligation = letter(sender, TokenCategory::Trust).with_deadline(*deadline);
                self.place_obligation(queue, index + 1, obligation)
            })
            .collect()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert every occupied slot records its own position and no id repeats.
#[track_caller]
pub fn assert_positions_consistent(queue: &ObligationQueue) {
    for (index, slot) in queue.slots().iter().enumerate() {
        if let Some(obligation) = slot {
            assert_eq!(
                obligation.queue_position,
                index + 1,
                "Obligation {} in slot {} records position {}",
                obligation.id,
                index + 1,
                obligation.queue_position
            );
        }
    }
    assert!(
        queue.store().is_consistent(),
        "Queue holds the same obligation twice"
    );
}

/// Assert occupied slots form an unbroken run from slot 1.
#[track_caller]
pub fn assert_no_gaps(queue: &ObligationQueue) {
    let count = queue.count();
    let leading = queue.slots().iter().take_while(|slot| slot.is_some()).count();
    assert_eq!(
        leading, count,
        "Expected {count} obligations packed at the front, found {leading}"
    );
}

/// Assert a ledger balance.
#[track_caller]
pub fn assert_balance(queue: &ObligationQueue, npc_id: &str, category: TokenCategory, expected: i32) {
    let actual = queue.ledger().balance(&NpcId::from(npc_id), category);
    assert_eq!(
        actual, expected,
        "Expected {npc_id} {category} balance {expected}, got {actual}"
    );
}

/// Assert what occupies a slot.
#[track_caller]
pub fn assert_slot(queue: &ObligationQueue, position: usize, expected: Option<ObligationId>) {
    let actual = queue.obligation_at(position).map(|o| o.id);
    assert_eq!(actual, expected, "Unexpected occupant of slot {position}");
}

/// Assert the queued obligations, front first.
#[track_caller]
pub fn assert_order(queue: &ObligationQueue, expected: &[ObligationId]) {
    let actual: Vec<ObligationId> = queue.active_obligations().map(|o| o.id).collect();
    assert_eq!(actual, expected, "Unexpected queue order");
}
