//! Standing obligations: persistent contracts between the player and an NPC.
//!
//! They are read-only to the queue. A standing obligation can
//! - force position 1 for obligations from its NPC,
//! - grant deadline bonuses by category (and optionally NPC),
//! - forbid manipulation actions,
//! - raise the price of skipping.

use crate::obligation::{DeliveryObligation, NpcId, TokenCategory};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A player action that a standing obligation may veto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueAction {
    Purge,
    PriorityMove,
    ExtendDeadline,
    Skip,
    Transfer,
    Cancel,
    Displace,
}

impl QueueAction {
    pub fn name(&self) -> &'static str {
        match self {
            QueueAction::Purge => "purge",
            QueueAction::PriorityMove => "priority move",
            QueueAction::ExtendDeadline => "extend deadline",
            QueueAction::Skip => "skip",
            QueueAction::Transfer => "transfer",
            QueueAction::Cancel => "cancel",
            QueueAction::Displace => "displace",
        }
    }
}

impl fmt::Display for QueueAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Read-only view of the player's standing obligations.
pub trait StandingObligations {
    /// Whether the player has an active standing obligation with this NPC.
    fn active_for(&self, npc_id: &NpcId) -> bool;

    /// `Some(reason)` when a standing obligation forbids the action.
    fn is_action_forbidden(
        &self,
        action: QueueAction,
        obligation: &DeliveryObligation,
    ) -> Option<String>;

    /// Extend the obligation's deadline by any applicable bonuses.
    /// Returns the total bonus applied.
    fn apply_deadline_bonus(&self, obligation: &mut DeliveryObligation) -> i32;

    /// Multiplier applied to the per-slot price of skipping this obligation.
    fn skip_cost_multiplier(&self, _obligation: &DeliveryObligation) -> u32 {
        1
    }
}

/// One standing obligation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandingObligation {
    pub name: String,

    /// NPC the contract is with, if NPC-specific.
    pub npc_id: Option<NpcId>,

    /// Categories the effects apply to. Empty means all.
    pub categories: Vec<TokenCategory>,

    /// Time units added to matching obligations on insertion.
    pub deadline_bonus: i32,

    /// Actions forbidden on matching obligations.
    pub forbidden_actions: Vec<QueueAction>,

    /// Skip price multiplier for matching obligations.
    pub skip_multiplier: u32,

    pub is_active: bool,
}

impl StandingObligation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            npc_id: None,
            categories: Vec::new(),
            deadline_bonus: 0,
            forbidden_actions: Vec::new(),
            skip_multiplier: 1,
            is_active: true,
        }
    }

    pub fn with_npc(mut self, npc_id: impl Into<NpcId>) -> Self {
        self.npc_id = Some(npc_id.into());
        self
    }

    pub fn with_category(mut self, category: TokenCategory) -> Self {
        if !self.categories.contains(&category) {
            self.categories.push(category);
        }
        self
    }

    pub fn with_deadline_bonus(mut self, bonus: i32) -> Self {
        self.deadline_bonus = bonus;
        self
    }

    pub fn forbidding(mut self, action: QueueAction) -> Self {
        if !self.forbidden_actions.contains(&action) {
            self.forbidden_actions.push(action);
        }
        self
    }

    pub fn with_skip_multiplier(mut self, multiplier: u32) -> Self {
        self.skip_multiplier = multiplier.max(1);
        self
    }

    /// Whether this contract's effects apply to the obligation.
    pub fn applies_to(&self, obligation: &DeliveryObligation) -> bool {
        if !self.is_active {
            return false;
        }
        let category_matches =
            self.categories.is_empty() || self.categories.contains(&obligation.category);
        let npc_matches = self
            .npc_id
            .as_ref()
            .map_or(true, |id| *id == obligation.sender_id);
        category_matches && npc_matches
    }
}

/// In-memory set of standing obligations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandingRegistry {
    obligations: Vec<StandingObligation>,
}

impl StandingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, obligation: StandingObligation) -> Self {
        self.add(obligation);
        self
    }

    pub fn add(&mut self, obligation: StandingObligation) {
        self.obligations.push(obligation);
    }

    pub fn active(&self) -> impl Iterator<Item = &StandingObligation> {
        self.obligations.iter().filter(|o| o.is_active)
    }
}

impl StandingObligations for StandingRegistry {
    fn active_for(&self, npc_id: &NpcId) -> bool {
        self.active().any(|o| o.npc_id.as_ref() == Some(npc_id))
    }

    fn is_action_forbidden(
        &self,
        action: QueueAction,
        obligation: &DeliveryObligation,
    ) -> Option<String> {
        self.active()
            .find(|o| o.applies_to(obligation) && o.forbidden_actions.contains(&action))
            .map(|o| format!("{} forbids {}", o.name, action))
    }

    fn apply_deadline_bonus(&self, obligation: &mut DeliveryObligation) -> i32 {
        let bonus: i32 = self
            .active()
            .filter(|o| o.applies_to(obligation))
            .map(|o| o.deadline_bonus)
            .sum();
        obligation.deadline = obligation.deadline.saturating_add(bonus);
        bonus
    }

    fn skip_cost_multiplier(&self, obligation: &DeliveryObligation) -> u32 {
        self.active()
            .filter(|o| o.applies_to(obligation))
            .map(|o| o.skip_multiplier)
            .max()
            .unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letter(sender: &str, category: TokenCategory) -> DeliveryObligation {
        DeliveryObligation::new(sender, "marcus", category).with_deadline(10)
    }

    #[test]
    fn test_active_for_npc() {
        let registry = StandingRegistry::new()
            .with(StandingObligation::new("Elena's Promise").with_npc("elena"));

        assert!(registry.active_for(&NpcId::from("elena")));
        assert!(!registry.active_for(&NpcId::from("marcus")));
    }

    #[test]
    fn test_inactive_obligation_is_ignored() {
        let mut contract = StandingObligation::new("Lapsed").with_npc("elena");
        contract.is_active = false;
        let registry = StandingRegistry::new().with(contract);

        assert!(!registry.active_for(&NpcId::from("elena")));
    }

    #[test]
    fn test_deadline_bonus_by_category_and_npc() {
        let registry = StandingRegistry::new()
            .with(
                StandingObligation::new("Merchant Guild")
                    .with_category(TokenCategory::Commerce)
                    .with_deadline_bonus(48),
            )
            .with(
                StandingObligation::new("Elena's Favor")
                    .with_npc("elena")
                    .with_deadline_bonus(4),
            );

        let mut commerce = letter("elena", TokenCategory::Commerce);
        assert_eq!(registry.apply_deadline_bonus(&mut commerce), 52);
        assert_eq!(commerce.deadline, 62);

        let mut trust = letter("marcus", TokenCategory::Trust);
        assert_eq!(registry.apply_deadline_bonus(&mut trust), 0);
        assert_eq!(trust.deadline, 10);
    }

    #[test]
    fn test_forbidden_action_reports_reason() {
        let registry = StandingRegistry::new().with(
            StandingObligation::new("Noble Oath")
                .with_category(TokenCategory::Status)
                .forbidding(QueueAction::Purge),
        );

        let status = letter("blackwood", TokenCategory::Status);
        let reason = registry.is_action_forbidden(QueueAction::Purge, &status);
        assert_eq!(reason.as_deref(), Some("Noble Oath forbids purge"));
        assert!(registry
            .is_action_forbidden(QueueAction::Skip, &status)
            .is_none());
        assert!(registry
            .is_action_forbidden(QueueAction::Purge, &letter("x", TokenCategory::Trust))
            .is_none());
    }

    #[test]
    fn test_skip_multiplier_takes_highest() {
        let registry = StandingRegistry::new()
            .with(StandingObligation::new("A").with_skip_multiplier(2))
            .with(
                StandingObligation::new("B")
                    .with_category(TokenCategory::Shadow)
                    .with_skip_multiplier(3),
            );

        assert_eq!(
            registry.skip_cost_multiplier(&letter("x", TokenCategory::Shadow)),
            3
        );
        assert_eq!(
            registry.skip_cost_multiplier(&letter("x", TokenCategory::Trust)),
            2
        );
        assert_eq!(
            StandingRegistry::new().skip_cost_multiplier(&letter("x", TokenCategory::Trust)),
            1
        );
    }
}
