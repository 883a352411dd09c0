//! Per-relationship token balances.
//!
//! The queue only reads, spends, adds and removes through [`TokenLedger`];
//! it never writes balances directly. Balances are signed and have no floor,
//! so debt is represented as a negative balance.

use crate::obligation::{NpcId, TokenCategory};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Token balances keyed by NPC and category.
pub trait TokenLedger {
    /// All non-zero balances held with an NPC.
    fn balances(&self, npc_id: &NpcId) -> BTreeMap<TokenCategory, i32>;

    /// Balance in a single category (zero when never touched).
    fn balance(&self, npc_id: &NpcId, category: TokenCategory) -> i32 {
        self.balances(npc_id).get(&category).copied().unwrap_or(0)
    }

    /// Spend tokens. Fails without mutating when the balance is below `amount`.
    fn spend(&mut self, category: TokenCategory, amount: u32, npc_id: &NpcId) -> bool;

    /// Grant tokens.
    fn add(&mut self, category: TokenCategory, amount: u32, npc_id: &NpcId);

    /// Remove tokens unconditionally; the balance may go negative.
    fn remove(&mut self, category: TokenCategory, amount: u32, npc_id: &NpcId);
}

/// A plain in-memory ledger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryLedger {
    balances: HashMap<NpcId, BTreeMap<TokenCategory, i32>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a balance, replacing whatever was there.
    pub fn with_balance(
        mut self,
        npc_id: impl Into<NpcId>,
        category: TokenCategory,
        amount: i32,
    ) -> Self {
        self.set_balance(npc_id, category, amount);
        self
    }

    pub fn set_balance(&mut self, npc_id: impl Into<NpcId>, category: TokenCategory, amount: i32) {
        self.balances
            .entry(npc_id.into())
            .or_default()
            .insert(category, amount);
    }

    /// Sum of every balance in the ledger. Useful for conservation checks.
    pub fn total(&self) -> i64 {
        self.balances
            .values()
            .flat_map(|by_category| by_category.values())
            .map(|&v| v as i64)
            .sum()
    }

    fn adjust(&mut self, npc_id: &NpcId, category: TokenCategory, delta: i32) {
        let entry = self
            .balances
            .entry(npc_id.clone())
            .or_default()
            .entry(category)
            .or_insert(0);
        *entry = entry.saturating_add(delta);
    }
}

impl TokenLedger for InMemoryLedger {
    fn balances(&self, npc_id: &NpcId) -> BTreeMap<TokenCategory, i32> {
        self.balances
            .get(npc_id)
            .map(|by_category| {
                by_category
                    .iter()
                    .filter(|&(_, &v)| v != 0)
                    .map(|(&k, &v)| (k, v))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn spend(&mut self, category: TokenCategory, amount: u32, npc_id: &NpcId) -> bool {
        let amount = to_signed(amount);
        if self.balance(npc_id, category) < amount {
            return false;
        }
        self.adjust(npc_id, category, -amount);
        true
    }

    fn add(&mut self, category: TokenCategory, amount: u32, npc_id: &NpcId) {
        self.adjust(npc_id, category, to_signed(amount));
    }

    fn remove(&mut self, category: TokenCategory, amount: u32, npc_id: &NpcId) {
        self.adjust(npc_id, category, -to_signed(amount));
    }
}

fn to_signed(amount: u32) -> i32 {
    i32::try_from(amount).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn npc(id: &str) -> NpcId {
        NpcId::from(id)
    }

    #[test]
    fn test_untouched_balance_is_zero() {
        let ledger = InMemoryLedger::new();
        assert_eq!(ledger.balance(&npc("elena"), TokenCategory::Trust), 0);
        assert!(ledger.balances(&npc("elena")).is_empty());
    }

    #[test]
    fn test_spend_requires_balance() {
        let mut ledger = InMemoryLedger::new().with_balance("elena", TokenCategory::Trust, 3);

        assert!(!ledger.spend(TokenCategory::Trust, 4, &npc("elena")));
        assert_eq!(ledger.balance(&npc("elena"), TokenCategory::Trust), 3);

        assert!(ledger.spend(TokenCategory::Trust, 3, &npc("elena")));
        assert_eq!(ledger.balance(&npc("elena"), TokenCategory::Trust), 0);
    }

    #[test]
    fn test_spend_zero_always_succeeds() {
        let mut ledger = InMemoryLedger::new().with_balance("elena", TokenCategory::Trust, -2);
        assert!(ledger.spend(TokenCategory::Trust, 0, &npc("elena")));
        assert_eq!(ledger.balance(&npc("elena"), TokenCategory::Trust), -2);
    }

    #[test]
    fn test_remove_goes_negative() {
        let mut ledger = InMemoryLedger::new().with_balance("elena", TokenCategory::Commerce, 1);
        ledger.remove(TokenCategory::Commerce, 3, &npc("elena"));
        assert_eq!(ledger.balance(&npc("elena"), TokenCategory::Commerce), -2);
    }

    #[test]
    fn test_balances_are_per_npc_and_category() {
        let mut ledger = InMemoryLedger::new()
            .with_balance("elena", TokenCategory::Trust, 2)
            .with_balance("elena", TokenCategory::Shadow, -1);
        ledger.add(TokenCategory::Trust, 1, &npc("marcus"));

        let elena = ledger.balances(&npc("elena"));
        assert_eq!(elena.get(&TokenCategory::Trust), Some(&2));
        assert_eq!(elena.get(&TokenCategory::Shadow), Some(&-1));
        assert_eq!(ledger.balance(&npc("marcus"), TokenCategory::Trust), 1);
        assert_eq!(ledger.total(), 2);
    }
}
